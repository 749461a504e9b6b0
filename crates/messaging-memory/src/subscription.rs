use crate::{Error, Nodes};

use std::error::Error as StdError;
use std::fmt::Debug;

use async_trait::async_trait;
use bytes::Bytes;
use poker_messaging::subscription::Subscription;
use poker_messaging::subscription_handler::SubscriptionHandler;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A node registered on a [`MemoryBus`](crate::MemoryBus).
///
/// Dropping the subscription without calling `unregister` keeps delivering
/// messages until the bus is dropped.
#[derive(Debug)]
pub struct MemorySubscription {
    node_id: String,
    nodes: Nodes,
    cancellation: CancellationToken,
    task: JoinHandle<()>,
}

impl MemorySubscription {
    pub(crate) fn spawn<X, T, D, S>(
        node_id: String,
        nodes: Nodes,
        mut receiver: broadcast::Receiver<Bytes>,
        handler: X,
    ) -> Self
    where
        X: SubscriptionHandler<T, D, S>,
        T: Clone
            + Debug
            + Send
            + Sync
            + TryFrom<Bytes, Error = D>
            + TryInto<Bytes, Error = S>
            + 'static,
        D: Debug + Send + StdError + Sync + 'static,
        S: Debug + Send + StdError + Sync + 'static,
    {
        let cancellation = CancellationToken::new();
        let token = cancellation.clone();
        let task_node_id = node_id.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => {
                        break;
                    }
                    message = receiver.recv() => {
                        match message {
                            Ok(bytes) => match T::try_from(bytes) {
                                Ok(data) => {
                                    if let Err(e) = handler.handle(data).await {
                                        warn!(node_id = %task_node_id, error = %e, "handler failed");
                                    }
                                }
                                Err(e) => {
                                    warn!(node_id = %task_node_id, error = %e, "dropping undecodable message");
                                }
                            },
                            Err(RecvError::Lagged(skipped)) => {
                                warn!(node_id = %task_node_id, skipped, "subscription lagged behind");
                            }
                            Err(RecvError::Closed) => {
                                break;
                            }
                        }
                    }
                }
            }

            debug!(node_id = %task_node_id, "delivery stopped");
        });

        Self {
            node_id,
            nodes,
            cancellation,
            task,
        }
    }
}

#[async_trait]
impl Subscription for MemorySubscription {
    type Error = Error;

    fn node_id(&self) -> &str {
        &self.node_id
    }

    async fn unregister(self) -> Result<(), Self::Error> {
        self.cancellation.cancel();
        let result = self.task.await;
        self.nodes.lock().await.remove(&self.node_id);

        result.map_err(|e| Error::Task(e.to_string()))
    }
}

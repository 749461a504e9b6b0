//! In-memory implementation of the messaging crate.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod subscription;

pub use error::Error;
pub use subscription::MemorySubscription;

use std::collections::HashSet;
use std::error::Error as StdError;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use poker_messaging::bus::MessageBus;
use poker_messaging::subscription_handler::SubscriptionHandler;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, broadcast};
use tracing::debug;

type Nodes = Arc<Mutex<HashSet<String>>>;

/// Options for the in-memory bus.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemoryBusOptions {
    /// How many messages a slow node may fall behind before it misses some.
    pub capacity: usize,
}

impl Default for MemoryBusOptions {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

/// A bus connecting nodes running in the same process.
///
/// Clones share the same channel.
#[derive(Debug)]
pub struct MemoryBus<T> {
    sender: broadcast::Sender<Bytes>,
    nodes: Nodes,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for MemoryBus<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            nodes: self.nodes.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> MemoryBus<T> {
    /// Creates a bus without registered nodes.
    #[must_use]
    pub fn new(options: MemoryBusOptions) -> Self {
        let (sender, _) = broadcast::channel(options.capacity.max(1));

        Self {
            sender,
            nodes: Arc::new(Mutex::new(HashSet::new())),
            _marker: PhantomData,
        }
    }

    /// The ids of the registered nodes.
    pub async fn node_ids(&self) -> Vec<String> {
        let mut node_ids: Vec<String> = self.nodes.lock().await.iter().cloned().collect();
        node_ids.sort_unstable();
        node_ids
    }
}

impl<T> Default for MemoryBus<T> {
    fn default() -> Self {
        Self::new(MemoryBusOptions::default())
    }
}

#[async_trait]
impl<T, D, S> MessageBus<T, D, S> for MemoryBus<T>
where
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
    type Error = Error;
    type SubscriptionType = MemorySubscription;

    async fn register<X>(&self, node_id: String, handler: X) -> Result<MemorySubscription, Error>
    where
        X: SubscriptionHandler<T, D, S>,
    {
        if !self.nodes.lock().await.insert(node_id.clone()) {
            return Err(Error::NodeAlreadyRegistered(node_id));
        }

        debug!(node_id = %node_id, "node registered");
        let receiver = self.sender.subscribe();
        Ok(MemorySubscription::spawn(
            node_id,
            self.nodes.clone(),
            receiver,
            handler,
        ))
    }

    async fn send_message(&self, message: T) -> Result<(), Error> {
        let bytes: Bytes = message
            .try_into()
            .map_err(|e: S| Error::Encode(e.to_string()))?;

        // no registered node is not an error
        let _ = self.sender.send(bytes);

        Ok(())
    }
}

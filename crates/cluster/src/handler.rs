use crate::error::HandlerError;
use crate::message::{DecodeError, EncodeError, NodeMessage};

use async_trait::async_trait;
use poker_messaging::subscription_handler::SubscriptionHandler;
use tokio::sync::mpsc;

/// Hands messages delivered by the bus to the synchronizer's worker.
#[derive(Clone, Debug)]
pub(crate) struct InboundHandler {
    sender: mpsc::UnboundedSender<NodeMessage>,
}

impl InboundHandler {
    pub(crate) const fn new(sender: mpsc::UnboundedSender<NodeMessage>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl SubscriptionHandler<NodeMessage, DecodeError, EncodeError> for InboundHandler {
    type Error = HandlerError;

    async fn handle(&self, data: NodeMessage) -> Result<(), Self::Error> {
        self.sender.send(data).map_err(|_| HandlerError)
    }
}

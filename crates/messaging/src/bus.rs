use crate::subscription::Subscription;
use crate::subscription_handler::SubscriptionHandler;

use std::error::Error;
use std::fmt::Debug;

use async_trait::async_trait;
use bytes::Bytes;

/// Marker trait for bus errors
pub trait MessageBusError: Error + Send + Sync + 'static {}

/// A publish/subscribe transport between nodes.
///
/// Every registered node receives every published message, including the
/// ones it published itself. Delivery is at least once, and messages of
/// different publishers may arrive in any order.
#[async_trait]
pub trait MessageBus<T, D, S>
where
    Self: Clone + Debug + Send + Sync + 'static,
    T: Clone
        + Debug
        + Send
        + Sync
        + TryFrom<Bytes, Error = D>
        + TryInto<Bytes, Error = S>
        + 'static,
    D: Debug + Error + Send + Sync + 'static,
    S: Debug + Error + Send + Sync + 'static,
{
    /// The error type for the bus.
    type Error: MessageBusError;

    /// The subscription returned by `register`.
    type SubscriptionType: Subscription;

    /// Registers a node and starts delivering messages to `handler`.
    async fn register<X>(
        &self,
        node_id: String,
        handler: X,
    ) -> Result<Self::SubscriptionType, Self::Error>
    where
        X: SubscriptionHandler<T, D, S>;

    /// Publishes a message to every registered node.
    async fn send_message(&self, message: T) -> Result<(), Self::Error>;
}

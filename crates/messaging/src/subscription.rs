use std::error::Error;
use std::fmt::Debug;

use async_trait::async_trait;

/// Marker trait for subscription errors
pub trait SubscriptionError: Error + Send + Sync + 'static {}

/// A node's registration on a bus.
#[async_trait]
pub trait Subscription
where
    Self: Debug + Send + Sync + 'static,
{
    /// The error type for the subscription.
    type Error: SubscriptionError;

    /// The id the node registered under.
    fn node_id(&self) -> &str;

    /// Stops delivery to the node.
    ///
    /// Returns once the handler is no longer invoked.
    async fn unregister(self) -> Result<(), Self::Error>;
}

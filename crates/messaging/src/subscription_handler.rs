use std::convert::Infallible;
use std::error::Error;
use std::fmt::Debug;

use async_trait::async_trait;
use bytes::Bytes;

/// Marker trait for subscription handler errors
pub trait SubscriptionHandlerError: Error + Send + Sync + 'static {}

impl SubscriptionHandlerError for Infallible {}

/// Receives the messages delivered to a registered node.
#[async_trait]
pub trait SubscriptionHandler<T = Bytes, DE = Infallible, SE = Infallible>
where
    Self: Clone + Send + Sync + 'static,
    DE: Error + Send + Sync + 'static,
    SE: Error + Send + Sync + 'static,
    T: Clone + Debug + Send + Sync + 'static,
{
    /// The error type for the handler.
    type Error: SubscriptionHandlerError;

    /// Handles the given message.
    ///
    /// Messages published by the node itself are delivered too.
    async fn handle(&self, data: T) -> Result<(), Self::Error>;
}

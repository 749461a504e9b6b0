use poker_messaging::bus::MessageBusError;
use poker_messaging::subscription::SubscriptionError;
use thiserror::Error;

/// Errors that can occur in this crate.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// The message could not be turned into bytes.
    #[error("failed to encode message: {0}")]
    Encode(String),

    /// Another subscription already uses the node id.
    #[error("node '{0}' is already registered")]
    NodeAlreadyRegistered(String),

    /// The delivery task panicked.
    #[error("subscription task failed: {0}")]
    Task(String),
}

impl MessageBusError for Error {}

impl SubscriptionError for Error {}

use poker_messaging::subscription_handler::SubscriptionHandlerError;
use thiserror::Error;

/// Errors raised by the node synchronizer.
#[derive(Debug, Error)]
pub enum Error {
    /// The synchronizer was started before.
    #[error("node synchronizer already started")]
    AlreadyStarted,

    /// The synchronizer was shut down.
    #[error("node synchronizer stopped")]
    Stopped,

    /// The message bus failed.
    #[error("message bus error: {0}")]
    Bus(String),

    /// A team operation failed.
    #[error(transparent)]
    Domain(#[from] poker_domain::Error),

    /// A registry operation failed.
    #[error(transparent)]
    Registry(#[from] poker_registry::Error),
}

/// The synchronizer stopped reading delivered messages.
#[derive(Clone, Debug, Error)]
#[error("node synchronizer is no longer receiving messages")]
pub struct HandlerError;

impl SubscriptionHandlerError for HandlerError {}

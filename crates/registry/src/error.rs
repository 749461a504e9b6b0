use thiserror::Error;

/// Errors raised by the registry.
#[derive(Debug, Error)]
pub enum Error {
    /// A team operation failed.
    #[error(transparent)]
    Domain(#[from] poker_domain::Error),

    /// A team with the name exists already.
    #[error("team '{0}' already exists")]
    TeamAlreadyExists(String),

    /// The team is being copied from another node.
    #[error("team '{0}' is being initialized from another node")]
    TeamInitializing(String),

    /// No team has the name.
    #[error("team '{0}' not found")]
    TeamNotFound(String),

    /// The node did not finish receiving the team in time.
    #[error("timed out waiting for team '{0}' to be initialized")]
    InitializationTimeout(String),
}

impl Error {
    /// Whether the error is a timeout, which callers may retry.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::InitializationTimeout(_))
    }
}

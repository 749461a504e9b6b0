use thiserror::Error;

/// Errors raised while running a local cluster.
#[derive(Debug, Error)]
pub enum Error {
    /// A node failed to start or stop.
    #[error(transparent)]
    Cluster(#[from] poker_cluster::Error),

    /// No node has the index.
    #[error("no node with index {0}")]
    NodeNotFound(usize),

    /// A registry operation failed.
    #[error(transparent)]
    Registry(#[from] poker_registry::Error),
}

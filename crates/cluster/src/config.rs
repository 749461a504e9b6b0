//! Cluster configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cluster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Id to register on the bus with. A random UUID if not set
    pub node_id: Option<String>,

    /// How long to wait for a peer to answer a request during initialization
    pub initialization_message_timeout: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            initialization_message_timeout: Duration::from_secs(60),
        }
    }
}

//! Registry configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// How long lookups wait for the node to receive a team from its peers
    pub initialization_timeout: Duration,

    /// How often waiting lookups check the initialization state
    pub initialization_poll_interval: Duration,

    /// How long a participant waits for new messages
    pub wait_for_message_timeout: Duration,

    /// Participants idle for longer are disconnected by the inactivity sweep
    pub client_inactivity_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            initialization_timeout: Duration::from_secs(60),
            initialization_poll_interval: Duration::from_millis(100),
            wait_for_message_timeout: Duration::from_secs(60),
            client_inactivity_timeout: Duration::from_secs(15 * 60),
        }
    }
}

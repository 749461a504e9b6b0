//! Local cluster configuration

use poker_cluster::ClusterConfig;
use poker_messaging_memory::MemoryBusOptions;
use poker_registry::RegistryConfig;
use serde::{Deserialize, Serialize};

/// Local cluster configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalClusterConfig {
    /// Options of the bus shared by every node
    pub bus: MemoryBusOptions,

    /// Synchronizer settings of every node. The node id is assigned per node
    pub cluster: ClusterConfig,

    /// Registry settings of every node
    pub registry: RegistryConfig,
}

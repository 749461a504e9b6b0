use crate::{Error, LocalClusterConfig};

use std::sync::Arc;

use poker_cluster::{ClusterConfig, NodeMessage, NodeSynchronizer};
use poker_domain::SystemTimeProvider;
use poker_messaging_memory::MemoryBus;
use poker_registry::TeamRegistry;
use tracing::info;

type Bus = MemoryBus<NodeMessage>;

/// One node of a [`LocalCluster`].
#[derive(Debug)]
pub struct LocalNode {
    synchronizer: NodeSynchronizer<Bus>,
}

impl LocalNode {
    /// The node's id on the bus.
    #[must_use]
    pub fn node_id(&self) -> &str {
        self.synchronizer.node_id()
    }

    /// The node's teams.
    #[must_use]
    pub fn registry(&self) -> &Arc<TeamRegistry> {
        self.synchronizer.registry()
    }

    /// Whether the node received every team from its peers.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.synchronizer.is_initialized()
    }
}

/// Nodes sharing an in-memory bus.
#[derive(Debug)]
pub struct LocalCluster {
    bus: Bus,
    config: LocalClusterConfig,
    next_index: usize,
    nodes: Vec<LocalNode>,
}

impl LocalCluster {
    /// Creates a cluster without nodes.
    #[must_use]
    pub fn new(config: LocalClusterConfig) -> Self {
        Self {
            bus: Bus::new(config.bus.clone()),
            config,
            next_index: 1,
            nodes: Vec::new(),
        }
    }

    /// Starts `count` nodes one after another, each waiting until it copied
    /// the teams of the ones before.
    ///
    /// # Errors
    /// Fails if a node fails to start.
    pub async fn start(config: LocalClusterConfig, count: usize) -> Result<Self, Error> {
        let mut cluster = Self::new(config);
        for _ in 0..count {
            cluster.start_node().await?;
        }

        Ok(cluster)
    }

    /// Starts another node and waits until it is initialized.
    ///
    /// # Errors
    /// Fails if the node fails to register on the bus or stops before it
    /// is initialized.
    pub async fn start_node(&mut self) -> Result<&LocalNode, Error> {
        let node_id = format!("node-{}", self.next_index);
        self.next_index += 1;

        let registry = Arc::new(TeamRegistry::new(
            self.config.registry.clone(),
            Arc::new(SystemTimeProvider),
        ));
        let config = ClusterConfig {
            node_id: Some(node_id.clone()),
            ..self.config.cluster.clone()
        };
        let synchronizer = NodeSynchronizer::new(self.bus.clone(), registry, config);
        synchronizer.start().await?;
        synchronizer.wait_until_initialized().await?;

        info!(%node_id, teams = ?synchronizer.registry().scrum_team_names(), "node joined cluster");

        let index = self.nodes.len();
        self.nodes.push(LocalNode { synchronizer });
        Ok(&self.nodes[index])
    }

    /// Stops the node at `index`.
    ///
    /// # Errors
    /// Fails if there is no such node or it fails to unregister.
    pub async fn stop_node(&mut self, index: usize) -> Result<(), Error> {
        if index >= self.nodes.len() {
            return Err(Error::NodeNotFound(index));
        }

        let node = self.nodes.remove(index);
        node.synchronizer.shutdown().await?;

        info!(node_id = %node.node_id(), "node left cluster");
        Ok(())
    }

    /// The running nodes, oldest first.
    #[must_use]
    pub fn nodes(&self) -> &[LocalNode] {
        &self.nodes
    }

    /// The node at `index`.
    ///
    /// # Errors
    /// Fails if there is no such node.
    pub fn node(&self, index: usize) -> Result<&LocalNode, Error> {
        self.nodes.get(index).ok_or(Error::NodeNotFound(index))
    }

    /// The ids of the nodes registered on the bus.
    pub async fn node_ids(&self) -> Vec<String> {
        self.bus.node_ids().await
    }

    /// Disconnects idle participants on every node.
    ///
    /// Returns how many participants were disconnected.
    pub async fn disconnect_inactive(&self) -> usize {
        let mut disconnected = 0;
        for node in &self.nodes {
            disconnected += node.registry().disconnect_inactive_observers(None).await;
        }

        disconnected
    }

    /// Stops every node.
    ///
    /// # Errors
    /// Fails if a node fails to unregister.
    pub async fn shutdown(mut self) -> Result<(), Error> {
        while !self.nodes.is_empty() {
            self.stop_node(self.nodes.len() - 1).await?;
        }

        Ok(())
    }
}

use crate::handler::InboundHandler;
use crate::message::{
    DecodeError, EncodeError, InitializeTeam, NodeMessage, NodeMessageBody, ScrumTeamMessage,
};
use crate::{ClusterConfig, Error};

use std::sync::Arc;
use std::time::Duration;

use poker_domain::{ScrumTeam, ScrumTeamEvent, TeamEvent};
use poker_messaging::bus::MessageBus;
use poker_messaging::subscription::Subscription;
use poker_registry::TeamRegistry;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Keeps the teams of a node in sync with its peers.
///
/// On start the node asks its peers for their teams and copies them. Until
/// then the registry holds lookups back. Afterwards every local team event is
/// published on the bus and every event published by a peer is applied to the
/// local copy of the team.
#[derive(Debug)]
pub struct NodeSynchronizer<B>
where
    B: MessageBus<NodeMessage, DecodeError, EncodeError>,
{
    bus: B,
    config: ClusterConfig,
    initialized: Arc<watch::Sender<bool>>,
    node_id: String,
    registry: Arc<TeamRegistry>,
    shutdown_token: CancellationToken,
    subscription: Mutex<Option<B::SubscriptionType>>,
    task_tracker: TaskTracker,
}

impl<B> NodeSynchronizer<B>
where
    B: MessageBus<NodeMessage, DecodeError, EncodeError>,
{
    /// Creates a synchronizer for the teams in `registry`.
    pub fn new(bus: B, registry: Arc<TeamRegistry>, config: ClusterConfig) -> Self {
        let node_id = config
            .node_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self {
            bus,
            config,
            initialized: Arc::new(watch::channel(false).0),
            node_id,
            registry,
            shutdown_token: CancellationToken::new(),
            subscription: Mutex::new(None),
            task_tracker: TaskTracker::new(),
        }
    }

    /// The id the node registers on the bus with.
    #[must_use]
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// The registry kept in sync.
    #[must_use]
    pub const fn registry(&self) -> &Arc<TeamRegistry> {
        &self.registry
    }

    /// Registers the node on the bus and starts initialization.
    ///
    /// # Errors
    /// Fails if the synchronizer was started before or the bus rejects the
    /// node.
    pub async fn start(&self) -> Result<(), Error> {
        if self.task_tracker.is_closed() {
            return Err(Error::AlreadyStarted);
        }

        // subscribe first so no local event is missed
        let events = self.registry.subscribe_events();
        let (sender, inbound) = mpsc::unbounded_channel();

        let subscription = self
            .bus
            .register(self.node_id.clone(), InboundHandler::new(sender))
            .await
            .map_err(|e| Error::Bus(e.to_string()))?;
        *self.subscription.lock().await = Some(subscription);

        let worker = Worker {
            bus: self.bus.clone(),
            initialization_message_timeout: self.config.initialization_message_timeout,
            initialized: self.initialized.clone(),
            node_id: self.node_id.clone(),
            registry: self.registry.clone(),
        };
        let shutdown_token = self.shutdown_token.clone();
        self.task_tracker
            .spawn(worker.run(inbound, events, shutdown_token));
        self.task_tracker.close();

        info!(node_id = %self.node_id, "node synchronizer started");
        Ok(())
    }

    /// Whether the node received every team from its peers.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        *self.initialized.borrow()
    }

    /// Waits until the node received every team from its peers.
    ///
    /// # Errors
    /// Fails if the synchronizer is shut down before the node is initialized.
    pub async fn wait_until_initialized(&self) -> Result<(), Error> {
        let mut receiver = self.initialized.subscribe();
        // the sender lives as long as self
        let initialized = async { receiver.wait_for(|initialized| *initialized).await.is_ok() };

        tokio::select! {
            biased;
            true = initialized => Ok(()),
            () = self.shutdown_token.cancelled() => Err(Error::Stopped),
        }
    }

    /// Stops synchronizing and unregisters the node from the bus.
    ///
    /// # Errors
    /// Fails if the bus fails to unregister the node.
    pub async fn shutdown(&self) -> Result<(), Error> {
        self.shutdown_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        let subscription = self.subscription.lock().await.take();
        if let Some(subscription) = subscription {
            subscription
                .unregister()
                .await
                .map_err(|e| Error::Bus(e.to_string()))?;
        }

        info!(node_id = %self.node_id, "node synchronizer stopped");
        Ok(())
    }
}

/// Where the node is in copying teams from its peers.
#[derive(Debug)]
enum Phase {
    /// Waiting for a peer to list its teams.
    Discovering { deadline: Instant },

    /// Waiting for `peer` to send the pending teams.
    Transferring { peer: String, deadline: Instant },

    Ready,
}

impl Phase {
    const fn deadline(&self) -> Option<Instant> {
        match self {
            Self::Discovering { deadline } | Self::Transferring { deadline, .. } => Some(*deadline),
            Self::Ready => None,
        }
    }

    const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

struct Worker<B> {
    bus: B,
    initialization_message_timeout: Duration,
    initialized: Arc<watch::Sender<bool>>,
    node_id: String,
    registry: Arc<TeamRegistry>,
}

impl<B> Worker<B>
where
    B: MessageBus<NodeMessage, DecodeError, EncodeError>,
{
    async fn run(
        self,
        mut inbound: mpsc::UnboundedReceiver<NodeMessage>,
        mut events: mpsc::UnboundedReceiver<ScrumTeamEvent>,
        shutdown_token: CancellationToken,
    ) {
        let mut phase = self.discover().await;

        loop {
            let deadline = phase.deadline();

            tokio::select! {
                () = shutdown_token.cancelled() => {
                    break;
                }
                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    phase = self.on_timeout(phase).await;
                }
                message = inbound.recv() => {
                    let Some(message) = message else {
                        error!(node_id = %self.node_id, "bus subscription closed");
                        break;
                    };
                    phase = self.on_message(phase, message).await;
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        error!(node_id = %self.node_id, "team event channel closed");
                        break;
                    };
                    self.relay(event).await;
                }
            }
        }

        debug!(node_id = %self.node_id, "synchronizer worker stopped");
    }

    async fn discover(&self) -> Phase {
        debug!(node_id = %self.node_id, "requesting team list");
        self.publish(NodeMessage::broadcast(
            &self.node_id,
            NodeMessageBody::RequestTeamList,
        ))
        .await;

        Phase::Discovering {
            deadline: Instant::now() + self.initialization_message_timeout,
        }
    }

    async fn on_timeout(&self, phase: Phase) -> Phase {
        match phase {
            Phase::Discovering { .. } => {
                // an unreachable peer looks the same as no peer at all
                info!(node_id = %self.node_id, "no peer answered, assuming this is the only node");
                self.registry.initialization().clear();
                self.mark_initialized()
            }
            Phase::Transferring { peer, .. } => {
                warn!(
                    node_id = %self.node_id,
                    %peer,
                    pending = ?self.registry.initialization().values(),
                    "peer did not send every team, asking again"
                );
                self.discover().await
            }
            Phase::Ready => Phase::Ready,
        }
    }

    async fn on_message(&self, phase: Phase, message: NodeMessage) -> Phase {
        if !message.is_for(&self.node_id) {
            return phase;
        }

        let sender = message.sender_node_id;
        match message.body {
            NodeMessageBody::ScrumTeamMessage(message) => {
                self.replay(message).await;
                phase
            }
            NodeMessageBody::TeamCreated {
                team_name,
                snapshot,
            } => {
                self.on_team_created(&team_name, &snapshot);
                phase
            }
            NodeMessageBody::RequestTeamList => {
                if phase.is_ready() {
                    let team_names = self.registry.scrum_team_names();
                    self.publish(NodeMessage::to(
                        &self.node_id,
                        sender,
                        NodeMessageBody::TeamList { team_names },
                    ))
                    .await;
                }
                phase
            }
            NodeMessageBody::RequestTeams { team_names } => {
                if phase.is_ready() {
                    self.send_teams(&sender, team_names).await;
                }
                phase
            }
            NodeMessageBody::TeamList { team_names } => match phase {
                Phase::Discovering { .. } => self.on_team_list(sender, team_names).await,
                phase => phase,
            },
            NodeMessageBody::InitializeTeam(team) => self.on_initialize_team(phase, team),
        }
    }

    async fn on_team_list(&self, peer: String, team_names: Vec<String>) -> Phase {
        let initialization = self.registry.initialization();

        // a retry keeps the teams still pending from the first answer
        initialization.setup(team_names);
        if initialization.is_complete() {
            return self.mark_initialized();
        }

        let team_names = initialization.values();
        debug!(node_id = %self.node_id, %peer, ?team_names, "requesting teams");
        self.publish(NodeMessage::to(
            &self.node_id,
            peer.clone(),
            NodeMessageBody::RequestTeams { team_names },
        ))
        .await;

        Phase::Transferring {
            peer,
            deadline: Instant::now() + self.initialization_message_timeout,
        }
    }

    fn on_initialize_team(&self, phase: Phase, team: InitializeTeam) -> Phase {
        let initialization = self.registry.initialization();
        if !initialization.is_pending(team.team_name()) {
            debug!(node_id = %self.node_id, team = %team.team_name(), "ignoring team that is not pending");
            return phase;
        }

        match &team {
            InitializeTeam::Snapshot {
                team_name,
                snapshot,
            } => self.replace(team_name, snapshot),
            InitializeTeam::Deleted { team_name } => {
                debug!(node_id = %self.node_id, team = %team_name, "team no longer exists on peer");
            }
        }

        initialization.remove(team.team_name());
        if initialization.is_complete() && !phase.is_ready() {
            return self.mark_initialized();
        }
        phase
    }

    fn on_team_created(&self, team_name: &str, snapshot: &str) {
        // a peer's snapshot of the team is still to come and supersedes this one
        if self.registry.initialization().contains_or_not_init(team_name) {
            debug!(node_id = %self.node_id, team = %team_name, "team is still initializing, waiting for its snapshot");
            return;
        }

        let Some(team) = self.parse(team_name, snapshot) else {
            return;
        };
        match self.registry.attach_scrum_team(team) {
            Ok(_) => debug!(node_id = %self.node_id, team = %team_name, "team received"),
            Err(e) => warn!(node_id = %self.node_id, team = %team_name, error = %e, "failed to attach team"),
        }
    }

    fn replace(&self, team_name: &str, snapshot: &str) {
        let Some(team) = self.parse(team_name, snapshot) else {
            return;
        };
        match self.registry.replace_scrum_team(team) {
            Ok(_) => debug!(node_id = %self.node_id, team = %team_name, "team initialized"),
            Err(e) => warn!(node_id = %self.node_id, team = %team_name, error = %e, "failed to initialize team"),
        }
    }

    fn parse(&self, team_name: &str, snapshot: &str) -> Option<ScrumTeam> {
        match ScrumTeam::from_json(snapshot, self.registry.time().clone()) {
            Ok(team) => Some(team),
            Err(e) => {
                warn!(node_id = %self.node_id, team = %team_name, error = %e, "invalid team snapshot");
                None
            }
        }
    }

    async fn replay(&self, message: ScrumTeamMessage) {
        let ScrumTeamMessage { team_name, event } = message;

        // the snapshot still to come already contains the event
        if self.registry.initialization().contains_or_not_init(&team_name) {
            debug!(node_id = %self.node_id, team = %team_name, "ignoring event of team still initializing");
            return;
        }

        let mut team = match self.registry.lock(&team_name).await {
            Ok(team) => team,
            Err(e) => {
                warn!(node_id = %self.node_id, team = %team_name, error = %e, "failed to replay event");
                return;
            }
        };

        team.set_replaying(true);
        let result = event.apply(&mut team);
        team.set_replaying(false);
        drop(team);

        match result {
            Ok(()) => debug!(node_id = %self.node_id, team = %team_name, ?event, "event replayed"),
            Err(e) => {
                warn!(node_id = %self.node_id, team = %team_name, ?event, error = %e, "failed to replay event");
            }
        }
    }

    async fn relay(&self, event: ScrumTeamEvent) {
        if event.replayed || !event.event.is_replicated() {
            return;
        }

        let ScrumTeamEvent {
            team_name, event, ..
        } = event;
        let body = match event {
            TeamEvent::TeamCreated { snapshot } => match serde_json::to_string(&snapshot) {
                Ok(snapshot) => NodeMessageBody::TeamCreated {
                    team_name,
                    snapshot,
                },
                Err(e) => {
                    warn!(node_id = %self.node_id, team = %team_name, error = %e, "failed to serialize new team");
                    return;
                }
            },
            event => NodeMessageBody::ScrumTeamMessage(ScrumTeamMessage { team_name, event }),
        };

        self.publish(NodeMessage::broadcast(&self.node_id, body)).await;
    }

    async fn send_teams(&self, peer: &str, team_names: Vec<String>) {
        for team_name in team_names {
            // released before publishing
            let snapshot: Result<String, Error> = match self.registry.lock(&team_name).await {
                Ok(team) => team.to_json().map_err(Error::from),
                Err(e) => Err(Error::from(e)),
            };

            let team = match snapshot {
                Ok(snapshot) => InitializeTeam::Snapshot {
                    team_name,
                    snapshot,
                },
                Err(e) => {
                    debug!(node_id = %self.node_id, team = %team_name, error = %e, "sending team as deleted");
                    InitializeTeam::Deleted { team_name }
                }
            };

            self.publish(NodeMessage::to(
                &self.node_id,
                peer,
                NodeMessageBody::InitializeTeam(team),
            ))
            .await;
        }
    }

    fn mark_initialized(&self) -> Phase {
        self.initialized.send_replace(true);
        info!(node_id = %self.node_id, teams = self.registry.scrum_team_names().len(), "node initialized");
        Phase::Ready
    }

    async fn publish(&self, message: NodeMessage) {
        if let Err(e) = self.bus.send_message(message).await {
            warn!(node_id = %self.node_id, error = %e, "failed to publish message");
        }
    }
}

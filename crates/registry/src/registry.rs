use crate::{Error, InitializationList, RegistryConfig, TeamLock};

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::Duration;

use poker_domain::{Deck, EventSink, Message, ScrumTeam, ScrumTeamEvent, TimeProvider, name_key};
use tokio::sync::{Mutex, mpsc};
use tokio::time::{Instant, sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug)]
struct TeamEntry {
    name: String,
    team: Arc<Mutex<ScrumTeam>>,
}

/// The teams hosted by this node.
///
/// Every team sits behind its own lock, so operations on different teams do
/// not wait for each other. Events of all teams are published on one
/// channel, see [`TeamRegistry::subscribe_events`].
#[derive(Debug)]
pub struct TeamRegistry {
    config: RegistryConfig,
    teams: parking_lot::Mutex<HashMap<String, TeamEntry>>,
    initialization: InitializationList,
    events: EventSink,
    time: Arc<dyn TimeProvider>,
}

impl TeamRegistry {
    /// Creates an empty registry whose initialization is still pending.
    #[must_use]
    pub fn new(config: RegistryConfig, time: Arc<dyn TimeProvider>) -> Self {
        Self {
            config,
            teams: parking_lot::Mutex::new(HashMap::new()),
            initialization: InitializationList::new(),
            events: EventSink::new(),
            time,
        }
    }

    /// The registry's configuration.
    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// The clock teams are created with.
    #[must_use]
    pub fn time(&self) -> &Arc<dyn TimeProvider> {
        &self.time
    }

    /// Tracks the teams still to be received from peers.
    #[must_use]
    pub const fn initialization(&self) -> &InitializationList {
        &self.initialization
    }

    /// Receives the events of every team in the registry. Events queue up
    /// until read.
    #[must_use]
    pub fn subscribe_events(&self) -> mpsc::UnboundedReceiver<ScrumTeamEvent> {
        self.events.subscribe()
    }

    /// Creates a team owned by `scrum_master` and returns it locked.
    ///
    /// Raises a `TeamCreated` event.
    ///
    /// # Errors
    /// Fails if the team is being received from a peer, the node does not
    /// finish initialization in time, the name is taken, or the names are
    /// invalid.
    pub async fn create_scrum_team(
        &self,
        team_name: &str,
        scrum_master: &str,
        deck: Deck,
    ) -> Result<TeamLock, Error> {
        if self.initialization.is_pending(team_name) {
            return Err(Error::TeamInitializing(team_name.to_string()));
        }
        self.wait_for_initialization(team_name).await?;

        let mut team = ScrumTeam::new(team_name, deck, self.time.clone())?;
        team.set_scrum_master(scrum_master)?;

        let lock = self.insert(team, false)?;
        lock.announce_created();

        info!(team = %team_name, %scrum_master, %deck, "team created");
        Ok(lock)
    }

    /// Adds a team built elsewhere, e.g. from a peer's snapshot, and returns
    /// it locked. Does not wait for initialization and raises no event.
    ///
    /// # Errors
    /// Fails if a team with the same name exists.
    pub fn attach_scrum_team(&self, team: ScrumTeam) -> Result<TeamLock, Error> {
        let team_name = team.name().to_string();
        let lock = self.insert(team, false)?;

        debug!(team = %team_name, "team attached");
        Ok(lock)
    }

    /// Adds a team built elsewhere like [`TeamRegistry::attach_scrum_team`],
    /// replacing a team of the same name if there is one.
    ///
    /// Holders of a lock on the replaced team keep the old copy.
    ///
    /// # Errors
    /// Fails only if the new team cannot be locked.
    pub fn replace_scrum_team(&self, team: ScrumTeam) -> Result<TeamLock, Error> {
        let team_name = team.name().to_string();
        let (lock, replaced) = self.store(team, true)?;

        debug!(team = %team_name, replaced, "team replaced");
        Ok(lock)
    }

    /// Locks a team.
    ///
    /// # Errors
    /// Fails if no team has the name, or the node does not finish
    /// initialization in time.
    pub async fn get_scrum_team(&self, team_name: &str) -> Result<TeamLock, Error> {
        self.wait_for_initialization(team_name).await?;
        self.lock(team_name).await
    }

    /// Locks a team without waiting for initialization.
    ///
    /// # Errors
    /// Fails if no team has the name.
    pub async fn lock(&self, team_name: &str) -> Result<TeamLock, Error> {
        let team = self
            .teams
            .lock()
            .get(&name_key(team_name))
            .map(|entry| entry.team.clone())
            .ok_or_else(|| Error::TeamNotFound(team_name.to_string()))?;

        Ok(TeamLock::new(team.lock_owned().await))
    }

    /// Removes a team from the registry.
    ///
    /// # Errors
    /// Fails if no team has the name.
    pub fn delete_scrum_team(&self, team_name: &str) -> Result<(), Error> {
        self.teams
            .lock()
            .remove(&name_key(team_name))
            .ok_or_else(|| Error::TeamNotFound(team_name.to_string()))?;

        info!(team = %team_name, "team deleted");
        Ok(())
    }

    /// Names of all teams, sorted.
    #[must_use]
    pub fn scrum_team_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .teams
            .lock()
            .values()
            .map(|entry| entry.name.clone())
            .collect();
        names.sort_unstable();
        names
    }

    /// Returns the undelivered messages of a participant, waiting for new
    /// ones if there are none.
    ///
    /// Counts as activity of the participant. Returns no messages if
    /// `cancel` fires or nothing arrives within the configured wait. A
    /// participant that leaves while waiting receives its final `Empty`
    /// message.
    ///
    /// # Errors
    /// Fails if the team or participant does not exist.
    pub async fn get_messages(
        &self,
        team_name: &str,
        participant: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Message>, Error> {
        let mut receiver = {
            let mut team = self.get_scrum_team(team_name).await?;
            team.update_activity(participant)?;

            let messages = team.take_messages(participant)?;
            if !messages.is_empty() {
                return Ok(messages);
            }
            team.subscribe_messages(participant)?
        };

        tokio::select! {
            () = cancel.cancelled() => return Ok(Vec::new()),
            changed = timeout(self.config.wait_for_message_timeout, receiver.changed()) => {
                if changed.is_err() {
                    return Ok(Vec::new());
                }
            }
        }

        let mut team = self.lock(team_name).await?;
        match team.take_messages(participant) {
            Ok(messages) => Ok(messages),
            // participant is gone, the last message sent to it is the terminal one
            Err(poker_domain::Error::ParticipantNotFound(_)) => {
                Ok(receiver.borrow().iter().cloned().collect())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Disconnects the participants of every team that were idle for longer
    /// than `threshold`, or the configured client inactivity timeout.
    ///
    /// Returns how many participants were disconnected.
    pub async fn disconnect_inactive_observers(&self, threshold: Option<Duration>) -> usize {
        let threshold = threshold.unwrap_or(self.config.client_inactivity_timeout);
        let teams: Vec<Arc<Mutex<ScrumTeam>>> = self
            .teams
            .lock()
            .values()
            .map(|entry| entry.team.clone())
            .collect();

        let mut disconnected = 0;
        for team in teams {
            let mut team = team.lock().await;
            let names = team.disconnect_inactive(threshold);
            if !names.is_empty() {
                debug!(team = %team.name(), participants = ?names, "disconnected inactive participants");
            }
            disconnected += names.len();
        }

        disconnected
    }

    fn insert(&self, team: ScrumTeam, replace: bool) -> Result<TeamLock, Error> {
        let name = team.name().to_string();
        match self.store(team, replace)? {
            (lock, false) => Ok(lock),
            (_, true) => Err(Error::TeamAlreadyExists(name)),
        }
    }

    /// Stores the team unless the name is taken and `replace` is unset.
    /// Returns the locked team and whether the name was taken.
    fn store(&self, mut team: ScrumTeam, replace: bool) -> Result<(TeamLock, bool), Error> {
        team.set_event_sink(self.events.clone());
        let name = team.name().to_string();
        let team = Arc::new(Mutex::new(team));

        // the new team is not shared yet, so locking it cannot block
        let guard = team
            .clone()
            .try_lock_owned()
            .map_err(|_| Error::TeamAlreadyExists(name.clone()))?;

        let taken = match self.teams.lock().entry(name_key(&name)) {
            Entry::Occupied(mut entry) => {
                if replace {
                    entry.insert(TeamEntry { name, team });
                }
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(TeamEntry { name, team });
                false
            }
        };

        Ok((TeamLock::new(guard), taken))
    }

    async fn wait_for_initialization(&self, team_name: &str) -> Result<(), Error> {
        let deadline = Instant::now() + self.config.initialization_timeout;

        while self.initialization.contains_or_not_init(team_name) {
            if Instant::now() >= deadline {
                return Err(Error::InitializationTimeout(team_name.to_string()));
            }
            sleep(self.config.initialization_poll_interval).await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;
    use chrono::TimeDelta;
    use poker_domain::{ManualTimeProvider, MessageBody, MessageType, TeamEvent};

    fn registry() -> Arc<TeamRegistry> {
        let registry = TeamRegistry::new(
            RegistryConfig::default(),
            Arc::new(ManualTimeProvider::default()),
        );
        registry.initialization().clear();
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_create_and_get_team() {
        let registry = registry();

        let team = registry
            .create_scrum_team("Team", "master", Deck::Fibonacci)
            .await
            .unwrap();
        assert_eq!(team.scrum_master().unwrap().name(), "master");
        drop(team);

        let team = registry.get_scrum_team("TEAM").await.unwrap();
        assert_eq!(team.name(), "Team");
        assert_eq!(team.available_estimations(), Deck::Fibonacci.estimations());
        assert_eq!(registry.scrum_team_names(), vec!["Team".to_string()]);
    }

    #[tokio::test]
    async fn test_create_duplicate_team_fails() {
        let registry = registry();
        drop(
            registry
                .create_scrum_team("Team", "master", Deck::Standard)
                .await
                .unwrap(),
        );

        assert_matches!(
            registry.create_scrum_team("team", "other", Deck::Standard).await,
            Err(Error::TeamAlreadyExists(_))
        );
    }

    #[tokio::test]
    async fn test_create_reports_invalid_names() {
        let registry = registry();

        assert_matches!(
            registry.create_scrum_team("", "master", Deck::Standard).await,
            Err(Error::Domain(poker_domain::Error::EmptyName))
        );
        assert!(registry.scrum_team_names().is_empty());
    }

    #[tokio::test]
    async fn test_get_unknown_team_fails() {
        let registry = registry();

        assert_matches!(
            registry.get_scrum_team("nothing").await,
            Err(Error::TeamNotFound(name)) if name == "nothing"
        );
    }

    #[tokio::test]
    async fn test_create_raises_team_created() {
        let registry = registry();
        let mut events = registry.subscribe_events();

        drop(
            registry
                .create_scrum_team("Team", "master", Deck::Standard)
                .await
                .unwrap(),
        );

        let event = events.recv().await.unwrap();
        assert_eq!(event.team_name, "Team");
        assert!(!event.replayed);
        assert_matches!(event.event, TeamEvent::TeamCreated { snapshot } => {
            assert_eq!(snapshot.members.len(), 1);
        });
    }

    #[tokio::test]
    async fn test_attach_raises_no_event() {
        let registry = registry();
        let mut events = registry.subscribe_events();
        let mut team = ScrumTeam::new("Team", Deck::Standard, registry.time().clone()).unwrap();
        team.set_scrum_master("master").unwrap();

        let mut team = registry.attach_scrum_team(team).unwrap();
        assert_matches!(events.try_recv(), Err(mpsc::error::TryRecvError::Empty));

        team.join("Alice", false).unwrap();
        assert_matches!(
            events.try_recv().unwrap().event,
            TeamEvent::MemberJoined { .. }
        );
    }

    #[tokio::test]
    async fn test_replace_overwrites_existing_team() {
        let registry = registry();
        let mut events = registry.subscribe_events();
        let mut team = registry
            .create_scrum_team("Team", "master", Deck::Standard)
            .await
            .unwrap();
        team.join("Stale", false).unwrap();
        drop(team);
        while events.try_recv().is_ok() {}

        let mut fresh = ScrumTeam::new("TEAM", Deck::Fibonacci, registry.time().clone()).unwrap();
        fresh.set_scrum_master("master").unwrap();
        fresh.join("Alice", false).unwrap();
        drop(registry.replace_scrum_team(fresh).unwrap());

        assert_eq!(registry.scrum_team_names(), vec!["TEAM".to_string()]);
        let mut team = registry.get_scrum_team("team").await.unwrap();
        assert!(team.participant("Stale").is_none());
        assert!(team.participant("Alice").is_some());
        assert_eq!(team.available_estimations(), Deck::Fibonacci.estimations());

        // the replacement publishes its events like any other team
        team.join("Bob", false).unwrap();
        assert_matches!(
            events.try_recv().unwrap().event,
            TeamEvent::MemberJoined { .. }
        );
    }

    #[tokio::test]
    async fn test_replace_adds_missing_team() {
        let registry = registry();
        let team = ScrumTeam::new("Team", Deck::Standard, registry.time().clone()).unwrap();

        drop(registry.replace_scrum_team(team).unwrap());

        assert_eq!(registry.scrum_team_names(), vec!["Team".to_string()]);
    }

    #[tokio::test]
    async fn test_slow_subscriber_keeps_every_event() {
        let registry = registry();
        let mut events = registry.subscribe_events();
        let mut team = registry
            .create_scrum_team("Team", "master", Deck::Standard)
            .await
            .unwrap();
        for index in 0..2000 {
            team.join(&format!("observer{index}"), true).unwrap();
        }
        drop(team);

        let mut joined = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event.event, TeamEvent::MemberJoined { .. }) {
                joined += 1;
            }
        }
        assert_eq!(joined, 2000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_times_out_while_uninitialized() {
        let registry = Arc::new(TeamRegistry::new(
            RegistryConfig::default(),
            Arc::new(ManualTimeProvider::default()),
        ));

        let result = registry.get_scrum_team("Team").await;

        assert_matches!(&result, Err(e) if e.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_fails_immediately_for_pending_team() {
        let registry = Arc::new(TeamRegistry::new(
            RegistryConfig::default(),
            Arc::new(ManualTimeProvider::default()),
        ));
        registry.initialization().setup(["Team"]);
        let started = Instant::now();

        assert_matches!(
            registry.create_scrum_team("team", "master", Deck::Standard).await,
            Err(Error::TeamInitializing(_))
        );
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_waits_for_initialization() {
        let registry = Arc::new(TeamRegistry::new(
            RegistryConfig::default(),
            Arc::new(ManualTimeProvider::default()),
        ));
        registry.initialization().setup(["Team"]);

        let waiter = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.get_scrum_team("Team").await.map(|t| t.name().to_string()) })
        };

        sleep(Duration::from_secs(5)).await;
        let team = ScrumTeam::new("Team", Deck::Standard, registry.time().clone()).unwrap();
        drop(registry.attach_scrum_team(team).unwrap());
        registry.initialization().remove("Team");

        assert_eq!(waiter.await.unwrap().unwrap(), "Team");
    }

    #[tokio::test(start_paused = true)]
    async fn test_team_lock_is_exclusive() {
        let registry = registry();
        let _a = registry
            .create_scrum_team("A", "master", Deck::Standard)
            .await
            .unwrap();
        drop(
            registry
                .create_scrum_team("B", "master", Deck::Standard)
                .await
                .unwrap(),
        );

        assert!(registry.get_scrum_team("B").await.is_ok());
        assert!(
            timeout(Duration::from_secs(1), registry.get_scrum_team("A"))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_delete_team() {
        let registry = registry();
        drop(
            registry
                .create_scrum_team("Team", "master", Deck::Standard)
                .await
                .unwrap(),
        );

        registry.delete_scrum_team("team").unwrap();

        assert!(registry.scrum_team_names().is_empty());
        assert_matches!(registry.delete_scrum_team("team"), Err(Error::TeamNotFound(_)));
    }

    #[tokio::test]
    async fn test_get_messages_returns_queued_messages() {
        let registry = registry();
        let mut team = registry
            .create_scrum_team("Team", "master", Deck::Standard)
            .await
            .unwrap();
        team.join("Alice", false).unwrap();
        drop(team);

        let messages = registry
            .get_messages("Team", "master", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message_type(), MessageType::MemberJoined);
    }

    #[tokio::test(start_paused = true)]
    #[tracing_test::traced_test]
    async fn test_get_messages_waits_for_message() {
        let registry = registry();
        drop(
            registry
                .create_scrum_team("Team", "master", Deck::Standard)
                .await
                .unwrap(),
        );

        let poll = {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .get_messages("Team", "master", &CancellationToken::new())
                    .await
            })
        };

        sleep(Duration::from_secs(10)).await;
        registry
            .get_scrum_team("Team")
            .await
            .unwrap()
            .join("Alice", true)
            .unwrap();

        let messages = poll.await.unwrap().unwrap();
        assert_eq!(messages.len(), 1);
        assert_matches!(&messages[0].body, MessageBody::MemberJoined { member } if member.name == "Alice");
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_messages_times_out_empty() {
        let registry = registry();
        drop(
            registry
                .create_scrum_team("Team", "master", Deck::Standard)
                .await
                .unwrap(),
        );

        let messages = registry
            .get_messages("Team", "master", &CancellationToken::new())
            .await
            .unwrap();

        assert!(messages.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_messages_can_be_cancelled() {
        let registry = registry();
        drop(
            registry
                .create_scrum_team("Team", "master", Deck::Standard)
                .await
                .unwrap(),
        );
        let cancel = CancellationToken::new();

        let poll = {
            let registry = registry.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { registry.get_messages("Team", "master", &cancel).await })
        };
        sleep(Duration::from_secs(1)).await;
        cancel.cancel();

        let started = Instant::now();
        assert!(poll.await.unwrap().unwrap().is_empty());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnected_participant_receives_empty_message() {
        let registry = registry();
        let mut team = registry
            .create_scrum_team("Team", "master", Deck::Standard)
            .await
            .unwrap();
        team.join("Alice", true).unwrap();
        drop(team);

        let poll = {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .get_messages("Team", "Alice", &CancellationToken::new())
                    .await
            })
        };
        sleep(Duration::from_secs(1)).await;
        registry.get_scrum_team("Team").await.unwrap().disconnect("Alice");

        let messages = poll.await.unwrap().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message_type(), MessageType::Empty);
    }

    #[tokio::test]
    async fn test_get_messages_for_unknown_participant_fails() {
        let registry = registry();
        drop(
            registry
                .create_scrum_team("Team", "master", Deck::Standard)
                .await
                .unwrap(),
        );

        assert_matches!(
            registry
                .get_messages("Team", "nobody", &CancellationToken::new())
                .await,
            Err(Error::Domain(poker_domain::Error::ParticipantNotFound(_)))
        );
    }

    #[tokio::test]
    async fn test_disconnect_inactive_observers() {
        let time = Arc::new(ManualTimeProvider::default());
        let registry = TeamRegistry::new(RegistryConfig::default(), time.clone());
        registry.initialization().clear();
        let mut team = registry
            .create_scrum_team("Team", "master", Deck::Standard)
            .await
            .unwrap();
        team.join("watcher", true).unwrap();
        drop(team);

        time.advance(TimeDelta::minutes(10));
        assert_eq!(registry.disconnect_inactive_observers(None).await, 0);

        registry
            .get_scrum_team("Team")
            .await
            .unwrap()
            .update_activity("master")
            .unwrap();
        time.advance(TimeDelta::minutes(10));

        assert_eq!(registry.disconnect_inactive_observers(None).await, 1);
        let team = registry.get_scrum_team("Team").await.unwrap();
        assert!(team.participant("watcher").is_none());
        assert!(!team.scrum_master().unwrap().is_dormant());
    }
}

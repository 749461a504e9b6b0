use crate::{
    Deck, Error, Estimation, EstimationResult, EventSink, Message, MessageBody, Participant,
    ParticipantInfo, Role, ScrumTeamEvent, TeamEvent, TimeProvider,
};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

/// Where a team is in its round of estimation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TeamState {
    /// No round was started yet.
    #[default]
    Initial,

    /// Members are voting.
    EstimationInProgress,

    /// Every member voted.
    EstimationFinished,

    /// The scrum master canceled the round.
    EstimationCanceled,
}

/// Progress of one member in the running round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimationParticipantStatus {
    /// Name of the member.
    pub member_name: String,

    /// Whether the member voted already.
    pub estimated: bool,
}

/// Estimation session of one team.
///
/// The team owns its participants. Every operation that changes state queues
/// messages into the inboxes of the affected participants and, if an event
/// sink is attached, raises a [`ScrumTeamEvent`].
#[derive(Debug)]
pub struct ScrumTeam {
    name: String,
    members: Vec<Participant>,
    observers: Vec<Participant>,
    state: TeamState,
    estimation_result: Option<EstimationResult>,
    available_estimations: Vec<Estimation>,
    timer_end_time: Option<DateTime<Utc>>,
    time: Arc<dyn TimeProvider>,
    event_sink: Option<EventSink>,
    replaying: bool,
}

pub(crate) struct TeamParts {
    pub name: String,
    pub members: Vec<Participant>,
    pub observers: Vec<Participant>,
    pub state: TeamState,
    pub estimation_result: Option<EstimationResult>,
    pub available_estimations: Vec<Estimation>,
    pub timer_end_time: Option<DateTime<Utc>>,
}

impl ScrumTeam {
    /// Creates a team without participants, using the cards of `deck`.
    ///
    /// # Errors
    /// Returns [`Error::EmptyName`] if `name` is empty.
    pub fn new(
        name: impl Into<String>,
        deck: Deck,
        time: Arc<dyn TimeProvider>,
    ) -> Result<Self, Error> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::EmptyName);
        }

        Ok(Self::restore(
            TeamParts {
                name,
                members: Vec::new(),
                observers: Vec::new(),
                state: TeamState::Initial,
                estimation_result: None,
                available_estimations: deck.estimations(),
                timer_end_time: None,
            },
            time,
        ))
    }

    pub(crate) fn restore(parts: TeamParts, time: Arc<dyn TimeProvider>) -> Self {
        Self {
            name: parts.name,
            members: parts.members,
            observers: parts.observers,
            state: parts.state,
            estimation_result: parts.estimation_result,
            available_estimations: parts.available_estimations,
            timer_end_time: parts.timer_end_time,
            time,
            event_sink: None,
            replaying: false,
        }
    }

    /// The team's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The state of the current round.
    #[must_use]
    pub const fn state(&self) -> TeamState {
        self.state
    }

    /// The members, scrum master included.
    pub fn members(&self) -> impl Iterator<Item = &Participant> {
        self.members.iter()
    }

    /// The observers.
    pub fn observers(&self) -> impl Iterator<Item = &Participant> {
        self.observers.iter()
    }

    /// The scrum master, if one was set.
    #[must_use]
    pub fn scrum_master(&self) -> Option<&Participant> {
        self.members
            .iter()
            .find(|member| member.role() == Role::ScrumMaster)
    }

    /// Finds a member or observer by name, ignoring case.
    #[must_use]
    pub fn participant(&self, name: &str) -> Option<&Participant> {
        self.members
            .iter()
            .chain(self.observers.iter())
            .find(|participant| participant.matches(name))
    }

    /// The cards members can vote with.
    #[must_use]
    pub fn available_estimations(&self) -> &[Estimation] {
        &self.available_estimations
    }

    /// The result of the running or last finished round.
    #[must_use]
    pub const fn estimation_result(&self) -> Option<&EstimationResult> {
        self.estimation_result.as_ref()
    }

    /// When the countdown timer runs out, if one is running.
    #[must_use]
    pub const fn timer_end_time(&self) -> Option<DateTime<Utc>> {
        self.timer_end_time
    }

    /// The clock the team stamps activity with.
    #[must_use]
    pub fn time(&self) -> &Arc<dyn TimeProvider> {
        &self.time
    }

    /// Routes the team's events to `sink`.
    pub fn set_event_sink(&mut self, sink: EventSink) {
        self.event_sink = Some(sink);
    }

    /// Marks events raised from now on as replays of another replica's events.
    pub fn set_replaying(&mut self, replaying: bool) {
        self.replaying = replaying;
    }

    /// Raises [`TeamEvent::TeamCreated`] with the current state.
    pub fn announce_created(&self) {
        self.emit(TeamEvent::TeamCreated {
            snapshot: Box::new(self.snapshot()),
        });
    }

    /// Sets the owner of the team.
    ///
    /// # Errors
    /// Fails if the team already has a scrum master or the name is taken.
    pub fn set_scrum_master(&mut self, name: &str) -> Result<(), Error> {
        if let Some(scrum_master) = self.scrum_master() {
            return Err(Error::ScrumMasterAlreadySet(scrum_master.name().to_string()));
        }

        self.add_participant(name, Role::ScrumMaster)
    }

    /// Adds a member, or an observer if `as_observer` is set.
    ///
    /// # Errors
    /// Fails if the name is empty or already taken by a member or observer.
    pub fn join(&mut self, name: &str, as_observer: bool) -> Result<(), Error> {
        let role = if as_observer {
            Role::Observer
        } else {
            Role::Member
        };

        self.add_participant(name, role)
    }

    /// Removes a participant from the team.
    ///
    /// The scrum master is not removed but becomes dormant. Unknown names are
    /// ignored. Returns whether anyone was disconnected.
    pub fn disconnect(&mut self, name: &str) -> bool {
        let Some(departed) = self.detach(name) else {
            return false;
        };

        self.check_estimation_complete();
        self.release(departed);
        true
    }

    /// Disconnects every participant that was not active within `threshold`.
    ///
    /// Returns the names of the disconnected participants. A dormant scrum
    /// master is not disconnected again.
    pub fn disconnect_inactive(&mut self, threshold: Duration) -> Vec<String> {
        let threshold = TimeDelta::from_std(threshold).unwrap_or(TimeDelta::MAX);
        let Some(cutoff) = self.time.now().checked_sub_signed(threshold) else {
            return Vec::new();
        };

        let inactive: Vec<String> = self
            .members
            .iter()
            .chain(self.observers.iter())
            .filter(|participant| !participant.is_dormant() && participant.last_activity() < cutoff)
            .map(|participant| participant.name().to_string())
            .collect();

        let departed: Vec<Departed> = inactive.iter().filter_map(|name| self.detach(name)).collect();
        if !departed.is_empty() {
            self.check_estimation_complete();
        }
        for departed in departed {
            self.release(departed);
        }

        inactive
    }

    /// Starts a new round of estimation.
    ///
    /// # Errors
    /// Fails if `initiator` is not the scrum master or a round is running.
    pub fn start_estimation(&mut self, initiator: &str) -> Result<(), Error> {
        let scrum_master = self.ensure_scrum_master(initiator)?;
        if self.state == TeamState::EstimationInProgress {
            return Err(Error::EstimationInProgress(self.name.clone()));
        }

        for member in &mut self.members {
            member.set_estimation(None);
        }
        self.estimation_result = Some(EstimationResult::new(
            self.members.iter().map(Participant::info),
        ));
        self.state = TeamState::EstimationInProgress;

        debug!(team = %self.name, "estimation started");
        self.broadcast(&MessageBody::EstimationStarted, None);
        self.emit(TeamEvent::EstimationStarted { scrum_master });
        Ok(())
    }

    /// Cancels the running round of estimation.
    ///
    /// # Errors
    /// Fails if `initiator` is not the scrum master or no round is running.
    pub fn cancel_estimation(&mut self, initiator: &str) -> Result<(), Error> {
        let scrum_master = self.ensure_scrum_master(initiator)?;
        if self.state != TeamState::EstimationInProgress {
            return Err(Error::EstimationNotInProgress(self.name.clone()));
        }

        self.estimation_result = None;
        self.state = TeamState::EstimationCanceled;

        debug!(team = %self.name, "estimation canceled");
        self.broadcast(&MessageBody::EstimationCanceled, None);
        self.emit(TeamEvent::EstimationCanceled { scrum_master });
        Ok(())
    }

    /// Sets the vote of a member.
    ///
    /// The vote only counts while a round is running and the member was part
    /// of the team when the round started.
    ///
    /// # Errors
    /// Fails if `member` is not a member or the card is not available.
    pub fn estimate(&mut self, member: &str, estimation: Option<Estimation>) -> Result<(), Error> {
        if let Some(estimation) = estimation {
            if !self.available_estimations.contains(&estimation) {
                return Err(Error::EstimationNotAvailable(estimation));
            }
        }

        let index = self
            .member_index(member)
            .ok_or_else(|| Error::MemberNotFound(member.to_string()))?;
        self.members[index].set_estimation(estimation);
        let info = self.members[index].info();

        if self.state != TeamState::EstimationInProgress {
            return Ok(());
        }
        let Some(result) = self
            .estimation_result
            .as_mut()
            .filter(|result| result.contains_member(&info.name))
        else {
            return Ok(());
        };
        result.set(&info.name, estimation)?;

        self.broadcast(&MessageBody::MemberEstimated { member: info.clone() }, None);
        self.emit(TeamEvent::MemberEstimated {
            member: info.name,
            estimation,
        });
        self.check_estimation_complete();
        Ok(())
    }

    /// Refreshes the last activity of a participant.
    ///
    /// # Errors
    /// Fails if no participant has the name.
    pub fn update_activity(&mut self, name: &str) -> Result<(), Error> {
        let now = self.time.now();
        let participant = self
            .participant_mut(name)
            .ok_or_else(|| Error::ParticipantNotFound(name.to_string()))?;
        participant.set_last_activity(now);
        let member = participant.name().to_string();

        self.emit(TeamEvent::MemberActivity { member });
        Ok(())
    }

    /// Replaces the cards members can vote with.
    ///
    /// # Errors
    /// Fails while a round is running.
    pub fn change_available_estimations(
        &mut self,
        estimations: Vec<Estimation>,
    ) -> Result<(), Error> {
        if self.state == TeamState::EstimationInProgress {
            return Err(Error::EstimationInProgress(self.name.clone()));
        }

        self.available_estimations = estimations.clone();
        self.broadcast(
            &MessageBody::AvailableEstimationsChanged {
                estimations: estimations.clone(),
            },
            None,
        );
        self.emit(TeamEvent::AvailableEstimationsChanged { estimations });
        Ok(())
    }

    /// Starts the countdown timer for `duration`.
    ///
    /// # Errors
    /// Fails if `member` is not a member or the duration is zero.
    pub fn start_timer(&mut self, member: &str, duration: Duration) -> Result<(), Error> {
        if duration.is_zero() {
            return Err(Error::InvalidTimerDuration);
        }
        let duration = TimeDelta::from_std(duration).map_err(|_| Error::InvalidTimerDuration)?;
        let end_time = self
            .time
            .now()
            .checked_add_signed(duration)
            .ok_or(Error::InvalidTimerDuration)?;

        self.start_timer_until(member, end_time)
    }

    /// Starts the countdown timer, running out at `end_time`.
    ///
    /// # Errors
    /// Fails if `member` is not a member.
    pub fn start_timer_until(&mut self, member: &str, end_time: DateTime<Utc>) -> Result<(), Error> {
        let member = self.member_name(member)?;

        self.timer_end_time = Some(end_time);
        self.broadcast(&MessageBody::TimerStarted { end_time }, None);
        self.emit(TeamEvent::TimerStarted { member, end_time });
        Ok(())
    }

    /// Stops the countdown timer.
    ///
    /// # Errors
    /// Fails if `member` is not a member.
    pub fn cancel_timer(&mut self, member: &str) -> Result<(), Error> {
        let member = self.member_name(member)?;

        self.timer_end_time = None;
        self.broadcast(&MessageBody::TimerCanceled, None);
        self.emit(TeamEvent::TimerCanceled { member });
        Ok(())
    }

    /// Who still has to vote in the running round. `None` outside a round.
    #[must_use]
    pub fn estimation_participants(&self) -> Option<Vec<EstimationParticipantStatus>> {
        if self.state != TeamState::EstimationInProgress {
            return None;
        }

        self.estimation_result.as_ref().map(|result| {
            result
                .iter()
                .map(|(member, estimation)| EstimationParticipantStatus {
                    member_name: member.name.clone(),
                    estimated: estimation.is_some(),
                })
                .collect()
        })
    }

    /// Removes the oldest undelivered message of a participant.
    ///
    /// # Errors
    /// Fails if no participant has the name.
    pub fn pop_message(&mut self, name: &str) -> Result<Option<Message>, Error> {
        self.participant_mut(name)
            .map(Participant::pop_message)
            .ok_or_else(|| Error::ParticipantNotFound(name.to_string()))
    }

    /// Removes every undelivered message of a participant.
    ///
    /// # Errors
    /// Fails if no participant has the name.
    pub fn take_messages(&mut self, name: &str) -> Result<Vec<Message>, Error> {
        self.participant_mut(name)
            .map(Participant::take_messages)
            .ok_or_else(|| Error::ParticipantNotFound(name.to_string()))
    }

    /// Watches the messages queued for a participant.
    ///
    /// The sender is dropped once the participant leaves, after the terminal
    /// [`MessageBody::Empty`] was queued.
    ///
    /// # Errors
    /// Fails if no participant has the name.
    pub fn subscribe_messages(&self, name: &str) -> Result<watch::Receiver<Option<Message>>, Error> {
        self.participant(name)
            .map(Participant::subscribe_messages)
            .ok_or_else(|| Error::ParticipantNotFound(name.to_string()))
    }

    fn add_participant(&mut self, name: &str, role: Role) -> Result<(), Error> {
        if name.trim().is_empty() {
            return Err(Error::EmptyName);
        }
        if self.participant(name).is_some() {
            return Err(Error::DuplicateName(name.to_string()));
        }

        let participant = Participant::new(name.to_string(), role, self.time.now());
        let member = participant.info();
        if role.is_member() {
            self.members.push(participant);
        } else {
            self.observers.push(participant);
        }

        debug!(team = %self.name, participant = %member.name, ?role, "participant joined");
        self.broadcast(
            &MessageBody::MemberJoined {
                member: member.clone(),
            },
            Some(name),
        );
        self.emit(TeamEvent::MemberJoined { member });
        Ok(())
    }

    /// Takes a participant out of the roster and tells everyone else.
    fn detach(&mut self, name: &str) -> Option<Departed> {
        let departed = if let Some(index) = self.member_index(name) {
            if self.members[index].role() == Role::ScrumMaster {
                self.members[index].set_dormant(true);
                Departed::Dormant(self.members[index].info())
            } else {
                Departed::Removed(self.members.remove(index))
            }
        } else {
            let index = self
                .observers
                .iter()
                .position(|observer| observer.matches(name))?;
            Departed::Removed(self.observers.remove(index))
        };

        let member = departed.info();
        debug!(team = %self.name, participant = %member.name, "participant disconnected");
        self.broadcast(
            &MessageBody::MemberDisconnected {
                member: member.clone(),
            },
            Some(&member.name),
        );
        self.emit(TeamEvent::MemberDisconnected { member });
        Some(departed)
    }

    /// Unblocks pending reads of a departed participant.
    fn release(&mut self, departed: Departed) {
        match departed {
            Departed::Removed(mut participant) => participant.send(MessageBody::Empty),
            Departed::Dormant(info) => {
                if let Some(index) = self.member_index(&info.name) {
                    self.members[index].send(MessageBody::Empty);
                }
            }
        }
    }

    fn check_estimation_complete(&mut self) {
        if self.state != TeamState::EstimationInProgress {
            return;
        }
        let Some(result) = self.estimation_result.as_mut() else {
            return;
        };
        if !result.is_complete(self.members.iter().map(Participant::name)) {
            return;
        }

        result.set_read_only();
        let result = result.items();
        self.state = TeamState::EstimationFinished;

        debug!(team = %self.name, "estimation finished");
        self.broadcast(&MessageBody::EstimationEnded { result }, None);
        self.emit(TeamEvent::EstimationEnded);
    }

    fn ensure_scrum_master(&self, name: &str) -> Result<String, Error> {
        self.scrum_master()
            .filter(|scrum_master| scrum_master.matches(name))
            .map(|scrum_master| scrum_master.name().to_string())
            .ok_or_else(|| Error::NotScrumMaster(name.to_string()))
    }

    fn member_name(&self, name: &str) -> Result<String, Error> {
        self.member_index(name)
            .map(|index| self.members[index].name().to_string())
            .ok_or_else(|| Error::MemberNotFound(name.to_string()))
    }

    fn member_index(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|member| member.matches(name))
    }

    fn participant_mut(&mut self, name: &str) -> Option<&mut Participant> {
        self.members
            .iter_mut()
            .chain(self.observers.iter_mut())
            .find(|participant| participant.matches(name))
    }

    /// Queues `body` for every member, then every observer.
    fn broadcast(&mut self, body: &MessageBody, except: Option<&str>) {
        for participant in self.members.iter_mut().chain(self.observers.iter_mut()) {
            if except.is_some_and(|name| participant.matches(name)) {
                continue;
            }
            participant.send(body.clone());
        }
    }

    fn emit(&self, event: TeamEvent) {
        let Some(sink) = &self.event_sink else {
            return;
        };

        sink.send(&ScrumTeamEvent {
            team_name: self.name.clone(),
            event,
            replayed: self.replaying,
        });
    }
}

enum Departed {
    Removed(Participant),
    Dormant(ParticipantInfo),
}

impl Departed {
    fn info(&self) -> ParticipantInfo {
        match self {
            Self::Removed(participant) => participant.info(),
            Self::Dormant(info) => info.clone(),
        }
    }
}

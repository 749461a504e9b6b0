use crate::participant::Inbox;
use crate::team::TeamParts;
use crate::{
    Error, Estimation, EstimationResult, EstimationResultItem, Message, Participant, Role,
    ScrumTeam, TeamState, TimeProvider,
};

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Complete state of a team, used to copy it to another node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSnapshot {
    /// Name of the team.
    pub name: String,

    /// State of the round.
    pub state: TeamState,

    /// Cards members can vote with.
    pub available_estimations: Vec<Estimation>,

    /// Members, scrum master included.
    pub members: Vec<ParticipantSnapshot>,

    /// Observers.
    pub observers: Vec<ParticipantSnapshot>,

    /// Result of the running or last finished round.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimation_result: Option<EstimationResultSnapshot>,

    /// When the countdown timer runs out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_end_time: Option<DateTime<Utc>>,
}

/// State of one participant, including its undelivered messages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSnapshot {
    /// Name of the participant.
    pub name: String,

    /// Role of the participant.
    pub role: Role,

    /// Current vote of a member.
    #[serde(default)]
    pub estimation: Option<Estimation>,

    /// When the participant was last active.
    pub last_activity: DateTime<Utc>,

    /// Whether the scrum master is disconnected.
    #[serde(default)]
    pub is_dormant: bool,

    /// Id of the most recently queued message.
    #[serde(default)]
    pub last_message_id: u64,

    /// Undelivered messages, oldest first.
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Votes of a round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimationResultSnapshot {
    /// Whether the round finished.
    pub read_only: bool,

    /// The votes, in result order.
    pub items: Vec<EstimationResultItem>,
}

impl ParticipantSnapshot {
    fn capture(participant: &Participant) -> Self {
        Self {
            name: participant.name().to_string(),
            role: participant.role(),
            estimation: participant.estimation(),
            last_activity: participant.last_activity(),
            is_dormant: participant.is_dormant(),
            last_message_id: participant.last_message_id(),
            messages: participant.messages().cloned().collect(),
        }
    }

    fn restore(self) -> Participant {
        Participant::restore(
            self.name,
            self.role,
            self.estimation,
            self.last_activity,
            self.is_dormant,
            Inbox::restore(self.messages, self.last_message_id),
        )
    }
}

impl ScrumTeam {
    /// Captures the complete state of the team.
    #[must_use]
    pub fn snapshot(&self) -> TeamSnapshot {
        TeamSnapshot {
            name: self.name().to_string(),
            state: self.state(),
            available_estimations: self.available_estimations().to_vec(),
            members: self.members().map(ParticipantSnapshot::capture).collect(),
            observers: self.observers().map(ParticipantSnapshot::capture).collect(),
            estimation_result: self.estimation_result().map(|result| {
                EstimationResultSnapshot {
                    read_only: result.is_read_only(),
                    items: result.items(),
                }
            }),
            timer_end_time: self.timer_end_time(),
        }
    }

    /// Rebuilds a team from a snapshot.
    ///
    /// The rebuilt team has no event sink.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSnapshot`] if the snapshot describes a team
    /// that cannot exist, e.g. one with two participants of the same name.
    pub fn from_snapshot(
        snapshot: TeamSnapshot,
        time: Arc<dyn TimeProvider>,
    ) -> Result<Self, Error> {
        validate(&snapshot)?;

        let estimation_result = snapshot.estimation_result.map(|result| {
            EstimationResult::restore(
                result
                    .items
                    .into_iter()
                    .map(|item| (item.member, item.estimation))
                    .collect(),
                result.read_only,
            )
        });

        Ok(Self::restore(
            TeamParts {
                name: snapshot.name,
                members: snapshot
                    .members
                    .into_iter()
                    .map(ParticipantSnapshot::restore)
                    .collect(),
                observers: snapshot
                    .observers
                    .into_iter()
                    .map(ParticipantSnapshot::restore)
                    .collect(),
                state: snapshot.state,
                estimation_result,
                available_estimations: snapshot.available_estimations,
                timer_end_time: snapshot.timer_end_time,
            },
            time,
        ))
    }

    /// Serializes the complete state of the team to JSON.
    ///
    /// # Errors
    /// Fails if serialization fails.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    /// Rebuilds a team from JSON written by [`ScrumTeam::to_json`].
    ///
    /// # Errors
    /// Fails if the JSON is malformed or describes an invalid team.
    pub fn from_json(json: &str, time: Arc<dyn TimeProvider>) -> Result<Self, Error> {
        Self::from_snapshot(serde_json::from_str(json)?, time)
    }
}

fn validate(snapshot: &TeamSnapshot) -> Result<(), Error> {
    let invalid = |reason: String| Err(Error::InvalidSnapshot(reason));

    if snapshot.name.trim().is_empty() {
        return Err(Error::EmptyName);
    }

    if let Some(member) = snapshot.members.iter().find(|m| !m.role.is_member()) {
        return invalid(format!("'{}' is listed as member but is an observer", member.name));
    }
    if let Some(observer) = snapshot.observers.iter().find(|o| o.role.is_member()) {
        return invalid(format!("'{}' is listed as observer but is a member", observer.name));
    }

    let scrum_masters = snapshot
        .members
        .iter()
        .filter(|member| member.role == Role::ScrumMaster)
        .count();
    if scrum_masters > 1 {
        return invalid(format!("{scrum_masters} scrum masters"));
    }

    let mut names = HashSet::new();
    for participant in snapshot.members.iter().chain(snapshot.observers.iter()) {
        if !names.insert(participant.name.to_lowercase()) {
            return invalid(format!("duplicate name '{}'", participant.name));
        }
    }

    if snapshot.state == TeamState::EstimationInProgress && snapshot.estimation_result.is_none() {
        return invalid("estimation in progress without result".to_string());
    }

    Ok(())
}

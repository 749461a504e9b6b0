use crate::{Error, Estimation, ParticipantInfo, Role, ScrumTeam, TeamSnapshot};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A state change of a team, as seen by other replicas of the team.
///
/// Unlike inbox messages, events carry everything needed to apply the same
/// change to another copy of the team.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TeamEvent {
    /// The team was created. Carries the complete initial state.
    TeamCreated {
        /// State of the team right after creation.
        snapshot: Box<TeamSnapshot>,
    },

    /// A participant joined, or the scrum master was set.
    MemberJoined {
        /// The new participant.
        member: ParticipantInfo,
    },

    /// A participant left.
    MemberDisconnected {
        /// The departed participant.
        member: ParticipantInfo,
    },

    /// A round of estimation started.
    EstimationStarted {
        /// Name of the scrum master that started the round.
        scrum_master: String,
    },

    /// Every member voted.
    EstimationEnded,

    /// The round was canceled.
    EstimationCanceled {
        /// Name of the scrum master that canceled the round.
        scrum_master: String,
    },

    /// A member voted.
    MemberEstimated {
        /// Name of the member.
        member: String,

        /// The vote.
        estimation: Option<Estimation>,
    },

    /// A participant showed signs of life.
    MemberActivity {
        /// Name of the participant.
        member: String,
    },

    /// The set of cards changed.
    AvailableEstimationsChanged {
        /// The new cards.
        estimations: Vec<Estimation>,
    },

    /// A member started the countdown timer.
    TimerStarted {
        /// Name of the member.
        member: String,

        /// When the timer runs out.
        end_time: DateTime<Utc>,
    },

    /// A member canceled the countdown timer.
    TimerCanceled {
        /// Name of the member.
        member: String,
    },
}

impl TeamEvent {
    /// Whether other replicas need to see this event to stay consistent.
    ///
    /// `EstimationEnded` follows from the relayed votes, so every replica
    /// raises it on its own.
    #[must_use]
    pub const fn is_replicated(&self) -> bool {
        !matches!(self, Self::EstimationEnded)
    }

    /// Applies an event raised by another replica to `team`.
    ///
    /// # Errors
    /// Returns the error of the underlying team operation. `TeamCreated` and
    /// `EstimationEnded` cannot be applied to an existing team and are
    /// ignored.
    pub fn apply(&self, team: &mut ScrumTeam) -> Result<(), Error> {
        match self {
            Self::TeamCreated { .. } | Self::EstimationEnded => Ok(()),
            Self::MemberJoined { member } => match member.role {
                Role::ScrumMaster => team.set_scrum_master(&member.name),
                Role::Member => team.join(&member.name, false),
                Role::Observer => team.join(&member.name, true),
            },
            Self::MemberDisconnected { member } => {
                team.disconnect(&member.name);
                Ok(())
            }
            Self::EstimationStarted { scrum_master } => team.start_estimation(scrum_master),
            Self::EstimationCanceled { scrum_master } => team.cancel_estimation(scrum_master),
            Self::MemberEstimated { member, estimation } => team.estimate(member, *estimation),
            Self::MemberActivity { member } => team.update_activity(member),
            Self::AvailableEstimationsChanged { estimations } => {
                team.change_available_estimations(estimations.clone())
            }
            Self::TimerStarted { member, end_time } => team.start_timer_until(member, *end_time),
            Self::TimerCanceled { member } => team.cancel_timer(member),
        }
    }
}

/// A [`TeamEvent`] stamped with the team it happened in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScrumTeamEvent {
    /// Name of the team.
    pub team_name: String,

    /// What happened.
    pub event: TeamEvent,

    /// Whether the event was raised while applying an event from another
    /// replica. Such events must not be relayed again.
    pub replayed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Deck, ManualTimeProvider, TeamState};

    use std::sync::Arc;

    use assert_matches::assert_matches;

    fn team() -> ScrumTeam {
        let mut team =
            ScrumTeam::new("Team", Deck::Standard, Arc::new(ManualTimeProvider::default()))
                .unwrap();
        team.set_scrum_master("master").unwrap();
        team
    }

    fn joined(name: &str, role: Role) -> TeamEvent {
        TeamEvent::MemberJoined {
            member: ParticipantInfo {
                name: name.to_string(),
                role,
            },
        }
    }

    #[test]
    fn test_only_estimation_ended_stays_local() {
        assert!(!TeamEvent::EstimationEnded.is_replicated());
        assert!(
            TeamEvent::MemberActivity {
                member: "a".to_string()
            }
            .is_replicated()
        );
    }

    #[test]
    fn test_member_joined_keeps_role() {
        let mut team = team();

        joined("alice", Role::Member).apply(&mut team).unwrap();
        joined("viewer", Role::Observer).apply(&mut team).unwrap();

        assert_eq!(team.members().count(), 2);
        assert_eq!(team.observers().count(), 1);
        assert_matches!(
            joined("boss", Role::ScrumMaster).apply(&mut team),
            Err(Error::ScrumMasterAlreadySet(name)) if name == "master"
        );
    }

    #[test]
    fn test_round_events_apply_in_order() {
        let mut team = team();
        joined("alice", Role::Member).apply(&mut team).unwrap();

        let events = [
            TeamEvent::EstimationStarted {
                scrum_master: "master".to_string(),
            },
            TeamEvent::MemberEstimated {
                member: "alice".to_string(),
                estimation: Some(Estimation::new(8.0).unwrap()),
            },
            TeamEvent::MemberEstimated {
                member: "master".to_string(),
                estimation: None,
            },
            TeamEvent::EstimationEnded,
        ];
        for event in &events {
            event.apply(&mut team).unwrap();
        }

        assert_eq!(team.state(), TeamState::EstimationFinished);
        assert_eq!(
            team.estimation_result().unwrap().get("alice"),
            Some(Estimation::new(8.0).unwrap())
        );
    }

    #[test]
    fn test_team_created_is_ignored_on_existing_team() {
        let mut team = team();
        let event = TeamEvent::TeamCreated {
            snapshot: Box::new(team.snapshot()),
        };

        event.apply(&mut team).unwrap();

        assert_eq!(team.members().count(), 1);
    }

    #[test]
    fn test_failed_operation_is_reported() {
        let mut team = team();

        assert_matches!(
            TeamEvent::EstimationCanceled {
                scrum_master: "master".to_string()
            }
            .apply(&mut team),
            Err(Error::EstimationNotInProgress(_))
        );
    }

    #[test]
    fn test_json_is_tagged_by_type() {
        let event = TeamEvent::TimerCanceled {
            member: "alice".to_string(),
        };

        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(
            json,
            serde_json::json!({ "type": "TimerCanceled", "member": "alice" })
        );
        assert_eq!(serde_json::from_value::<TeamEvent>(json).unwrap(), event);
    }
}

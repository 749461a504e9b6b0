use crate::Estimation;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role a participant plays in a team.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    /// Watches the team without voting.
    Observer,

    /// Votes in rounds of estimation.
    Member,

    /// Owns the team and drives rounds of estimation. Always a member.
    ScrumMaster,
}

impl Role {
    /// Whether the role takes part in estimation.
    #[must_use]
    pub const fn is_member(self) -> bool {
        matches!(self, Self::Member | Self::ScrumMaster)
    }
}

/// Identifies a participant inside message payloads.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantInfo {
    /// Name of the participant.
    pub name: String,

    /// Role of the participant.
    pub role: Role,
}

impl ParticipantInfo {
    /// Creates a new participant reference.
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }
}

/// One member's entry in a finished estimation result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimationResultItem {
    /// The member that was asked to vote.
    pub member: ParticipantInfo,

    /// The vote, or `None` if the member left before voting.
    pub estimation: Option<Estimation>,
}

/// The type tag of a [`Message`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// See [`MessageBody::Empty`].
    Empty,
    /// See [`MessageBody::MemberJoined`].
    MemberJoined,
    /// See [`MessageBody::MemberDisconnected`].
    MemberDisconnected,
    /// See [`MessageBody::EstimationStarted`].
    EstimationStarted,
    /// See [`MessageBody::EstimationEnded`].
    EstimationEnded,
    /// See [`MessageBody::EstimationCanceled`].
    EstimationCanceled,
    /// See [`MessageBody::MemberEstimated`].
    MemberEstimated,
    /// See [`MessageBody::MemberActivity`].
    MemberActivity,
    /// See [`MessageBody::TeamCreated`].
    TeamCreated,
    /// See [`MessageBody::AvailableEstimationsChanged`].
    AvailableEstimationsChanged,
    /// See [`MessageBody::TimerStarted`].
    TimerStarted,
    /// See [`MessageBody::TimerCanceled`].
    TimerCanceled,
}

/// The payload of a [`Message`], tagged by message type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MessageBody {
    /// Carries no information; terminates a pending long poll.
    Empty,

    /// A participant joined the team.
    MemberJoined {
        /// The new participant.
        member: ParticipantInfo,
    },

    /// A participant left the team (or the scrum master went dormant).
    MemberDisconnected {
        /// The departed participant.
        member: ParticipantInfo,
    },

    /// A new round of estimation started.
    EstimationStarted,

    /// Every member voted.
    EstimationEnded {
        /// The votes of all members asked in the round.
        result: Vec<EstimationResultItem>,
    },

    /// The scrum master canceled the round.
    EstimationCanceled,

    /// A member voted. The vote itself stays hidden until the round ends.
    MemberEstimated {
        /// The member that voted.
        member: ParticipantInfo,
    },

    /// A participant showed signs of life.
    MemberActivity {
        /// The active participant.
        member: ParticipantInfo,
    },

    /// The team was created.
    TeamCreated,

    /// The set of cards changed.
    AvailableEstimationsChanged {
        /// The new cards.
        estimations: Vec<Estimation>,
    },

    /// A member started the countdown timer.
    TimerStarted {
        /// When the timer runs out.
        end_time: DateTime<Utc>,
    },

    /// The countdown timer was canceled.
    TimerCanceled,
}

impl MessageBody {
    /// The type tag of the body.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::Empty => MessageType::Empty,
            Self::MemberJoined { .. } => MessageType::MemberJoined,
            Self::MemberDisconnected { .. } => MessageType::MemberDisconnected,
            Self::EstimationStarted => MessageType::EstimationStarted,
            Self::EstimationEnded { .. } => MessageType::EstimationEnded,
            Self::EstimationCanceled => MessageType::EstimationCanceled,
            Self::MemberEstimated { .. } => MessageType::MemberEstimated,
            Self::MemberActivity { .. } => MessageType::MemberActivity,
            Self::TeamCreated => MessageType::TeamCreated,
            Self::AvailableEstimationsChanged { .. } => MessageType::AvailableEstimationsChanged,
            Self::TimerStarted { .. } => MessageType::TimerStarted,
            Self::TimerCanceled => MessageType::TimerCanceled,
        }
    }
}

/// A notification queued for one participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Sequence number, strictly increasing per recipient.
    pub id: u64,

    /// What happened.
    #[serde(flatten)]
    pub body: MessageBody,
}

impl Message {
    /// The type tag of the message.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        self.body.message_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_json_is_tagged_by_type() {
        let message = Message {
            id: 7,
            body: MessageBody::MemberJoined {
                member: ParticipantInfo::new("Alice", Role::Observer),
            },
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "MemberJoined");
        assert_eq!(json["id"], 7);
        assert_eq!(json["member"]["role"], "observer");

        let parsed: Message = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, message);
        assert_eq!(parsed.message_type(), MessageType::MemberJoined);
    }

    #[test]
    fn test_message_type_names_match_json_tags() {
        for body in [
            MessageBody::Empty,
            MessageBody::EstimationStarted,
            MessageBody::EstimationCanceled,
            MessageBody::TeamCreated,
            MessageBody::TimerCanceled,
        ] {
            let tag = serde_json::to_value(&body).unwrap()["type"].clone();
            assert_eq!(serde_json::to_value(body.message_type()).unwrap(), tag);
        }
    }
}

use bytes::Bytes;
use poker_domain::TeamEvent;
use serde::{Deserialize, Serialize};

/// Error decoding a [`NodeMessage`] from bytes.
pub type DecodeError = ciborium::de::Error<std::io::Error>;

/// Error encoding a [`NodeMessage`] to bytes.
pub type EncodeError = ciborium::ser::Error<std::io::Error>;

/// Envelope of everything nodes say to each other.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct NodeMessage {
    /// The node that published the message.
    pub sender_node_id: String,

    /// The node the message is meant for. Every node if `None`.
    pub recipient_node_id: Option<String>,

    /// The content.
    pub body: NodeMessageBody,
}

impl NodeMessage {
    /// A message for every node.
    pub fn broadcast(sender_node_id: impl Into<String>, body: NodeMessageBody) -> Self {
        Self {
            sender_node_id: sender_node_id.into(),
            recipient_node_id: None,
            body,
        }
    }

    /// A message for one node.
    pub fn to(
        sender_node_id: impl Into<String>,
        recipient_node_id: impl Into<String>,
        body: NodeMessageBody,
    ) -> Self {
        Self {
            sender_node_id: sender_node_id.into(),
            recipient_node_id: Some(recipient_node_id.into()),
            body,
        }
    }

    /// Whether a node should process the message: it was sent by another
    /// node, to everyone or to `node_id`.
    #[must_use]
    pub fn is_for(&self, node_id: &str) -> bool {
        self.sender_node_id != node_id
            && self
                .recipient_node_id
                .as_deref()
                .is_none_or(|recipient| recipient == node_id)
    }
}

/// The content of a [`NodeMessage`].
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub enum NodeMessageBody {
    /// Something happened in a team.
    ScrumTeamMessage(ScrumTeamMessage),

    /// A team was created.
    TeamCreated {
        /// Name of the team.
        team_name: String,

        /// JSON snapshot of the new team.
        snapshot: String,
    },

    /// Asks peers for the names of their teams.
    RequestTeamList,

    /// Answers [`NodeMessageBody::RequestTeamList`].
    TeamList {
        /// Names of all teams of the sender.
        team_names: Vec<String>,
    },

    /// Asks a peer for snapshots of teams.
    RequestTeams {
        /// Names of the requested teams.
        team_names: Vec<String>,
    },

    /// Answers [`NodeMessageBody::RequestTeams`], one message per team.
    InitializeTeam(InitializeTeam),
}

/// A team event, tagged with its team.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ScrumTeamMessage {
    /// Name of the team.
    pub team_name: String,

    /// What happened.
    pub event: TeamEvent,
}

/// One team sent in answer to [`NodeMessageBody::RequestTeams`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum InitializeTeam {
    /// The team's JSON snapshot.
    Snapshot {
        /// Name of the team.
        team_name: String,

        /// JSON snapshot of the team.
        snapshot: String,
    },

    /// The team does not exist on the sender.
    Deleted {
        /// Name of the team.
        team_name: String,
    },
}

impl InitializeTeam {
    /// Name of the team.
    #[must_use]
    pub fn team_name(&self) -> &str {
        match self {
            Self::Snapshot { team_name, .. } | Self::Deleted { team_name } => team_name,
        }
    }
}

impl TryFrom<Bytes> for NodeMessage {
    type Error = DecodeError;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        let reader = bytes.as_ref();
        ciborium::de::from_reader(reader)
    }
}

impl TryInto<Bytes> for NodeMessage {
    type Error = EncodeError;

    fn try_into(self) -> Result<Bytes, Self::Error> {
        let mut writer = Vec::new();
        ciborium::ser::into_writer(&self, &mut writer)?;
        Ok(Bytes::from(writer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use poker_domain::Estimation;

    #[test]
    fn test_team_event_survives_encoding() {
        let message = NodeMessage::to(
            "node-a",
            "node-b",
            NodeMessageBody::ScrumTeamMessage(ScrumTeamMessage {
                team_name: "Team".to_string(),
                event: TeamEvent::MemberEstimated {
                    member: "Alice".to_string(),
                    estimation: Some(Estimation::infinity()),
                },
            }),
        );

        let bytes: Bytes = message.clone().try_into().unwrap();
        let decoded = NodeMessage::try_from(bytes).unwrap();

        assert_eq!(decoded, message);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(NodeMessage::try_from(Bytes::from_static(b"\xff\x00garbage")).is_err());
    }

    #[test]
    fn test_is_for() {
        let broadcast = NodeMessage::broadcast("a", NodeMessageBody::RequestTeamList);
        assert!(broadcast.is_for("b"));
        assert!(!broadcast.is_for("a"));

        let direct = NodeMessage::to("a", "b", NodeMessageBody::RequestTeamList);
        assert!(direct.is_for("b"));
        assert!(!direct.is_for("c"));
    }
}

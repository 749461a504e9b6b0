//! Planning poker teams: cards, participants, messages and the state machine
//! driving rounds of estimation.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod estimation;
mod event;
mod message;
mod participant;
mod result;
mod sink;
mod snapshot;
mod team;
mod time;

pub use error::Error;
pub use estimation::{Deck, Estimation};
pub use event::{ScrumTeamEvent, TeamEvent};
pub use message::{EstimationResultItem, Message, MessageBody, MessageType, ParticipantInfo, Role};
pub use participant::Participant;
pub use result::EstimationResult;
pub use sink::EventSink;
pub use snapshot::{EstimationResultSnapshot, ParticipantSnapshot, TeamSnapshot};
pub use team::{EstimationParticipantStatus, ScrumTeam, TeamState};
pub use time::{ManualTimeProvider, SystemTimeProvider, TimeProvider};

/// Team and participant names compare case-insensitively.
pub(crate) fn names_equal(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// The key a team or participant name is stored under.
#[must_use]
pub fn name_key(name: &str) -> String {
    name.to_lowercase()
}

//! Keeps the scrum teams of several nodes in sync over a message bus.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod config;
mod error;
mod handler;
mod message;
mod synchronizer;

pub use config::ClusterConfig;
pub use error::{Error, HandlerError};
pub use message::{
    DecodeError, EncodeError, InitializeTeam, NodeMessage, NodeMessageBody, ScrumTeamMessage,
};
pub use synchronizer::NodeSynchronizer;

//! Runs several planning poker nodes in one process, connected by an
//! in-memory bus.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod cluster;
mod config;
mod error;

pub use cluster::{LocalCluster, LocalNode};
pub use config::LocalClusterConfig;
pub use error::Error;

//! Registry of the teams hosted by a node, handing out exclusive locks on
//! them and holding lookups back while the node copies teams from its peers.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod config;
mod error;
mod initialization;
mod lock;
mod registry;

pub use config::RegistryConfig;
pub use error::Error;
pub use initialization::InitializationList;
pub use lock::TeamLock;
pub use registry::TeamRegistry;

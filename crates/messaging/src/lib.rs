//! Abstract interface for the publish/subscribe bus connecting nodes.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Buses deliver every published message to every registered node.
pub mod bus;

/// Subscriptions keep a node registered on a bus.
pub mod subscription;

/// Subscription handlers process messages delivered to a node.
pub mod subscription_handler;

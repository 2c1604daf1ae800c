//! Message Broker Fabric
//!
//! A line-delimited TCP pub/sub hub. The node holding MESSAGE_BROKER runs
//! the server; every node runs a client pointed at the broker. A line
//! published by any client is fanned out to all other connected clients.

pub mod client;
pub mod server;

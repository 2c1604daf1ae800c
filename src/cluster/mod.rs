//! Cluster Coordination Service
//!
//! The heart of the runtime: one service per node that discovers peers over
//! UDP broadcast, elects a coordinator with the Bully algorithm, and applies
//! the role assignment the coordinator hands out.
//!
//! ## Core Mechanisms
//! - **Single dispatch loop**: Every inbound datagram and every timer
//!   expiration is funnelled through one mpsc channel and handled to
//!   completion before the next event is picked up. Handlers never suspend;
//!   they either finish synchronously or arm a timer and return.
//! - **Discovery**: JOIN is broadcast until the first HELLO arrives; HELLO
//!   and ACK HELLO are bounded unicast retry transactions that carry the full
//!   node list.
//! - **Bully election**: Membership additions arm a debounce; when it fires
//!   the node challenges every higher-priority peer and either defers to an
//!   OK or bullies through to coordinator.
//! - **Role propagation**: The coordinator persists the role vector and
//!   repeats COORDINATOR to every member until acknowledged.

pub mod discovery;
pub mod election;
pub mod events;
pub mod service;
pub mod transport;

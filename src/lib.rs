//! Peer-to-Peer Collaborative Document Cluster
//!
//! This library crate defines the modules that make up a cluster node.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! The node is built from a coordination core and the collaborators it
//! drives:
//!
//! - **`cluster`**: The coordination core. One dispatch loop per node that
//!   discovers peers over UDP broadcast, runs the Bully election, and
//!   propagates the coordinator's role assignment.
//! - **`membership`**: The known-nodes table, with priorities derived
//!   locally from each peer's address.
//! - **`protocol`**: The strict text/JSON wire codec for the seven
//!   discovery message types.
//! - **`timers`**: Keyed, cancel-safe interval and timeout registries that
//!   feed the dispatch loop.
//! - **`roles`**: Turns role-vector changes into ordered start/stop calls on
//!   the collaborators below.
//! - **`broker`** / **`gateway`** / **`editing`** / **`storage`**: The
//!   role-driven services: a TCP pub/sub fabric, the HTTP face of the
//!   cluster, the document editing endpoint, and the shared document store.

pub mod broker;
pub mod cluster;
pub mod config;
pub mod editing;
pub mod gateway;
pub mod membership;
pub mod protocol;
pub mod roles;
pub mod storage;
pub mod timers;

//! Cluster Membership Module
//!
//! Maintains the local node's view of the cluster: which peers exist, what
//! priority they carry, and which cluster roles they currently hold.
//!
//! ## Core Mechanisms
//! - **Address-derived identity**: A node is identified by its IPv4 address on
//!   the discovery interface. No separate node id exists anywhere in the system.
//! - **Local priority computation**: A node's election priority is derived from
//!   the host bits of its address. Every node can compute any peer's priority
//!   from the address alone, so priorities are never transmitted and never
//!   trusted from the wire.
//! - **Single-writer table**: The membership table is mutated only by the
//!   cluster service dispatch loop. Everyone else receives immutable snapshots.

pub mod priority;
pub mod table;
pub mod types;

//! Timer Registries
//!
//! Every retransmit interval and deadline in the discovery and election
//! protocols lives in one of these registries. A timer is a spawned task
//! that pushes a typed event into the dispatch channel when it fires, so
//! timer bodies are serialized with datagram handling and never race it.
//!
//! Cancellation is idempotent, and re-arming a key always cancels the prior
//! timer first. Leaks here cause duplicate ELECTION storms, so the handle
//! aborts its task on drop.

pub mod registry;

#[cfg(test)]
mod tests;

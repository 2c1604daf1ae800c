//! Discovery Wire Protocol
//!
//! All cluster coordination traffic is UTF-8 text over UDP: a message keyword,
//! optionally followed by a JSON node-list payload, separated by spaces.
//! The parser is strict. A datagram that is not exactly one of the known
//! forms is rejected before it can touch any state.

pub mod message;

#[cfg(test)]
mod tests;

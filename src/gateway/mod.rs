//! HTTP Gateway
//!
//! The cluster's REST face, bound only while this node holds the GATEWAY
//! role. Serves the membership view and the document store.

pub mod server;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::net::Ipv4Addr;

use super::priority::{broadcast_address, priority};

/// A cluster-wide role assigned by the coordinator.
///
/// `MessageBroker` and `Gateway` are cluster singletons: at most one node
/// holds each at any time. The coordinator always takes `MessageBroker`;
/// `Gateway` goes to the lowest-priority member. Everyone else edits.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    MessageBroker,
    Gateway,
    Editing,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::MessageBroker => write!(f, "MESSAGE_BROKER"),
            Role::Gateway => write!(f, "GATEWAY"),
            Role::Editing => write!(f, "EDITING"),
        }
    }
}

/// A member of the cluster as seen by the local node.
///
/// The priority field is always recomputed from the address and the local
/// netmask. It never comes from the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeEntry {
    pub address: Ipv4Addr,
    pub priority: u32,
    pub roles: BTreeSet<Role>,
}

/// The local node's identity on the discovery interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeIdentity {
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
}

impl NodeIdentity {
    pub fn new(address: Ipv4Addr, netmask: Ipv4Addr) -> Self {
        Self { address, netmask }
    }

    pub fn priority(&self) -> u32 {
        priority(self.address, self.netmask)
    }

    pub fn broadcast_address(&self) -> Ipv4Addr {
        broadcast_address(self.address, self.netmask)
    }
}

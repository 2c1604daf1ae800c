use std::collections::{BTreeSet, HashMap};
use std::net::Ipv4Addr;

use super::priority::priority;
use super::types::{NodeEntry, NodeIdentity, Role};

/// What an upsert did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpsertOutcome {
    pub added: bool,
    pub roles_changed: bool,
}

/// The known-nodes set, keyed by address.
///
/// The local node's own entry is always present and cannot be removed. The
/// table has a single writer (the cluster service dispatch loop); every other
/// component sees deep-copied snapshots.
pub struct MembershipTable {
    identity: NodeIdentity,
    entries: HashMap<Ipv4Addr, NodeEntry>,
}

impl MembershipTable {
    pub fn new(identity: NodeIdentity) -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            identity.address,
            NodeEntry {
                address: identity.address,
                priority: identity.priority(),
                roles: BTreeSet::new(),
            },
        );
        Self { identity, entries }
    }

    pub fn self_address(&self) -> Ipv4Addr {
        self.identity.address
    }

    pub fn self_priority(&self) -> u32 {
        self.identity.priority()
    }

    pub fn self_roles(&self) -> BTreeSet<Role> {
        self.entries
            .get(&self.identity.address)
            .map(|entry| entry.roles.clone())
            .unwrap_or_default()
    }

    /// Inserts or updates an entry. The priority is recomputed locally from
    /// the address, never taken from the caller.
    pub fn upsert(&mut self, address: Ipv4Addr, roles: BTreeSet<Role>) -> UpsertOutcome {
        let computed = priority(address, self.identity.netmask);
        match self.entries.get_mut(&address) {
            Some(entry) => {
                let roles_changed = entry.roles != roles;
                entry.roles = roles;
                entry.priority = computed;
                UpsertOutcome {
                    added: false,
                    roles_changed,
                }
            }
            None => {
                self.entries.insert(
                    address,
                    NodeEntry {
                        address,
                        priority: computed,
                        roles,
                    },
                );
                UpsertOutcome {
                    added: true,
                    roles_changed: false,
                }
            }
        }
    }

    /// Removes a peer. The local entry is never removed.
    pub fn remove(&mut self, address: Ipv4Addr) -> bool {
        if address == self.identity.address {
            return false;
        }
        self.entries.remove(&address).is_some()
    }

    pub fn contains(&self, address: Ipv4Addr) -> bool {
        self.entries.contains_key(&address)
    }

    pub fn get(&self, address: Ipv4Addr) -> Option<&NodeEntry> {
        self.entries.get(&address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deep copy of all entries, ordered by address for stable output.
    pub fn snapshot(&self) -> Vec<NodeEntry> {
        let mut entries: Vec<NodeEntry> = self.entries.values().cloned().collect();
        entries.sort_by_key(|entry| entry.address);
        entries
    }

    pub fn find_by_role(&self, role: Role) -> Option<&NodeEntry> {
        self.entries.values().find(|entry| entry.roles.contains(&role))
    }

    /// Peers with a strictly higher priority than the local node.
    pub fn higher_priority_peers(&self) -> Vec<NodeEntry> {
        let own = self.self_priority();
        let mut peers: Vec<NodeEntry> = self
            .entries
            .values()
            .filter(|entry| entry.priority > own)
            .cloned()
            .collect();
        peers.sort_by_key(|entry| entry.priority);
        peers
    }

    /// All entries except the local one.
    pub fn peers(&self) -> Vec<NodeEntry> {
        let mut peers: Vec<NodeEntry> = self
            .entries
            .values()
            .filter(|entry| entry.address != self.identity.address)
            .cloned()
            .collect();
        peers.sort_by_key(|entry| entry.address);
        peers
    }

    /// The member with the smallest priority, self included.
    pub fn min_priority_member(&self) -> Option<&NodeEntry> {
        self.entries.values().min_by_key(|entry| entry.priority)
    }
}

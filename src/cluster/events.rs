use std::collections::BTreeSet;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::sync::broadcast;

use crate::membership::types::{NodeEntry, Role};

/// An input to the cluster service dispatch loop. Datagrams and timer
/// expirations flow through the same channel, which is what serializes
/// handler execution.
#[derive(Debug, Clone)]
pub enum Event {
    Datagram { source: SocketAddr, payload: Vec<u8> },
    Timer(TimerEvent),
    Shutdown,
}

/// A fired timer, tagged with the transaction it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// Broadcast JOIN again (pre-HELLO only).
    JoinTick,
    /// The membership-change debounce elapsed; start an election.
    PreElection,
    /// Retransmit HELLO to the peer.
    HelloTick(Ipv4Addr),
    /// The peer never acknowledged our HELLO.
    HelloDeadline(Ipv4Addr),
    /// Retransmit ELECTION to the higher-priority peer.
    ElectionTick(Ipv4Addr),
    /// The higher-priority peer never answered our ELECTION.
    ElectionDeadline(Ipv4Addr),
    /// Retransmit COORDINATOR to the member.
    CoordinatorTick(Ipv4Addr),
    /// The member never acknowledged our COORDINATOR.
    CoordinatorDeadline(Ipv4Addr),
    /// We got an OK but no COORDINATOR followed.
    CoordinatorWait,
}

/// Immutable membership snapshot delivered to subscribers.
pub type NodesSnapshot = Vec<NodeEntry>;

/// The local node's role set changed. `source` is the node that announced
/// the assignment: ourselves when we won the election, the coordinator
/// otherwise. Broker and gateway addresses are included so collaborators can
/// be pointed at the right peers without re-deriving them from a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolesUpdate {
    pub roles: BTreeSet<Role>,
    pub source: Ipv4Addr,
    pub broker: Option<Ipv4Addr>,
    pub gateway: Option<Ipv4Addr>,
}

/// Outbound event bus: `nodes` on every membership change, `roles` on every
/// local role change. Subscribers get deep copies and never touch core state.
pub struct EventBus {
    nodes: broadcast::Sender<NodesSnapshot>,
    roles: broadcast::Sender<RolesUpdate>,
}

impl EventBus {
    pub fn new() -> Self {
        let (nodes, _) = broadcast::channel(64);
        let (roles, _) = broadcast::channel(64);
        Self { nodes, roles }
    }

    pub fn subscribe_nodes(&self) -> broadcast::Receiver<NodesSnapshot> {
        self.nodes.subscribe()
    }

    pub fn subscribe_roles(&self) -> broadcast::Receiver<RolesUpdate> {
        self.roles.subscribe()
    }

    pub(crate) fn publish_nodes(&self, snapshot: NodesSnapshot) {
        let _ = self.nodes.send(snapshot);
    }

    pub(crate) fn publish_roles(&self, update: RolesUpdate) {
        let _ = self.roles.send(update);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

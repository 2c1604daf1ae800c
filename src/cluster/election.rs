//! Bully election handlers and the coordinator's role-assignment path.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use super::events::{Event, TimerEvent};
use super::service::ClusterService;
use crate::membership::priority::priority;
use crate::membership::types::Role;
use crate::protocol::message::{Message, WireNode};
use crate::timers::registry::TimerHandle;

/// Where the node stands in the current election round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElectionStatus {
    #[default]
    Idle,
    Candidate,
    Follower,
    Leader,
}

/// Election-round bookkeeping. The pending challenge targets are the keys
/// of the election interval registry, so they are not duplicated here.
#[derive(Debug, Default)]
pub struct ElectionState {
    pub status: ElectionStatus,
    pub received_ok: bool,
}

impl ClusterService {
    /// Challenges every higher-priority peer, or takes the lead outright if
    /// there is none.
    pub(crate) fn start_election(&mut self) {
        self.timers.pre_election.cancel();
        self.timers.coordinator_wait.cancel();
        self.timers.cancel_election();

        let higher = self.table.higher_priority_peers();
        if higher.is_empty() {
            self.become_leader();
            return;
        }

        self.election.status = ElectionStatus::Candidate;
        self.election.received_ok = false;
        tracing::info!(
            "Starting election against {} higher-priority peer(s)",
            higher.len()
        );
        for peer in higher {
            let interval = TimerHandle::interval(
                &self.tx,
                self.config.message_interval,
                Event::Timer(TimerEvent::ElectionTick(peer.address)),
            );
            self.timers.election_interval.arm(peer.address, interval);
            let deadline = TimerHandle::timeout(
                &self.tx,
                self.config.message_timeout,
                Event::Timer(TimerEvent::ElectionDeadline(peer.address)),
            );
            self.timers.election_timeout.arm(peer.address, deadline);
        }
    }

    pub(crate) fn on_election_tick(&self, to: Ipv4Addr) {
        self.unicast(to, &Message::Election);
    }

    /// A challenged peer stayed silent: evict it, and if nobody objected and
    /// no challenge is still pending, bully through to the lead.
    pub(crate) fn on_election_deadline(&mut self, peer: Ipv4Addr) {
        self.timers.election_interval.cancel(peer);
        self.timers.election_timeout.cancel(peer);
        if self.table.remove(peer) {
            tracing::warn!("{} never answered ELECTION, evicting", peer);
            self.publish_nodes();
        }
        if self.election.status == ElectionStatus::Candidate
            && !self.election.received_ok
            && self.timers.election_interval.is_empty()
        {
            self.become_leader();
        }
    }

    /// A lower-priority peer challenged us.
    pub(crate) fn on_election(&mut self, from: Ipv4Addr) {
        let challenger = priority(from, self.identity.netmask);
        if challenger >= self.identity.priority() {
            tracing::warn!(
                "Protocol violation: ELECTION from {} with priority {} >= ours {}, dropping",
                from,
                challenger,
                self.identity.priority()
            );
            return;
        }

        // A message from an unknown peer introduces it.
        if !self.table.contains(from) {
            self.table.upsert(from, BTreeSet::new());
            self.publish_nodes();
        }

        // Election traffic means the cluster is already converging.
        self.timers.pre_election.cancel();
        self.unicast(from, &Message::Ok);

        if !matches!(
            self.election.status,
            ElectionStatus::Candidate | ElectionStatus::Leader
        ) {
            // Take our own shot on the next debounce tick.
            self.reset_pre_election();
        }
    }

    /// A higher-priority peer told us to stand down. Some higher peer will
    /// announce itself as coordinator; if none does within the message
    /// timeout, the round restarts.
    pub(crate) fn on_ok(&mut self, from: Ipv4Addr) {
        if self.election.status != ElectionStatus::Candidate {
            tracing::warn!("OK from {} outside an election round, dropping", from);
            return;
        }
        tracing::debug!("{} objected to our election, awaiting COORDINATOR", from);
        self.election.received_ok = true;
        self.timers.cancel_election();
        let handle = TimerHandle::timeout(
            &self.tx,
            self.config.message_timeout,
            Event::Timer(TimerEvent::CoordinatorWait),
        );
        self.timers.coordinator_wait.arm(handle);
    }

    /// The OK we deferred to was never followed by a COORDINATOR.
    pub(crate) fn on_coordinator_wait(&mut self) {
        if self.election.status == ElectionStatus::Candidate {
            tracing::info!("No COORDINATOR after OK, restarting election");
            self.start_election();
        }
    }

    /// Every challenge went unanswered (or there was nobody to challenge):
    /// this node is now the coordinator.
    pub(crate) fn become_leader(&mut self) {
        self.election.status = ElectionStatus::Leader;
        self.election.received_ok = false;
        self.timers.pre_election.cancel();
        self.timers.coordinator_wait.cancel();
        self.timers.cancel_election();
        tracing::info!(
            "Election won with priority {}, assuming coordinator",
            self.identity.priority()
        );
        self.assign_roles();
    }

    /// The coordinator's assignment: itself as broker, the lowest-priority
    /// member as gateway, everyone else editing. In a single-node cluster the
    /// coordinator is also the lowest-priority member and holds both
    /// singleton roles; with two or more members the minimum is never the
    /// maximum, so broker and gateway stay disjoint.
    fn assign_roles(&mut self) {
        let old_roles = self.table.self_roles();
        let gateway = self
            .table
            .min_priority_member()
            .map(|entry| entry.address)
            .unwrap_or(self.identity.address);

        for entry in self.table.snapshot() {
            let mut roles = BTreeSet::new();
            if entry.address == self.identity.address {
                roles.insert(Role::MessageBroker);
            }
            if entry.address == gateway {
                roles.insert(Role::Gateway);
            }
            if roles.is_empty() {
                roles.insert(Role::Editing);
            }
            self.table.upsert(entry.address, roles);
        }
        self.publish_nodes();

        if self.table.self_roles() != old_roles {
            self.apply_local_roles(self.identity.address);
        }

        for peer in self.table.peers() {
            let interval = TimerHandle::interval(
                &self.tx,
                self.config.message_interval,
                Event::Timer(TimerEvent::CoordinatorTick(peer.address)),
            );
            self.timers.coordinator_interval.arm(peer.address, interval);
            let deadline = TimerHandle::timeout(
                &self.tx,
                self.config.message_timeout,
                Event::Timer(TimerEvent::CoordinatorDeadline(peer.address)),
            );
            self.timers.coordinator_timeout.arm(peer.address, deadline);
        }
    }

    pub(crate) fn on_coordinator_tick(&self, to: Ipv4Addr) {
        self.unicast(to, &Message::Coordinator(self.wire_snapshot()));
    }

    /// The member never acknowledged the assignment: stop re-sending and
    /// evict it.
    pub(crate) fn on_coordinator_deadline(&mut self, peer: Ipv4Addr) {
        self.timers.coordinator_interval.cancel(peer);
        self.timers.coordinator_timeout.cancel(peer);
        if self.table.remove(peer) {
            tracing::warn!("{} never acknowledged COORDINATOR, evicting", peer);
            self.publish_nodes();
        }
    }

    /// A new coordinator announced itself with a full role assignment.
    pub(crate) fn on_coordinator(&mut self, from: Ipv4Addr, nodes: Vec<WireNode>) {
        let announcer = priority(from, self.identity.netmask);
        if announcer <= self.identity.priority() {
            tracing::warn!(
                "INVALID COORDINATOR from {} with priority {} <= ours {}, dropping",
                from,
                announcer,
                self.identity.priority()
            );
            return;
        }

        self.timers.pre_election.cancel();
        self.timers.coordinator_wait.cancel();
        self.timers.cancel_election();
        self.election.status = ElectionStatus::Follower;
        self.election.received_ok = false;

        self.validate_assignment(from, &nodes);

        // Overwrite the role vector to match the announcement. Entries we
        // know about that the coordinator does not carry lose their
        // singleton roles so the local view never shows two brokers.
        let old_roles = self.table.self_roles();
        let announced: BTreeSet<Ipv4Addr> = nodes.iter().map(|node| node.address).collect();
        for entry in self.table.snapshot() {
            if !announced.contains(&entry.address) {
                let mut roles = entry.roles.clone();
                roles.remove(&Role::MessageBroker);
                roles.remove(&Role::Gateway);
                if roles != entry.roles {
                    self.table.upsert(entry.address, roles);
                }
            }
        }
        for node in &nodes {
            let roles: BTreeSet<_> = node.roles.iter().copied().collect();
            self.table.upsert(node.address, roles);
        }
        self.publish_nodes();

        if self.table.self_roles() != old_roles {
            self.apply_local_roles(from);
        }

        self.unicast(from, &Message::AckCoordinator(nodes));
    }

    /// Sanity checks on the announced assignment. Priorities claimed by the
    /// sender are never trusted; both checks recompute them locally. A
    /// mismatch is logged but the assignment is still applied.
    fn validate_assignment(&self, from: Ipv4Addr, nodes: &[WireNode]) {
        let broker = nodes
            .iter()
            .find(|node| node.roles.contains(&Role::MessageBroker));
        match broker {
            Some(node) if node.address == from => {}
            Some(node) => tracing::warn!(
                "COORDINATOR from {} names {} as broker instead of itself",
                from,
                node.address
            ),
            None => tracing::warn!("COORDINATOR from {} names no broker", from),
        }

        let min = nodes
            .iter()
            .map(|node| priority(node.address, self.identity.netmask))
            .min();
        if let Some(gateway) = nodes.iter().find(|node| node.roles.contains(&Role::Gateway)) {
            let gateway_priority = priority(gateway.address, self.identity.netmask);
            if Some(gateway_priority) != min {
                tracing::warn!(
                    "COORDINATOR from {} assigned GATEWAY to {} which is not the minimum priority",
                    from,
                    gateway.address
                );
            }
        } else {
            tracing::warn!("COORDINATOR from {} names no gateway", from);
        }
    }

    /// A member confirmed the assignment we sent it.
    pub(crate) fn on_ack_coordinator(&mut self, from: Ipv4Addr, _nodes: &[WireNode]) {
        let had_interval = self.timers.coordinator_interval.cancel(from);
        let had_deadline = self.timers.coordinator_timeout.cancel(from);
        if !had_interval && !had_deadline {
            tracing::warn!(
                "ACK COORDINATOR from {} for an announcement we never sent, dropping",
                from
            );
            return;
        }
        tracing::debug!("{} acknowledged the role assignment", from);
    }
}

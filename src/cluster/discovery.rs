//! Discovery protocol handlers: the JOIN broadcast loop and the
//! HELLO / ACK HELLO unicast retry transactions.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use super::events::{Event, TimerEvent};
use super::service::ClusterService;
use crate::protocol::message::{Message, WireNode};
use crate::timers::registry::TimerHandle;

impl ClusterService {
    /// Broadcast JOIN every message interval until the first HELLO arrives.
    pub(crate) fn start_join_loop(&mut self) {
        if self.join_quiesced {
            return;
        }
        tracing::info!("Broadcasting JOIN until a peer answers");
        let handle = TimerHandle::interval(
            &self.tx,
            self.config.message_interval,
            Event::Timer(TimerEvent::JoinTick),
        );
        self.timers.join_interval.arm(handle);
    }

    pub(crate) fn on_join_tick(&self) {
        self.broadcast(&Message::Join);
    }

    /// Once any HELLO has been heard the JOIN loop never restarts.
    fn stop_join_loop(&mut self) {
        if self.timers.join_interval.cancel() {
            tracing::debug!("First HELLO received, JOIN broadcast stopped");
        }
        self.join_quiesced = true;
    }

    /// A peer announced itself. Open a HELLO retry transaction towards it
    /// unless one is already in flight.
    pub(crate) fn on_join(&mut self, from: Ipv4Addr) {
        if self.timers.hello_interval.contains(from) {
            tracing::debug!("Duplicate JOIN from {} mid-greeting, ignored", from);
            return;
        }

        let outcome = self.table.upsert(from, BTreeSet::new());
        if outcome.added || outcome.roles_changed {
            self.publish_nodes();
        }
        if outcome.added {
            self.reset_pre_election();
        }

        let interval = TimerHandle::interval(
            &self.tx,
            self.config.message_interval,
            Event::Timer(TimerEvent::HelloTick(from)),
        );
        self.timers.hello_interval.arm(from, interval);
        let deadline = TimerHandle::timeout(
            &self.tx,
            self.config.message_timeout,
            Event::Timer(TimerEvent::HelloDeadline(from)),
        );
        self.timers.hello_timeout.arm(from, deadline);
    }

    pub(crate) fn on_hello_tick(&self, to: Ipv4Addr) {
        self.unicast(to, &Message::Hello(self.wire_snapshot_excluding(to)));
    }

    /// The peer never acknowledged our HELLO: close the transaction and
    /// evict it.
    pub(crate) fn on_hello_deadline(&mut self, peer: Ipv4Addr) {
        self.timers.hello_interval.cancel(peer);
        self.timers.hello_timeout.cancel(peer);
        if self.table.remove(peer) {
            tracing::warn!("{} never acknowledged HELLO, evicting", peer);
            self.publish_nodes();
        }
    }

    /// A peer greeted us in response to our JOIN broadcast.
    pub(crate) fn on_hello(&mut self, from: Ipv4Addr, nodes: &[WireNode]) {
        self.stop_join_loop();
        self.merge_node_list(nodes);
        self.unicast(from, &Message::AckHello(self.wire_snapshot_excluding(from)));
        // The peer has clearly heard us; any greeting we had in flight
        // towards it is settled.
        self.timers.hello_interval.cancel(from);
        self.timers.hello_timeout.cancel(from);
    }

    /// The peer closed the HELLO transaction we opened towards it.
    pub(crate) fn on_ack_hello(&mut self, from: Ipv4Addr, nodes: &[WireNode]) {
        let had_interval = self.timers.hello_interval.cancel(from);
        let had_deadline = self.timers.hello_timeout.cancel(from);
        if !had_interval && !had_deadline {
            tracing::warn!("ACK HELLO from {} for a greeting we never sent, dropping", from);
            return;
        }
        self.merge_node_list(nodes);
        self.stop_join_loop();
    }

    /// Folds a received node list into the table. The self entry is skipped,
    /// priorities are recomputed locally, and any newly learned peer re-arms
    /// the pre-election debounce.
    pub(crate) fn merge_node_list(&mut self, nodes: &[WireNode]) {
        let mut added = false;
        let mut changed = false;
        for node in nodes {
            if node.address == self.identity.address {
                continue;
            }
            let roles: BTreeSet<_> = node.roles.iter().copied().collect();
            let outcome = self.table.upsert(node.address, roles);
            added |= outcome.added;
            changed |= outcome.roles_changed;
        }
        if added || changed {
            self.publish_nodes();
        }
        if added {
            self.reset_pre_election();
        }
    }

    /// Re-arms the debounce that separates a membership change from the
    /// election it triggers. Every add resets it so concurrent JOINs settle
    /// before anyone starts bullying.
    pub(crate) fn reset_pre_election(&mut self) {
        let handle = TimerHandle::timeout(
            &self.tx,
            self.config.preelection_timeout,
            Event::Timer(TimerEvent::PreElection),
        );
        self.timers.pre_election.arm(handle);
    }
}

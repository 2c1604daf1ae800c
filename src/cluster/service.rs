use anyhow::{Context, Result};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use super::election::ElectionState;
use super::events::{Event, EventBus, NodesSnapshot, RolesUpdate, TimerEvent};
use super::transport::{Transport, UdpTransport};
use crate::config::Config;
use crate::membership::table::MembershipTable;
use crate::membership::types::{NodeIdentity, Role};
use crate::protocol::message::{Message, WireNode};
use crate::roles::controller::RoleControllerHandle;
use crate::timers::registry::Timers;

/// The one object that owns the UDP socket, the membership table, and every
/// timer registry. All protocol state changes happen inside its dispatch
/// loop, one event at a time.
pub struct ClusterService {
    pub(crate) config: Config,
    pub(crate) identity: NodeIdentity,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) table: MembershipTable,
    pub(crate) timers: Timers,
    pub(crate) election: ElectionState,
    pub(crate) join_quiesced: bool,
    pub(crate) bus: EventBus,
    pub(crate) controller: RoleControllerHandle,
    pub(crate) tx: UnboundedSender<Event>,
    rx: UnboundedReceiver<Event>,
    recv_task: Option<JoinHandle<()>>,
}

/// Cheap handle for signalling the running service from outside.
#[derive(Clone)]
pub struct ClusterHandle {
    tx: UnboundedSender<Event>,
}

impl ClusterHandle {
    pub fn shutdown(&self) {
        let _ = self.tx.send(Event::Shutdown);
    }
}

impl ClusterService {
    /// Builds a service around an arbitrary transport. Used directly by
    /// tests; production goes through [`ClusterService::bind`].
    pub fn new(
        config: Config,
        identity: NodeIdentity,
        transport: Arc<dyn Transport>,
        controller: RoleControllerHandle,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            table: MembershipTable::new(identity),
            timers: Timers::default(),
            election: ElectionState::default(),
            join_quiesced: false,
            bus: EventBus::new(),
            config,
            identity,
            transport,
            controller,
            tx,
            rx,
            recv_task: None,
        }
    }

    /// Binds the discovery socket and wires the receive loop. A bind failure
    /// here is fatal for the process.
    pub async fn bind(config: Config, controller: RoleControllerHandle) -> Result<Self> {
        let identity = resolve_identity(&config)?;
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, config.discovery_port))
            .await
            .with_context(|| {
                format!("failed to bind discovery port {}", config.discovery_port)
            })?;
        socket
            .set_broadcast(true)
            .context("failed to enable broadcast on the discovery socket")?;
        let socket = Arc::new(socket);

        tracing::info!(
            "Discovery bound on port {} as {} (priority {}, broadcast {})",
            config.discovery_port,
            identity.address,
            identity.priority(),
            identity.broadcast_address()
        );

        let transport = Arc::new(UdpTransport::new(socket.clone()));
        let mut service = Self::new(config, identity, transport, controller);
        service.recv_task = Some(service.spawn_recv_loop(socket));
        Ok(service)
    }

    fn spawn_recv_loop(&self, socket: Arc<UdpSocket>) -> JoinHandle<()> {
        let tx = self.tx.clone();
        let self_address = self.identity.address;
        tokio::spawn(async move {
            let mut buf = vec![0u8; 8192];
            loop {
                match socket.recv_from(&mut buf).await {
                    Ok((len, source)) => {
                        // Our own broadcasts come back to us.
                        if source.ip() == IpAddr::V4(self_address) {
                            continue;
                        }
                        let event = Event::Datagram {
                            source,
                            payload: buf[..len].to_vec(),
                        };
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("Failed to receive UDP packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        })
    }

    pub fn handle(&self) -> ClusterHandle {
        ClusterHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn subscribe_nodes(&self) -> broadcast::Receiver<NodesSnapshot> {
        self.bus.subscribe_nodes()
    }

    pub fn subscribe_roles(&self) -> broadcast::Receiver<RolesUpdate> {
        self.bus.subscribe_roles()
    }

    /// Runs the dispatch loop until shutdown.
    pub async fn run(mut self) {
        self.start_join_loop();
        while let Some(event) = self.rx.recv().await {
            if matches!(event, Event::Shutdown) {
                break;
            }
            self.handle_event(event);
        }
        self.shutdown();
    }

    pub(crate) fn handle_event(&mut self, event: Event) {
        match event {
            Event::Datagram { source, payload } => self.on_datagram(source, &payload),
            Event::Timer(timer) => self.on_timer(timer),
            Event::Shutdown => {}
        }
    }

    fn on_datagram(&mut self, source: SocketAddr, payload: &[u8]) {
        let IpAddr::V4(from) = source.ip() else {
            tracing::warn!("Dropping non-IPv4 datagram from {}", source);
            return;
        };
        if from == self.identity.address {
            return;
        }
        let message = match Message::parse(payload) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!("Dropping malformed datagram from {}: {}", from, e);
                return;
            }
        };
        tracing::debug!("{} from {}", message.kind(), from);
        match message {
            Message::Join => self.on_join(from),
            Message::Hello(nodes) => self.on_hello(from, &nodes),
            Message::AckHello(nodes) => self.on_ack_hello(from, &nodes),
            Message::Election => self.on_election(from),
            Message::Ok => self.on_ok(from),
            Message::Coordinator(nodes) => self.on_coordinator(from, nodes),
            Message::AckCoordinator(nodes) => self.on_ack_coordinator(from, &nodes),
            Message::Assign => {
                tracing::warn!("ASSIGN from {} has no handler, dropping", from);
            }
        }
    }

    fn on_timer(&mut self, timer: TimerEvent) {
        match timer {
            TimerEvent::JoinTick => self.on_join_tick(),
            TimerEvent::PreElection => self.start_election(),
            TimerEvent::HelloTick(peer) => self.on_hello_tick(peer),
            TimerEvent::HelloDeadline(peer) => self.on_hello_deadline(peer),
            TimerEvent::ElectionTick(peer) => self.on_election_tick(peer),
            TimerEvent::ElectionDeadline(peer) => self.on_election_deadline(peer),
            TimerEvent::CoordinatorTick(peer) => self.on_coordinator_tick(peer),
            TimerEvent::CoordinatorDeadline(peer) => self.on_coordinator_deadline(peer),
            TimerEvent::CoordinatorWait => self.on_coordinator_wait(),
        }
    }

    fn shutdown(&mut self) {
        tracing::info!("Cluster service shutting down");
        self.timers.cancel_all();
        if let Some(task) = self.recv_task.take() {
            task.abort();
        }
        self.controller.shutdown();
    }

    pub(crate) fn unicast(&self, to: Ipv4Addr, message: &Message) {
        let target = SocketAddr::new(IpAddr::V4(to), self.config.discovery_port);
        self.transport.send(target, message);
    }

    pub(crate) fn broadcast(&self, message: &Message) {
        let target = SocketAddr::new(
            IpAddr::V4(self.identity.broadcast_address()),
            self.config.discovery_port,
        );
        self.transport.send(target, message);
    }

    /// The full current node list in wire form. COORDINATOR payloads use
    /// this: the receiver must find itself in the list to learn its role.
    pub(crate) fn wire_snapshot(&self) -> Vec<WireNode> {
        self.table
            .snapshot()
            .into_iter()
            .map(|entry| WireNode {
                address: entry.address,
                roles: entry.roles.into_iter().collect(),
            })
            .collect()
    }

    /// The node list as carried by greetings: everything except the
    /// destination, which knows itself.
    pub(crate) fn wire_snapshot_excluding(&self, target: Ipv4Addr) -> Vec<WireNode> {
        self.table
            .snapshot()
            .into_iter()
            .filter(|entry| entry.address != target)
            .map(|entry| WireNode {
                address: entry.address,
                roles: entry.roles.into_iter().collect(),
            })
            .collect()
    }

    pub(crate) fn publish_nodes(&self) {
        self.bus.publish_nodes(self.table.snapshot());
    }

    /// Emits the `roles` event and points the role controller at the new
    /// assignment. Called only when the local role set actually changed.
    pub(crate) fn apply_local_roles(&mut self, source: Ipv4Addr) {
        let roles = self.table.self_roles();
        let broker = self
            .table
            .find_by_role(Role::MessageBroker)
            .map(|entry| entry.address);
        let gateway = self
            .table
            .find_by_role(Role::Gateway)
            .map(|entry| entry.address);
        tracing::info!(
            "Local roles now {:?} (announced by {})",
            roles,
            source
        );
        let update = RolesUpdate {
            roles,
            source,
            broker,
            gateway,
        };
        self.bus.publish_roles(update.clone());
        self.controller.apply(update);
    }

    /// Drains and handles everything currently queued, in rounds, so timers
    /// armed by one handler get to deliver into the same pump. Test helper:
    /// lets a paused-clock test step the dispatch loop deterministically.
    #[cfg(test)]
    pub(crate) async fn pump(&mut self) {
        for _ in 0..8 {
            for _ in 0..8 {
                tokio::task::yield_now().await;
            }
            while let Ok(event) = self.rx.try_recv() {
                self.handle_event(event);
            }
        }
    }
}

/// Picks the node's discovery address: the configured override if present,
/// otherwise the first routable local IPv4.
fn resolve_identity(config: &Config) -> Result<NodeIdentity> {
    let address = match config.address {
        Some(address) => address,
        None => match local_ip_address::local_ip()
            .context("failed to autodetect a local IPv4 address")?
        {
            IpAddr::V4(address) => address,
            IpAddr::V6(address) => {
                anyhow::bail!("local interface resolved to IPv6 {}, set DISCOVERY_ADDRESS", address)
            }
        },
    };
    Ok(NodeIdentity::new(address, config.netmask))
}

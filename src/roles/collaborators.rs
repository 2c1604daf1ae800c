use anyhow::Result;
use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// The message broker server. Bound on the local socket-IO port while this
/// node holds MESSAGE_BROKER.
#[async_trait]
pub trait BrokerServer: Send + Sync {
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
}

/// A client connection into whichever node currently runs the broker.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn start(&self, broker: Ipv4Addr) -> Result<()>;
    async fn stop(&self) -> Result<()>;
}

/// The HTTP gateway. Needed only while this node holds GATEWAY.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
}

/// The document-editing fabric. The store and the messaging client are wired
/// in at construction; the gateway address is whatever the latest assignment
/// says.
#[async_trait]
pub trait EditingServer: Send + Sync {
    async fn start(&self, gateway: Option<Ipv4Addr>) -> Result<()>;
    async fn stop(&self) -> Result<()>;
}

/// Everything the role controller can start and stop.
pub struct Collaborators {
    pub broker_server: Arc<dyn BrokerServer>,
    pub broker_client: Arc<dyn BrokerClient>,
    pub gateway: Arc<dyn Gateway>,
    pub editing: Arc<dyn EditingServer>,
}

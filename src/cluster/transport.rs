use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;

use crate::protocol::message::Message;

/// Outbound datagram sink. Sends are fire-and-forget: a failed send is
/// logged and dropped, and the owning retry interval tries again.
pub trait Transport: Send + Sync {
    fn send(&self, target: SocketAddr, message: &Message);
}

/// The real thing: the one broadcast-enabled UDP socket the node owns.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    pub fn new(socket: Arc<UdpSocket>) -> Self {
        Self { socket }
    }
}

impl Transport for UdpTransport {
    fn send(&self, target: SocketAddr, message: &Message) {
        let encoded = match message.encode() {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::error!("Failed to encode {} for {}: {}", message.kind(), target, e);
                return;
            }
        };
        if let Err(e) = self.socket.try_send_to(encoded.as_bytes(), target) {
            tracing::warn!("Failed to send {} to {}: {}", message.kind(), target, e);
        }
    }
}

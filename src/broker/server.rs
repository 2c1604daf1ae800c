use anyhow::{Context, Result};
use async_trait::async_trait;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

use crate::roles::collaborators::BrokerServer;

struct ServerRuntime {
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
    local_addr: SocketAddr,
}

/// The broker hub. Each accepted connection subscribes to the fan-out
/// channel; lines it sends are re-published to everyone else.
pub struct MessageBrokerServer {
    port: u16,
    runtime: Mutex<Option<ServerRuntime>>,
}

impl MessageBrokerServer {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            runtime: Mutex::new(None),
        }
    }

    /// The address the server actually bound. Useful when constructed with
    /// port 0.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.runtime.lock().await.as_ref().map(|r| r.local_addr)
    }

    async fn serve(
        listener: TcpListener,
        hub: broadcast::Sender<(u64, String)>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut next_conn = 0u64;
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            next_conn += 1;
                            tracing::debug!("Broker connection {} from {}", next_conn, peer);
                            tokio::spawn(Self::serve_connection(
                                stream,
                                next_conn,
                                hub.clone(),
                                shutdown.clone(),
                            ));
                        }
                        Err(e) => {
                            tracing::warn!("Broker accept failed: {}", e);
                        }
                    }
                }
            }
        }
    }

    async fn serve_connection(
        stream: TcpStream,
        conn_id: u64,
        hub: broadcast::Sender<(u64, String)>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        let mut fanout = hub.subscribe();
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            let _ = hub.send((conn_id, line));
                        }
                        Ok(None) => break,
                        Err(e) => {
                            tracing::debug!("Broker connection {} read failed: {}", conn_id, e);
                            break;
                        }
                    }
                }
                published = fanout.recv() => {
                    match published {
                        Ok((origin, line)) if origin != conn_id => {
                            if write_half.write_all(format!("{}\n", line).as_bytes()).await.is_err() {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(
                                "Broker connection {} lagged, {} line(s) dropped",
                                conn_id,
                                skipped
                            );
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
        tracing::debug!("Broker connection {} closed", conn_id);
    }
}

#[async_trait]
impl BrokerServer for MessageBrokerServer {
    async fn start(&self) -> Result<()> {
        let mut runtime = self.runtime.lock().await;
        if runtime.is_some() {
            tracing::debug!("Broker server already running");
            return Ok(());
        }
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, self.port))
            .await
            .with_context(|| format!("failed to bind broker port {}", self.port))?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Broker server listening on {}", local_addr);
        let (hub, _) = broadcast::channel(256);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let accept_task = tokio::spawn(Self::serve(listener, hub, shutdown_rx));
        *runtime = Some(ServerRuntime {
            shutdown,
            accept_task,
            local_addr,
        });
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let Some(runtime) = self.runtime.lock().await.take() else {
            return Ok(());
        };
        let _ = runtime.shutdown.send(true);
        let _ = runtime.accept_task.await;
        tracing::info!("Broker server stopped");
        Ok(())
    }
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::net::Ipv4Addr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use crate::roles::collaborators::BrokerClient;

struct ClientRuntime {
    shutdown: watch::Sender<bool>,
    io_task: JoinHandle<()>,
    outgoing: mpsc::UnboundedSender<String>,
}

/// Client side of the broker fabric. Publishes lines towards the broker and
/// fans received lines out to local subscribers.
pub struct MessageBrokerClient {
    port: u16,
    incoming: broadcast::Sender<String>,
    runtime: Mutex<Option<ClientRuntime>>,
}

impl MessageBrokerClient {
    pub fn new(port: u16) -> Self {
        let (incoming, _) = broadcast::channel(256);
        Self {
            port,
            incoming,
            runtime: Mutex::new(None),
        }
    }

    /// Lines published by other nodes, in arrival order.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.incoming.subscribe()
    }

    /// Queues a line towards the broker. Dropped with a warning when no
    /// connection is up.
    pub async fn publish(&self, line: String) {
        let runtime = self.runtime.lock().await;
        match runtime.as_ref() {
            Some(runtime) => {
                let _ = runtime.outgoing.send(line);
            }
            None => tracing::warn!("Broker client not connected, dropping publish"),
        }
    }

    async fn run_io(
        stream: TcpStream,
        incoming: broadcast::Sender<String>,
        mut outgoing: mpsc::UnboundedReceiver<String>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            let _ = incoming.send(line);
                        }
                        Ok(None) => {
                            tracing::warn!("Broker connection closed by server");
                            break;
                        }
                        Err(e) => {
                            tracing::warn!("Broker connection read failed: {}", e);
                            break;
                        }
                    }
                }
                queued = outgoing.recv() => {
                    let Some(line) = queued else { break };
                    if let Err(e) = write_half.write_all(format!("{}\n", line).as_bytes()).await {
                        tracing::warn!("Broker publish failed: {}", e);
                        break;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl BrokerClient for MessageBrokerClient {
    async fn start(&self, broker: Ipv4Addr) -> Result<()> {
        let mut runtime = self.runtime.lock().await;
        if runtime.is_some() {
            tracing::debug!("Broker client already connected, restart requires stop first");
            return Ok(());
        }
        let stream = TcpStream::connect((broker, self.port))
            .await
            .with_context(|| format!("failed to connect to broker {}:{}", broker, self.port))?;
        tracing::info!("Connected to broker at {}:{}", broker, self.port);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let io_task = tokio::spawn(Self::run_io(
            stream,
            self.incoming.clone(),
            outgoing_rx,
            shutdown_rx,
        ));
        *runtime = Some(ClientRuntime {
            shutdown,
            io_task,
            outgoing,
        });
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let Some(runtime) = self.runtime.lock().await.take() else {
            return Ok(());
        };
        let _ = runtime.shutdown.send(true);
        let _ = runtime.io_task.await;
        tracing::info!("Broker client disconnected");
        Ok(())
    }
}

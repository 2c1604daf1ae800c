use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::broker::client::MessageBrokerClient;
use crate::roles::collaborators::EditingServer;
use crate::storage::store::DocumentStore;

/// A document content change travelling over the broker fabric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUpdate {
    pub document_id: String,
    pub content: String,
}

struct EditingRuntime {
    shutdown: watch::Sender<bool>,
    apply_task: JoinHandle<()>,
}

/// The editing fabric endpoint: consumes remote updates, publishes local
/// ones.
pub struct EditingService {
    storage: Arc<DocumentStore>,
    client: Arc<MessageBrokerClient>,
    runtime: Mutex<Option<EditingRuntime>>,
}

impl EditingService {
    pub fn new(storage: Arc<DocumentStore>, client: Arc<MessageBrokerClient>) -> Self {
        Self {
            storage,
            client,
            runtime: Mutex::new(None),
        }
    }

    /// Publishes a local edit to every other editing node.
    pub async fn publish_update(&self, update: &DocumentUpdate) -> Result<()> {
        let line = serde_json::to_string(update)?;
        self.client.publish(line).await;
        Ok(())
    }

    async fn apply_loop(
        storage: Arc<DocumentStore>,
        client: Arc<MessageBrokerClient>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut updates = client.subscribe();
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                line = updates.recv() => {
                    let Ok(line) = line else { break };
                    match serde_json::from_str::<DocumentUpdate>(&line) {
                        Ok(update) => {
                            match storage.update_content(&update.document_id, &update.content) {
                                Ok(Some(_)) => {
                                    tracing::debug!("Applied update to document {}", update.document_id);
                                }
                                Ok(None) => {
                                    tracing::warn!(
                                        "Update for unknown document {}, skipped",
                                        update.document_id
                                    );
                                }
                                Err(e) => {
                                    tracing::error!("Failed to apply document update: {}", e);
                                }
                            }
                        }
                        Err(e) => {
                            tracing::warn!("Dropping malformed update line: {}", e);
                        }
                    }
                }
            }
        }
    }
}

#[async_trait]
impl EditingServer for EditingService {
    async fn start(&self, gateway: Option<Ipv4Addr>) -> Result<()> {
        let mut runtime = self.runtime.lock().await;
        if runtime.is_some() {
            tracing::debug!("Editing server already running");
            return Ok(());
        }
        tracing::info!(
            "Editing fabric started (gateway: {})",
            gateway
                .map(|addr| addr.to_string())
                .unwrap_or_else(|| "unassigned".to_string())
        );
        let (shutdown, shutdown_rx) = watch::channel(false);
        let apply_task = tokio::spawn(Self::apply_loop(
            self.storage.clone(),
            self.client.clone(),
            shutdown_rx,
        ));
        *runtime = Some(EditingRuntime {
            shutdown,
            apply_task,
        });
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let Some(runtime) = self.runtime.lock().await.take() else {
            return Ok(());
        };
        let _ = runtime.shutdown.send(true);
        let _ = runtime.apply_task.await;
        tracing::info!("Editing fabric stopped");
        Ok(())
    }
}

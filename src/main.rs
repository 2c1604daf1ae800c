use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use collab_cluster::broker::client::MessageBrokerClient;
use collab_cluster::broker::server::MessageBrokerServer;
use collab_cluster::cluster::service::ClusterService;
use collab_cluster::config::Config;
use collab_cluster::editing::server::EditingService;
use collab_cluster::gateway::server::GatewayServer;
use collab_cluster::roles::collaborators::Collaborators;
use collab_cluster::roles::controller::RoleController;
use collab_cluster::storage::store::DocumentStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = Config::from_env();
    tracing::info!("Starting collaborative document cluster node");

    // Shared document state, loaded before anything can touch it.
    let storage = Arc::new(DocumentStore::new(config.storage_path.clone()));
    storage.start()?;

    // The membership view the gateway serves. Updated from cluster events.
    let view = Arc::new(RwLock::new(Vec::new()));

    let broker_client = Arc::new(MessageBrokerClient::new(config.broker_port));
    let collaborators = Collaborators {
        broker_server: Arc::new(MessageBrokerServer::new(config.broker_port)),
        broker_client: broker_client.clone(),
        gateway: Arc::new(GatewayServer::new(
            config.gateway_port,
            storage.clone(),
            view.clone(),
        )),
        editing: Arc::new(EditingService::new(storage.clone(), broker_client.clone())),
    };
    let controller = RoleController::spawn(collaborators);

    // A failed bind is fatal and exits non-zero.
    let service = ClusterService::bind(config, controller).await?;
    let handle = service.handle();

    let mut view_updates = service.subscribe_nodes();
    let view_writer = view.clone();
    tokio::spawn(async move {
        loop {
            match view_updates.recv().await {
                Ok(snapshot) => *view_writer.write().await = snapshot,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Cluster view fell behind, {} update(s) dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Periodic cluster stats, mirroring every node's local view.
    let stats_view = view.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(5));
        loop {
            interval.tick().await;
            let snapshot = stats_view.read().await.clone();
            tracing::info!("Cluster view: {} node(s)", snapshot.len());
            for entry in snapshot {
                tracing::info!(
                    "  - {} priority={} roles={:?}",
                    entry.address,
                    entry.priority,
                    entry.roles
                );
            }
        }
    });

    let runner = tokio::spawn(service.run());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    handle.shutdown();
    let _ = runner.await;

    Ok(())
}

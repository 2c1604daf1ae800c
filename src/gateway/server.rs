use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::cluster::events::NodesSnapshot;
use crate::roles::collaborators::Gateway;
use crate::storage::store::{Document, DocumentStore};

#[derive(Clone)]
pub(crate) struct GatewayState {
    pub(crate) storage: Arc<DocumentStore>,
    pub(crate) view: Arc<RwLock<NodesSnapshot>>,
}

struct GatewayRuntime {
    shutdown: oneshot::Sender<()>,
    serve_task: JoinHandle<()>,
}

/// The HTTP server fronting the cluster while this node is the gateway.
pub struct GatewayServer {
    port: u16,
    state: GatewayState,
    runtime: Mutex<Option<GatewayRuntime>>,
}

impl GatewayServer {
    pub fn new(
        port: u16,
        storage: Arc<DocumentStore>,
        view: Arc<RwLock<NodesSnapshot>>,
    ) -> Self {
        Self {
            port,
            state: GatewayState { storage, view },
            runtime: Mutex::new(None),
        }
    }

    pub(crate) fn router(state: GatewayState) -> Router {
        Router::new()
            .route("/health", get(handle_health))
            .route("/cluster", get(handle_cluster))
            .route("/documents", get(handle_list_documents).post(handle_create_document))
            .route("/documents/:id", get(handle_get_document))
            .with_state(state)
    }
}

#[async_trait]
impl Gateway for GatewayServer {
    async fn start(&self) -> Result<()> {
        let mut runtime = self.runtime.lock().await;
        if runtime.is_some() {
            tracing::debug!("Gateway already running");
            return Ok(());
        }
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, self.port))
            .await
            .with_context(|| format!("failed to bind gateway port {}", self.port))?;
        tracing::info!("Gateway listening on {}", listener.local_addr()?);
        let app = Self::router(self.state.clone());
        let (shutdown, shutdown_rx) = oneshot::channel();
        let serve_task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                tracing::error!("Gateway server failed: {}", e);
            }
        });
        *runtime = Some(GatewayRuntime {
            shutdown,
            serve_task,
        });
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let Some(runtime) = self.runtime.lock().await.take() else {
            return Ok(());
        };
        let _ = runtime.shutdown.send(());
        let _ = runtime.serve_task.await;
        tracing::info!("Gateway stopped");
        Ok(())
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
struct CreateDocumentRequest {
    name: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn handle_cluster(State(state): State<GatewayState>) -> Json<NodesSnapshot> {
    Json(state.view.read().await.clone())
}

async fn handle_list_documents(State(state): State<GatewayState>) -> Json<Vec<Document>> {
    Json(state.storage.documents())
}

async fn handle_get_document(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, StatusCode> {
    state
        .storage
        .document(&id)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn handle_create_document(
    State(state): State<GatewayState>,
    Json(request): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<Document>), StatusCode> {
    match state.storage.create_document(&request.name) {
        Ok(document) => Ok((StatusCode::CREATED, Json(document))),
        Err(e) => {
            tracing::error!("Failed to create document: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

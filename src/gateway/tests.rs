//! Gateway Tests
//!
//! Drives the router in-process with `tower::ServiceExt::oneshot`, no
//! listener involved. Covers the document round-trip, the 404 path, and the
//! membership view the gateway serves.

#[cfg(test)]
mod tests {
    use crate::gateway::server::{GatewayServer, GatewayState};
    use crate::membership::types::{NodeEntry, Role};
    use crate::storage::store::{Document, DocumentStore};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::collections::BTreeSet;
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use tokio::sync::RwLock;
    use tower::ServiceExt;

    fn state() -> GatewayState {
        GatewayState {
            storage: Arc::new(DocumentStore::new(None)),
            view: Arc::new(RwLock::new(Vec::new())),
        }
    }

    fn router(state: &GatewayState) -> Router {
        GatewayServer::router(state.clone())
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    async fn post(router: Router, uri: &str, body: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    // ============================================================
    // HEALTH AND CLUSTER VIEW
    // ============================================================

    #[tokio::test]
    async fn test_health_reports_ok() {
        let state = state();
        let (status, body) = get(router(&state), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_cluster_serves_the_membership_view() {
        let state = state();
        {
            let mut view = state.view.write().await;
            view.push(NodeEntry {
                address: Ipv4Addr::new(10, 0, 0, 3),
                priority: 3,
                roles: [Role::MessageBroker].into_iter().collect(),
            });
            view.push(NodeEntry {
                address: Ipv4Addr::new(10, 0, 0, 1),
                priority: 1,
                roles: BTreeSet::new(),
            });
        }

        let (status, body) = get(router(&state), "/cluster").await;
        assert_eq!(status, StatusCode::OK);
        let nodes = body.as_array().unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0]["address"], "10.0.0.3");
        assert_eq!(nodes[0]["priority"], 3);
        assert_eq!(nodes[0]["roles"][0], "MESSAGE_BROKER");
        assert_eq!(nodes[1]["roles"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_cluster_starts_empty() {
        let state = state();
        let (status, body) = get(router(&state), "/cluster").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 0);
    }

    // ============================================================
    // DOCUMENT ROUTES
    // ============================================================

    #[tokio::test]
    async fn test_create_then_list_round_trip() {
        let state = state();

        let (status, created) =
            post(router(&state), "/documents", r#"{"name":"notes"}"#).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["id"], "1");
        assert_eq!(created["name"], "notes");
        assert_eq!(created["content"], "");

        let (status, listed) = get(router(&state), "/documents").await;
        assert_eq!(status, StatusCode::OK);
        let documents = listed.as_array().unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0]["id"], "1");
        assert_eq!(documents[0]["name"], "notes");
    }

    #[tokio::test]
    async fn test_get_document_by_id() {
        let state = state();
        let created = state.storage.create_document("minutes").unwrap();

        let (status, body) = get(router(&state), &format!("/documents/{}", created.id)).await;
        assert_eq!(status, StatusCode::OK);
        let document: Document = serde_json::from_value(body).unwrap();
        assert_eq!(document, created);
    }

    #[tokio::test]
    async fn test_unknown_document_is_a_404() {
        let state = state();
        state.storage.create_document("notes").unwrap();

        let (status, _) = get(router(&state), "/documents/999").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_without_a_name_is_rejected() {
        let state = state();
        let (status, _) = post(router(&state), "/documents", r#"{}"#).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(state.storage.documents().is_empty());
    }

    #[tokio::test]
    async fn test_ids_stay_monotonic_across_requests() {
        let state = state();
        let (_, first) = post(router(&state), "/documents", r#"{"name":"a"}"#).await;
        let (_, second) = post(router(&state), "/documents", r#"{"name":"b"}"#).await;
        assert_eq!(first["id"], "1");
        assert_eq!(second["id"], "2");
    }
}

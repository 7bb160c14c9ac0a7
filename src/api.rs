use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use tokio::net::ToSocketAddrs;
use tokio::sync::watch;

use crate::capture::TargetTable;
use crate::trigger::{self, Trigger};

mod models;

pub use models::{PodsPayload, TargetsResponse};

/// Shared state of the control API handlers.
#[derive(Debug, Clone)]
pub struct ApiState {
    triggers: Arc<watch::Sender<Option<Trigger>>>,
    targets: Arc<TargetTable>,
    cluster_mode: bool,
}

impl ApiState {
    pub fn new(
        triggers: watch::Sender<Option<Trigger>>,
        targets: Arc<TargetTable>,
        cluster_mode: bool,
    ) -> Self {
        Self {
            triggers: Arc::new(triggers),
            targets,
            cluster_mode,
        }
    }
}

/// Accepts a full pod snapshot from the Kubernetes watch collaborator.
async fn put_pods(State(state): State<ApiState>, Json(payload): Json<PodsPayload>) -> Response {
    if !state.cluster_mode {
        return (
            StatusCode::CONFLICT,
            "pod snapshots are not accepted in host mode",
        )
            .into_response();
    }

    let pods = payload.into_pods();
    log::debug!("Received snapshot of {} pods", pods.len());
    trigger::publish(&state.triggers, Trigger::Pods(Arc::new(pods)));
    StatusCode::ACCEPTED.into_response()
}

async fn post_refresh(State(state): State<ApiState>) -> Response {
    log::debug!("Received refresh request");
    trigger::publish(&state.triggers, Trigger::Refresh);
    StatusCode::ACCEPTED.into_response()
}

async fn get_targets(State(state): State<ApiState>) -> Response {
    let body = TargetsResponse {
        targets: state.targets.snapshot(),
    };
    (StatusCode::OK, Json(body)).into_response()
}

async fn healthz() -> &'static str {
    "ok"
}

pub struct APIServer {
    router: axum::Router,
}

impl APIServer {
    pub fn new(state: ApiState) -> Self {
        let router = axum::Router::new()
            .route("/pods", put(put_pods))
            .route("/refresh", post(post_refresh))
            .route("/targets", get(get_targets))
            .route("/healthz", get(healthz))
            .with_state(state);
        Self { router }
    }

    /// Serves the control API until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if binding to `addr` or serving fails.
    pub async fn listen(self, addr: impl ToSocketAddrs) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        log::info!("Control API listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router.into_make_service()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn server(cluster_mode: bool) -> (APIServer, watch::Receiver<Option<Trigger>>) {
        let (tx, rx) = watch::channel(None);
        let targets = Arc::new(TargetTable::new("/definitely/does/not/exist"));
        (APIServer::new(ApiState::new(tx, targets, cluster_mode)), rx)
    }

    fn put_pods_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("PUT")
            .uri("/pods")
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_put_pods_queues_snapshot() {
        let (server, rx) = server(true);
        let body = r#"[{"metadata": {"name": "web-0"}, "status": {"containerStatuses": [{"name": "web", "containerID": "containerd://abc"}]}}]"#;

        let response = server.router.oneshot(put_pods_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        match rx.borrow().clone() {
            Some(Trigger::Pods(pods)) => {
                assert_eq!(pods.len(), 1);
                assert_eq!(pods[0].metadata.name, "web-0");
            }
            other => panic!("unexpected trigger: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_put_pods_rejected_in_host_mode() {
        let (server, rx) = server(false);
        let response = server.router.oneshot(put_pods_request("[]")).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(rx.borrow().is_none());
    }

    #[tokio::test]
    async fn test_put_pods_invalid_json() {
        let (server, _rx) = server(true);
        let response = server.router.oneshot(put_pods_request("{not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_refresh_queues_trigger() {
        let (server, rx) = server(false);
        let request = Request::builder()
            .method("POST")
            .uri("/refresh")
            .body(Body::empty())
            .unwrap();
        let response = server.router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(matches!(*rx.borrow(), Some(Trigger::Refresh)));
    }

    #[tokio::test]
    async fn test_refresh_does_not_replace_pending_snapshot() {
        let (server, rx) = server(true);
        let body = r#"[{"metadata": {"name": "web-0"}}]"#;
        let response = server
            .router
            .clone()
            .oneshot(put_pods_request(body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let request = Request::builder()
            .method("POST")
            .uri("/refresh")
            .body(Body::empty())
            .unwrap();
        let response = server.router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        match rx.borrow().clone() {
            Some(Trigger::Pods(pods)) => assert_eq!(pods[0].metadata.name, "web-0"),
            other => panic!("unexpected trigger: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_targets_empty() {
        let (server, _rx) = server(true);
        let request = Request::builder().uri("/targets").body(Body::empty()).unwrap();
        let response = server.router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "targets": [] }));
    }
}

//! Axum-based deployment intake API.
//!
//! - `POST /deploy` — multipart upload (archive, owner, optional env JSON);
//!   runs the orchestrator and returns the `DeployResult`. Workload build
//!   failures are a 200 with `status: "failed"`; pipeline errors are a 500.
//! - `GET /deploy/{id}/progress`, `GET /deployments` — progress polling.
//! - `GET /tools`, `GET /tools/{id}` — the tool registry.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::deploy::{self, DeployRequest};
use crate::instance::InstanceHandle;
use crate::progress;
use crate::registry;

#[derive(Clone)]
pub struct ApiState {
    pub handle: Arc<dyn InstanceHandle>,
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ApiError {
    error: String,
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (status, Json(ApiError { error: msg.into() }))
}

// ---------------------------------------------------------------------------
// Deployment intake
// ---------------------------------------------------------------------------

async fn read_deploy_request(multipart: &mut Multipart) -> Result<DeployRequest, String> {
    let mut archive: Option<Vec<u8>> = None;
    let mut owner: Option<String> = None;
    let mut env: HashMap<String, String> = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| format!("Invalid multipart body: {err}"))?
    {
        match field.name() {
            Some("archive") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| format!("Failed to read archive: {err}"))?;
                archive = Some(bytes.to_vec());
            }
            Some("owner") => {
                owner = Some(
                    field
                        .text()
                        .await
                        .map_err(|err| format!("Failed to read owner: {err}"))?,
                );
            }
            Some("env") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|err| format!("Failed to read env: {err}"))?;
                if !raw.trim().is_empty() {
                    env = serde_json::from_str(&raw)
                        .map_err(|err| format!("env is not a JSON object of strings: {err}"))?;
                }
            }
            _ => {}
        }
    }

    Ok(DeployRequest {
        archive: archive.ok_or("archive field required")?,
        owner: owner.ok_or("owner field required")?,
        env,
    })
}

async fn deploy_tool(State(state): State<ApiState>, mut multipart: Multipart) -> impl IntoResponse {
    let request = match read_deploy_request(&mut multipart).await {
        Ok(request) => request,
        Err(msg) => return api_error(StatusCode::BAD_REQUEST, msg).into_response(),
    };

    info!(
        "deploy request from {} ({} bytes)",
        request.owner,
        request.archive.len()
    );

    match deploy::deploy(state.handle.as_ref(), request).await {
        Ok(result) => (StatusCode::OK, Json(serde_json::to_value(result).unwrap())).into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": err.to_string(), "status": "failed" })),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// Progress + registry endpoints
// ---------------------------------------------------------------------------

async fn get_deploy_progress(Path(deploy_id): Path<String>) -> impl IntoResponse {
    match progress::get_deploy(&deploy_id) {
        Some(status) => {
            (StatusCode::OK, Json(serde_json::to_value(status).unwrap())).into_response()
        }
        None => api_error(StatusCode::NOT_FOUND, "Deployment not found").into_response(),
    }
}

async fn list_deployments() -> impl IntoResponse {
    let active = progress::list_active_deploys();
    (
        StatusCode::OK,
        Json(serde_json::json!({ "deployments": active })),
    )
}

async fn list_tools() -> impl IntoResponse {
    match registry::list_tools() {
        Ok(tools) => {
            (StatusCode::OK, Json(serde_json::json!({ "tools": tools }))).into_response()
        }
        Err(err) => api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

async fn get_tool(Path(tool_id): Path<String>) -> impl IntoResponse {
    match registry::get_tool_by_id(&tool_id) {
        Ok(tool) => (StatusCode::OK, Json(serde_json::to_value(tool).unwrap())).into_response(),
        Err(err) => api_error(StatusCode::NOT_FOUND, err.to_string()).into_response(),
    }
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// Build the intake router around one instance handle.
pub fn router(handle: Arc<dyn InstanceHandle>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/deploy", post(deploy_tool))
        .route("/deploy/{deploy_id}/progress", get(get_deploy_progress))
        .route("/deployments", get(list_deployments))
        .route("/tools", get(list_tools))
        .route("/tools/{tool_id}", get(get_tool))
        .layer(cors)
        .with_state(ApiState { handle })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::util::ServiceExt;

    use crate::testkit::MockInstance;

    fn test_router() -> Router {
        router(Arc::new(MockInstance::new()))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = test_router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn unknown_deploy_progress_is_404() {
        let response = test_router()
            .oneshot(
                Request::get("/deploy/nope/progress")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn tracked_deploy_progress_is_served() {
        progress::start_deploy("api-progress-test");
        let response = test_router()
            .oneshot(
                Request::get("/deploy/api-progress-test/progress")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["deploy_id"], "api-progress-test");
        assert_eq!(body["phase"], "extracting");
    }

    #[tokio::test]
    async fn deploy_without_required_fields_is_400() {
        let body = "--b\r\nContent-Disposition: form-data; name=\"owner\"\r\n\r\nalice\r\n--b--\r\n";
        let response = test_router()
            .oneshot(
                Request::post("/deploy")
                    .header("content-type", "multipart/form-data; boundary=b")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "archive field required");
    }
}

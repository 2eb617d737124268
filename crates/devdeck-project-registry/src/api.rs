//! HTTP API handlers using axum.
//!
//! Project CRUD failures are HTTP errors (400 / 404 / 409 / 500). Lifecycle
//! and deployment failures are expected outcomes and are reported in-band:
//! HTTP 200 with `success: false`, a readable `error` and a stable `kind`.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use devdeck_common::{Project, ProjectError, ProjectKey};
use devdeck_process_management::{DeployRunner, ProcessInfo, ProcessManager};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    storage::ProjectStore,
    types::{
        ActionResponse, ErrorResponse, PathRequest, ProjectsResponse, RunScriptRequest,
        StatusQuery, StatusResponse, UpdateProjectRequest,
    },
};

/// Shared state of all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ProjectStore>,
    pub manager: ProcessManager,
    pub deployer: Arc<DeployRunner>,
}

/// Creates the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/projects", get(list_projects_handler))
        .route("/api/add-project", post(add_project_handler))
        .route("/api/update-project", post(update_project_handler))
        .route("/api/delete-project", post(delete_project_handler))
        .route("/api/run-script", post(run_script_handler))
        .route("/api/start-project", post(start_project_handler))
        .route("/api/stop-project", post(stop_project_handler))
        .route("/api/processes", get(list_processes_handler))
        .route("/api/project-status", get(project_status_handler))
        .route("/api/health", get(health_handler))
        .with_state(state)
}

async fn list_projects_handler(State(state): State<AppState>) -> Json<Vec<Project>> {
    Json(state.store.list())
}

async fn add_project_handler(
    State(state): State<AppState>,
    Json(project): Json<Project>,
) -> Result<Json<ProjectsResponse>, ApiError> {
    let projects = state.store.add(project)?;
    Ok(Json(ProjectsResponse {
        success: true,
        projects,
    }))
}

async fn update_project_handler(
    State(state): State<AppState>,
    Json(req): Json<UpdateProjectRequest>,
) -> Result<Json<ProjectsResponse>, ApiError> {
    let projects = state.store.update(&req.old_path, req.project())?;
    Ok(Json(ProjectsResponse {
        success: true,
        projects,
    }))
}

async fn delete_project_handler(
    State(state): State<AppState>,
    Json(req): Json<PathRequest>,
) -> Result<Json<ProjectsResponse>, ApiError> {
    let projects = state.store.delete(&req.path)?;
    Ok(Json(ProjectsResponse {
        success: true,
        projects,
    }))
}

/// Runs the deployment sequence of a project.
async fn run_script_handler(
    State(state): State<AppState>,
    payload: Result<Json<RunScriptRequest>, JsonRejection>,
) -> Json<ActionResponse> {
    let Json(req) = match payload {
        Ok(req) => req,
        Err(rejection) => return invalid_request(rejection),
    };
    let key = ProjectKey::new(req.path.as_str());
    let name = state
        .store
        .get_project(&key)
        .map(|project| project.name)
        .unwrap_or_else(|_| key.to_string());
    let project = Project::new(name, key.as_str(), req.project_type);

    info!("Deploy requested for {} ({})", key, req.project_type);
    match state.deployer.deploy(&project).await {
        Ok(report) => Json(ActionResponse {
            output: Some(format!(
                "Deployment successful! ({} step(s) completed)",
                report.steps.len()
            )),
            ..ActionResponse::ok()
        }),
        Err(e) => {
            warn!("Deploy of {} failed: {}", key, e);
            Json(ActionResponse::failed(&e, e.kind()))
        }
    }
}

async fn start_project_handler(
    State(state): State<AppState>,
    payload: Result<Json<PathRequest>, JsonRejection>,
) -> Json<ActionResponse> {
    let Json(req) = match payload {
        Ok(req) => req,
        Err(rejection) => return invalid_request(rejection),
    };
    let key = ProjectKey::new(req.path);
    match state.manager.start(&key).await {
        Ok(process) => Json(ActionResponse {
            process: Some(process),
            ..ActionResponse::ok()
        }),
        Err(e) => {
            warn!("Start of {} failed: {}", key, e);
            Json(ActionResponse::failed(&e, e.kind()))
        }
    }
}

async fn stop_project_handler(
    State(state): State<AppState>,
    payload: Result<Json<PathRequest>, JsonRejection>,
) -> Json<ActionResponse> {
    let Json(req) = match payload {
        Ok(req) => req,
        Err(rejection) => return invalid_request(rejection),
    };
    let key = ProjectKey::new(req.path);
    match state.manager.stop(&key).await {
        Ok(report) => Json(ActionResponse {
            output: Some(format!("Stopped {} process(es)", report.killed.len())),
            ..ActionResponse::ok()
        }),
        Err(e) => {
            warn!("Stop of {} failed: {}", key, e);
            Json(ActionResponse::failed(&e, e.kind()))
        }
    }
}

/// In-band reply for a lifecycle request whose body could not be decoded.
fn invalid_request(rejection: JsonRejection) -> Json<ActionResponse> {
    let reason = rejection.body_text();
    warn!("Rejected request body: {}", reason);
    Json(ActionResponse::failed(reason, "invalid_request"))
}

async fn list_processes_handler(State(state): State<AppState>) -> Json<Vec<ProcessInfo>> {
    Json(state.manager.list_running().await)
}

async fn project_status_handler(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Json<StatusResponse> {
    let key = ProjectKey::new(query.path);
    let running = state.manager.is_running(&key).await;
    Json(StatusResponse {
        path: key.to_string(),
        running,
    })
}

/// Health check endpoint.
async fn health_handler() -> &'static str {
    "OK"
}

/// API error type.
#[derive(Debug)]
pub enum ApiError {
    Project(ProjectError),
}

impl From<ProjectError> for ApiError {
    fn from(e: ProjectError) -> Self {
        ApiError::Project(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::Project(e) = self;
        let status = match &e {
            ProjectError::Validation { .. } => StatusCode::BAD_REQUEST,
            ProjectError::NotFound { .. } => StatusCode::NOT_FOUND,
            ProjectError::AlreadyExists { .. } => StatusCode::CONFLICT,
            ProjectError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("API error: {} - {}", status, e);
        } else {
            warn!("API error: {} - {}", status, e);
        }

        let body = Json(ErrorResponse {
            success: false,
            error: e.to_string(),
            kind: e.kind().to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use devdeck_common::ProjectType;
    use devdeck_process_management::DevDeckConfig;
    use serde_json::{json, Value};
    use tower::util::ServiceExt; // for `oneshot`

    struct TestApp {
        dir: tempfile::TempDir,
        state: AppState,
    }

    fn app() -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DevDeckConfig::default();
        config.process.kill_timeout = std::time::Duration::from_secs(5);
        let store = Arc::new(ProjectStore::open(dir.path().join("projects.json")));
        let state = AppState {
            manager: ProcessManager::new(&config, store.clone()),
            deployer: Arc::new(DeployRunner::new(&config)),
            store,
        };
        TestApp { dir, state }
    }

    async fn send(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = create_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = app();
        let request = Request::builder()
            .method("GET")
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();

        let response = create_router(app.state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_project_crud() {
        let app = app();

        let (status, body) = send(
            &app.state,
            "POST",
            "/api/add-project",
            Some(json!({"name": "shop", "path": "/srv/shop", "type": "React"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["projects"][0]["type"], "React");

        let (status, body) = send(
            &app.state,
            "POST",
            "/api/update-project",
            Some(json!({"old_path": "/srv/shop", "name": "shop", "path": "/srv/shop2", "type": "Node.js"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["projects"][0]["path"], "/srv/shop2");

        let (status, body) = send(&app.state, "GET", "/api/projects", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(1));

        let (status, body) = send(
            &app.state,
            "POST",
            "/api/delete-project",
            Some(json!({"path": "/srv/shop2"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["projects"], json!([]));
    }

    #[tokio::test]
    async fn test_crud_error_statuses() {
        let app = app();
        let project = json!({"name": "a", "path": "/srv/a", "type": "Flask"});
        send(&app.state, "POST", "/api/add-project", Some(project.clone())).await;

        let (status, body) = send(&app.state, "POST", "/api/add-project", Some(project)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
        assert_eq!(body["kind"], "project_exists");

        let (status, _) = send(
            &app.state,
            "POST",
            "/api/add-project",
            Some(json!({"name": " ", "path": "/srv/b", "type": "Flask"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app.state,
            "POST",
            "/api/delete-project",
            Some(json!({"path": "/srv/none"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "project_not_found");
    }

    #[tokio::test]
    async fn test_start_unknown_project() {
        let app = app();
        let (status, body) = send(
            &app.state,
            "POST",
            "/api/start-project",
            Some(json!({"path": "/srv/unknown"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["kind"], "unknown_project");
    }

    #[tokio::test]
    async fn test_stop_not_running() {
        let app = app();
        let (status, body) = send(
            &app.state,
            "POST",
            "/api/stop-project",
            Some(json!({"path": "/srv/idle"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["kind"], "not_running");
        assert_eq!(body["error"], "No running process found for project /srv/idle");
    }

    #[tokio::test]
    async fn test_malformed_lifecycle_body_is_reported_in_band() {
        let app = app();

        let (status, body) = send(&app.state, "POST", "/api/start-project", Some(json!({"name": "x"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["kind"], "invalid_request");
        assert!(body["error"].as_str().is_some());

        // No body and no content type
        let (status, body) = send(&app.state, "POST", "/api/stop-project", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kind"], "invalid_request");

        let (status, body) = send(&app.state, "POST", "/api/run-script", Some(json!({"path": "/srv/a"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kind"], "invalid_request");
    }

    #[tokio::test]
    async fn test_start_missing_directory() {
        let app = app();
        app.state
            .store
            .add(Project::new("ghost", "/definitely/not/a/dir", ProjectType::Flask))
            .unwrap();

        let (_, body) = send(
            &app.state,
            "POST",
            "/api/start-project",
            Some(json!({"path": "/definitely/not/a/dir"})),
        )
        .await;
        assert_eq!(body["kind"], "path_not_found");
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_start_status_stop_roundtrip() {
        let app = app();
        let path = app.dir.path().join("site");
        std::fs::create_dir(&path).unwrap();
        let path = path.to_string_lossy().into_owned();
        app.state
            .store
            .add(Project::new("site", path.as_str(), ProjectType::Flask))
            .unwrap();

        // Any long-running command stands in for the dev server
        let mut config = DevDeckConfig::default();
        config
            .project_types
            .get_mut(&ProjectType::Flask)
            .unwrap()
            .start_command = "sleep 30".to_string();
        let state = AppState {
            manager: ProcessManager::new(&config, app.state.store.clone()),
            ..app.state.clone()
        };

        let (_, body) = send(&state, "POST", "/api/start-project", Some(json!({ "path": path }))).await;
        assert_eq!(body["success"], true);
        let pid = body["process"]["pid"].as_u64().unwrap();
        assert!(pid > 0);

        let uri = format!("/api/project-status?path={}", path);
        let (_, body) = send(&state, "GET", &uri, None).await;
        assert_eq!(body["running"], true);

        let (_, body) = send(&state, "GET", "/api/processes", None).await;
        assert_eq!(body.as_array().map(Vec::len), Some(1));

        let (_, body) = send(&state, "POST", "/api/stop-project", Some(json!({ "path": path }))).await;
        assert_eq!(body["success"], true);

        let (_, body) = send(&state, "GET", &uri, None).await;
        assert_eq!(body["running"], false);
    }

    #[tokio::test]
    async fn test_run_script_missing_directory() {
        let app = app();
        let (status, body) = send(
            &app.state,
            "POST",
            "/api/run-script",
            Some(json!({"path": "/definitely/not/a/dir", "type": "Flask"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["kind"], "path_not_found");
    }
}

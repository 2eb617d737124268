//! Request and response bodies of the control-plane HTTP API.

use devdeck_common::{Project, ProjectType};
use devdeck_process_management::ProcessInfo;
use serde::{Deserialize, Serialize};

/// Body of `/api/update-project`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProjectRequest {
    pub old_path: String,
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub project_type: ProjectType,
}

impl UpdateProjectRequest {
    pub fn project(&self) -> Project {
        Project::new(self.name.clone(), self.path.clone(), self.project_type)
    }
}

/// Body of requests that only name a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathRequest {
    pub path: String,
}

/// Body of `/api/run-script`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunScriptRequest {
    pub path: String,
    #[serde(rename = "type")]
    pub project_type: ProjectType,
}

/// Query of `/api/project-status`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusQuery {
    pub path: String,
}

/// Result of a project registry mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectsResponse {
    pub success: bool,
    pub projects: Vec<Project>,
}

/// Result of a lifecycle or deployment action.
///
/// Failures are reported in-band (`success: false`) with a readable `error`
/// and a stable `kind`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<ProcessInfo>,
}

impl ActionResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn failed(error: impl ToString, kind: &'static str) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            kind: Some(kind),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub path: String,
    pub running: bool,
}

/// Body of an error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub kind: String,
}

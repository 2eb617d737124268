//! Persistent project registry storage.
//!
//! # Rust Learning Note
//!
//! The registry is a JSON array kept in memory behind a `parking_lot::RwLock`
//! and written through on every mutation:
//!
//! ```rust,ignore
//! let mut projects = self.projects.write();
//! let mut updated = projects.clone();
//! updated.push(project);
//! self.persist(&updated)?;   // temp file + rename
//! *projects = updated;       // only after the file is safe
//! ```
//!
//! - Readers never see a half-applied change: the in-memory list is swapped
//!   only after the file was replaced.
//! - Writers are serialized by the write lock, so two mutations can never
//!   interleave their file writes.
//! - `parking_lot` locks do not poison; a panicking writer cannot wedge the
//!   registry.

use devdeck_common::{Project, ProjectError, ProjectKey};
use devdeck_process_management::ProjectSource;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// File-backed list of registered projects.
#[derive(Debug)]
pub struct ProjectStore {
    file: PathBuf,
    projects: RwLock<Vec<Project>>,
}

impl ProjectStore {
    /// Open the registry stored at `file`.
    ///
    /// A missing file yields an empty registry. An unreadable or corrupt file
    /// is logged and also yields an empty registry; it is only overwritten by
    /// the next mutation.
    pub fn open(file: impl Into<PathBuf>) -> Self {
        let file = file.into();
        let projects = match std::fs::read_to_string(&file) {
            Ok(content) => match serde_json::from_str::<Vec<Project>>(&content) {
                Ok(projects) => {
                    info!("Loaded {} project(s) from {}", projects.len(), file.display());
                    projects
                }
                Err(e) => {
                    error!("Failed to parse {}: {}", file.display(), e);
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No project file at {}, starting empty", file.display());
                Vec::new()
            }
            Err(e) => {
                error!("Failed to read {}: {}", file.display(), e);
                Vec::new()
            }
        };

        Self {
            file,
            projects: RwLock::new(projects),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn list(&self) -> Vec<Project> {
        self.projects.read().clone()
    }

    pub fn get_project(&self, key: &ProjectKey) -> Result<Project, ProjectError> {
        self.projects
            .read()
            .iter()
            .find(|project| project.key() == *key)
            .cloned()
            .ok_or_else(|| ProjectError::not_found(key.as_str()))
    }

    /// Register a new project; returns the updated list.
    pub fn add(&self, project: Project) -> Result<Vec<Project>, ProjectError> {
        let project = normalize(project)?;
        let key = project.key();

        self.mutate(|projects| {
            if projects.iter().any(|existing| existing.key() == key) {
                return Err(ProjectError::already_exists(key.as_str()));
            }
            info!("Adding project {} at {}", project.name, key);
            projects.push(project);
            Ok(())
        })
    }

    /// Replace the project registered at `old_path`; returns the updated list.
    pub fn update(&self, old_path: &str, project: Project) -> Result<Vec<Project>, ProjectError> {
        let project = normalize(project)?;
        let old_key = ProjectKey::new(old_path);
        let new_key = project.key();

        self.mutate(|projects| {
            let index = projects
                .iter()
                .position(|existing| existing.key() == old_key)
                .ok_or_else(|| ProjectError::not_found(old_key.as_str()))?;

            let collides = projects
                .iter()
                .enumerate()
                .any(|(i, existing)| i != index && existing.key() == new_key);
            if collides {
                return Err(ProjectError::already_exists(new_key.as_str()));
            }

            info!("Updating project {} -> {} ({})", old_key, new_key, project.name);
            projects[index] = project;
            Ok(())
        })
    }

    /// Remove the project registered at `path`; returns the updated list.
    pub fn delete(&self, path: &str) -> Result<Vec<Project>, ProjectError> {
        let key = ProjectKey::new(path);

        self.mutate(|projects| {
            let index = projects
                .iter()
                .position(|existing| existing.key() == key)
                .ok_or_else(|| ProjectError::not_found(key.as_str()))?;
            let removed = projects.remove(index);
            info!("Deleted project {} at {}", removed.name, key);
            Ok(())
        })
    }

    /// Apply `change` to a copy, persist it, then publish it.
    fn mutate<F>(&self, change: F) -> Result<Vec<Project>, ProjectError>
    where
        F: FnOnce(&mut Vec<Project>) -> Result<(), ProjectError>,
    {
        let mut projects = self.projects.write();
        let mut updated = projects.clone();
        change(&mut updated)?;
        self.persist(&updated)?;
        *projects = updated.clone();
        Ok(updated)
    }

    fn persist(&self, projects: &[Project]) -> Result<(), ProjectError> {
        let content = serde_json::to_vec_pretty(projects)
            .map_err(|e| ProjectError::storage(format!("Failed to serialize projects: {}", e)))?;

        let tmp = self.file.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(|e| {
            ProjectError::storage(format!("Failed to write {}: {}", tmp.display(), e))
        })?;

        if let Err(e) = std::fs::rename(&tmp, &self.file) {
            warn!("Failed to replace {}: {}", self.file.display(), e);
            let _ = std::fs::remove_file(&tmp);
            return Err(ProjectError::storage(format!(
                "Failed to replace {}: {}",
                self.file.display(),
                e
            )));
        }

        debug!("Saved {} project(s) to {}", projects.len(), self.file.display());
        Ok(())
    }
}

impl ProjectSource for ProjectStore {
    fn get_project(&self, key: &ProjectKey) -> Option<Project> {
        ProjectStore::get_project(self, key).ok()
    }
}

fn normalize(project: Project) -> Result<Project, ProjectError> {
    let name = project.name.trim();
    let path = project.path.trim();
    if name.is_empty() {
        return Err(ProjectError::validation("Project name cannot be empty"));
    }
    if path.is_empty() {
        return Err(ProjectError::validation("Project path cannot be empty"));
    }
    Ok(Project::new(name, path, project.project_type))
}

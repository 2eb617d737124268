//! Core domain types used throughout DevDeck.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Project key - a project is identified by its filesystem path.
///
/// # Example
/// ```
/// use devdeck_common::ProjectKey;
///
/// let key = ProjectKey::from("  /srv/shop-api ");
/// assert_eq!(key.as_str(), "/srv/shop-api");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectKey(String);

impl ProjectKey {
    /// Creates a new ProjectKey, trimming surrounding whitespace.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let trimmed = path.trim();
        if trimmed.len() == path.len() {
            Self(path)
        } else {
            Self(trimmed.to_string())
        }
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for ProjectKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ProjectKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of project. Decides the deployment steps and the start command.
///
/// The serialized names are the ones stored in `projects.json` and sent by
/// the UI, so `NodeJs` travels as `"Node.js"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectType {
    #[serde(rename = "React")]
    React,
    #[serde(rename = "Node.js")]
    NodeJs,
    #[serde(rename = "Flask")]
    Flask,
}

impl ProjectType {
    pub const ALL: [ProjectType; 3] = [ProjectType::React, ProjectType::NodeJs, ProjectType::Flask];

    /// Returns the project type name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::React => "React",
            ProjectType::NodeJs => "Node.js",
            ProjectType::Flask => "Flask",
        }
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub project_type: ProjectType,
}

impl Project {
    pub fn new(name: impl Into<String>, path: impl Into<String>, project_type: ProjectType) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            project_type,
        }
    }

    /// The registry key of this project (its path).
    pub fn key(&self) -> ProjectKey {
        ProjectKey::new(self.path.as_str())
    }
}

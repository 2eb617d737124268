use anyhow::{Context, Result};
use devdeck_common::ProjectType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub mod validation;

/// Top-level configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevDeckConfig {
    #[serde(default)]
    pub server: ServerOptions,
    #[serde(default)]
    pub process: ProcessOptions,
    #[serde(default)]
    pub deploy: DeployOptions,
    /// Per project type commands; types missing from the file get built-in defaults.
    #[serde(default)]
    pub project_types: HashMap<ProjectType, ProjectTypeConfig>,
}

/// HTTP server and storage options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerOptions {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_projects_file")]
    pub projects_file: String,
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Process lifecycle options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOptions {
    /// Upper bound on waiting for a killed root process to be reaped.
    #[serde(default = "default_kill_timeout", with = "duration_serde")]
    pub kill_timeout: Duration,
    #[serde(default)]
    pub duplicate_start: DuplicateStartPolicy,
    /// Background reconcile period; `0s` disables the reconciler.
    #[serde(default = "default_reconcile_interval", with = "duration_serde")]
    pub reconcile_interval: Duration,
    /// Run script base name; `.sh` / `.bat` is appended per platform.
    #[serde(default = "default_launch_script_name")]
    pub launch_script_name: String,
    /// Write the process output to `<launch_script_name>.log` in the project directory.
    #[serde(default = "default_true")]
    pub capture_output: bool,
}

/// What `start` does when the project already has a live process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateStartPolicy {
    /// Fail with `AlreadyRunning`.
    #[default]
    Reject,
    /// Terminate the tracked tree, then start a fresh process.
    Replace,
}

/// Deployment runner options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployOptions {
    #[serde(default = "default_step_timeout", with = "duration_serde")]
    pub step_timeout: Duration,
}

/// Commands for one project type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectTypeConfig {
    pub start_command: String,
    #[serde(default)]
    pub environment: HashMap<String, String>,
    /// Each step is `[program, args...]`.
    #[serde(default)]
    pub deploy_steps: Vec<Vec<String>>,
}

impl ProjectTypeConfig {
    /// Built-in commands for a project type.
    pub fn default_for(project_type: ProjectType) -> Self {
        let git_pull = step(&["git", "pull"]);
        let npm_install = step(&["npm", "install"]);
        let (start_command, deploy_steps) = match project_type {
            ProjectType::React => (
                "npm start",
                vec![git_pull, npm_install, step(&["npm", "run", "build"])],
            ),
            ProjectType::NodeJs => ("node server.js", vec![git_pull, npm_install]),
            ProjectType::Flask => ("python app.py", vec![git_pull]),
        };

        Self {
            start_command: start_command.to_string(),
            environment: HashMap::new(),
            deploy_steps,
        }
    }
}

fn step(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}

impl Default for DevDeckConfig {
    fn default() -> Self {
        let mut config = Self {
            server: ServerOptions::default(),
            process: ProcessOptions::default(),
            deploy: DeployOptions::default(),
            project_types: HashMap::new(),
        };
        config.fill_project_type_defaults();
        config
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            projects_file: default_projects_file(),
            static_dir: default_static_dir(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            kill_timeout: default_kill_timeout(),
            duplicate_start: DuplicateStartPolicy::default(),
            reconcile_interval: default_reconcile_interval(),
            launch_script_name: default_launch_script_name(),
            capture_output: true,
        }
    }
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            step_timeout: default_step_timeout(),
        }
    }
}

impl DevDeckConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::load_from_string(&content)
    }

    /// Load configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        // An empty document is a valid "all defaults" configuration
        let mut config: DevDeckConfig = if content.trim().is_empty() {
            DevDeckConfig::default()
        } else {
            serde_yaml::from_str(content).context("Failed to parse YAML configuration")?
        };

        config.fill_project_type_defaults();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Commands for `project_type`, falling back to the built-in defaults.
    pub fn project_type(&self, project_type: ProjectType) -> ProjectTypeConfig {
        self.project_types
            .get(&project_type)
            .cloned()
            .unwrap_or_else(|| ProjectTypeConfig::default_for(project_type))
    }

    fn fill_project_type_defaults(&mut self) {
        for project_type in ProjectType::ALL {
            self.project_types
                .entry(project_type)
                .or_insert_with(|| ProjectTypeConfig::default_for(project_type));
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    32400
}

fn default_projects_file() -> String {
    "projects.json".to_string()
}

fn default_static_dir() -> String {
    "client/dist".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_kill_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_reconcile_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_launch_script_name() -> String {
    "start_project".to_string()
}

fn default_true() -> bool {
    true
}

fn default_step_timeout() -> Duration {
    Duration::from_secs(600)
}

// Custom serialization for Duration
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis();
        if millis % 1000 == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", millis))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        // Check for "ms" BEFORE "s" since "ms" ends with 's'
        if let Some(num_str) = s.strip_suffix("ms") {
            let millis: u64 = num_str.parse().map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_millis(millis))
        } else if let Some(num_str) = s.strip_suffix('s') {
            let secs: u64 = num_str.parse().map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_secs(secs))
        } else if let Some(num_str) = s.strip_suffix('m') {
            let mins: u64 = num_str.parse().map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_secs(mins * 60))
        } else {
            Err(format!("Duration must end with 's', 'ms', or 'm': {}", s))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = DevDeckConfig::load_from_string("").unwrap();
        assert_eq!(config.server.port, 32400);
        assert_eq!(config.server.projects_file, "projects.json");
        assert_eq!(config.process.kill_timeout, Duration::from_secs(10));
        assert_eq!(config.process.duplicate_start, DuplicateStartPolicy::Reject);
        assert_eq!(config.deploy.step_timeout, Duration::from_secs(600));
        assert_eq!(config.project_type(ProjectType::NodeJs).start_command, "node server.js");
        assert_eq!(config.project_type(ProjectType::React).deploy_steps.len(), 3);
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let yaml = r#"
process:
  kill_timeout: 500ms
  duplicate_start: replace
  reconcile_interval: 0s
project_types:
  Flask:
    start_command: flask run
    environment:
      FLASK_ENV: development
"#;
        let config = DevDeckConfig::load_from_string(yaml).unwrap();
        assert_eq!(config.process.kill_timeout, Duration::from_millis(500));
        assert_eq!(config.process.duplicate_start, DuplicateStartPolicy::Replace);
        assert!(config.process.reconcile_interval.is_zero());
        assert_eq!(config.server.host, "0.0.0.0");

        let flask = config.project_type(ProjectType::Flask);
        assert_eq!(flask.start_command, "flask run");
        assert_eq!(flask.environment.get("FLASK_ENV").map(String::as_str), Some("development"));
        assert!(flask.deploy_steps.is_empty());
        assert_eq!(config.project_type(ProjectType::React).start_command, "npm start");
    }

    #[test]
    fn test_parse_duration_units() {
        use duration_serde::parse_duration;
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("fast").is_err());
    }

    #[test]
    fn test_invalid_yaml_is_rejected() {
        assert!(DevDeckConfig::load_from_string("process: [not, a, map]").is_err());
        assert!(DevDeckConfig::load_from_string("process:\n  kill_timeout: soon\n").is_err());
    }
}

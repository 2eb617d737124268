//! Project process launcher.
//!
//! A start materializes a small run script in the project directory (it
//! changes into the directory and runs the type's start command) and spawns
//! it through the platform shell as a detached session leader. The script is
//! rewritten on every start; it is a convenience artifact, not state.

use crate::config::{DevDeckConfig, ProjectTypeConfig};
use crate::exit::ExitMonitor;
use crate::types::ManagedProcess;
use chrono::Utc;
use devdeck_common::{LaunchError, Project, ProjectKey, ProjectType};
use devdeck_process::{LaunchSpec, ProcessTree};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[cfg(unix)]
const SCRIPT_EXTENSION: &str = "sh";
#[cfg(windows)]
const SCRIPT_EXTENSION: &str = "bat";

pub struct Launcher {
    tree: Arc<dyn ProcessTree>,
    script_name: String,
    capture_output: bool,
    commands: HashMap<ProjectType, ProjectTypeConfig>,
}

impl Launcher {
    pub fn new(tree: Arc<dyn ProcessTree>, config: &DevDeckConfig) -> Self {
        let commands = ProjectType::ALL
            .into_iter()
            .map(|project_type| (project_type, config.project_type(project_type)))
            .collect();

        Self {
            tree,
            script_name: config.process.launch_script_name.clone(),
            capture_output: config.process.capture_output,
            commands,
        }
    }

    /// Spawn the long-running process for `project` under `key`.
    ///
    /// Must be called from within a tokio runtime (the exit monitor is a task).
    pub fn launch(&self, key: &ProjectKey, project: &Project) -> Result<ManagedProcess, LaunchError> {
        let directory = PathBuf::from(key.as_str());
        if !directory.is_dir() {
            return Err(LaunchError::path_not_found(key.as_str()));
        }

        let commands = self
            .commands
            .get(&project.project_type)
            .cloned()
            .unwrap_or_else(|| ProjectTypeConfig::default_for(project.project_type));

        let script = self
            .write_run_script(&directory, &commands.start_command)
            .map_err(|e| LaunchError::spawn_failed(key.clone(), format!("Failed to write run script: {}", e)))?;
        debug!("Wrote run script {} for {}", script.display(), key);

        let spec = LaunchSpec {
            id: key.to_string(),
            program: shell_program().to_string(),
            args: shell_args(&script),
            working_directory: directory.clone(),
            environment: commands.environment,
            output_file: self
                .capture_output
                .then(|| directory.join(format!("{}.log", self.script_name))),
        };

        let root = self
            .tree
            .spawn_detached(&spec)
            .map_err(|e| LaunchError::spawn_failed(key.clone(), e.to_string()))?;

        let exit = match root.child {
            Some(child) => ExitMonitor::spawn(key, root.pid, child),
            None => ExitMonitor::untracked(),
        };

        info!(
            "Started {} ({}) for {} (PID: {}, PGID: {:?})",
            project.name, project.project_type, key, root.pid, root.pgid
        );

        Ok(ManagedProcess {
            key: key.clone(),
            pid: root.pid,
            pgid: root.pgid,
            started_at: Utc::now(),
            os_start_time: root.start_time,
            exit,
        })
    }

    fn write_run_script(&self, directory: &Path, start_command: &str) -> std::io::Result<PathBuf> {
        let path = directory.join(format!("{}.{}", self.script_name, SCRIPT_EXTENSION));
        std::fs::write(&path, run_script(directory, start_command))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
        }

        Ok(path)
    }
}

#[cfg(unix)]
fn run_script(directory: &Path, start_command: &str) -> String {
    format!(
        "#!/bin/sh\ncd {} || exit 1\n{}\n",
        sh_quote(&directory.to_string_lossy()),
        start_command
    )
}

#[cfg(windows)]
fn run_script(directory: &Path, start_command: &str) -> String {
    format!(
        "@echo off\r\ncd /d \"{}\"\r\n{}\r\n",
        directory.display(),
        start_command
    )
}

#[cfg(unix)]
fn shell_program() -> &'static str {
    "sh"
}

#[cfg(windows)]
fn shell_program() -> &'static str {
    "cmd"
}

#[cfg(unix)]
fn shell_args(script: &Path) -> Vec<String> {
    vec![script.to_string_lossy().into_owned()]
}

#[cfg(windows)]
fn shell_args(script: &Path) -> Vec<String> {
    vec!["/C".to_string(), script.to_string_lossy().into_owned()]
}

/// Single-quote `value` for a POSIX shell.
#[cfg(unix)]
fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

//! Deployment sequence runner.
//!
//! Runs the configured steps of a project type (e.g. `git pull`,
//! `npm install`, `npm run build`) one after the other in the project
//! directory. The first failing step aborts the sequence.

use crate::config::DevDeckConfig;
use devdeck_common::{DeployError, Project, ProjectType};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Output of one completed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutput {
    pub step: String,
    pub stdout: String,
    pub stderr: String,
}

/// Outcome of a successful deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployReport {
    pub path: String,
    pub steps: Vec<StepOutput>,
}

#[derive(Debug, Clone)]
pub struct DeployRunner {
    steps: HashMap<ProjectType, Vec<Vec<String>>>,
    step_timeout: Duration,
}

impl DeployRunner {
    pub fn new(config: &DevDeckConfig) -> Self {
        let steps = ProjectType::ALL
            .into_iter()
            .map(|project_type| (project_type, config.project_type(project_type).deploy_steps))
            .collect();

        Self {
            steps,
            step_timeout: config.deploy.step_timeout,
        }
    }

    /// Run the deployment steps of `project` in its directory.
    pub async fn deploy(&self, project: &Project) -> Result<DeployReport, DeployError> {
        let directory = Path::new(project.path.trim());
        if !directory.is_dir() {
            return Err(DeployError::PathNotFound {
                path: project.path.clone(),
            });
        }

        let steps = self
            .steps
            .get(&project.project_type)
            .map(Vec::as_slice)
            .unwrap_or_default();

        info!(
            "Deploying {} ({}) in {}: {} step(s)",
            project.name,
            project.project_type,
            directory.display(),
            steps.len()
        );

        let mut outputs = Vec::with_capacity(steps.len());
        for step in steps {
            outputs.push(self.run_step(directory, step).await?);
        }

        info!("Deployment of {} finished", project.name);
        Ok(DeployReport {
            path: project.path.clone(),
            steps: outputs,
        })
    }

    async fn run_step(&self, directory: &Path, step: &[String]) -> Result<StepOutput, DeployError> {
        let name = step.join(" ");
        let Some((program, args)) = step.split_first() else {
            return Err(DeployError::SpawnFailed {
                step: name,
                reason: "empty step".to_string(),
            });
        };

        debug!("Running deploy step '{}' in {}", name, directory.display());
        let mut cmd = Command::new(resolve_program(program));
        cmd.args(args)
            .current_dir(directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own group, so a timed out step goes down with everything it forked
        #[cfg(unix)]
        cmd.process_group(0);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return Err(DeployError::SpawnFailed {
                    step: name,
                    reason: e.to_string(),
                })
            }
        };
        let pid = child.id();

        let wait = child.wait_with_output();
        tokio::pin!(wait);
        let output = match tokio::time::timeout(self.step_timeout, &mut wait).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(DeployError::SpawnFailed {
                    step: name,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                warn!("Deploy step '{}' timed out after {:?}", name, self.step_timeout);
                if let Some(pid) = pid {
                    kill_step_tree(pid).await;
                }
                return Err(DeployError::StepTimedOut {
                    step: name,
                    timeout_secs: self.step_timeout.as_secs(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!("Deploy step '{}' stdout:\n{}", name, stdout);
        debug!("Deploy step '{}' stderr:\n{}", name, stderr);

        if !output.status.success() {
            warn!("Deploy step '{}' failed: {}", name, output.status);
            return Err(DeployError::StepFailed {
                step: name,
                exit_code: output.status.code(),
                stderr,
            });
        }

        Ok(StepOutput {
            step: name,
            stdout,
            stderr,
        })
    }
}

/// Kill a timed out step and every process below it.
async fn kill_step_tree(pid: u32) {
    let killed = tokio::task::spawn_blocking(move || {
        for target in devdeck_process::descendants_of(pid).into_iter().rev().chain(std::iter::once(pid)) {
            if let Err(e) = devdeck_process::force_kill(target) {
                debug!("Failed to kill deploy process {}: {}", target, e);
            }
        }
        #[cfg(unix)]
        {
            if let Err(e) = devdeck_process::kill_process_group(pid) {
                debug!("Failed to sweep deploy process group {}: {}", pid, e);
            }
        }
    })
    .await;

    if let Err(e) = killed {
        warn!("Kill task for deploy step {} failed: {}", pid, e);
    }
}

/// `npm` is a batch wrapper on Windows and must be named with its extension.
fn resolve_program(program: &str) -> String {
    if cfg!(windows) && program == "npm" {
        "npm.cmd".to_string()
    } else {
        program.to_string()
    }
}

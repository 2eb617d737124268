//! Detached process spawning.
//!
//! The spawned process becomes the leader of a new session (Unix `setsid`)
//! or of a new process group with its own console (Windows). It no longer
//! shares the manager's terminal or signal delivery, and its whole tree can
//! be addressed as one group.
//!
//! Must be called from within a tokio runtime: the returned
//! [`tokio::process::Child`] is reaped by the runtime's SIGCHLD driver.

use devdeck_common::{ProcessError, ProcessResult};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, info};

/// What to run and where.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Identifier used in logs and errors (the project key).
    pub id: String,
    pub program: String,
    pub args: Vec<String>,
    pub working_directory: PathBuf,
    pub environment: HashMap<String, String>,
    /// File receiving stdout and stderr; `None` discards output.
    pub output_file: Option<PathBuf>,
}

/// A freshly spawned detached process.
#[derive(Debug)]
pub struct DetachedChild {
    pub pid: u32,
    /// Process group id (equals `pid` on Unix, `None` where groups are not addressable).
    pub pgid: Option<u32>,
    pub child: Child,
}

/// Spawn `spec` as a detached session / process group leader.
pub fn spawn_detached(spec: &LaunchSpec) -> ProcessResult<DetachedChild> {
    info!("Spawning detached process for {}: {} {:?}", spec.id, spec.program, spec.args);

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .current_dir(&spec.working_directory)
        .envs(&spec.environment)
        .stdin(Stdio::null())
        .kill_on_drop(false);

    match &spec.output_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)
                .map_err(|e| {
                    ProcessError::spawn_failed(
                        &spec.id,
                        format!("Failed to open output file {}: {}", path.display(), e),
                    )
                })?;
            let stderr = file.try_clone().map_err(|e| {
                ProcessError::spawn_failed(&spec.id, format!("Failed to clone output handle: {}", e))
            })?;
            cmd.stdout(Stdio::from(file)).stderr(Stdio::from(stderr));
        }
        None => {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
    }

    #[cfg(unix)]
    unsafe {
        cmd.pre_exec(|| {
            nix::unistd::setsid()
                .map(|_| ())
                .map_err(std::io::Error::from)
        });
    }

    #[cfg(windows)]
    {
        const CREATE_NEW_CONSOLE: u32 = 0x00000010;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x00000200;
        cmd.creation_flags(CREATE_NEW_PROCESS_GROUP | CREATE_NEW_CONSOLE);
    }

    let child = cmd
        .spawn()
        .map_err(|e| ProcessError::spawn_failed(&spec.id, e.to_string()))?;

    let pid = child
        .id()
        .ok_or_else(|| ProcessError::spawn_failed(&spec.id, "process exited before its PID was read"))?;

    let pgid = if cfg!(unix) { Some(pid) } else { None };

    debug!("Detached process for {} started (PID: {}, PGID: {:?})", spec.id, pid, pgid);
    Ok(DetachedChild { pid, pgid, child })
}

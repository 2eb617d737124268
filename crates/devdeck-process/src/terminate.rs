//! Process termination primitives.
//!
//! Termination here is always forceful (SIGKILL on Unix, TerminateProcess on
//! Windows). A target that is already gone is reported as
//! [`KillOutcome::AlreadyExited`] rather than as an error: for a caller
//! tearing down a tree, "already dead" is the desired end state.

use devdeck_common::{ProcessError, ProcessResult};

/// Result of a kill attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    /// The signal was delivered.
    Killed,
    /// There was nothing to kill.
    AlreadyExited,
}

/// Force kill a process (SIGKILL on Unix, TerminateProcess on Windows).
///
/// Refuses PID 0 and the calling process itself.
pub fn force_kill(pid: u32) -> ProcessResult<KillOutcome> {
    if pid == 0 {
        return Err(ProcessError::kill_failed(pid, "refusing to signal PID 0"));
    }
    if pid == std::process::id() {
        return Err(ProcessError::kill_failed(
            pid,
            "refusing to signal the manager process itself",
        ));
    }

    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};

        let nix_pid = to_nix_pid(pid)?;
        match kill(nix_pid, Signal::SIGKILL) {
            Ok(()) => Ok(KillOutcome::Killed),
            Err(nix::errno::Errno::ESRCH) => Ok(KillOutcome::AlreadyExited),
            Err(e) => Err(ProcessError::kill_failed(pid, e.to_string())),
        }
    }

    #[cfg(windows)]
    {
        use windows::Win32::Foundation::CloseHandle;
        use windows::Win32::System::Threading::{OpenProcess, TerminateProcess, PROCESS_TERMINATE};

        unsafe {
            let handle = match OpenProcess(PROCESS_TERMINATE, false, pid) {
                Ok(h) if !h.is_invalid() => h,
                Ok(_) => {
                    return Err(ProcessError::kill_failed(
                        pid,
                        "Failed to open process for termination",
                    ));
                }
                Err(e) => {
                    const ERROR_INVALID_PARAMETER: u32 = 0x80070057;
                    if e.code().0 as u32 == ERROR_INVALID_PARAMETER {
                        return Ok(KillOutcome::AlreadyExited);
                    }
                    return Err(ProcessError::kill_failed(
                        pid,
                        format!("Failed to open process for termination: {}", e),
                    ));
                }
            };

            let result = TerminateProcess(handle, 1);
            let _ = CloseHandle(handle);

            result
                .map(|_| KillOutcome::Killed)
                .map_err(|e| ProcessError::kill_failed(pid, format!("TerminateProcess failed: {}", e)))
        }
    }
}

/// Force kill every process in a process group (Unix `killpg`).
///
/// Refuses the group of the calling process. On platforms without process
/// groups this is a no-op that reports [`KillOutcome::AlreadyExited`].
pub fn kill_process_group(pgid: u32) -> ProcessResult<KillOutcome> {
    if pgid <= 1 {
        return Err(ProcessError::kill_failed(
            pgid,
            "refusing to signal process group 0 or 1",
        ));
    }

    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::getpgrp;

        let nix_pgid = to_nix_pid(pgid)?;
        if nix_pgid == getpgrp() {
            return Err(ProcessError::kill_failed(
                pgid,
                "refusing to signal the manager's own process group",
            ));
        }
        match killpg(nix_pgid, Signal::SIGKILL) {
            Ok(()) => Ok(KillOutcome::Killed),
            Err(nix::errno::Errno::ESRCH) => Ok(KillOutcome::AlreadyExited),
            Err(e) => Err(ProcessError::kill_failed(pgid, e.to_string())),
        }
    }

    #[cfg(not(unix))]
    {
        Ok(KillOutcome::AlreadyExited)
    }
}

#[cfg(unix)]
fn to_nix_pid(pid: u32) -> ProcessResult<nix::unistd::Pid> {
    // Values above i32::MAX would turn into negative (group) targets
    i32::try_from(pid)
        .map(nix::unistd::Pid::from_raw)
        .map_err(|_| ProcessError::kill_failed(pid, "PID out of range"))
}

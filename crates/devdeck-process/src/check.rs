//! Process existence and identity checks.
//!
//! A PID alone does not identify a process: once a process exits and is
//! reaped, the OS is free to hand the same PID to an unrelated program. The
//! start time reported by the OS is captured at spawn and compared later.

use devdeck_common::{ProcessError, ProcessResult};
use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, System};

/// Check if a process with the given PID exists.
///
/// On Unix this uses `kill(pid, 0)`, which sends no signal but checks if the
/// process exists. On Windows it uses `OpenProcess`.
///
/// A zombie (exited but not yet reaped) still "exists" here; use
/// [`process_is_alive`] when exited-but-unreaped must count as dead.
///
/// # Returns
///
/// * `Ok(true)` - Process exists
/// * `Ok(false)` - Process does not exist
/// * `Err(_)` - Error occurred while checking
///
/// # Examples
///
/// ```rust,no_run
/// use devdeck_process::process_exists;
///
/// if process_exists(1234).unwrap() {
///     println!("Process 1234 is running");
/// }
/// ```
pub fn process_exists(pid: u32) -> ProcessResult<bool> {
    if pid == 0 {
        return Ok(false);
    }

    #[cfg(unix)]
    {
        process_exists_unix(pid)
    }

    #[cfg(windows)]
    {
        process_exists_windows(pid)
    }
}

#[cfg(unix)]
fn process_exists_unix(pid: u32) -> ProcessResult<bool> {
    use nix::sys::signal::kill;
    use nix::unistd::Pid as NixPid;

    let Ok(raw) = i32::try_from(pid) else {
        return Ok(false);
    };

    match kill(NixPid::from_raw(raw), None) {
        Ok(_) => Ok(true),
        Err(nix::errno::Errno::ESRCH) => Ok(false),
        // Exists, but owned by someone else
        Err(nix::errno::Errno::EPERM) => Ok(true),
        Err(e) => Err(ProcessError::query_failed(
            pid,
            format!("Failed to check process: {}", e),
        )),
    }
}

#[cfg(windows)]
fn process_exists_windows(pid: u32) -> ProcessResult<bool> {
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::System::Threading::{OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION};

    unsafe {
        let handle: HANDLE = match OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) {
            Ok(h) => h,
            Err(e) => {
                // ERROR_INVALID_PARAMETER means there is no such process
                let error_code = e.code().0 as u32;
                const ERROR_INVALID_PARAMETER: u32 = 0x80070057;
                const ERROR_ACCESS_DENIED: u32 = 0x80070005;

                if error_code == ERROR_INVALID_PARAMETER {
                    return Ok(false);
                }
                if error_code == ERROR_ACCESS_DENIED {
                    return Ok(true);
                }
                return Err(ProcessError::query_failed(
                    pid,
                    format!("Failed to check process: {}", e),
                ));
            }
        };

        let _ = CloseHandle(handle);
        Ok(true)
    }
}

/// Check if a process exists and has not exited.
///
/// Unlike [`process_exists`], a zombie counts as dead.
pub fn process_is_alive(pid: u32) -> bool {
    match process_exists(pid) {
        Ok(true) => !process_is_zombie(pid),
        Ok(false) => false,
        // Could not tell; treat as alive so callers never drop a live process
        Err(_) => true,
    }
}

fn process_is_zombie(pid: u32) -> bool {
    let mut system = System::new();
    let sys_pid = Pid::from_u32(pid);
    if !system.refresh_process_specifics(sys_pid, ProcessRefreshKind::new()) {
        return false;
    }
    system
        .process(sys_pid)
        .map(|process| matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
        .unwrap_or(false)
}

/// OS-reported start time of a process, in seconds since the Unix epoch.
///
/// Returns `None` if the process does not exist or cannot be inspected.
pub fn process_start_time(pid: u32) -> Option<u64> {
    if pid == 0 {
        return None;
    }
    let mut system = System::new();
    let sys_pid = Pid::from_u32(pid);
    if !system.refresh_process_specifics(sys_pid, ProcessRefreshKind::new()) {
        return None;
    }
    system.process(sys_pid).map(|process| process.start_time())
}

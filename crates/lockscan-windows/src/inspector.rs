use crate::handle::{LockingProcess, open_process};
use crate::owner::process_owner;
use crate::parameters::{get_command_line, get_working_directory};
use crate::window::main_window_title;
use lockscan_core::{
    LockHolder, LockingProcessesOptions, ProcessId, ProcessInfo, ProcessInspector,
};
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::debug;
use windows::Win32::System::Threading::{
    PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION, QueryFullProcessImageNameW,
};
use windows::core::PWSTR;

const IMAGE_PATH_CAPACITY: usize = 1024;

/// State of a lock holder at inspection time
enum Liveness {
    Running,
    /// Alive but every query handle was refused
    Inaccessible,
    Exited,
}

/// Builds [`ProcessInfo`] records from live Windows processes
pub struct WindowsProcessInspector {
    collect_parameters: bool,
    system: Mutex<System>,
}

impl WindowsProcessInspector {
    pub fn new(options: &LockingProcessesOptions) -> Self {
        Self {
            collect_parameters: options.collect_process_parameters,
            system: Mutex::new(System::new()),
        }
    }

    fn start_time(&self, process_id: ProcessId) -> Option<SystemTime> {
        let pid = Pid::from_u32(process_id);
        let mut system = self
            .system
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing(),
        );
        system
            .process(pid)
            .map(|process| UNIX_EPOCH + Duration::from_secs(process.start_time()))
    }

    fn liveness(holder: &LockHolder, started: Option<SystemTime>) -> Liveness {
        match LockingProcess::open(holder.process_id, holder.app_name.as_str()) {
            Some(_) => Liveness::Running,
            None if started.is_some() => Liveness::Inaccessible,
            None => Liveness::Exited,
        }
    }
}

/// Full image path through a handle carrying only PROCESS_QUERY_LIMITED_INFORMATION
fn image_path(process_id: ProcessId) -> Option<String> {
    let process = match open_process(process_id, PROCESS_QUERY_LIMITED_INFORMATION) {
        Ok(process) => process,
        Err(e) => {
            debug!(pid = process_id, error = %e, "Cannot open process for image path");
            return None;
        }
    };
    let mut buffer = [0u16; IMAGE_PATH_CAPACITY];
    let mut size = IMAGE_PATH_CAPACITY as u32;

    match unsafe {
        QueryFullProcessImageNameW(
            process.raw(),
            PROCESS_NAME_WIN32,
            PWSTR(buffer.as_mut_ptr()),
            &mut size,
        )
    } {
        Ok(()) => Some(String::from_utf16_lossy(&buffer[..size as usize])),
        Err(e) => {
            debug!(pid = process_id, error = %e, "QueryFullProcessImageNameW failed");
            None
        }
    }
}

impl ProcessInspector for WindowsProcessInspector {
    fn inspect(&self, holder: &LockHolder, locked_path: &Path) -> ProcessInfo {
        let pid = holder.process_id;
        let mut info = ProcessInfo::new(pid, holder.app_name.as_str(), locked_path);

        let started = self.start_time(pid);
        match Self::liveness(holder, started) {
            Liveness::Running => {}
            Liveness::Inaccessible => {
                debug!(
                    pid,
                    name = holder.display_name(),
                    "Lock holder cannot be opened; collecting what is visible"
                );
            }
            Liveness::Exited => {
                debug!(
                    pid,
                    name = holder.display_name(),
                    "Lock holder exited before inspection"
                );
                return info;
            }
        }

        info.start_time = started;
        if let Some(path) = image_path(pid) {
            info.path = path;
        }

        info.user_name = process_owner(pid);
        info.main_window_title = main_window_title(pid);
        if self.collect_parameters {
            info.command_line = get_command_line(pid);
            info.working_directory = get_working_directory(pid);
        }

        info
    }
}

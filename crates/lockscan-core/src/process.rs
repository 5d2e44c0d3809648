use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Unique identifier for a process
pub type ProcessId = u32;

/// Image path placeholder when the process could not be queried
pub const ACCESS_DENIED: &str = "Access Denied";

/// Owner placeholder when the process token could not be read
pub const UNKNOWN_USER: &str = "Unknown";

/// Diagnostic record for a process holding at least one lock found by a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    pub process_id: ProcessId,
    /// Application name as reported by the Restart Manager
    pub process_name: String,
    pub locked_paths: BTreeSet<PathBuf>,
    pub working_directory: String,
    pub command_line: String,
    /// Full image path, or [`ACCESS_DENIED`]
    pub path: String,
    pub main_window_title: String,
    pub start_time: Option<SystemTime>,
    /// `DOMAIN\user`, a raw SID string, or [`UNKNOWN_USER`]
    pub user_name: String,
}

impl ProcessInfo {
    pub fn new(
        process_id: ProcessId,
        process_name: impl Into<String>,
        locked_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            process_id,
            process_name: process_name.into(),
            locked_paths: BTreeSet::from([locked_path.into()]),
            working_directory: String::new(),
            command_line: String::new(),
            path: ACCESS_DENIED.to_string(),
            main_window_title: String::new(),
            start_time: None,
            user_name: UNKNOWN_USER.to_string(),
        }
    }

    /// Record another locked path; returns false if it was already known
    pub fn add_locked_path(&mut self, path: impl Into<PathBuf>) -> bool {
        self.locked_paths.insert(path.into())
    }

    pub fn holds_lock_on(&self, path: &Path) -> bool {
        self.locked_paths.contains(path)
    }
}

/// One process reported by a single lock check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHolder {
    pub process_id: ProcessId,
    pub app_name: String,
    /// Short service name when the holder is a Windows service
    pub service_short_name: Option<String>,
}

impl LockHolder {
    pub fn new(process_id: ProcessId, app_name: impl Into<String>) -> Self {
        Self {
            process_id,
            app_name: app_name.into(),
            service_short_name: None,
        }
    }

    /// Attach a service name; empty names are ignored
    pub fn with_service(mut self, service_short_name: impl Into<String>) -> Self {
        let service_short_name = service_short_name.into();
        if !service_short_name.is_empty() {
            self.service_short_name = Some(service_short_name);
        }
        self
    }

    /// Service name if there is one, else the application name
    pub fn display_name(&self) -> &str {
        self.service_short_name.as_deref().unwrap_or(&self.app_name)
    }
}

/// Result of asking whether a single file is locked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockCheckOutcome {
    /// The file is held open by these processes
    Locked(Vec<LockHolder>),
    /// Nobody holds the file
    NotLocked,
    /// The check itself failed, so the answer is unknown
    Indeterminate(String),
}

impl LockCheckOutcome {
    pub fn holders(&self) -> &[LockHolder] {
        match self {
            LockCheckOutcome::Locked(holders) => holders,
            _ => &[],
        }
    }
}

/// Field of RTL_USER_PROCESS_PARAMETERS that can be read from another process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterField {
    CommandLine,
    CurrentDirectory,
}

impl ParameterField {
    pub fn as_str(self) -> &'static str {
        match self {
            ParameterField::CommandLine => "command line",
            ParameterField::CurrentDirectory => "current directory",
        }
    }
}

/// Answers "who holds this file open"
pub trait LockProbe: Send + Sync {
    fn check(&self, path: &Path) -> LockCheckOutcome;
}

/// Builds the diagnostic record for a newly discovered lock holder.
///
/// Implementations must not fail: any sub-lookup that breaks leaves its
/// field at the default.
pub trait ProcessInspector: Send + Sync {
    fn inspect(&self, holder: &LockHolder, locked_path: &Path) -> ProcessInfo;
}

impl<T: LockProbe + ?Sized> LockProbe for &T {
    fn check(&self, path: &Path) -> LockCheckOutcome {
        (**self).check(path)
    }
}

impl<T: ProcessInspector + ?Sized> ProcessInspector for &T {
    fn inspect(&self, holder: &LockHolder, locked_path: &Path) -> ProcessInfo {
        (**self).inspect(holder, locked_path)
    }
}

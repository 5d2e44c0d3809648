//! Find the processes holding files open.
//!
//! The entry points here pick the platform backend at compile time. Only
//! Windows has one; elsewhere the scans return [`LockScanError::Unsupported`]
//! and the parameter accessors return empty strings.

mod factory;
mod logging;

pub use factory::{PlatformLockScannerFactory, is_supported, platform_name};
pub use lockscan_core::{
    LockScanError, LockingProcessesOptions, LockingProcessesOptionsBuilder, ProcessId,
    ProcessInfo, ScanReport, UNLIMITED_DEPTH,
};
pub use logging::{init_json_tracing, init_tracing};
pub use tokio_util::sync::CancellationToken;

#[cfg(windows)]
pub use lockscan_windows::LockingProcess;

#[cfg(windows)]
use lockscan_core::LockScannerFactory;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Every process holding a lock on `path` or, per `options`, on files below it
pub fn get_locking_processes_info(
    path: impl AsRef<Path>,
    options: &LockingProcessesOptions,
) -> Result<Vec<ProcessInfo>, LockScanError> {
    Ok(get_locking_processes_report(path, options, None)?.processes)
}

/// Like [`get_locking_processes_info`] but returns the full scan report and
/// stops early once `cancellation` fires
pub fn get_locking_processes_report(
    path: impl AsRef<Path>,
    options: &LockingProcessesOptions,
    cancellation: Option<&CancellationToken>,
) -> Result<ScanReport, LockScanError> {
    #[cfg(windows)]
    {
        let mut scanner = PlatformLockScannerFactory::create_scanner(options);
        if let Some(token) = cancellation {
            scanner = scanner.with_cancellation(token.clone());
        }
        scanner.scan_report(path.as_ref(), options)
    }

    #[cfg(not(windows))]
    {
        let _ = (options, cancellation);
        debug!(path = %path.as_ref().display(), "Lock scan requested on unsupported platform");
        Err(LockScanError::Unsupported(platform_name()))
    }
}

/// Runs [`get_locking_processes_info`] on the blocking thread pool
pub async fn get_locking_processes_info_async(
    path: impl Into<PathBuf>,
    options: LockingProcessesOptions,
) -> Result<Vec<ProcessInfo>, LockScanError> {
    let path = path.into();
    tokio::task::spawn_blocking(move || get_locking_processes_info(&path, &options))
        .await
        .map_err(|e| LockScanError::TaskJoin(e.to_string()))?
}

/// Live handles to the processes locking `path`. Holders that exit before
/// they can be opened are dropped.
#[cfg(windows)]
pub fn get_locking_processes(
    path: impl AsRef<Path>,
    recursive: bool,
) -> Result<Vec<LockingProcess>, LockScanError> {
    let options = if recursive {
        LockingProcessesOptions::recursive()
    } else {
        LockingProcessesOptions::top_level_only()
    };

    let processes = get_locking_processes_info(path, &options)?
        .into_iter()
        .filter_map(|info| {
            let process = LockingProcess::open(info.process_id, info.process_name);
            if process.is_none() {
                debug!(pid = info.process_id, "Locking process exited before it could be opened");
            }
            process
        })
        .collect();

    Ok(processes)
}

/// Command line of `process_id`, or an empty string when it cannot be read
pub fn get_command_line(process_id: ProcessId) -> String {
    #[cfg(windows)]
    return lockscan_windows::get_command_line(process_id);

    #[cfg(not(windows))]
    {
        debug!(pid = process_id, "Process parameters are only readable on Windows");
        String::new()
    }
}

/// Current directory of `process_id`, or an empty string when it cannot be read
pub fn get_working_directory(process_id: ProcessId) -> String {
    #[cfg(windows)]
    return lockscan_windows::get_working_directory(process_id);

    #[cfg(not(windows))]
    {
        debug!(pid = process_id, "Process parameters are only readable on Windows");
        String::new()
    }
}

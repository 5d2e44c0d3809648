//! Windows implementation of the lock scanner: Restart Manager lock probe,
//! PEB readers for every bitness combination, and the process inspector.

#![cfg(windows)]

mod bitness;
mod error;
mod handle;
mod inspector;
mod memory;
mod owner;
mod parameters;
mod restart_manager;
mod window;

pub use bitness::{caller_is_64bit, os_is_64bit, resolve as resolve_bitness};
pub use error::NativeError;
pub use handle::LockingProcess;
pub use inspector::WindowsProcessInspector;
pub use memory::RemoteStrategy;
pub use owner::process_owner;
pub use parameters::{get_command_line, get_working_directory, read_parameter};
pub use restart_manager::{RestartManagerProbe, RmSession, holders_of};
pub use window::main_window_title;

use lockscan_core::{LockScanner, LockScannerFactory, LockingProcessesOptions};

/// Windows-specific lock scanner factory
pub struct WindowsLockScannerFactory;

impl LockScannerFactory for WindowsLockScannerFactory {
    type Probe = RestartManagerProbe;
    type Inspector = WindowsProcessInspector;

    fn create_scanner(
        options: &LockingProcessesOptions,
    ) -> LockScanner<RestartManagerProbe, WindowsProcessInspector> {
        LockScanner::new(RestartManagerProbe, WindowsProcessInspector::new(options))
    }

    fn platform_name() -> &'static str {
        "Windows"
    }
}

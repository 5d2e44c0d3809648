#[cfg(windows)]
use lockscan_core::{LockScanner, LockScannerFactory, LockingProcessesOptions};

/// Platform-independent factory that selects the appropriate implementation at compile time
pub struct PlatformLockScannerFactory;

#[cfg(windows)]
impl LockScannerFactory for PlatformLockScannerFactory {
    type Probe = lockscan_windows::RestartManagerProbe;
    type Inspector = lockscan_windows::WindowsProcessInspector;

    fn create_scanner(options: &LockingProcessesOptions) -> LockScanner<Self::Probe, Self::Inspector> {
        lockscan_windows::WindowsLockScannerFactory::create_scanner(options)
    }

    fn platform_name() -> &'static str {
        lockscan_windows::WindowsLockScannerFactory::platform_name()
    }
}

/// Name of the platform backend compiled into this build
pub fn platform_name() -> &'static str {
    #[cfg(windows)]
    return <PlatformLockScannerFactory as LockScannerFactory>::platform_name();

    #[cfg(not(windows))]
    return std::env::consts::OS;
}

/// Whether this build can actually scan for locks
pub fn is_supported() -> bool {
    cfg!(windows)
}

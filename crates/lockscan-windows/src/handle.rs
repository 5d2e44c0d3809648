use crate::error::NativeError;
use lockscan_core::ProcessId;
use windows::Win32::Foundation::{CloseHandle, HANDLE, WAIT_TIMEOUT};
use windows::Win32::System::Threading::{
    GetExitCodeProcess, OpenProcess, PROCESS_ACCESS_RIGHTS, PROCESS_QUERY_LIMITED_INFORMATION,
    PROCESS_SYNCHRONIZE, WaitForSingleObject,
};

/// Exit code reported for a process that has not terminated
const STILL_ACTIVE: u32 = 259;

/// Kernel handle closed on drop
#[derive(Debug)]
pub struct OwnedHandle(HANDLE);

impl OwnedHandle {
    pub fn new(handle: HANDLE) -> Option<Self> {
        if handle.is_invalid() {
            None
        } else {
            Some(Self(handle))
        }
    }

    pub fn raw(&self) -> HANDLE {
        self.0
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

// The handle value is process-wide; nothing ties it to the opening thread.
unsafe impl Send for OwnedHandle {}
unsafe impl Sync for OwnedHandle {}

pub fn open_process(
    process_id: ProcessId,
    access: PROCESS_ACCESS_RIGHTS,
) -> Result<OwnedHandle, NativeError> {
    let handle =
        unsafe { OpenProcess(access, false, process_id) }.map_err(NativeError::win32("OpenProcess"))?;
    OwnedHandle::new(handle).ok_or(NativeError::InvalidHandle("OpenProcess"))
}

/// How a held handle can tell whether its process is still alive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LivenessCheck {
    /// Handle carries SYNCHRONIZE
    Wait,
    /// Query-only handle; compare the exit code against STILL_ACTIVE
    ExitCode,
}

/// A live process that was found holding a lock
#[derive(Debug)]
pub struct LockingProcess {
    process_id: ProcessId,
    name: String,
    handle: OwnedHandle,
    check: LivenessCheck,
}

impl LockingProcess {
    /// Open `process_id`; `None` if it has exited or cannot be opened even
    /// for limited queries.
    ///
    /// Processes whose DACL refuses SYNCHRONIZE are still opened, with a
    /// query-only handle.
    pub fn open(process_id: ProcessId, name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        let process = match Self::open_waitable(process_id, name.clone()) {
            Some(process) => process,
            None => Self::open_query_only(process_id, name)?,
        };
        process.is_running().then_some(process)
    }

    fn open_waitable(process_id: ProcessId, name: String) -> Option<Self> {
        let handle = open_process(
            process_id,
            PROCESS_QUERY_LIMITED_INFORMATION | PROCESS_SYNCHRONIZE,
        )
        .ok()?;
        Some(Self {
            process_id,
            name,
            handle,
            check: LivenessCheck::Wait,
        })
    }

    fn open_query_only(process_id: ProcessId, name: String) -> Option<Self> {
        let handle = open_process(process_id, PROCESS_QUERY_LIMITED_INFORMATION).ok()?;
        Some(Self {
            process_id,
            name,
            handle,
            check: LivenessCheck::ExitCode,
        })
    }

    pub fn process_id(&self) -> ProcessId {
        self.process_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Borrow the raw handle; it stays owned by `self`
    pub fn raw_handle(&self) -> HANDLE {
        self.handle.raw()
    }

    pub fn is_running(&self) -> bool {
        match self.check {
            LivenessCheck::Wait => unsafe {
                WaitForSingleObject(self.handle.raw(), 0) == WAIT_TIMEOUT
            },
            LivenessCheck::ExitCode => {
                let mut code = 0u32;
                unsafe { GetExitCodeProcess(self.handle.raw(), &mut code) }.is_ok()
                    && code == STILL_ACTIVE
            }
        }
    }
}

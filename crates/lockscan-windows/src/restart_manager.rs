//! Lock probe backed by the Restart Manager.
//!
//! Every checked file gets its own short-lived session: start, register the
//! single path, list the affected processes, end.

use crate::error::NativeError;
use lockscan_core::two_phase::{ListStatus, fetch_list};
use lockscan_core::{LockCheckOutcome, LockHolder, LockProbe};
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use tracing::{debug, trace};
use windows::Win32::Foundation::{ERROR_MORE_DATA, ERROR_SUCCESS, WIN32_ERROR};
use windows::Win32::System::RestartManager::{
    CCH_RM_SESSION_KEY, RM_PROCESS_INFO, RmEndSession, RmGetList, RmRegisterResources,
    RmStartSession,
};
use windows::core::{PCWSTR, PWSTR};

/// Restart Manager session, ended on drop
#[derive(Debug)]
pub struct RmSession {
    handle: u32,
    key: String,
}

impl RmSession {
    pub fn start() -> Result<Self, NativeError> {
        let mut handle = 0u32;
        let mut key = [0u16; CCH_RM_SESSION_KEY as usize + 1];

        let status = unsafe { RmStartSession(&mut handle, None, PWSTR(key.as_mut_ptr())) };
        check("RmStartSession", status)?;

        let key = wide_to_string(&key);
        trace!(session = handle, %key, "Restart Manager session started");
        Ok(Self { handle, key })
    }

    /// Unique key the system generated for this session
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn register_file(&self, path: &Path) -> Result<(), NativeError> {
        let wide: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();
        let files = [PCWSTR(wide.as_ptr())];

        let status = unsafe { RmRegisterResources(self.handle, Some(&files), None, None) };
        check("RmRegisterResources", status)
    }

    /// Processes using any registered resource
    pub fn affected_processes(&self) -> Result<Vec<RM_PROCESS_INFO>, NativeError> {
        fetch_list(|buffer: &mut [RM_PROCESS_INFO]| {
            let mut needed = 0u32;
            let mut count = buffer.len() as u32;
            let mut reasons = 0u32;
            let entries = (!buffer.is_empty()).then_some(buffer.as_mut_ptr());

            let status =
                unsafe { RmGetList(self.handle, &mut needed, &mut count, entries, &mut reasons) };
            match status {
                ERROR_SUCCESS => ListStatus::Complete {
                    count: count as usize,
                },
                ERROR_MORE_DATA => ListStatus::MoreData {
                    needed: needed as usize,
                },
                WIN32_ERROR(code) => ListStatus::Failed(code),
            }
        })
        .map_err(|source| NativeError::List {
            call: "RmGetList",
            source,
        })
    }
}

impl Drop for RmSession {
    fn drop(&mut self) {
        let status = unsafe { RmEndSession(self.handle) };
        if status != ERROR_SUCCESS {
            debug!(session = self.handle, code = status.0, "RmEndSession failed");
        }
    }
}

fn check(call: &'static str, status: WIN32_ERROR) -> Result<(), NativeError> {
    if status == ERROR_SUCCESS {
        Ok(())
    } else {
        Err(NativeError::Code {
            call,
            code: status.0,
        })
    }
}

fn wide_to_string(wide: &[u16]) -> String {
    let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
    String::from_utf16_lossy(&wide[..len])
}

fn to_holder(info: &RM_PROCESS_INFO) -> LockHolder {
    LockHolder::new(info.Process.dwProcessId, wide_to_string(&info.strAppName))
        .with_service(wide_to_string(&info.strServiceShortName))
}

/// Processes holding `path` open, according to a fresh session
pub fn holders_of(path: &Path) -> Result<Vec<LockHolder>, NativeError> {
    let session = RmSession::start()?;
    session.register_file(path)?;
    let holders = session
        .affected_processes()?
        .iter()
        .map(to_holder)
        .collect();
    Ok(holders)
}

/// [`LockProbe`] that asks the Restart Manager about each file
#[derive(Debug, Default, Clone, Copy)]
pub struct RestartManagerProbe;

impl LockProbe for RestartManagerProbe {
    fn check(&self, path: &Path) -> LockCheckOutcome {
        match holders_of(path) {
            Ok(holders) if holders.is_empty() => LockCheckOutcome::NotLocked,
            Ok(holders) => LockCheckOutcome::Locked(holders),
            Err(e) => LockCheckOutcome::Indeterminate(e.to_string()),
        }
    }
}

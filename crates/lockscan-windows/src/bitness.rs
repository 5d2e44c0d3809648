use crate::error::NativeError;
use crate::handle::OwnedHandle;
use lockscan_core::TargetBitness;
use windows::Win32::Foundation::HANDLE;
use windows::Win32::System::Threading::{GetCurrentProcess, IsWow64Process};
use windows::core::BOOL;

pub fn caller_is_64bit() -> bool {
    cfg!(target_pointer_width = "64")
}

/// A 32-bit caller is on a 64-bit OS exactly when it runs under WOW64
pub fn os_is_64bit() -> bool {
    caller_is_64bit() || is_wow64(unsafe { GetCurrentProcess() }).unwrap_or(false)
}

pub fn is_wow64(process: HANDLE) -> Result<bool, NativeError> {
    let mut wow64 = BOOL::default();
    unsafe { IsWow64Process(process, &mut wow64) }.map_err(NativeError::win32("IsWow64Process"))?;
    Ok(wow64.as_bool())
}

/// Classify `process` relative to the running binary
pub fn resolve(process: &OwnedHandle) -> Result<TargetBitness, NativeError> {
    Ok(TargetBitness::classify(
        os_is_64bit(),
        caller_is_64bit(),
        is_wow64(process.raw())?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::open_process;
    use windows::Win32::System::Threading::PROCESS_QUERY_LIMITED_INFORMATION;

    #[test]
    fn test_current_process_is_native() {
        let process = open_process(std::process::id(), PROCESS_QUERY_LIMITED_INFORMATION).unwrap();
        let bitness = resolve(&process).unwrap();
        // a process is never cross-bitness relative to itself
        assert_ne!(bitness, TargetBitness::CrossFrom32To64);
        if caller_is_64bit() {
            assert_eq!(bitness, TargetBitness::Native);
        }
    }

    #[test]
    fn test_64bit_caller_implies_64bit_os() {
        if caller_is_64bit() {
            assert!(os_is_64bit());
        }
    }
}

//! The three ways of reading another process's PEB, one per [`TargetBitness`].

use crate::handle::OwnedHandle;
use lockscan_core::{PebLayout, RemoteMemory, TargetBitness};
use std::ffi::c_void;
use std::mem::size_of;
use tracing::trace;
use windows::Wdk::System::Threading::{
    NtQueryInformationProcess, ProcessBasicInformation, ProcessWow64Information,
};
use windows::Win32::Foundation::HANDLE;
use windows::Win32::System::Diagnostics::Debug::ReadProcessMemory;

/// PROCESS_BASIC_INFORMATION in the caller's own layout
#[repr(C)]
#[derive(Default)]
struct BasicInformation {
    exit_status: i32,
    peb_base_address: usize,
    affinity_mask: usize,
    base_priority: i32,
    unique_process_id: usize,
    inherited_from_unique_process_id: usize,
}

/// Strategy chosen once per target process
pub enum RemoteStrategy<'a> {
    /// Same bitness: basic information query and ReadProcessMemory
    Native(&'a OwnedHandle),
    /// 32-bit target under WOW64: WOW64 information query for the PEB32
    Wow64(&'a OwnedHandle),
    /// 32-bit caller, 64-bit target: the NtWow64 *64 family
    #[cfg(target_pointer_width = "32")]
    Cross64(&'a OwnedHandle),
}

impl<'a> RemoteStrategy<'a> {
    pub fn select(process: &'a OwnedHandle, bitness: TargetBitness) -> Option<Self> {
        match bitness {
            TargetBitness::Native => Some(RemoteStrategy::Native(process)),
            TargetBitness::TargetIsWow64 => Some(RemoteStrategy::Wow64(process)),
            #[cfg(target_pointer_width = "32")]
            TargetBitness::CrossFrom32To64 => Some(RemoteStrategy::Cross64(process)),
            // a 64-bit caller is never the 32-bit side of a cross read
            #[cfg(not(target_pointer_width = "32"))]
            TargetBitness::CrossFrom32To64 => None,
        }
    }

    fn bitness(&self) -> TargetBitness {
        match self {
            RemoteStrategy::Native(_) => TargetBitness::Native,
            RemoteStrategy::Wow64(_) => TargetBitness::TargetIsWow64,
            #[cfg(target_pointer_width = "32")]
            RemoteStrategy::Cross64(_) => TargetBitness::CrossFrom32To64,
        }
    }
}

impl RemoteMemory for RemoteStrategy<'_> {
    fn layout(&self) -> PebLayout {
        self.bitness().layout(PebLayout::current())
    }

    fn peb_address(&self) -> Option<u64> {
        match self {
            RemoteStrategy::Native(process) => native_peb_address(process.raw()),
            RemoteStrategy::Wow64(process) => wow64_peb_address(process.raw()),
            #[cfg(target_pointer_width = "32")]
            RemoteStrategy::Cross64(process) => cross64::peb_address(process.raw()),
        }
    }

    fn read(&self, address: u64, len: usize) -> Option<Vec<u8>> {
        match self {
            RemoteStrategy::Native(process) | RemoteStrategy::Wow64(process) => {
                read_virtual(process.raw(), address, len)
            }
            #[cfg(target_pointer_width = "32")]
            RemoteStrategy::Cross64(process) => cross64::read(process.raw(), address, len),
        }
    }
}

fn native_peb_address(process: HANDLE) -> Option<u64> {
    let mut info = BasicInformation::default();
    let mut returned = 0u32;
    let status = unsafe {
        NtQueryInformationProcess(
            process,
            ProcessBasicInformation,
            (&mut info as *mut BasicInformation).cast::<c_void>(),
            size_of::<BasicInformation>() as u32,
            &mut returned,
        )
    };
    if status.is_err() {
        trace!(status = status.0, "ProcessBasicInformation query failed");
        return None;
    }
    Some(info.peb_base_address as u64)
}

fn wow64_peb_address(process: HANDLE) -> Option<u64> {
    let mut peb32: usize = 0;
    let mut returned = 0u32;
    let status = unsafe {
        NtQueryInformationProcess(
            process,
            ProcessWow64Information,
            (&mut peb32 as *mut usize).cast::<c_void>(),
            size_of::<usize>() as u32,
            &mut returned,
        )
    };
    if status.is_err() {
        trace!(status = status.0, "ProcessWow64Information query failed");
        return None;
    }
    Some(peb32 as u64)
}

fn read_virtual(process: HANDLE, address: u64, len: usize) -> Option<Vec<u8>> {
    let address = usize::try_from(address).ok()?;
    let mut buffer = vec![0u8; len];
    let mut read = 0usize;

    if let Err(e) = unsafe {
        ReadProcessMemory(
            process,
            address as *const c_void,
            buffer.as_mut_ptr().cast::<c_void>(),
            len,
            Some(&mut read),
        )
    } {
        trace!(address = format_args!("{address:#x}"), len, error = %e, "ReadProcessMemory failed");
        return None;
    }

    (read == len).then_some(buffer)
}

#[cfg(target_pointer_width = "32")]
mod cross64 {
    use std::ffi::c_void;
    use std::mem::size_of;
    use tracing::trace;
    use windows::Wdk::System::Threading::{PROCESSINFOCLASS, ProcessBasicInformation};
    use windows::Win32::Foundation::{HANDLE, NTSTATUS};

    // Only exported by the WOW64 ntdll, so only linkable from 32-bit builds.
    #[link(name = "ntdll")]
    unsafe extern "system" {
        fn NtWow64QueryInformationProcess64(
            process: HANDLE,
            class: PROCESSINFOCLASS,
            information: *mut c_void,
            length: u32,
            returned: *mut u32,
        ) -> NTSTATUS;

        fn NtWow64ReadVirtualMemory64(
            process: HANDLE,
            base_address: u64,
            buffer: *mut c_void,
            size: u64,
            read: *mut u64,
        ) -> NTSTATUS;
    }

    /// PROCESS_BASIC_INFORMATION in the 64-bit layout
    #[repr(C)]
    #[derive(Default)]
    struct BasicInformation64 {
        exit_status: i32,
        _reserved0: u32,
        peb_base_address: u64,
        affinity_mask: u64,
        base_priority: i32,
        _reserved1: u32,
        unique_process_id: u64,
        inherited_from_unique_process_id: u64,
    }

    pub(super) fn peb_address(process: HANDLE) -> Option<u64> {
        let mut info = BasicInformation64::default();
        let mut returned = 0u32;
        let status = unsafe {
            NtWow64QueryInformationProcess64(
                process,
                ProcessBasicInformation,
                (&mut info as *mut BasicInformation64).cast::<c_void>(),
                size_of::<BasicInformation64>() as u32,
                &mut returned,
            )
        };
        if status.is_err() {
            trace!(status = status.0, "NtWow64QueryInformationProcess64 failed");
            return None;
        }
        Some(info.peb_base_address)
    }

    pub(super) fn read(process: HANDLE, address: u64, len: usize) -> Option<Vec<u8>> {
        let mut buffer = vec![0u8; len];
        let mut read = 0u64;
        let status = unsafe {
            NtWow64ReadVirtualMemory64(
                process,
                address,
                buffer.as_mut_ptr().cast::<c_void>(),
                len as u64,
                &mut read,
            )
        };
        if status.is_err() {
            trace!(status = status.0, "NtWow64ReadVirtualMemory64 failed");
            return None;
        }
        (read == len as u64).then_some(buffer)
    }
}

use lockscan_core::two_phase::ListFetchError;
use thiserror::Error;

/// Failure of a native call. Never leaves this crate's public operations;
/// it is logged and collapsed into a missing field or an indeterminate check.
#[derive(Error, Debug)]
pub enum NativeError {
    #[error("{call} failed: {source}")]
    Win32 {
        call: &'static str,
        #[source]
        source: windows::core::Error,
    },

    #[error("{call} returned error code {code}")]
    Code { call: &'static str, code: u32 },

    #[error("{call} list query failed: {source}")]
    List {
        call: &'static str,
        #[source]
        source: ListFetchError,
    },

    #[error("{0} returned an invalid handle")]
    InvalidHandle(&'static str),
}

impl NativeError {
    pub fn win32(call: &'static str) -> impl FnOnce(windows::core::Error) -> Self {
        move |source| NativeError::Win32 { call, source }
    }
}

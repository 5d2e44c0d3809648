use crate::error::NativeError;
use crate::handle::{OwnedHandle, open_process};
use lockscan_core::sid::format_sid;
use lockscan_core::two_phase::{ListStatus, fetch_list};
use lockscan_core::{ProcessId, UNKNOWN_USER};
use std::ffi::c_void;
use std::mem::size_of;
use tracing::debug;
use windows::Win32::Foundation::{ERROR_INSUFFICIENT_BUFFER, HANDLE};
use windows::Win32::Security::{
    GetSidIdentifierAuthority, GetSidSubAuthority, GetSidSubAuthorityCount, GetTokenInformation,
    IsValidSid, LookupAccountSidW, PSID, SID_NAME_USE, TOKEN_QUERY, TOKEN_USER, TokenUser,
};
use windows::Win32::System::Threading::{OpenProcessToken, PROCESS_QUERY_LIMITED_INFORMATION};
use windows::core::{PCWSTR, PWSTR};

const NAME_CAPACITY: usize = 256;

/// `DOMAIN\user` owning `process_id`, the raw SID string when the account
/// cannot be resolved, or [`UNKNOWN_USER`]
pub fn process_owner(process_id: ProcessId) -> String {
    match token_user(process_id) {
        Ok(token_user) => describe_sid(token_user.sid()),
        Err(e) => {
            debug!(pid = process_id, error = %e, "Cannot read process token");
            UNKNOWN_USER.to_string()
        }
    }
}

/// TOKEN_USER copied out of the process token. Stored as u64 words so the
/// embedded SID pointer stays aligned.
struct TokenUserBuffer(Vec<u64>);

impl TokenUserBuffer {
    fn sid(&self) -> PSID {
        let token_user = self.0.as_ptr().cast::<TOKEN_USER>();
        unsafe { (*token_user).User.Sid }
    }
}

fn token_user(process_id: ProcessId) -> Result<TokenUserBuffer, NativeError> {
    let process = open_process(process_id, PROCESS_QUERY_LIMITED_INFORMATION)?;

    let mut raw = HANDLE::default();
    unsafe { OpenProcessToken(process.raw(), TOKEN_QUERY, &mut raw) }
        .map_err(NativeError::win32("OpenProcessToken"))?;
    let token = OwnedHandle::new(raw).ok_or(NativeError::InvalidHandle("OpenProcessToken"))?;

    let words = fetch_list(|buffer: &mut [u64]| {
        let bytes = (buffer.len() * size_of::<u64>()) as u32;
        let target = (!buffer.is_empty()).then_some(buffer.as_mut_ptr().cast::<c_void>());
        let mut needed = 0u32;

        match unsafe { GetTokenInformation(token.raw(), TokenUser, target, bytes, &mut needed) } {
            Ok(()) => ListStatus::Complete {
                count: buffer.len(),
            },
            Err(e) if e.code() == ERROR_INSUFFICIENT_BUFFER.to_hresult() => ListStatus::MoreData {
                needed: (needed as usize).div_ceil(size_of::<u64>()),
            },
            Err(e) => ListStatus::Failed(e.code().0 as u32),
        }
    })
    .map_err(|source| NativeError::List {
        call: "GetTokenInformation",
        source,
    })?;

    if words.is_empty() {
        return Err(NativeError::Code {
            call: "GetTokenInformation",
            code: 0,
        });
    }
    Ok(TokenUserBuffer(words))
}

fn describe_sid(sid: PSID) -> String {
    match account_name(sid) {
        Ok(name) => name,
        Err(e) => {
            debug!(error = %e, "Account lookup failed; using SID string");
            sid_string(sid).unwrap_or_else(|| UNKNOWN_USER.to_string())
        }
    }
}

fn account_name(sid: PSID) -> Result<String, NativeError> {
    let mut name = [0u16; NAME_CAPACITY];
    let mut domain = [0u16; NAME_CAPACITY];
    let mut name_len = NAME_CAPACITY as u32;
    let mut domain_len = NAME_CAPACITY as u32;
    let mut kind = SID_NAME_USE::default();

    unsafe {
        LookupAccountSidW(
            PCWSTR::null(),
            sid,
            Some(PWSTR(name.as_mut_ptr())),
            &mut name_len,
            Some(PWSTR(domain.as_mut_ptr())),
            &mut domain_len,
            &mut kind,
        )
    }
    .map_err(NativeError::win32("LookupAccountSidW"))?;

    let name = String::from_utf16_lossy(&name[..name_len as usize]);
    let domain = String::from_utf16_lossy(&domain[..domain_len as usize]);
    Ok(if domain.is_empty() {
        name
    } else {
        format!("{domain}\\{name}")
    })
}

fn sid_string(sid: PSID) -> Option<String> {
    unsafe {
        if !IsValidSid(sid).as_bool() {
            return None;
        }
        // SID layout starts with the revision byte
        let revision = *sid.0.cast::<u8>();
        let authority = (*GetSidIdentifierAuthority(sid)).Value;
        let count = *GetSidSubAuthorityCount(sid);
        let subs: Vec<u32> = (0..u32::from(count))
            .map(|i| *GetSidSubAuthority(sid, i))
            .collect();
        Some(format_sid(revision, authority, &subs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_own_process_has_owner() {
        let owner = process_owner(std::process::id());
        assert_ne!(owner, UNKNOWN_USER);
        assert!(!owner.is_empty());
    }

    #[test]
    fn test_own_sid_formats() {
        let token_user = token_user(std::process::id()).unwrap();
        let sid = sid_string(token_user.sid()).unwrap();
        assert!(sid.starts_with("S-1-"), "{sid}");
    }

    #[test]
    fn test_own_account_resolves_to_name() {
        let token_user = token_user(std::process::id()).unwrap();
        let name = account_name(token_user.sid()).unwrap();
        assert!(!name.is_empty());
        assert!(!name.starts_with("S-1-"), "{name}");
        assert_eq!(process_owner(std::process::id()), name);
    }

    #[test]
    fn test_missing_process_is_unknown() {
        assert_eq!(process_owner(0xFFFF_FFFD), UNKNOWN_USER);
    }
}

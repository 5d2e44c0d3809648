use lockscan_core::ProcessId;
use windows::Win32::Foundation::{HWND, LPARAM};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GW_OWNER, GetWindow, GetWindowTextLengthW, GetWindowTextW,
    GetWindowThreadProcessId, IsWindowVisible,
};
use windows::core::BOOL;

struct TitleSearch {
    process_id: ProcessId,
    title: Option<String>,
}

/// A main window is a visible, unowned top-level window with a title
fn is_main_window(visible: bool, has_owner: bool, title_len: i32) -> bool {
    visible && !has_owner && title_len > 0
}

fn has_owner(hwnd: HWND) -> bool {
    unsafe { GetWindow(hwnd, GW_OWNER) }.is_ok_and(|owner| !owner.is_invalid())
}

unsafe extern "system" fn visit_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let search = unsafe { &mut *(lparam.0 as *mut TitleSearch) };

    let mut owner_pid = 0u32;
    unsafe { GetWindowThreadProcessId(hwnd, Some(&mut owner_pid)) };
    if owner_pid != search.process_id {
        return true.into();
    }

    let visible = unsafe { IsWindowVisible(hwnd) }.as_bool();
    let len = unsafe { GetWindowTextLengthW(hwnd) };
    if !is_main_window(visible, has_owner(hwnd), len) {
        return true.into();
    }

    let mut buffer = vec![0u16; len as usize + 1];
    let copied = unsafe { GetWindowTextW(hwnd, &mut buffer) };
    if copied <= 0 {
        return true.into();
    }

    search.title = Some(String::from_utf16_lossy(&buffer[..copied as usize]));
    // stop enumerating
    false.into()
}

/// Title of the first visible, unowned, titled top-level window of
/// `process_id`, or an empty string for windowless processes
pub fn main_window_title(process_id: ProcessId) -> String {
    let mut search = TitleSearch {
        process_id,
        title: None,
    };

    // EnumWindows reports an error when the callback stops early
    let _ = unsafe {
        EnumWindows(
            Some(visit_window),
            LPARAM(&mut search as *mut TitleSearch as isize),
        )
    };

    search.title.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_process_has_no_title() {
        assert_eq!(main_window_title(0xFFFF_FFFD), "");
    }

    #[test]
    fn test_owned_windows_are_not_main_windows() {
        assert!(is_main_window(true, false, 12));
        assert!(!is_main_window(true, true, 12));
        assert!(!is_main_window(false, false, 12));
        assert!(!is_main_window(true, false, 0));
    }

    #[test]
    fn test_desktop_window_has_no_owner() {
        let desktop = unsafe { windows::Win32::UI::WindowsAndMessaging::GetDesktopWindow() };
        assert!(!has_owner(desktop));
    }
}

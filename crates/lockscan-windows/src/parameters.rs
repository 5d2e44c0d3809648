use crate::bitness::resolve;
use crate::handle::open_process;
use crate::memory::RemoteStrategy;
use lockscan_core::{ParameterField, ProcessId, read_process_parameter};
use tracing::debug;
use windows::Win32::System::Threading::{PROCESS_QUERY_INFORMATION, PROCESS_VM_READ};

/// Read `field` out of another process's PEB. Every failure is `None`.
pub fn read_parameter(process_id: ProcessId, field: ParameterField) -> Option<String> {
    let process = match open_process(process_id, PROCESS_QUERY_INFORMATION | PROCESS_VM_READ) {
        Ok(process) => process,
        Err(e) => {
            debug!(pid = process_id, error = %e, "Cannot open process for parameter read");
            return None;
        }
    };

    let bitness = match resolve(&process) {
        Ok(bitness) => bitness,
        Err(e) => {
            debug!(pid = process_id, error = %e, "Cannot determine process bitness");
            return None;
        }
    };

    let memory = RemoteStrategy::select(&process, bitness)?;
    let value = read_process_parameter(&memory, field);
    if value.is_none() {
        debug!(
            pid = process_id,
            field = field.as_str(),
            ?bitness,
            "Process parameter unavailable"
        );
    }
    value
}

/// Command line of `process_id`, or an empty string
pub fn get_command_line(process_id: ProcessId) -> String {
    read_parameter(process_id, ParameterField::CommandLine).unwrap_or_default()
}

/// Current directory of `process_id` without its trailing separator, or an empty string
pub fn get_working_directory(process_id: ProcessId) -> String {
    read_parameter(process_id, ParameterField::CurrentDirectory).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_process_yields_empty() {
        assert_eq!(get_command_line(0xFFFF_FFFD), "");
        assert_eq!(get_working_directory(0xFFFF_FFFD), "");
    }

    #[test]
    fn test_own_command_line_mentions_executable() {
        let command_line = get_command_line(std::process::id());
        let exe = std::env::current_exe().unwrap();
        let stem = exe.file_stem().unwrap().to_string_lossy().to_string();
        assert!(
            command_line.contains(&stem),
            "{command_line:?} should mention {stem:?}"
        );
    }

    #[test]
    fn test_own_working_directory_matches() {
        let directory = get_working_directory(std::process::id());
        let expected = std::env::current_dir().unwrap();
        let expected = expected.to_string_lossy();
        assert_eq!(
            directory.to_lowercase(),
            expected.trim_end_matches('\\').to_lowercase()
        );
    }
}

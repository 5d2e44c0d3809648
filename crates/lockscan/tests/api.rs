use lockscan::{
    CancellationToken, LockScanError, LockingProcessesOptions, get_command_line,
    get_locking_processes_info, get_locking_processes_info_async, get_locking_processes_report,
    get_working_directory,
};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_file(true)
        .with_thread_ids(false)
        .with_target(false)
        .with_line_number(true)
        .try_init();
}

#[test]
fn test_nonexistent_pid_returns_empty_strings() {
    init_logging();
    assert_eq!(get_command_line(0xFFFF_FFFD), "");
    assert_eq!(get_working_directory(0xFFFF_FFFD), "");
}

#[cfg(not(windows))]
#[tokio::test]
async fn test_async_scan_unsupported_off_windows() {
    init_logging();
    let result = get_locking_processes_info_async(".", LockingProcessesOptions::recursive()).await;
    assert!(matches!(result, Err(LockScanError::Unsupported(_))));

    let token = CancellationToken::new();
    let report = get_locking_processes_report(".", &LockingProcessesOptions::default(), Some(&token));
    assert!(matches!(report, Err(LockScanError::Unsupported(_))));
    assert!(get_locking_processes_info(".", &LockingProcessesOptions::default()).is_err());
}

#[cfg(windows)]
mod windows_scans {
    use super::*;
    use lockscan::get_locking_processes;
    use std::fs::{File, OpenOptions};
    use std::os::windows::fs::OpenOptionsExt;
    use std::path::Path;

    fn hold_exclusively(path: &Path) -> File {
        OpenOptions::new()
            .create(true)
            .write(true)
            .share_mode(0)
            .open(path)
            .unwrap()
    }

    #[test]
    fn test_child_command_line_and_directory_read_exactly() {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        let mut child = std::process::Command::new("cmd.exe")
            .args(["/c", "ping", "-n", "5", "127.0.0.1"])
            .current_dir(dir.path())
            .stdout(std::process::Stdio::null())
            .spawn()
            .unwrap();

        let command_line = get_command_line(child.id());
        let working_directory = get_working_directory(child.id());
        let _ = child.kill();
        child.wait().unwrap();

        assert_eq!(command_line, r#""cmd.exe" /c ping -n 5 127.0.0.1"#);
        let expected = dir.path().to_string_lossy();
        assert_eq!(
            working_directory.to_lowercase(),
            expected.trim_end_matches('\\').to_lowercase()
        );
        assert!(!working_directory.ends_with('\\'));
    }

    #[test]
    fn test_unlocked_tree_reports_nothing() {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::write(dir.path().join("sub").join("b.txt"), b"b").unwrap();

        let processes =
            get_locking_processes_info(dir.path(), &LockingProcessesOptions::recursive()).unwrap();
        assert!(processes.is_empty(), "{processes:?}");
    }

    #[test]
    fn test_exclusive_lock_detected_with_parameters() {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("held.log");
        let _held = hold_exclusively(&target);

        let options = LockingProcessesOptions::builder()
            .collect_process_parameters(true)
            .build()
            .unwrap();
        let processes = get_locking_processes_info(&target, &options).unwrap();

        assert_eq!(processes.len(), 1, "{processes:?}");
        let own = &processes[0];
        assert_eq!(own.process_id, std::process::id());
        assert!(own.holds_lock_on(&target));
        assert!(!own.command_line.is_empty());
        assert_eq!(own.command_line, get_command_line(std::process::id()));
    }

    #[test]
    fn test_recursive_scan_merges_paths_for_one_process() {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        let first = dir.path().join("first.dat");
        let second = nested.join("second.dat");
        let _a = hold_exclusively(&first);
        let _b = hold_exclusively(&second);

        let processes =
            get_locking_processes_info(dir.path(), &LockingProcessesOptions::recursive()).unwrap();

        let own: Vec<_> = processes
            .iter()
            .filter(|p| p.process_id == std::process::id())
            .collect();
        assert_eq!(own.len(), 1);
        assert!(own[0].holds_lock_on(&first));
        assert!(own[0].holds_lock_on(&second));
    }

    #[test]
    fn test_max_depth_zero_ignores_subdirectories() {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        let _held = hold_exclusively(&nested.join("deep.dat"));

        let options = LockingProcessesOptions::builder()
            .recursive(true)
            .max_depth(0)
            .build()
            .unwrap();
        let report = get_locking_processes_report(dir.path(), &options, None).unwrap();

        assert!(report.processes.is_empty());
        assert_eq!(report.directories_visited, 1);
        assert_eq!(report.files_checked, 0);
    }

    #[test]
    fn test_live_handles_for_locking_processes() {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        let _held = hold_exclusively(&dir.path().join("held.bin"));

        let processes = get_locking_processes(dir.path(), false).unwrap();
        assert_eq!(processes.len(), 1);
        assert_eq!(processes[0].process_id(), std::process::id());
        assert!(processes[0].is_running());
    }

    #[test]
    fn test_cancelled_scan_stops() {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let result =
            get_locking_processes_report(dir.path(), &LockingProcessesOptions::recursive(), Some(&token));
        assert!(matches!(result, Err(LockScanError::Cancelled)));
    }

    #[test]
    fn test_missing_path_is_not_found() {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        let result = get_locking_processes_info(
            dir.path().join("absent"),
            &LockingProcessesOptions::default(),
        );
        assert!(matches!(result, Err(LockScanError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_async_scan_matches_blocking_scan() {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("async.dat");
        let _held = hold_exclusively(&target);

        let processes =
            get_locking_processes_info_async(target.clone(), LockingProcessesOptions::default())
                .await
                .unwrap();
        assert_eq!(processes.len(), 1);
        assert!(processes[0].holds_lock_on(&target));
    }
}

use crate::config::LockingProcessesOptions;
use crate::error::LockScanError;
use crate::process::{
    LockCheckOutcome, LockHolder, LockProbe, ProcessId, ProcessInfo, ProcessInspector,
};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What a path on disk turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// Immediate contents of one directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryListing {
    pub files: Vec<PathBuf>,
    pub directories: Vec<PathBuf>,
}

/// Filesystem view used by the scanner
pub trait DirectorySource: Send + Sync {
    fn resolve(&self, path: &Path) -> io::Result<PathBuf> {
        std::path::absolute(path)
    }

    fn entry_kind(&self, path: &Path) -> Option<EntryKind>;

    fn list(&self, directory: &Path) -> io::Result<DirectoryListing>;
}

/// [`DirectorySource`] backed by `std::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDirectorySource;

impl DirectorySource for FsDirectorySource {
    fn entry_kind(&self, path: &Path) -> Option<EntryKind> {
        let metadata = fs::metadata(path).ok()?;
        if metadata.is_dir() {
            Some(EntryKind::Directory)
        } else {
            Some(EntryKind::File)
        }
    }

    fn list(&self, directory: &Path) -> io::Result<DirectoryListing> {
        let mut listing = DirectoryListing::default();

        for entry in fs::read_dir(directory)? {
            let entry = entry?;
            let path = entry.path();
            // follow links so a linked directory is walked like a real one
            let is_dir = match entry.file_type()? {
                kind if kind.is_symlink() => fs::metadata(&path).is_ok_and(|m| m.is_dir()),
                kind => kind.is_dir(),
            };
            if is_dir {
                listing.directories.push(path);
            } else {
                listing.files.push(path);
            }
        }

        listing.files.sort();
        listing.directories.sort();
        Ok(listing)
    }
}

/// Per-scan store of discovered processes, keyed by process id
#[derive(Debug, Default)]
pub struct LockedProcessMap {
    inner: DashMap<ProcessId, ProcessInfo>,
}

impl LockedProcessMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `holder` as a new record, or add `path` to its existing record.
    ///
    /// `build` runs outside the map lock. If another thread inserts the same
    /// id meanwhile, its record wins and receives `path`. Returns true when a
    /// new record was inserted.
    pub fn merge<F>(&self, holder: &LockHolder, path: &Path, build: F) -> bool
    where
        F: FnOnce() -> ProcessInfo,
    {
        if let Some(mut existing) = self.inner.get_mut(&holder.process_id) {
            existing.add_locked_path(path);
            return false;
        }

        let candidate = build();
        match self.inner.entry(holder.process_id) {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().add_locked_path(path);
                false
            }
            Entry::Vacant(vacant) => {
                vacant.insert(candidate);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn into_sorted_vec(self) -> Vec<ProcessInfo> {
        let mut processes: Vec<ProcessInfo> =
            self.inner.into_iter().map(|(_, info)| info).collect();
        processes.sort_by_key(|info| info.process_id);
        processes
    }
}

/// Everything one scan observed
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub processes: Vec<ProcessInfo>,
    pub files_checked: usize,
    pub directories_visited: usize,
    /// Files whose lock check failed, with the reason
    pub indeterminate: Vec<(PathBuf, String)>,
    /// Directories skipped because their contents could not be listed
    pub skipped_directories: Vec<PathBuf>,
}

/// Finds the processes holding locks on a file or anywhere below a directory
pub struct LockScanner<P, I, D = FsDirectorySource> {
    probe: P,
    inspector: I,
    directories: D,
    cancellation: Option<CancellationToken>,
}

impl<P, I> LockScanner<P, I, FsDirectorySource>
where
    P: LockProbe,
    I: ProcessInspector,
{
    pub fn new(probe: P, inspector: I) -> Self {
        Self {
            probe,
            inspector,
            directories: FsDirectorySource,
            cancellation: None,
        }
    }
}

impl<P, I, D> LockScanner<P, I, D>
where
    P: LockProbe,
    I: ProcessInspector,
    D: DirectorySource,
{
    pub fn with_directory_source<E: DirectorySource>(self, directories: E) -> LockScanner<P, I, E> {
        LockScanner {
            probe: self.probe,
            inspector: self.inspector,
            directories,
            cancellation: self.cancellation,
        }
    }

    /// Abort the walk with [`LockScanError::Cancelled`] once `token` fires.
    /// Checked between directories.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn scan(
        &self,
        path: &Path,
        options: &LockingProcessesOptions,
    ) -> Result<Vec<ProcessInfo>, LockScanError> {
        Ok(self.scan_report(path, options)?.processes)
    }

    pub fn scan_report(
        &self,
        path: &Path,
        options: &LockingProcessesOptions,
    ) -> Result<ScanReport, LockScanError> {
        options
            .validate()
            .map_err(|e| LockScanError::InvalidOptions(format!("{e}")))?;

        let root = self
            .directories
            .resolve(path)
            .map_err(|_| LockScanError::NotFound(path.to_path_buf()))?;

        info!(path = %root.display(), ?options, "Scanning for locking processes");

        let results = LockedProcessMap::new();
        let mut report = ScanReport::default();

        match self.directories.entry_kind(&root) {
            Some(EntryKind::Directory) => self.walk(&root, options, &results, &mut report)?,
            Some(EntryKind::File) => self.check_file(&root, &results, &mut report),
            None => return Err(LockScanError::NotFound(root)),
        }

        report.processes = results.into_sorted_vec();
        info!(
            path = %root.display(),
            processes = report.processes.len(),
            files = report.files_checked,
            directories = report.directories_visited,
            indeterminate = report.indeterminate.len(),
            "Lock scan finished"
        );

        Ok(report)
    }

    fn walk(
        &self,
        root: &Path,
        options: &LockingProcessesOptions,
        results: &LockedProcessMap,
        report: &mut ScanReport,
    ) -> Result<(), LockScanError> {
        let mut queue = VecDeque::from([(root.to_path_buf(), 0usize)]);

        while let Some((directory, depth)) = queue.pop_front() {
            if self
                .cancellation
                .as_ref()
                .is_some_and(CancellationToken::is_cancelled)
            {
                info!(path = %directory.display(), "Lock scan cancelled");
                return Err(LockScanError::Cancelled);
            }

            let listing = match self.directories.list(&directory) {
                Ok(listing) => listing,
                Err(e) => match LockScanError::from_io(&directory, e) {
                    denied if denied.is_access_denied() && options.continue_on_access_denied => {
                        warn!(path = %directory.display(), "Skipping directory: access denied");
                        report.skipped_directories.push(directory);
                        continue;
                    }
                    other => return Err(other),
                },
            };

            debug!(
                path = %directory.display(),
                depth,
                files = listing.files.len(),
                subdirectories = listing.directories.len(),
                "Checking directory"
            );
            report.directories_visited += 1;

            for file in &listing.files {
                self.check_file(file, results, report);
            }

            if options.recursive && options.allows_depth(depth + 1) {
                queue.extend(
                    listing
                        .directories
                        .into_iter()
                        .map(|subdirectory| (subdirectory, depth + 1)),
                );
            }
        }

        Ok(())
    }

    fn check_file(&self, path: &Path, results: &LockedProcessMap, report: &mut ScanReport) {
        report.files_checked += 1;

        match self.probe.check(path) {
            LockCheckOutcome::Locked(holders) => {
                for holder in &holders {
                    let inserted =
                        results.merge(holder, path, || self.inspector.inspect(holder, path));
                    debug!(
                        pid = holder.process_id,
                        path = %path.display(),
                        new = inserted,
                        "Found locking process"
                    );
                }
            }
            LockCheckOutcome::NotLocked => {}
            LockCheckOutcome::Indeterminate(reason) => {
                warn!(path = %path.display(), %reason, "Lock check failed; treating as not locked");
                report.indeterminate.push((path.to_path_buf(), reason));
            }
        }
    }
}

/// Platform-specific factory for lock scanners
pub trait LockScannerFactory {
    type Probe: LockProbe;
    type Inspector: ProcessInspector;

    fn create_scanner(options: &LockingProcessesOptions) -> LockScanner<Self::Probe, Self::Inspector>;

    fn platform_name() -> &'static str;
}

//! lockscan core - platform-independent pieces of the lock scanner
//!
//! This crate holds the data model, scan options, error taxonomy, the
//! directory walk, and the PEB walking logic. Platform crates plug in the
//! native lock probe, process inspector, and remote memory readers.

pub mod bitness;
pub mod config;
pub mod error;
pub mod peb;
pub mod process;
pub mod scanner;
pub mod sid;
pub mod two_phase;

pub use bitness::{PebLayout, PebOffsets, TargetBitness};
pub use config::{LockingProcessesOptions, LockingProcessesOptionsBuilder, UNLIMITED_DEPTH};
pub use error::LockScanError;
pub use peb::{RemoteMemory, read_process_parameter};
pub use process::{
    ACCESS_DENIED, LockCheckOutcome, LockHolder, LockProbe, ParameterField, ProcessId,
    ProcessInfo, ProcessInspector, UNKNOWN_USER,
};
pub use scanner::{
    DirectoryListing, DirectorySource, EntryKind, FsDirectorySource, LockScanner,
    LockScannerFactory, LockedProcessMap, ScanReport,
};
pub use tokio_util::sync::CancellationToken;

use lockscan::{CancellationToken, LockingProcessesOptions, get_locking_processes_report};
use std::path::PathBuf;

/// Usage: locks_json <path> [max-depth]
///
/// Prints the scan report for `path` as JSON. Ctrl-C stops the walk between
/// directories.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lockscan::init_tracing()?;

    let mut args = std::env::args().skip(1);
    let path = PathBuf::from(args.next().unwrap_or_else(|| ".".to_string()));
    let max_depth = match args.next() {
        Some(depth) => depth.parse()?,
        None => lockscan::UNLIMITED_DEPTH,
    };

    let options = LockingProcessesOptions::builder()
        .recursive(true)
        .max_depth(max_depth)
        .collect_process_parameters(true)
        .build()?;

    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let report = tokio::task::spawn_blocking(move || {
        get_locking_processes_report(&path, &options, Some(&token))
    })
    .await??;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

//! Library scan command.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::runtime::Runtime;

use crate::config::{Config, LibraryConfig};
use crate::library::{ProgressCallback, ScanOptions, ScanService, ScanStats, ScanStepStats};

use super::open_db;

/// Errors printed after a scan; the rest are only counted.
const PRINTED_ERRORS: usize = 20;

/// Scan the media libraries
pub fn cmd_scan(
    rt: &Runtime,
    mut config: Config,
    db_path: Option<&Path>,
    libraries: &[LibraryConfig],
    full: bool,
    force_optimize: bool,
) -> anyhow::Result<()> {
    if !libraries.is_empty() {
        config.libraries = libraries.to_vec();
    }
    if config.libraries.is_empty() {
        anyhow::bail!("No media library configured; pass --library NAME=PATH or add one to the config file");
    }

    rt.block_on(async {
        let db = open_db(&config, db_path).await?;
        let service = ScanService::new(db, config);

        let abort = service.abort_handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nAborting scan...");
                abort.store(true, Ordering::SeqCst);
            }
        });

        let options = ScanOptions {
            full_scan: full,
            force_optimize,
        };
        let outcome = service.run(options, print_progress()).await?;
        println!();

        if outcome.aborted {
            println!("Scan aborted. Committed changes are kept.");
        } else {
            println!("Scan complete.");
        }
        print_summary(&outcome.stats);
        Ok(())
    })
}

fn print_progress() -> ProgressCallback {
    Arc::new(|step: &ScanStepStats| {
        print!(
            "\r[{}/{}] {:<28} {:>3}% ({}/{})",
            step.step_index + 1,
            step.step_count,
            step.step.name(),
            step.progress(),
            step.processed_elems,
            step.total_elems,
        );
        let _ = std::io::stdout().flush();
    })
}

fn print_summary(stats: &ScanStats) {
    if let Some(finished) = stats.finished {
        let elapsed = finished - stats.started;
        println!("Elapsed:    {:.1}s", elapsed.num_milliseconds() as f64 / 1000.0);
    }
    println!("Walked:     {}", stats.files_walked);
    println!("Scanned:    {}", stats.scans);
    println!("Unchanged:  {}", stats.skips);
    println!("Added:      {}", stats.additions);
    println!("Updated:    {}", stats.updates);
    println!("Removed:    {}", stats.deletions);
    println!("Failures:   {}", stats.failures);
    println!("Errors:     {}", stats.errors_count);
    println!("Duplicates: {}", stats.duplicates.len());

    if !stats.errors.is_empty() {
        println!();
        println!("Files with errors:");
        for error in stats.errors.iter().take(PRINTED_ERRORS) {
            println!("  {error}");
        }
        if stats.errors_count as usize > PRINTED_ERRORS {
            println!("  ... and {} more", stats.errors_count as usize - PRINTED_ERRORS);
        }
    }

    if !stats.duplicates.is_empty() {
        println!();
        println!("Duplicate recordings:");
        for duplicate in &stats.duplicates {
            println!("  {}", duplicate.path);
        }
    }
}

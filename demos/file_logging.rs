//! File logging example
//!
//! Demonstrates configuration-driven setup of the process-wide registry with
//! console and rotating file sinks, and the renumbered backups it leaves.
//!
//! Run with: cargo run --example file_logging

use quill_logger::core::config::keys;
use quill_logger::prelude::*;
use quill_logger::{info, warn};

fn main() -> Result<()> {
    println!("=== Quill Logger - File Logging Example ===\n");

    let config = MapConfig::from_json(
        r#"{
            "sinks.list": "console logfile",
            "default.level": "info",
            "console.prefix": "[@L] ",
            "logfile.name": "logs/application.log",
            "logfile.kmaxsize": 1,
            "logfile.backups": 3
        }"#,
    )?;
    let _guard = quill_logger::init_global(&config)?;
    let registry = quill_logger::global()?;

    println!("1. Logging to both console and file:");
    let log = registry.get_logger("app.startup");
    info!(log, "Application started");
    log.diag("Loading configuration... (below the default level)", vec![]);
    info!(log, "Writing up to {} KiB per file", config.get_long(keys::LOGFILE_KMAXSIZE, 100));
    warn!(log, "Using default settings for some options");

    println!("\n2. Filling enough lines to roll the file over:");
    let work = registry.get_logger("app.worker");
    for i in 1..=60 {
        info!(work, "Processing item @1i/@2i", i, 60);
    }
    registry.flush();

    println!("\n=== Example completed successfully! ===");
    println!("Check 'logs/application000.log' .. 'logs/application002.log'");

    Ok(())
}

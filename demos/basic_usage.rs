//! Basic logger usage example
//!
//! Demonstrates named loggers, level assignment by prefix and the template
//! symbols, printed on the console.
//!
//! Run with: cargo run --example basic_usage

use quill_logger::prelude::*;
use quill_logger::{diag, error, info, logger, warn};

fn main() -> Result<()> {
    println!("=== Quill Logger - Basic Usage Example ===\n");

    let console = ConsoleSink::new().with_prefix("@T [@L] @c: ");
    let registry = Registry::with_sinks(Level::Trace, vec![Box::new(console)])?;
    let log = logger!(registry);

    println!("1. Logging at different levels:");
    log.trace("This is a trace message", vec![]);
    diag!(log, "This is a diagnostic message");
    info!(log, "This is an info message");
    warn!(log, "This is a warning message");
    error!(log, "This is an error message");
    registry.flush();

    println!("\n2. Level assignment by prefix:");
    let db = registry.get_logger("app.db");
    let web = registry.get_logger("app.web");
    registry.set_level(Level::Warn, "app");
    registry.set_level(Level::Diag, "app.db");
    diag!(db, "app.db is at {} (visible)", db.level().name());
    diag!(web, "app.web is at {} (hidden)", web.level().name());
    warn!(web, "app.web warning (visible)");
    registry.flush();

    println!("\n3. Template symbols:");
    info!(log, "@1s has @2i items, flag=@3b, ratio=@4f", "cart", 3, true, 0.25);
    info!(log, "{2} before {1}, then {}", "first", "second");
    info!(log, "hex @1h, missing @2s, unknown @1z", 255);
    let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only volume");
    error!(log, err: err, "save failed: @1E");
    registry.flush();

    registry.shutdown();
    println!("\n=== Example completed successfully! ===");

    Ok(())
}

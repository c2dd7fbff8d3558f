//! Background dispatch example
//!
//! Demonstrates many producer threads feeding a slow sink through the bounded
//! queue, and the drain performed on shutdown.
//!
//! Run with: cargo run --example async_logging

use quill_logger::core::Dispatcher;
use quill_logger::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// A sink that takes a while for every record
struct SlowConsole {
    inner: ConsoleSink,
}

impl Sink for SlowConsole {
    fn append(&mut self, record: &Record) -> Result<()> {
        thread::sleep(Duration::from_millis(2));
        self.inner.append(record)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn name(&self) -> &str {
        "slow-console"
    }
}

fn main() -> Result<()> {
    println!("=== Quill Logger - Background Dispatch Example ===\n");

    let sink = SlowConsole {
        inner: ConsoleSink::new().with_prefix("@h [@L] "),
    };
    let dispatcher = Arc::new(Dispatcher::new(vec![Box::new(sink)]));
    dispatcher.start()?;
    let registry = Arc::new(Registry::new(Level::Info, Arc::clone(&dispatcher)));

    println!("1. Five producers, 60 messages each:");
    let mut handles = vec![];
    for thread_id in 0..5 {
        let registry = Arc::clone(&registry);
        let handle = thread::Builder::new()
            .name(format!("producer-{}", thread_id))
            .spawn(move || {
                let logger = registry.get_logger("demo.producer");
                for i in 0..60 {
                    logger.info("Thread {} - Message {}", vec![thread_id.into(), i.into()]);
                }
            })?;
        handles.push(handle);
    }

    for handle in handles {
        if handle.join().is_err() {
            eprintln!("A producer thread panicked");
        }
    }

    println!("\n2. Shutting down (drains whatever is still queued):");
    let clean = dispatcher.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);

    let metrics = dispatcher.metrics();
    println!("\n=== Dispatcher metrics ===");
    println!("  dispatched:   {}", metrics.dispatched());
    println!("  drained:      {}", metrics.drained());
    println!("  lost:         {}", metrics.lost());
    println!("  block events: {}", metrics.block_events());
    println!("  clean stop:   {}", clean);

    Ok(())
}

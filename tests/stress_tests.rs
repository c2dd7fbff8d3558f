//! Stress tests for the dispatcher under load
//!
//! These tests verify:
//! - Producers block on a full queue instead of dropping records
//! - Every record reaches every sink exactly once
//! - Per-producer ordering survives concurrent logging
//! - Records queued right before shutdown are drained
//! - Records racing shutdown are either delivered or counted as lost

use parking_lot::Mutex;
use quill_logger::core::{
    CallSite, Dispatcher, ErrorHandler, ErrorMode, Level, Record, Registry, Result, Sink,
    TemplateEngine, DEFAULT_SHUTDOWN_TIMEOUT,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Records rendered lines, optionally sleeping on every append
struct SlowSink {
    engine: TemplateEngine,
    lines: Arc<Mutex<Vec<String>>>,
    delay: Duration,
}

impl SlowSink {
    fn new(delay: Duration) -> (Self, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Self {
            engine: TemplateEngine::new(""),
            lines: Arc::clone(&lines),
            delay,
        };
        (sink, lines)
    }
}

impl Sink for SlowSink {
    fn append(&mut self, record: &Record) -> Result<()> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.lines.lock().push(self.engine.format(record));
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "slow"
    }
}

/// Counts appends only
struct CountingSink {
    count: Arc<AtomicUsize>,
}

impl Sink for CountingSink {
    fn append(&mut self, _record: &Record) -> Result<()> {
        self.count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Parse "t<thread>-<seq>" lines into per-thread sequences
fn by_producer(lines: &[String]) -> HashMap<usize, Vec<usize>> {
    let mut seen: HashMap<usize, Vec<usize>> = HashMap::new();
    for line in lines {
        let (thread_part, seq_part) = line
            .trim_start_matches('t')
            .split_once('-')
            .expect("line has producer and sequence");
        seen.entry(thread_part.parse().unwrap())
            .or_default()
            .push(seq_part.parse().unwrap());
    }
    seen
}

#[test]
fn test_backpressure_never_drops() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 100;

    let (sink, lines) = SlowSink::new(Duration::from_micros(200));
    let dispatcher = Arc::new(Dispatcher::with_capacity(vec![Box::new(sink)], 8));
    dispatcher.start().unwrap();
    let registry = Arc::new(Registry::new(Level::Info, Arc::clone(&dispatcher)));

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|t| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let logger = registry.get_logger("stress.producer");
                for i in 0..PER_PRODUCER {
                    logger.info("t{}-{}", vec![t.into(), i.into()]);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("Producer panicked");
    }

    assert!(dispatcher.shutdown(DEFAULT_SHUTDOWN_TIMEOUT));

    let lines = lines.lock();
    assert_eq!(lines.len(), PRODUCERS * PER_PRODUCER);
    assert_eq!(dispatcher.metrics().lost(), 0);
    assert!(
        dispatcher.metrics().block_events() > 0,
        "a queue of 8 should have filled up"
    );

    let seen = by_producer(&lines);
    assert_eq!(seen.len(), PRODUCERS);
    for (producer, sequence) in seen {
        let expected: Vec<usize> = (0..PER_PRODUCER).collect();
        assert_eq!(sequence, expected, "producer {} out of order", producer);
    }
}

#[test]
fn test_every_sink_sees_every_record_once() {
    const PRODUCERS: usize = 8;
    const PER_PRODUCER: usize = 500;

    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let registry = Arc::new(
        Registry::with_sinks(
            Level::Trace,
            vec![
                Box::new(CountingSink {
                    count: Arc::clone(&first),
                }),
                Box::new(CountingSink {
                    count: Arc::clone(&second),
                }),
            ],
        )
        .expect("Failed to start registry"),
    );

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|t| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let logger = registry.get_logger(&format!("stress.thread{}", t));
                for i in 0..PER_PRODUCER {
                    logger.diag("message {}", vec![i.into()]);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("Producer panicked");
    }
    assert!(registry.shutdown());

    assert_eq!(first.load(Ordering::Relaxed), PRODUCERS * PER_PRODUCER);
    assert_eq!(second.load(Ordering::Relaxed), PRODUCERS * PER_PRODUCER);
    assert_eq!(registry.dispatcher().metrics().lost(), 0);
}

#[test]
fn test_records_before_shutdown_are_drained() {
    let (sink, lines) = SlowSink::new(Duration::from_millis(1));
    let registry = Registry::with_sinks(Level::Info, vec![Box::new(sink)]).expect("Failed to start registry");
    let logger = registry.get_logger("stress.drain");

    // More than the queue holds, so shutdown starts with a full queue
    for i in 0..300 {
        logger.warn("pending {}", vec![i.into()]);
    }
    assert!(registry.shutdown());

    let lines = lines.lock();
    assert_eq!(lines.len(), 300);
    for (i, line) in lines.iter().enumerate() {
        assert_eq!(line, &format!("pending {}", i));
    }
}

#[test]
fn test_concurrent_level_changes() {
    let count = Arc::new(AtomicUsize::new(0));
    let registry = Arc::new(
        Registry::with_sinks(
            Level::Warn,
            vec![Box::new(CountingSink {
                count: Arc::clone(&count),
            })],
        )
        .expect("Failed to start registry"),
    );

    let setter = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || {
            for i in 0..200 {
                let level = if i % 2 == 0 { Level::Trace } else { Level::Error };
                registry.set_level(level, "churn");
            }
            registry.set_level(Level::Info, "churn");
        })
    };
    let producer = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || {
            for i in 0..200 {
                let logger = registry.get_logger(&format!("churn.n{}", i % 10));
                logger.error("always passes", vec![]);
            }
        })
    };
    setter.join().expect("Setter panicked");
    producer.join().expect("Producer panicked");
    assert!(registry.shutdown());

    assert_eq!(count.load(Ordering::Relaxed), 200);
    assert_eq!(registry.get_logger("churn.n3").level(), Level::Info);
    assert_eq!(registry.get_logger("churn.fresh").level(), Level::Info);
}

#[test]
fn test_enqueue_racing_shutdown_is_accounted() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 2000;

    for _ in 0..5 {
        let delivered = Arc::new(AtomicUsize::new(0));
        let dispatcher = Arc::new(
            Dispatcher::with_capacity(
                vec![Box::new(CountingSink {
                    count: Arc::clone(&delivered),
                })],
                16,
            )
            .with_error_handler(ErrorHandler::new(ErrorMode::Silent)),
        );
        dispatcher.start().unwrap();

        let accepted = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..PRODUCERS)
            .map(|t| {
                let dispatcher = Arc::clone(&dispatcher);
                let accepted = Arc::clone(&accepted);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        let record = Record::new(
                            Level::Info,
                            "t{}-{}",
                            vec![t.into(), i.into()],
                            CallSite::caller(),
                        );
                        if dispatcher.enqueue(record) {
                            accepted.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(2));
        assert!(dispatcher.shutdown(DEFAULT_SHUTDOWN_TIMEOUT));
        for handle in handles {
            handle.join().expect("Producer panicked");
        }

        let accepted = accepted.load(Ordering::Relaxed);
        assert_eq!(delivered.load(Ordering::Relaxed), accepted);
        assert_eq!(
            accepted as u64 + dispatcher.metrics().lost(),
            (PRODUCERS * PER_PRODUCER) as u64
        );
        assert_eq!(dispatcher.queued(), 0);
    }
}

//! Background fan-out from producers to sinks
//!
//! Producers push [`Record`]s into a bounded queue; a single consumer thread
//! pops them and calls every sink in configured order. A full queue blocks the
//! producer instead of dropping. Shutdown stops the consumer first and then
//! drains whatever is left on the calling thread, so the two never overlap.

use super::caller::CallSite;
use super::error_handler::{ErrorHandler, ErrorMode, Rollup};
use super::level::Level;
use super::metrics::DispatcherMetrics;
use super::record::Record;
use super::sink::Sink;
use super::LoggerError;
use crossbeam_channel::{bounded, select, Receiver, SendTimeoutError, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Records the queue holds before producers block
pub const QUEUE_CAPACITY: usize = 128;

/// Default time to wait for the consumer thread on shutdown (5 seconds)
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// How often a blocked producer re-checks the dispatcher state
const BLOCK_POLL: Duration = Duration::from_millis(100);

const STARTUP_WARNING_TEMPLATE: &str = "Sink initialization failed: @1s";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DispatcherState {
    Created = 0,
    Running = 1,
    Draining = 2,
    Stopped = 3,
}

impl DispatcherState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => DispatcherState::Created,
            1 => DispatcherState::Running,
            2 => DispatcherState::Draining,
            _ => DispatcherState::Stopped,
        }
    }
}

type SharedSinks = Arc<Mutex<Vec<Box<dyn Sink>>>>;

pub struct Dispatcher {
    sender: Sender<Record>,
    receiver: Receiver<Record>,
    wake_tx: Mutex<Option<Sender<()>>>,
    wake_rx: Receiver<()>,
    sinks: SharedSinks,
    state: AtomicU8,
    /// Held shared around every send, exclusively while entering `Stopped`
    gate: RwLock<()>,
    exit: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
    metrics: Arc<DispatcherMetrics>,
    /// Records accepted into the queue, startup warning included
    accepted: AtomicU64,
    lost: Rollup,
    error_handler: ErrorHandler,
    startup_warning: Mutex<Option<String>>,
}

impl Dispatcher {
    /// A dispatcher in the `Created` state; call [`Dispatcher::start`] to spawn
    /// the consumer.
    pub fn new(sinks: Vec<Box<dyn Sink>>) -> Self {
        Self::with_capacity(sinks, QUEUE_CAPACITY)
    }

    pub fn with_capacity(sinks: Vec<Box<dyn Sink>>, capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            sender,
            receiver,
            wake_tx: Mutex::new(Some(wake_tx)),
            wake_rx,
            sinks: Arc::new(Mutex::new(sinks)),
            state: AtomicU8::new(DispatcherState::Created as u8),
            gate: RwLock::new(()),
            exit: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
            metrics: Arc::new(DispatcherMetrics::new()),
            accepted: AtomicU64::new(0),
            lost: Rollup::default(),
            error_handler: ErrorHandler::default(),
            startup_warning: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_error_handler(mut self, error_handler: ErrorHandler) -> Self {
        self.error_handler = error_handler;
        self
    }

    /// Report lost records on the first occurrence and then every `threshold`
    #[must_use]
    pub fn with_rollup_threshold(mut self, threshold: u64) -> Self {
        self.lost = Rollup::new(threshold);
        self
    }

    /// Text of a `Warn` record delivered before anything else once started
    #[must_use]
    pub fn with_startup_warning(self, summary: impl Into<String>) -> Self {
        *self.startup_warning.lock() = Some(summary.into());
        self
    }

    pub fn state(&self) -> DispatcherState {
        DispatcherState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn metrics(&self) -> &DispatcherMetrics {
        &self.metrics
    }

    pub fn capacity(&self) -> usize {
        self.sender.capacity().unwrap_or(QUEUE_CAPACITY)
    }

    /// Records waiting in the queue
    pub fn queued(&self) -> usize {
        self.receiver.len()
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.lock().len()
    }

    /// Spawn the consumer thread. Has no effect unless the dispatcher is in
    /// the `Created` state.
    ///
    /// # Errors
    ///
    /// Returns error if the thread cannot be spawned; the dispatcher then
    /// stays in `Created`.
    pub fn start(&self) -> super::Result<()> {
        let mut handle = self.handle.lock();
        if self.state() != DispatcherState::Created {
            return Ok(());
        }

        let warning = self.take_startup_warning();

        let receiver = self.receiver.clone();
        let wake_rx = self.wake_rx.clone();
        let sinks = Arc::clone(&self.sinks);
        let exit = Arc::clone(&self.exit);
        let metrics = Arc::clone(&self.metrics);
        let error_handler = self.error_handler;

        let spawned = thread::Builder::new()
            .name("quill-dispatcher".to_string())
            .spawn(move || {
                if let Some(record) = warning {
                    fan_out(&sinks, &record, &metrics, error_handler);
                }

                while !exit.load(Ordering::Acquire) {
                    select! {
                        recv(receiver) -> msg => match msg {
                            Ok(record) => {
                                fan_out(&sinks, &record, &metrics, error_handler);
                                if receiver.is_empty() {
                                    flush_all(&sinks, error_handler);
                                }
                            }
                            Err(_) => break,
                        },
                        recv(wake_rx) -> _ => break,
                    }
                }
            })
            .map_err(|e| LoggerError::io_operation("start dispatcher", "Failed to spawn consumer thread", e))?;

        *handle = Some(spawned);
        self.state
            .store(DispatcherState::Running as u8, Ordering::Release);
        Ok(())
    }

    fn take_startup_warning(&self) -> Option<Record> {
        self.startup_warning.lock().take().map(|summary| {
            self.accepted.fetch_add(1, Ordering::AcqRel);
            Record::new(
                Level::Warn,
                STARTUP_WARNING_TEMPLATE,
                vec![summary.into()],
                CallSite::new(module_path!(), "start", file!(), line!()),
            )
        })
    }

    /// Hand a record to the consumer.
    ///
    /// Blocks while the queue is full and the dispatcher is running. Returns
    /// `false` if the record was lost; losses are counted and reported, never
    /// returned as errors.
    pub fn enqueue(&self, record: Record) -> bool {
        let gate = self.gate.read();
        match self.state() {
            DispatcherState::Running => {
                drop(gate);
                self.enqueue_blocking(record)
            }
            DispatcherState::Created | DispatcherState::Draining => {
                match self.sender.try_send(record) {
                    Ok(()) => self.accept(),
                    Err(TrySendError::Full(_)) => self.lose(LoggerError::QueueFull),
                    Err(TrySendError::Disconnected(_)) => self.lose(LoggerError::QueueDisconnected),
                }
            }
            DispatcherState::Stopped => self.lose(LoggerError::DispatcherStopped),
        }
    }

    fn enqueue_blocking(&self, mut record: Record) -> bool {
        let mut blocked = false;
        loop {
            // Released between attempts so shutdown can take the gate
            let _gate = self.gate.read();
            if self.state() == DispatcherState::Stopped {
                return self.lose(LoggerError::DispatcherStopped);
            }

            match self.sender.try_send(record) {
                Ok(()) => return self.accept(),
                Err(TrySendError::Full(returned)) => record = returned,
                Err(TrySendError::Disconnected(_)) => {
                    return self.lose(LoggerError::QueueDisconnected);
                }
            }

            if !blocked {
                self.metrics.record_block();
                blocked = true;
            }
            match self.sender.send_timeout(record, BLOCK_POLL) {
                Ok(()) => return self.accept(),
                Err(SendTimeoutError::Timeout(returned)) => record = returned,
                Err(SendTimeoutError::Disconnected(_)) => {
                    return self.lose(LoggerError::QueueDisconnected);
                }
            }
        }
    }

    fn accept(&self) -> bool {
        self.accepted.fetch_add(1, Ordering::AcqRel);
        true
    }

    fn lose(&self, cause: LoggerError) -> bool {
        self.metrics.record_lost();
        if let Some(total) = self.lost.record() {
            self.error_handler
                .report(&format!("Dispatcher lost {} record(s)", total), Some(&cause));
        }
        false
    }

    /// Wait until every accepted record has been handed to the sinks.
    ///
    /// Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        loop {
            if self.metrics.dispatched() >= self.accepted.load(Ordering::Acquire) {
                return true;
            }
            if start.elapsed() >= timeout || self.state() == DispatcherState::Created {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Flush every sink
    pub fn flush(&self) {
        flush_all(&self.sinks, self.error_handler);
    }

    /// Stop the consumer, drain the queue on this thread and close the sinks.
    ///
    /// Returns `true` if the consumer stopped within `timeout`. Calling it
    /// again after the dispatcher stopped returns `true` and does nothing.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let previous = self.state.swap(DispatcherState::Draining as u8, Ordering::AcqRel);
        if DispatcherState::from_u8(previous) != DispatcherState::Created
            && DispatcherState::from_u8(previous) != DispatcherState::Running
        {
            self.state.store(previous, Ordering::Release);
            return true;
        }

        self.exit.store(true, Ordering::Release);
        drop(self.wake_tx.lock().take());

        let mut joined = true;
        if let Some(handle) = self.handle.lock().take() {
            let start = Instant::now();
            loop {
                if handle.is_finished() {
                    if let Err(e) = handle.join() {
                        eprintln!(
                            "[LOGGER ERROR] Dispatcher thread panicked during shutdown: {:?}",
                            e
                        );
                        joined = false;
                    }
                    break;
                }

                if start.elapsed() >= timeout {
                    eprintln!(
                        "[LOGGER WARNING] Dispatcher thread did not finish within timeout. \
                         Draining on the shutdown thread."
                    );
                    joined = false;
                    break;
                }

                thread::sleep(Duration::from_millis(10));
            }
        }

        {
            let mut sinks = self.sinks.lock();
            for sink in sinks.iter_mut() {
                sink.notify_shutdown();
            }
        }

        // Never started, so the warning is still pending
        if let Some(warning) = self.take_startup_warning() {
            fan_out(&self.sinks, &warning, &self.metrics, self.error_handler);
        }

        self.drain();
        {
            // No producer is between its state check and its send past this point
            let _gate = self.gate.write();
            self.state
                .store(DispatcherState::Stopped as u8, Ordering::Release);
        }
        self.drain();

        let mut sinks = self.sinks.lock();
        for (idx, sink) in sinks.iter_mut().enumerate() {
            let result = catch_unwind(AssertUnwindSafe(|| sink.close()));
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.error_handler
                        .report(&format!("Sink #{} close failed", idx), Some(&e));
                }
                Err(panic_info) => {
                    self.error_handler.report(
                        &format!(
                            "Sink #{} panicked during close: {}",
                            idx,
                            panic_message(&*panic_info)
                        ),
                        None,
                    );
                }
            }
        }

        joined
    }

    fn drain(&self) {
        while let Ok(record) = self.receiver.try_recv() {
            fan_out(&self.sinks, &record, &self.metrics, self.error_handler);
            self.metrics.record_drained();
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
    }
}

/// Call every sink with `record`
///
/// **Per-sink panic isolation**: each sink call is wrapped in `catch_unwind`,
/// a failing or panicking sink never stops the sinks after it.
fn fan_out(
    sinks: &SharedSinks,
    record: &Record,
    metrics: &DispatcherMetrics,
    error_handler: ErrorHandler,
) {
    let mut sinks = sinks.lock();
    for (idx, sink) in sinks.iter_mut().enumerate() {
        let append_result = catch_unwind(AssertUnwindSafe(|| sink.append(record)));

        match append_result {
            Ok(Ok(())) => {}
            // Already reported by the sink's own handler
            Ok(Err(LoggerError::Escalated(_))) => {
                metrics.record_sink_failure();
            }
            Ok(Err(e)) => {
                metrics.record_sink_failure();
                error_handler.report(&format!("Sink #{} '{}' failed", idx, sink.name()), Some(&e));
            }
            Err(panic_info) => {
                metrics.record_sink_panic();
                if error_handler.mode() != ErrorMode::Silent {
                    eprintln!(
                        "[LOGGER CRITICAL] Sink #{} panicked: {}. \
                         Other sinks continue to function.",
                        idx,
                        panic_message(&*panic_info)
                    );
                }
            }
        }
    }
    metrics.record_dispatched();
}

fn flush_all(sinks: &SharedSinks, error_handler: ErrorHandler) {
    let mut sinks = sinks.lock();
    for (idx, sink) in sinks.iter_mut().enumerate() {
        match catch_unwind(AssertUnwindSafe(|| sink.flush())) {
            Ok(Ok(())) | Ok(Err(LoggerError::Escalated(_))) => {}
            Ok(Err(e)) => {
                error_handler.report(&format!("Sink #{} flush failed", idx), Some(&e));
            }
            Err(panic_info) => {
                if error_handler.mode() != ErrorMode::Silent {
                    eprintln!(
                        "[LOGGER CRITICAL] Sink #{} panicked during flush: {}. \
                         Other sinks continue to function.",
                        idx,
                        panic_message(&*panic_info)
                    );
                }
            }
        }
    }
}

fn panic_message(panic_info: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Result, TemplateEngine};

    struct MemorySink {
        engine: TemplateEngine,
        lines: Arc<Mutex<Vec<String>>>,
        delay: Duration,
        shutdown_seen: Arc<AtomicBool>,
    }

    impl MemorySink {
        fn new(lines: Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                engine: TemplateEngine::new(""),
                lines,
                delay: Duration::ZERO,
                shutdown_seen: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl Sink for MemorySink {
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

        fn notify_shutdown(&mut self) {
            self.shutdown_seen.store(true, Ordering::SeqCst);
        }

        fn name(&self) -> &str {
            "memory"
        }
    }

    struct PanickingSink;

    impl Sink for PanickingSink {
        fn append(&mut self, _record: &Record) -> Result<()> {
            panic!("Intentional panic for testing");
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    struct FailingSink;

    impl Sink for FailingSink {
        fn append(&mut self, _record: &Record) -> Result<()> {
            Err(LoggerError::other("device unavailable"))
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    /// Fails every append through an `exception`-mode handler
    struct EscalatingSink {
        handler: ErrorHandler,
    }

    impl Sink for EscalatingSink {
        fn append(&mut self, _record: &Record) -> Result<()> {
            self.handler.handle("EscalatingSink: device unavailable", None)
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "escalating"
        }
    }

    fn record(text: &str) -> Record {
        Record::new(Level::Info, text, vec![], CallSite::caller())
    }

    fn quiet() -> ErrorHandler {
        ErrorHandler::new(ErrorMode::Silent)
    }

    #[test]
    fn test_state_transitions() {
        let dispatcher = Dispatcher::new(vec![]).with_error_handler(quiet());
        assert_eq!(dispatcher.state(), DispatcherState::Created);
        assert_eq!(dispatcher.capacity(), QUEUE_CAPACITY);

        dispatcher.start().unwrap();
        assert_eq!(dispatcher.state(), DispatcherState::Running);

        assert!(dispatcher.shutdown(DEFAULT_SHUTDOWN_TIMEOUT));
        assert_eq!(dispatcher.state(), DispatcherState::Stopped);
        assert!(dispatcher.shutdown(DEFAULT_SHUTDOWN_TIMEOUT));
        assert!(!dispatcher.enqueue(record("late")));
        assert_eq!(dispatcher.metrics().lost(), 1);
    }

    #[test]
    fn test_records_reach_sinks_in_order() {
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::new(vec![
            Box::new(MemorySink::new(Arc::clone(&first))),
            Box::new(MemorySink::new(Arc::clone(&second))),
        ]);
        dispatcher.start().unwrap();

        for i in 0..20 {
            assert!(dispatcher.enqueue(record(&format!("message {}", i))));
        }
        assert!(dispatcher.wait_idle(DEFAULT_SHUTDOWN_TIMEOUT));

        let expected: Vec<String> = (0..20).map(|i| format!("message {}", i)).collect();
        assert_eq!(*first.lock(), expected);
        assert_eq!(*second.lock(), expected);
        assert_eq!(dispatcher.metrics().dispatched(), 20);
    }

    #[test]
    fn test_startup_warning_comes_first() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::new(vec![Box::new(MemorySink::new(Arc::clone(&lines)))])
            .with_startup_warning("logfile: permission denied");

        // Queued before start, delivered after the warning
        assert!(dispatcher.enqueue(record("early")));
        dispatcher.start().unwrap();
        assert!(dispatcher.wait_idle(DEFAULT_SHUTDOWN_TIMEOUT));

        assert_eq!(
            *lines.lock(),
            vec![
                "Sink initialization failed: logfile: permission denied".to_string(),
                "early".to_string()
            ]
        );
    }

    #[test]
    fn test_shutdown_drains_unstarted_queue() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = MemorySink::new(Arc::clone(&lines));
        let shutdown_seen = Arc::clone(&sink.shutdown_seen);
        let dispatcher = Dispatcher::new(vec![Box::new(sink)]);

        for i in 0..5 {
            dispatcher.enqueue(record(&format!("pending {}", i)));
        }
        assert!(dispatcher.shutdown(DEFAULT_SHUTDOWN_TIMEOUT));

        assert_eq!(lines.lock().len(), 5);
        assert_eq!(dispatcher.metrics().drained(), 5);
        assert!(shutdown_seen.load(Ordering::SeqCst));
    }

    #[test]
    fn test_queue_full_before_start_loses() {
        let dispatcher = Dispatcher::with_capacity(vec![], 2).with_error_handler(quiet());
        assert!(dispatcher.enqueue(record("a")));
        assert!(dispatcher.enqueue(record("b")));
        assert!(!dispatcher.enqueue(record("c")));
        assert_eq!(dispatcher.metrics().lost(), 1);
    }

    #[test]
    fn test_full_queue_blocks_producer() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let mut sink = MemorySink::new(Arc::clone(&lines));
        sink.delay = Duration::from_millis(5);
        let dispatcher = Dispatcher::with_capacity(vec![Box::new(sink)], 2);
        dispatcher.start().unwrap();

        for i in 0..20 {
            assert!(dispatcher.enqueue(record(&format!("{}", i))));
        }
        assert!(dispatcher.shutdown(DEFAULT_SHUTDOWN_TIMEOUT));

        assert_eq!(lines.lock().len(), 20);
        assert_eq!(dispatcher.metrics().lost(), 0);
        assert!(dispatcher.metrics().block_events() > 0);
    }

    #[test]
    fn test_panicking_sink_is_isolated() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::new(vec![
            Box::new(PanickingSink),
            Box::new(FailingSink),
            Box::new(MemorySink::new(Arc::clone(&lines))),
        ])
        .with_error_handler(quiet());
        dispatcher.start().unwrap();

        dispatcher.enqueue(record("first"));
        dispatcher.enqueue(record("second"));
        assert!(dispatcher.wait_idle(DEFAULT_SHUTDOWN_TIMEOUT));

        assert_eq!(lines.lock().len(), 2);
        assert_eq!(dispatcher.metrics().sink_panics(), 2);
        assert_eq!(dispatcher.metrics().sink_failures(), 2);
    }

    #[test]
    fn test_escalated_failure_is_isolated() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::new(vec![
            Box::new(EscalatingSink {
                handler: ErrorHandler::new(ErrorMode::Exception),
            }),
            Box::new(MemorySink::new(Arc::clone(&lines))),
        ]);
        dispatcher.start().unwrap();

        assert!(dispatcher.enqueue(record("still delivered")));
        assert!(dispatcher.wait_idle(DEFAULT_SHUTDOWN_TIMEOUT));

        assert_eq!(*lines.lock(), vec!["still delivered".to_string()]);
        assert_eq!(dispatcher.metrics().sink_failures(), 1);
        assert_eq!(dispatcher.metrics().sink_panics(), 0);
        assert!(dispatcher.shutdown(DEFAULT_SHUTDOWN_TIMEOUT));
    }

    #[test]
    fn test_startup_warning_delivered_without_start() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::new(vec![Box::new(MemorySink::new(Arc::clone(&lines)))])
            .with_startup_warning("broken: disk full");

        assert!(dispatcher.enqueue(record("queued")));
        assert!(dispatcher.shutdown(DEFAULT_SHUTDOWN_TIMEOUT));

        assert_eq!(
            *lines.lock(),
            vec![
                "Sink initialization failed: broken: disk full".to_string(),
                "queued".to_string()
            ]
        );
        assert!(dispatcher.wait_idle(Duration::ZERO));
    }

    #[test]
    fn test_enqueue_after_stop_reports_cause() {
        let dispatcher = Dispatcher::new(vec![]).with_error_handler(quiet());
        assert!(dispatcher.shutdown(DEFAULT_SHUTDOWN_TIMEOUT));
        assert!(!dispatcher.enqueue(record("late")));
        assert!(!dispatcher.enqueue(record("later")));
        assert_eq!(dispatcher.metrics().lost(), 2);
        assert_eq!(dispatcher.lost.count(), 2);
    }
}

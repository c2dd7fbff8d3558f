//! Sink trait for log output destinations

use super::{error::Result, record::Record};

/// A destination for rendered records.
///
/// Sinks are only ever called from the dispatcher's consumer thread, or from
/// the thread draining the queue at shutdown, and never concurrently.
pub trait Sink: Send + Sync {
    /// Render and persist one record
    fn append(&mut self, record: &Record) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    /// The shutdown drain has begun
    fn notify_shutdown(&mut self) {}

    /// Final flush; called at most once
    fn close(&mut self) -> Result<()> {
        self.flush()
    }

    fn name(&self) -> &str;
}

//! Named loggers

use super::arg::{Arg, ErrorInfo};
use super::caller::CallSite;
use super::dispatcher::Dispatcher;
use super::level::Level;
use super::record::Record;
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// A named entry point into the pipeline.
///
/// Loggers are owned by the [`Registry`](super::registry::Registry) and shared
/// as `Arc<Logger>`; a level change made through the registry is visible to
/// every holder on its next call.
pub struct Logger {
    name: String,
    level: AtomicU8,
    dispatcher: Arc<Dispatcher>,
}

impl Logger {
    pub(crate) fn new(name: impl Into<String>, level: Level, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            name: name.into(),
            level: AtomicU8::new(level.value()),
            dispatcher,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current threshold
    pub fn level(&self) -> Level {
        Level::from_value(i64::from(self.level.load(Ordering::Acquire)))
    }

    pub(crate) fn set_level(&self, level: Level) {
        self.level.store(level.value(), Ordering::Release);
    }

    /// Whether a call at `level` would be forwarded
    #[inline]
    pub fn is_enabled(&self, level: Level) -> bool {
        level.passes(self.level())
    }

    #[track_caller]
    pub fn log(&self, level: Level, template: &str, args: Vec<Arg>) {
        self.log_at(level, template, args, CallSite::caller());
    }

    pub fn log_at(&self, level: Level, template: &str, args: Vec<Arg>, caller: CallSite) {
        if !self.is_enabled(level) {
            return;
        }
        self.dispatcher
            .enqueue(Record::new(level, template, args, caller));
    }

    /// Log with an error as argument 1
    pub fn log_error_at(
        &self,
        level: Level,
        template: &str,
        error: ErrorInfo,
        args: Vec<Arg>,
        caller: CallSite,
    ) {
        if !self.is_enabled(level) {
            return;
        }
        self.dispatcher
            .enqueue(Record::with_error(level, template, error, args, caller));
    }

    #[inline]
    #[track_caller]
    pub fn trace(&self, template: &str, args: Vec<Arg>) {
        self.log(Level::Trace, template, args);
    }

    #[inline]
    #[track_caller]
    pub fn diag(&self, template: &str, args: Vec<Arg>) {
        self.log(Level::Diag, template, args);
    }

    #[inline]
    #[track_caller]
    pub fn info(&self, template: &str, args: Vec<Arg>) {
        self.log(Level::Info, template, args);
    }

    #[inline]
    #[track_caller]
    pub fn warn(&self, template: &str, args: Vec<Arg>) {
        self.log(Level::Warn, template, args);
    }

    #[inline]
    #[track_caller]
    pub fn error(&self, template: &str, args: Vec<Arg>) {
        self.log(Level::Error, template, args);
    }

    #[track_caller]
    pub fn warn_with<E: Error + ?Sized>(&self, err: &E, template: &str, args: Vec<Arg>) {
        self.log_with(Level::Warn, err, template, args);
    }

    #[track_caller]
    pub fn error_with<E: Error + ?Sized>(&self, err: &E, template: &str, args: Vec<Arg>) {
        self.log_with(Level::Error, err, template, args);
    }

    #[track_caller]
    pub fn info_with<E: Error + ?Sized>(&self, err: &E, template: &str, args: Vec<Arg>) {
        self.log_with(Level::Info, err, template, args);
    }

    #[track_caller]
    pub fn log_with<E: Error + ?Sized>(&self, level: Level, err: &E, template: &str, args: Vec<Arg>) {
        if !self.is_enabled(level) {
            return;
        }
        self.log_error_at(level, template, ErrorInfo::new(err), args, CallSite::caller());
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level())
            .finish()
    }
}

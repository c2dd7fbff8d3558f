//! Logger hierarchy and level history
//!
//! Levels are assigned by dotted name prefix. Every `set_level` call is kept
//! in order and replayed onto loggers created later, so the most recent
//! matching call wins regardless of how specific its prefix is.

use super::arg::Arg;
use super::caller::{dotted_module_path, CallSite};
use super::config::{keys, Configuration};
use super::dispatcher::{Dispatcher, DEFAULT_SHUTDOWN_TIMEOUT};
use super::error::Result;
use super::error_handler::{ErrorHandler, DEFAULT_ROLLUP_THRESHOLD};
use super::level::Level;
use super::logger::Logger;
use super::record::Record;
use super::sink::Sink;
use crate::sinks::SinkFactory;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Default)]
struct RegistryState {
    loggers: HashMap<String, Arc<Logger>>,
    /// Every `set_level` call, in call order
    history: Vec<(String, Level)>,
}

pub struct Registry {
    state: Mutex<RegistryState>,
    default_level: Level,
    dispatcher: Arc<Dispatcher>,
}

impl Registry {
    /// A registry over an existing dispatcher. The dispatcher is not started.
    pub fn new(default_level: Level, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            default_level,
            dispatcher,
        }
    }

    /// A registry over `sinks` with a running dispatcher
    ///
    /// # Errors
    ///
    /// Returns error if the dispatcher thread cannot be spawned.
    pub fn with_sinks(default_level: Level, sinks: Vec<Box<dyn Sink>>) -> Result<Self> {
        let dispatcher = Arc::new(Dispatcher::new(sinks));
        dispatcher.start()?;
        Ok(Self::new(default_level, dispatcher))
    }

    /// Build sinks from `sinks.list` and start the dispatcher.
    ///
    /// Sinks that fail to construct do not fail the registry; they are
    /// summarised in a `Warn` record delivered before anything else.
    ///
    /// # Errors
    ///
    /// Returns error if the dispatcher thread cannot be spawned.
    pub fn from_config(config: &dyn Configuration, factory: &SinkFactory) -> Result<Self> {
        let default_level = Level::from_name(&config.get_string(keys::DEFAULT_LEVEL, "Warn"));
        let error_handler =
            ErrorHandler::from_name(&config.get_string(keys::ERROR_MODE, "syserror"));
        let rollup = config.get_long(keys::ERRORS_ROLLUP, DEFAULT_ROLLUP_THRESHOLD as i64);

        let resolution = factory.resolve(config);
        let warning = resolution.failure_summary();

        let mut dispatcher = Dispatcher::new(resolution.sinks)
            .with_error_handler(error_handler)
            .with_rollup_threshold(u64::try_from(rollup).unwrap_or(DEFAULT_ROLLUP_THRESHOLD));
        if let Some(summary) = warning {
            dispatcher = dispatcher.with_startup_warning(summary);
        }

        let dispatcher = Arc::new(dispatcher);
        dispatcher.start()?;
        Ok(Self::new(default_level, dispatcher))
    }

    pub fn default_level(&self) -> Level {
        self.default_level
    }

    /// The cached logger for `name`, created on first use.
    ///
    /// An empty name stands for the calling module. `::` separators are
    /// normalised to dots.
    #[track_caller]
    pub fn get_logger(&self, name: &str) -> Arc<Logger> {
        let name = if name.trim().is_empty() {
            CallSite::caller().class_name()
        } else {
            dotted_module_path(name.trim())
        };

        let mut state = self.state.lock();
        if let Some(logger) = state.loggers.get(&name) {
            return Arc::clone(logger);
        }

        let level = state
            .history
            .iter()
            .filter(|(prefix, _)| name.starts_with(prefix.as_str()))
            .last()
            .map_or(self.default_level, |(_, level)| *level);

        let logger = Arc::new(Logger::new(name.clone(), level, Arc::clone(&self.dispatcher)));
        state.loggers.insert(name, Arc::clone(&logger));
        logger
    }

    /// Set `level` on every logger whose name starts with `prefix` (an empty
    /// prefix matches all), and on loggers created later.
    pub fn set_level(&self, level: Level, prefix: &str) {
        let prefix = dotted_module_path(prefix.trim());
        let mut state = self.state.lock();
        for (name, logger) in &state.loggers {
            if name.starts_with(prefix.as_str()) {
                logger.set_level(level);
            }
        }
        state.history.push((prefix, level));
    }

    /// Build a record and hand it to the dispatcher, bypassing level checks
    #[track_caller]
    pub fn write(&self, level: Level, template: &str, args: Vec<Arg>) -> bool {
        self.dispatcher
            .enqueue(Record::new(level, template, args, CallSite::caller()))
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Level history in call order
    pub fn history(&self) -> Vec<(String, Level)> {
        self.state.lock().history.clone()
    }

    pub fn logger_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().loggers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Wait for queued records to be delivered, then flush every sink
    pub fn flush(&self) -> bool {
        let idle = self.dispatcher.wait_idle(DEFAULT_SHUTDOWN_TIMEOUT);
        self.dispatcher.flush();
        idle
    }

    /// Drain the dispatcher and close the sinks
    pub fn shutdown(&self) -> bool {
        self.dispatcher.shutdown(DEFAULT_SHUTDOWN_TIMEOUT)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("default_level", &self.default_level)
            .field("loggers", &self.logger_names())
            .field("dispatcher_state", &self.dispatcher.state())
            .finish()
    }
}

//! # Quill Logger
//!
//! An in-process logging pipeline: named loggers filter by level, a background
//! dispatcher decouples producers from slow sinks, and a small template
//! language renders each record once per distinct sink configuration.
//!
//! ## Features
//!
//! - **Hierarchical levels**: dotted logger names, level assignment by prefix
//!   with the most recent matching call winning
//! - **Backpressure**: a bounded queue blocks producers instead of dropping
//! - **Drain on shutdown**: nothing queued before shutdown is lost
//! - **Templates**: `@1s`, `@L`, `@c`, `{}`, `{2}` and friends
//! - **Rotating files**: numbered backups, newest data at the highest index
//!
//! ## Example
//!
//! ```
//! use quill_logger::prelude::*;
//! use quill_logger::{info, logger};
//!
//! let registry = Registry::with_sinks(Level::Info, vec![Box::new(ConsoleSink::new())]).unwrap();
//! let log = logger!(registry);
//! info!(log, "listening on port {}", 8080);
//! registry.shutdown();
//! ```

pub mod core;
pub mod macros;
pub mod sinks;

use once_cell::sync::OnceCell;

pub mod prelude {
    pub use crate::core::{
        Arg, CallSite, Configuration, DispatcherMetrics, EnvConfig, ErrorHandler, ErrorInfo,
        ErrorMode, Level, Logger, LoggerError, MapConfig, Record, Registry, Result, Sink,
        TemplateEngine, DEFAULT_SHUTDOWN_TIMEOUT,
    };
    pub use crate::sinks::{ConsoleSink, RotatingFileSink, SinkFactory};
}

pub use crate::core::{
    Arg, CallSite, Configuration, Dispatcher, DispatcherMetrics, EnvConfig, ErrorHandler,
    ErrorInfo, ErrorMode, Level, Logger, LoggerError, MapConfig, Record, Registry, Result, Sink,
    TemplateEngine, DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use crate::sinks::{ConsoleSink, RotatingFileSink, SinkFactory};

static GLOBAL: OnceCell<Registry> = OnceCell::new();

/// Initialise the process-wide registry with the built-in sinks.
///
/// # Errors
///
/// Returns error if the registry was already initialised or the dispatcher
/// cannot start.
pub fn init_global(config: &dyn Configuration) -> Result<ShutdownGuard> {
    init_global_with(config, &SinkFactory::with_builtins())
}

/// Same as [`init_global`] with custom sink constructors
///
/// # Errors
///
/// Same as [`init_global`].
pub fn init_global_with(config: &dyn Configuration, factory: &SinkFactory) -> Result<ShutdownGuard> {
    let registry = Registry::from_config(config, factory)?;
    if let Err(registry) = GLOBAL.set(registry) {
        registry.shutdown();
        return Err(LoggerError::config(
            "global registry",
            "already initialised",
        ));
    }
    Ok(ShutdownGuard { _private: () })
}

/// The process-wide registry, built from `QUILL_*` environment variables on
/// first use when [`init_global`] was never called.
///
/// # Errors
///
/// Returns error if the registry has to be built and its dispatcher cannot
/// start.
pub fn global() -> Result<&'static Registry> {
    GLOBAL.get_or_try_init(|| Registry::from_config(&EnvConfig::new(), &SinkFactory::with_builtins()))
}

/// Drain and close the process-wide registry, if there is one
pub fn shutdown() -> bool {
    GLOBAL.get().map_or(true, Registry::shutdown)
}

/// Shuts the process-wide registry down when dropped
#[must_use = "dropping the guard shuts the logger down"]
#[derive(Debug)]
pub struct ShutdownGuard {
    _private: (),
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        shutdown();
    }
}

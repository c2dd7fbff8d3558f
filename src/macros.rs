//! Logging macros that capture the full call site.
//!
//! Compared with the `Logger` methods, the macros also record the module path
//! and the enclosing function name, and evaluate their arguments only when the
//! level passes.
//!
//! # Examples
//!
//! ```
//! use quill_logger::prelude::*;
//! use quill_logger::{error, info, logger};
//!
//! let registry = Registry::with_sinks(Level::Info, vec![Box::new(ConsoleSink::new())]).unwrap();
//! let log = logger!(registry);
//!
//! // Basic logging
//! info!(log, "Server started");
//!
//! // Positional arguments
//! let port = 8080;
//! info!(log, "Server listening on port {}", port);
//!
//! // With an error as argument 1
//! let err = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
//! error!(log, err: err, "Request failed: @1e (user {2})", 42);
//! # registry.shutdown();
//! ```

/// Build a [`CallSite`](crate::core::CallSite) for the current location.
#[doc(hidden)]
#[macro_export]
macro_rules! __callsite {
    () => {{
        fn __quill_here() {}
        $crate::core::caller::CallSite::new(
            module_path!(),
            $crate::core::caller::enclosing_function(::core::any::type_name_of_val(&__quill_here)),
            file!(),
            line!(),
        )
    }};
}

/// Log a template with positional arguments.
///
/// Arguments go through [`Arg::from`](crate::Arg); an error passed as
/// `err: value` becomes argument 1.
///
/// # Examples
///
/// ```
/// # use quill_logger::prelude::*;
/// # use std::sync::Arc;
/// # let registry = Registry::new(Level::Info, Arc::new(quill_logger::Dispatcher::new(vec![])));
/// # let logger = registry.get_logger("app");
/// use quill_logger::log;
/// log!(logger, Level::Info, "Simple message");
/// log!(logger, Level::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, err: $err:expr, $template:expr $(, $arg:expr)* $(,)?) => {{
        let __logger = &$logger;
        let __level = $level;
        if __logger.is_enabled(__level) {
            __logger.log_error_at(
                __level,
                $template,
                $crate::ErrorInfo::new(&$err),
                vec![$($crate::Arg::from($arg)),*],
                $crate::__callsite!(),
            );
        }
    }};
    ($logger:expr, $level:expr, $template:expr $(, $arg:expr)* $(,)?) => {{
        let __logger = &$logger;
        let __level = $level;
        if __logger.is_enabled(__level) {
            __logger.log_at(
                __level,
                $template,
                vec![$($crate::Arg::from($arg)),*],
                $crate::__callsite!(),
            );
        }
    }};
}

/// Log a trace-level message.
///
/// # Examples
///
/// ```
/// # use quill_logger::prelude::*;
/// # use std::sync::Arc;
/// # let registry = Registry::new(Level::Trace, Arc::new(quill_logger::Dispatcher::new(vec![])));
/// # let logger = registry.get_logger("app");
/// use quill_logger::trace;
/// trace!(logger, "Entering function: calculate()");
/// trace!(logger, "Variable value: {}", 42);
/// ```
#[macro_export]
macro_rules! trace {
    ($logger:expr, $($rest:tt)+) => {
        $crate::log!($logger, $crate::Level::Trace, $($rest)+)
    };
}

/// Log a diagnostic message.
#[macro_export]
macro_rules! diag {
    ($logger:expr, $($rest:tt)+) => {
        $crate::log!($logger, $crate::Level::Diag, $($rest)+)
    };
}

/// Log an info-level message.
#[macro_export]
macro_rules! info {
    ($logger:expr, $($rest:tt)+) => {
        $crate::log!($logger, $crate::Level::Info, $($rest)+)
    };
}

/// Log a warning.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($rest:tt)+) => {
        $crate::log!($logger, $crate::Level::Warn, $($rest)+)
    };
}

/// Log an error.
///
/// # Examples
///
/// ```
/// # use quill_logger::prelude::*;
/// # use std::sync::Arc;
/// # let registry = Registry::new(Level::Info, Arc::new(quill_logger::Dispatcher::new(vec![])));
/// # let logger = registry.get_logger("app");
/// use quill_logger::error;
/// let err = std::fmt::Error;
/// error!(logger, "Connection failed");
/// error!(logger, err: err, "Write failed: @1E");
/// ```
#[macro_export]
macro_rules! error {
    ($logger:expr, $($rest:tt)+) => {
        $crate::log!($logger, $crate::Level::Error, $($rest)+)
    };
}

/// The logger named after the current module, or after `name`.
#[macro_export]
macro_rules! logger {
    ($registry:expr) => {
        $registry.get_logger(module_path!())
    };
    ($registry:expr, $name:expr) => {
        $registry.get_logger($name)
    };
}

#[cfg(test)]
mod tests {
    use crate::core::{Dispatcher, Level, Registry};
    use std::sync::Arc;

    fn registry(level: Level) -> Registry {
        Registry::new(level, Arc::new(Dispatcher::new(vec![])))
    }

    #[test]
    fn test_callsite_names_enclosing_function() {
        let site = crate::__callsite!();
        assert_eq!(site.class_name(), "quill_logger.macros.tests");
        assert_eq!(site.method_name(), "test_callsite_names_enclosing_function");
    }

    #[test]
    fn test_callsite_inside_closure() {
        let site = (|| crate::__callsite!())();
        assert_eq!(site.method_name(), "test_callsite_inside_closure");
    }

    #[test]
    fn test_logger_macro_uses_module_path() {
        let registry = registry(Level::Info);
        let logger = crate::logger!(registry);
        assert_eq!(logger.name(), "quill_logger.macros.tests");
        let named = crate::logger!(registry, "app.web");
        assert_eq!(named.name(), "app.web");
    }

    #[test]
    fn test_arguments_not_evaluated_when_filtered() {
        let registry = registry(Level::Warn);
        let logger = registry.get_logger("lazy");
        let evaluated = std::cell::Cell::new(false);
        let touch = || {
            evaluated.set(true);
            1
        };
        crate::diag!(logger, "value {}", touch());
        assert!(!evaluated.get());
        crate::warn!(logger, "value {}", touch());
        assert!(evaluated.get());
        assert_eq!(registry.dispatcher().queued(), 1);
    }

    #[test]
    fn test_error_becomes_first_argument() {
        let registry = registry(Level::Info);
        let logger = registry.get_logger("errors");
        let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        crate::error!(logger, err: err, "failed: @1e after {} tries", 3);
        assert_eq!(registry.dispatcher().queued(), 1);
    }
}

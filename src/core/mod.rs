//! Core pipeline types and traits

pub mod arg;
pub mod caller;
pub mod config;
pub mod dispatcher;
pub mod dump;
pub mod error;
pub mod error_handler;
pub mod level;
pub mod logger;
pub mod metrics;
pub mod record;
pub mod registry;
pub mod sink;
pub mod template;
pub mod timestamp;

pub use arg::{Arg, ErrorInfo};
pub use caller::CallSite;
pub use config::{Configuration, EnvConfig, MapConfig};
pub use dispatcher::{Dispatcher, DispatcherState, DEFAULT_SHUTDOWN_TIMEOUT, QUEUE_CAPACITY};
pub use dump::{ObjectDumper, Shape};
pub use error::{LoggerError, Result};
pub use error_handler::{ErrorHandler, ErrorMode};
pub use level::Level;
pub use logger::Logger;
pub use metrics::DispatcherMetrics;
pub use record::Record;
pub use registry::Registry;
pub use sink::Sink;
pub use template::TemplateEngine;
pub use timestamp::TimestampStyle;

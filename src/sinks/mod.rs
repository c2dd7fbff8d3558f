//! Log destinations

pub mod console;
pub mod factory;
pub mod rotating_file;

pub use crate::core::sink::Sink;
pub use console::ConsoleSink;
pub use factory::{parse_sink_list, SinkConstructor, SinkFactory, SinkResolution};
pub use rotating_file::{BackupNaming, RotatingFileSink};

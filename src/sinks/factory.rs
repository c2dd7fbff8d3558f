//! Construction of sinks from configured names

use super::{ConsoleSink, RotatingFileSink, Sink};
use crate::core::config::{keys, Configuration};
use crate::core::error::{LoggerError, Result};
use std::collections::HashMap;
use std::fmt;

/// Builds one sink from the configuration
pub type SinkConstructor =
    Box<dyn Fn(&dyn Configuration) -> Result<Box<dyn Sink>> + Send + Sync>;

pub const DEFAULT_SINKS: &str = "console";

/// Name-keyed sink constructors. Names are matched case-insensitively.
///
/// # Examples
///
/// ```
/// use quill_logger::core::config::MapConfig;
/// use quill_logger::sinks::{ConsoleSink, Sink, SinkFactory};
///
/// let factory = SinkFactory::with_builtins()
///     .with("quiet", |_| Ok(Box::new(ConsoleSink::new().with_colors(false)) as Box<dyn Sink>));
/// assert!(factory.contains("Quiet"));
///
/// let config = MapConfig::new().set("sinks.list", "console, quiet");
/// let resolved = factory.resolve(&config);
/// assert_eq!(resolved.sinks.len(), 2);
/// ```
pub struct SinkFactory {
    constructors: HashMap<String, SinkConstructor>,
}

impl SinkFactory {
    /// An empty factory
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// `console` and `logfile`, also reachable as `consolesink` and
    /// `rotatingfilesink`
    pub fn with_builtins() -> Self {
        let mut factory = Self::new();
        for name in ["console", "consolesink"] {
            factory.register(name, |config| {
                Ok(Box::new(ConsoleSink::from_config(config)) as Box<dyn Sink>)
            });
        }
        for name in ["logfile", "rotatingfilesink"] {
            factory.register(name, |config| {
                Ok(Box::new(RotatingFileSink::from_config(config)?) as Box<dyn Sink>)
            });
        }
        factory
    }

    /// Register a constructor, replacing any previous one with the same name
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&dyn Configuration) -> Result<Box<dyn Sink>> + Send + Sync + 'static,
    {
        self.constructors
            .insert(name.trim().to_lowercase(), Box::new(constructor));
    }

    #[must_use]
    pub fn with<F>(mut self, name: &str, constructor: F) -> Self
    where
        F: Fn(&dyn Configuration) -> Result<Box<dyn Sink>> + Send + Sync + 'static,
    {
        self.register(name, constructor);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(&name.trim().to_lowercase())
    }

    /// Build the sink registered under `name`
    ///
    /// # Errors
    ///
    /// `UnknownSink` for an unregistered name, or whatever the constructor returns.
    pub fn create(&self, name: &str, config: &dyn Configuration) -> Result<Box<dyn Sink>> {
        let constructor = self
            .constructors
            .get(&name.trim().to_lowercase())
            .ok_or_else(|| LoggerError::UnknownSink(name.to_string()))?;
        constructor(config)
    }

    /// Build every sink named in `sinks.list`, in order.
    ///
    /// Failures are collected rather than returned. When nothing could be
    /// built, a default console sink stands in.
    pub fn resolve(&self, config: &dyn Configuration) -> SinkResolution {
        let list = config.get_string(keys::SINKS_LIST, DEFAULT_SINKS);
        let mut resolution = SinkResolution::default();

        for name in parse_sink_list(&list) {
            match self.create(name, config) {
                Ok(sink) => resolution.sinks.push(sink),
                Err(e) => resolution.failures.push((name.to_string(), e)),
            }
        }

        if resolution.sinks.is_empty() {
            resolution.sinks.push(Box::new(ConsoleSink::from_config(config)));
        }
        resolution
    }
}

impl Default for SinkFactory {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for SinkFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.constructors.keys().collect();
        names.sort();
        f.debug_struct("SinkFactory").field("sinks", &names).finish()
    }
}

/// Sinks built by [`SinkFactory::resolve`] plus the names that failed
#[derive(Default)]
pub struct SinkResolution {
    pub sinks: Vec<Box<dyn Sink>>,
    pub failures: Vec<(String, LoggerError)>,
}

impl SinkResolution {
    /// One line summarising every failure, or `None` when all sinks were built
    pub fn failure_summary(&self) -> Option<String> {
        if self.failures.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .failures
            .iter()
            .map(|(name, err)| format!("{}: {}", name, err))
            .collect();
        Some(parts.join("; "))
    }
}

/// Split a sink list on commas and whitespace
pub fn parse_sink_list(list: &str) -> Vec<&str> {
    list.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|name| !name.is_empty())
        .collect()
}

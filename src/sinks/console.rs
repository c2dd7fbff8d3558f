//! Console sink

use crate::core::config::{keys, Configuration};
use crate::core::{Level, Record, Result, Sink, TemplateEngine};
#[cfg(feature = "console")]
use colored::Colorize;

pub const DEFAULT_CONSOLE_PREFIX: &str = "@U @c [@L]: ";

/// Writes one rendered line per record; `Error` goes to stderr, everything
/// else to stdout.
pub struct ConsoleSink {
    engine: TemplateEngine,
    use_colors: bool,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            engine: TemplateEngine::new(DEFAULT_CONSOLE_PREFIX),
            use_colors: true,
        }
    }

    pub fn from_config(config: &dyn Configuration) -> Self {
        Self {
            engine: TemplateEngine::from_config(
                config,
                keys::CONSOLE_PREFIX,
                DEFAULT_CONSOLE_PREFIX,
            ),
            use_colors: config.get_bool(keys::CONSOLE_COLORS, true),
        }
    }

    #[must_use]
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.engine = self.engine.with_prefix(prefix);
        self
    }

    pub fn engine(&self) -> &TemplateEngine {
        &self.engine
    }

    #[cfg(feature = "console")]
    fn decorate(&self, line: String, level: Level) -> String {
        if self.use_colors {
            line.color(level.color_code()).to_string()
        } else {
            line
        }
    }

    #[cfg(not(feature = "console"))]
    fn decorate(&self, line: String, _level: Level) -> String {
        line
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for ConsoleSink {
    fn append(&mut self, record: &Record) -> Result<()> {
        let line = self.decorate(self.engine.format(record), record.level());
        match record.level() {
            Level::Error => eprintln!("{}", line),
            _ => println!("{}", line),
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        use std::io::Write;
        std::io::stdout().flush()?;
        std::io::stderr().flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}

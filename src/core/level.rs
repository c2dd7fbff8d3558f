//! Severity levels

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered severity scale. Comparison is by rank, so `Trace < Diag < ... < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    /// Detailed trace of everything
    Trace = 1,
    /// Diagnostic data for debugging
    Diag = 2,
    /// Provenance and flow
    Info = 3,
    /// Something has gone awry
    Warn = 4,
    /// An error that must be dealt with
    Error = 5,
}

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Trace,
        Level::Diag,
        Level::Info,
        Level::Warn,
        Level::Error,
    ];

    /// Integer rank of this level
    #[inline]
    pub const fn value(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Level::Trace => "Trace",
            Level::Diag => "Diag",
            Level::Info => "Info",
            Level::Warn => "Warn",
            Level::Error => "Error",
        }
    }

    /// Look up a level by rank, `Warn` when no level has that rank
    pub fn from_value(value: i64) -> Self {
        Self::ALL
            .into_iter()
            .find(|level| i64::from(level.value()) == value)
            .unwrap_or(Level::Warn)
    }

    /// Look up a level by name (case-insensitive), `Warn` when unrecognized
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or(Level::Warn)
    }

    /// Whether a call at `self` passes a threshold of `threshold`
    #[inline]
    pub fn passes(self, threshold: Level) -> bool {
        self.value() >= threshold.value()
    }

    /// Descriptive form, e.g. `Level[name=Diag, value=2]`
    pub fn describe(self) -> String {
        format!("Level[name={}, value={}]", self.name(), self.value())
    }

    #[cfg(feature = "console")]
    pub fn color_code(self) -> colored::Color {
        use colored::Color::*;
        match self {
            Level::Trace => BrightBlack,
            Level::Diag => Blue,
            Level::Info => Green,
            Level::Warn => Yellow,
            Level::Error => Red,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TRACE" => Ok(Level::Trace),
            "DIAG" => Ok(Level::Diag),
            "INFO" => Ok(Level::Info),
            "WARN" => Ok(Level::Warn),
            "ERROR" => Ok(Level::Error),
            _ => Err(format!("Invalid log level: '{}'", s)),
        }
    }
}

//! Shared handling for faults inside the pipeline
//!
//! Logging must never take the host down. Every fault that is not simply a
//! filtered-out call is routed through an [`ErrorHandler`], whose behaviour is
//! chosen by the operator.

use super::error::{LoggerError, Result};
use std::error::Error;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default number of occurrences between two rolled-up reports
pub const DEFAULT_ROLLUP_THRESHOLD: u64 = 1000;

/// How faults are surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Swallow everything
    Silent,
    /// One line on stdout
    Console,
    /// One line on stderr
    #[default]
    Syserror,
    /// Report on stderr and return an error to the failing operation
    Exception,
}

impl FromStr for ErrorMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "silent" => Ok(ErrorMode::Silent),
            "console" => Ok(ErrorMode::Console),
            "syserror" | "stderr" => Ok(ErrorMode::Syserror),
            "exception" | "throw" => Ok(ErrorMode::Exception),
            other => Err(format!("Invalid error mode: '{}'", other)),
        }
    }
}

impl fmt::Display for ErrorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorMode::Silent => write!(f, "silent"),
            ErrorMode::Console => write!(f, "console"),
            ErrorMode::Syserror => write!(f, "syserror"),
            ErrorMode::Exception => write!(f, "exception"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorHandler {
    mode: ErrorMode,
}

impl ErrorHandler {
    pub const fn new(mode: ErrorMode) -> Self {
        Self { mode }
    }

    /// Parse the mode leniently; unknown names fall back to `syserror`
    pub fn from_name(name: &str) -> Self {
        Self::new(name.parse().unwrap_or_default())
    }

    pub fn mode(&self) -> ErrorMode {
        self.mode
    }

    /// Report a fault.
    ///
    /// Returns `Err(LoggerError::Escalated)` only in `exception` mode.
    pub fn handle(&self, message: &str, source: Option<&dyn Error>) -> Result<()> {
        let line = match source {
            Some(err) => format!("[LOGGER ERROR] {}: {}", message, err),
            None => format!("[LOGGER ERROR] {}", message),
        };

        match self.mode {
            ErrorMode::Silent => Ok(()),
            ErrorMode::Console => {
                println!("{}", line);
                Ok(())
            }
            ErrorMode::Syserror => {
                eprintln!("{}", line);
                Ok(())
            }
            ErrorMode::Exception => {
                eprintln!("{}", line);
                Err(LoggerError::Escalated(line))
            }
        }
    }

    /// Report a fault where escalation has nowhere to go
    pub fn report(&self, message: &str, source: Option<&dyn Error>) {
        let _ = self.handle(message, source);
    }
}

/// Counts repeated faults and decides which occurrences deserve a report:
/// the first one, then every `threshold`-th.
#[derive(Debug)]
pub struct Rollup {
    count: AtomicU64,
    threshold: u64,
}

impl Rollup {
    pub const fn new(threshold: u64) -> Self {
        Self {
            count: AtomicU64::new(0),
            threshold: if threshold == 0 { 1 } else { threshold },
        }
    }

    /// Record one occurrence; returns the new total when it should be reported
    pub fn record(&self) -> Option<u64> {
        let total = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        if total == 1 || total % self.threshold == 0 {
            Some(total)
        } else {
            None
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for Rollup {
    fn default() -> Self {
        Self::new(DEFAULT_ROLLUP_THRESHOLD)
    }
}

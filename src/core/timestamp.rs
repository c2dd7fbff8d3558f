//! Timestamp rendering styles
//!
//! Short local forms follow the US short style (`1/8/25, 1:05 PM`); UTC forms
//! are ISO 8601 with milliseconds.

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Timestamp styles used by the template engine and the file header
///
/// # Examples
///
/// ```
/// use quill_logger::core::TimestampStyle;
/// use chrono::{TimeZone, Utc};
///
/// let at = Utc.with_ymd_and_hms(2025, 1, 8, 10, 30, 45).unwrap();
/// assert_eq!(TimestampStyle::UtcDateTime.format(&at), "2025-01-08T10:30:45.000Z");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampStyle {
    /// `1/8/25`
    LocalDate,
    /// `1:05 PM`
    LocalTime,
    /// `1/8/25, 1:05 PM`
    LocalDateTime,
    /// `2025-01-08`
    UtcDate,
    /// `10:30:45.123Z`
    UtcTime,
    /// `2025-01-08T10:30:45.123Z`
    #[default]
    UtcDateTime,
    /// ISO 8601 local date and time without offset: `2025-01-08T13:05:09.123`
    IsoLocal,
}

impl TimestampStyle {
    #[must_use]
    pub fn format<Tz: TimeZone>(&self, datetime: &DateTime<Tz>) -> String
    where
        Tz::Offset: Display,
    {
        if self.is_utc() {
            let utc = datetime.with_timezone(&Utc);
            utc.format(self.pattern()).to_string()
        } else {
            let local = datetime.with_timezone(&Local);
            local.format(self.pattern()).to_string()
        }
    }

    /// Whether the style renders in UTC rather than local time
    #[must_use]
    pub fn is_utc(&self) -> bool {
        matches!(
            self,
            TimestampStyle::UtcDate | TimestampStyle::UtcTime | TimestampStyle::UtcDateTime
        )
    }

    fn pattern(&self) -> &'static str {
        match self {
            TimestampStyle::LocalDate => "%-m/%-d/%y",
            TimestampStyle::LocalTime => "%-I:%M %p",
            TimestampStyle::LocalDateTime => "%-m/%-d/%y, %-I:%M %p",
            TimestampStyle::UtcDate => "%Y-%m-%d",
            TimestampStyle::UtcTime => "%H:%M:%S%.3fZ",
            TimestampStyle::UtcDateTime => "%Y-%m-%dT%H:%M:%S%.3fZ",
            TimestampStyle::IsoLocal => "%Y-%m-%dT%H:%M:%S%.3f",
        }
    }
}

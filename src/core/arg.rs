//! Positional message arguments
//!
//! Arguments are captured into an owned, closed set of variants when the record
//! is built, so a record can cross to the dispatcher thread and be rendered
//! later without borrowing from the caller.

use super::dump::Shape;
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::Serialize;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// A captured failure: type, message and the chain of causes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    type_name: String,
    message: String,
    causes: Vec<String>,
}

impl ErrorInfo {
    pub fn new<E: Error + ?Sized>(err: &E) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            type_name: std::any::type_name::<E>().trim_start_matches('&').to_string(),
            message: err.to_string(),
            causes,
        }
    }

    /// For failures that are not `std::error::Error` values
    pub fn from_message(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            causes: Vec::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn causes(&self) -> &[String] {
        &self.causes
    }

    /// `TypeName: message` followed by one `Caused by:` line per cause
    pub fn trace(&self) -> String {
        let mut text = format!("{}: {}", self.type_name, self.message);
        for cause in &self.causes {
            text.push_str("\nCaused by: ");
            text.push_str(cause);
        }
        text
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Null,
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    DateTime(DateTime<Utc>),
    Error(ErrorInfo),
    /// Any other value, already turned into text
    Display(String),
    /// A structure for `@o` / `@O`
    Value(Arc<Shape>),
}

impl Arg {
    pub fn error<E: Error + ?Sized>(err: &E) -> Self {
        Arg::Error(ErrorInfo::new(err))
    }

    pub fn display<T: fmt::Display + ?Sized>(value: &T) -> Self {
        Arg::Display(value.to_string())
    }

    pub fn debug<T: fmt::Debug + ?Sized>(value: &T) -> Self {
        Arg::Display(format!("{:?}", value))
    }

    /// Capture any serializable value as a dumpable structure.
    ///
    /// Values that fail to serialize are kept as their error text.
    pub fn dump<T: Serialize + ?Sized>(value: &T) -> Self {
        let type_name = short_type_name(std::any::type_name::<T>());
        match serde_json::to_value(value) {
            Ok(json) => Arg::Value(Arc::new(Shape::from_json(type_name, json))),
            Err(err) => Arg::Display(format!("<{}: {}>", type_name, err)),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Arg::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Arg::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Arg::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Arg::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&DateTime<Utc>> {
        match self {
            Arg::DateTime(at) => Some(at),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorInfo> {
        match self {
            Arg::Error(info) => Some(info),
            _ => None,
        }
    }

    /// The value as a dump tree; plain values become single nodes
    pub fn to_shape(&self) -> Option<Arc<Shape>> {
        let shape = match self {
            Arg::Null => return None,
            Arg::Value(shape) => return Some(Arc::clone(shape)),
            Arg::Str(s) => Shape::scalar("String", s.clone()),
            Arg::Bool(b) => Shape::scalar("bool", b.to_string()),
            Arg::Int(n) => Shape::scalar("i64", n.to_string()),
            Arg::Float(x) => Shape::scalar("f64", format!("{:?}", x)),
            Arg::DateTime(at) => Shape::scalar("DateTime", at.to_rfc3339()),
            Arg::Error(info) => Shape::Error(info.clone()),
            Arg::Display(text) => Shape::scalar("Display", text.clone()),
        };
        Some(Arc::new(shape))
    }
}

/// Generic text form, used by `{}` and `@Nt`
impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Null => f.write_str("(null)"),
            Arg::Str(s) | Arg::Display(s) => f.write_str(s),
            Arg::Bool(b) => write!(f, "{}", b),
            Arg::Int(n) => write!(f, "{}", n),
            Arg::Float(x) => write!(f, "{:?}", x),
            Arg::DateTime(at) => write!(f, "{}", at.format("%Y-%m-%dT%H:%M:%S%.3fZ")),
            Arg::Error(info) => write!(f, "{}", info),
            Arg::Value(shape) => f.write_str(&shape.inline()),
        }
    }
}

fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Str(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Str(s)
    }
}

impl From<&String> for Arg {
    fn from(s: &String) -> Self {
        Arg::Str(s.clone())
    }
}

impl From<char> for Arg {
    fn from(c: char) -> Self {
        Arg::Str(c.to_string())
    }
}

impl From<bool> for Arg {
    fn from(b: bool) -> Self {
        Arg::Bool(b)
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Arg {
                fn from(n: $ty) -> Self {
                    Arg::Int(i64::from(n))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! impl_from_wide_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Arg {
                fn from(n: $ty) -> Self {
                    match i64::try_from(n) {
                        Ok(n) => Arg::Int(n),
                        Err(_) => Arg::Display(n.to_string()),
                    }
                }
            }
        )*
    };
}

impl_from_wide_int!(u64, usize, isize, i128, u128);

impl From<f32> for Arg {
    fn from(x: f32) -> Self {
        Arg::Float(f64::from(x))
    }
}

impl From<f64> for Arg {
    fn from(x: f64) -> Self {
        Arg::Float(x)
    }
}

impl From<DateTime<Utc>> for Arg {
    fn from(at: DateTime<Utc>) -> Self {
        Arg::DateTime(at)
    }
}

impl From<DateTime<Local>> for Arg {
    fn from(at: DateTime<Local>) -> Self {
        Arg::DateTime(at.with_timezone(&Utc))
    }
}

/// Naive date-times are taken to be UTC
impl From<NaiveDateTime> for Arg {
    fn from(at: NaiveDateTime) -> Self {
        Arg::DateTime(at.and_utc())
    }
}

impl From<ErrorInfo> for Arg {
    fn from(info: ErrorInfo) -> Self {
        Arg::Error(info)
    }
}

impl From<Shape> for Arg {
    fn from(shape: Shape) -> Self {
        Arg::Value(Arc::new(shape))
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        value.map_or(Arg::Null, Into::into)
    }
}

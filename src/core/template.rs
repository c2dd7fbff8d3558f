//! Message template rendering
//!
//! A line is rendered from `prefix + template`, scanned left to right.
//!
//! `@` symbols take an optional 1-based argument index (`1`..`9`) and one tag
//! letter. With an index the tag converts that argument:
//!
//! | tag | argument |
//! |---|---|
//! | `s` | string |
//! | `b` / `B` | bool as `T`/`F` or `true`/`false` |
//! | `i` / `h` | integer, decimal or hex |
//! | `f` | float |
//! | `d` / `D` | date-time, short local or UTC |
//! | `e` / `E` | error message, or message and causes |
//! | `t` | generic text |
//! | `o` / `O` | shallow or deep structure dump |
//!
//! Without an index the tag reads record metadata: `l`/`L` level value/name,
//! `d`/`t`/`u` local date/time/both, `D`/`T`/`U` the UTC forms, `e`/`E` the
//! record error, `m` method, `c` class.method, `p` package.class.method with an
//! abbreviated package, `P` the same unabbreviated, `h` thread name and `@@` for
//! a literal `@`.
//!
//! `{}` takes the next argument from a cursor that starts at 1, `{N}` takes
//! argument `N` without moving the cursor, and `{{` is a literal `{`.
//!
//! Absent or wrongly typed values render as `(null)`, unknown tags as `###` and
//! malformed symbols as `???`. Malformed symbols are also reported through the
//! [`ErrorHandler`].

use super::arg::Arg;
use super::caller::assemble_caller_path;
use super::config::{keys, Configuration};
use super::dump::{ObjectDumper, DEFAULT_DUMP_DEPTH, DEFAULT_DUMP_WIDTH};
use super::error_handler::ErrorHandler;
use super::record::Record;
use super::timestamp::TimestampStyle;

pub const NULL_TEXT: &str = "(null)";
pub const UNKNOWN_TAG_TEXT: &str = "###";
pub const MALFORMED_TEXT: &str = "???";

#[derive(Debug, Clone)]
pub struct TemplateEngine {
    prefix: String,
    deep: ObjectDumper,
    shallow: ObjectDumper,
    error_handler: ErrorHandler,
    signature: String,
}

impl TemplateEngine {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let deep = ObjectDumper::new(DEFAULT_DUMP_DEPTH, DEFAULT_DUMP_WIDTH);
        Self {
            signature: Self::make_signature(&prefix, &deep),
            prefix,
            shallow: ObjectDumper::shallow(deep.max_width()),
            deep,
            error_handler: ErrorHandler::default(),
        }
    }

    /// Engine whose prefix is read from `prefix_key`, with dump limits and error
    /// mode from the shared keys.
    pub fn from_config(config: &dyn Configuration, prefix_key: &str, default_prefix: &str) -> Self {
        let depth = config.get_integer(keys::DUMP_DEPTH, DEFAULT_DUMP_DEPTH as i32);
        let width = config.get_integer(keys::DUMP_WIDTH, DEFAULT_DUMP_WIDTH as i32);
        Self::new(config.get_string(prefix_key, default_prefix))
            .with_dumper(ObjectDumper::new(
                usize::try_from(depth).unwrap_or(0),
                usize::try_from(width).unwrap_or(0),
            ))
            .with_error_handler(ErrorHandler::from_name(
                &config.get_string(keys::ERROR_MODE, "syserror"),
            ))
    }

    #[must_use]
    pub fn with_dumper(mut self, dumper: ObjectDumper) -> Self {
        self.deep = dumper;
        self.shallow = ObjectDumper::shallow(dumper.max_width());
        self.signature = Self::make_signature(&self.prefix, &self.deep);
        self
    }

    /// Same settings under a different prefix
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self.signature = Self::make_signature(&self.prefix, &self.deep);
        self
    }

    #[must_use]
    pub fn with_error_handler(mut self, error_handler: ErrorHandler) -> Self {
        self.error_handler = error_handler;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Cache key shared by every engine with the same prefix and settings
    pub fn signature(&self) -> &str {
        &self.signature
    }

    fn make_signature(prefix: &str, dumper: &ObjectDumper) -> String {
        format!(
            "TemplateEngine:{}:depth={};width={}",
            prefix,
            dumper.max_depth(),
            dumper.max_width()
        )
    }

    /// Render through the record's cache
    pub fn format(&self, record: &Record) -> String {
        record.render_cached(&self.signature, |r| self.render(r))
    }

    /// Render without consulting the cache
    pub fn render(&self, record: &Record) -> String {
        let text: Vec<char> = self
            .prefix
            .chars()
            .chain(record.template().chars())
            .collect();
        let mut out = String::with_capacity(text.len() + 32);
        let mut cursor = 1usize;
        let mut pos = 0usize;

        while pos < text.len() {
            pos = match text[pos] {
                '@' => self.expand_at(&text, pos, record, &mut out),
                '{' => self.expand_brace(&text, pos, record, &mut cursor, &mut out),
                c => {
                    out.push(c);
                    pos + 1
                }
            };
        }

        out
    }

    /// Expand the `@` symbol at `pos`; returns the position after it
    fn expand_at(&self, text: &[char], pos: usize, record: &Record, out: &mut String) -> usize {
        let Some(&first) = text.get(pos + 1) else {
            self.malformed(text, pos, out);
            return text.len();
        };

        match first.to_digit(10) {
            Some(index) if index > 0 => match text.get(pos + 2) {
                Some(&tag) => {
                    out.push_str(&self.expand_arg(record, tag, index as usize));
                    pos + 3
                }
                None => {
                    self.malformed(text, pos, out);
                    text.len()
                }
            },
            _ => {
                out.push_str(&self.expand_meta(record, first));
                pos + 2
            }
        }
    }

    /// Expand the `{` sequence at `pos`; returns the position after it
    fn expand_brace(
        &self,
        text: &[char],
        pos: usize,
        record: &Record,
        cursor: &mut usize,
        out: &mut String,
    ) -> usize {
        match text.get(pos + 1) {
            Some('{') => {
                out.push('{');
                pos + 2
            }
            Some('}') => {
                push_display(out, record.arg(*cursor));
                *cursor += 1;
                pos + 2
            }
            Some(c) if c.is_ascii_digit() => {
                let end = text[pos + 1..]
                    .iter()
                    .position(|c| !c.is_ascii_digit())
                    .map_or(text.len(), |offset| pos + 1 + offset);
                if text.get(end) == Some(&'}') {
                    let digits: String = text[pos + 1..end].iter().collect();
                    let arg = digits.parse::<usize>().ok().and_then(|n| record.arg(n));
                    push_display(out, arg);
                    end + 1
                } else {
                    self.malformed(text, pos, out);
                    end
                }
            }
            _ => {
                out.push('{');
                pos + 1
            }
        }
    }

    fn malformed(&self, text: &[char], pos: usize, out: &mut String) {
        out.push_str(MALFORMED_TEXT);
        let template: String = text.iter().collect();
        self.error_handler.report(
            &format!(
                "Malformed template symbol at position {} in \"{}\"",
                pos, template
            ),
            None,
        );
    }

    fn expand_arg(&self, record: &Record, tag: char, index: usize) -> String {
        let arg = record.arg(index);
        let value = match tag {
            's' => arg.and_then(Arg::as_str).map(str::to_string),
            'b' => arg
                .and_then(Arg::as_bool)
                .map(|b| if b { "T" } else { "F" }.to_string()),
            'B' => arg.and_then(Arg::as_bool).map(|b| b.to_string()),
            'i' => arg.and_then(Arg::as_int).map(|n| n.to_string()),
            'h' => arg.and_then(Arg::as_int).map(|n| format!("{:x}", n)),
            'f' => arg.and_then(Arg::as_float).map(|x| format!("{:?}", x)),
            'd' => arg
                .and_then(Arg::as_datetime)
                .map(|at| TimestampStyle::LocalDateTime.format(at)),
            'D' => arg
                .and_then(Arg::as_datetime)
                .map(|at| TimestampStyle::UtcDateTime.format(at)),
            'e' => arg
                .and_then(Arg::as_error)
                .map(|info| info.message().to_string()),
            'E' => arg.and_then(Arg::as_error).map(|info| info.trace()),
            't' => arg.filter(|a| !a.is_null()).map(|a| a.to_string()),
            'o' => arg
                .and_then(Arg::to_shape)
                .map(|shape| self.shallow.dump(&shape, &format!("arg{}", index))),
            'O' => arg
                .and_then(Arg::to_shape)
                .map(|shape| self.deep.dump(&shape, &format!("arg{}", index))),
            _ => return UNKNOWN_TAG_TEXT.to_string(),
        };
        value.unwrap_or_else(|| NULL_TEXT.to_string())
    }

    fn expand_meta(&self, record: &Record, tag: char) -> String {
        let caller = record.caller();
        let caller_path = |show_package, show_class, abbreviated| {
            assemble_caller_path(
                &caller.class_name(),
                &caller.method_name(),
                show_package,
                show_class,
                abbreviated,
            )
        };
        let at = record.timestamp();

        match tag {
            'l' => record.level().value().to_string(),
            'L' => record.level().name().to_string(),
            'd' => TimestampStyle::LocalDate.format(at),
            'D' => TimestampStyle::UtcDate.format(at),
            't' => TimestampStyle::LocalTime.format(at),
            'T' => TimestampStyle::UtcTime.format(at),
            'u' => TimestampStyle::LocalDateTime.format(at),
            'U' => TimestampStyle::UtcDateTime.format(at),
            'e' => record
                .error()
                .map_or_else(|| NULL_TEXT.to_string(), |info| info.message().to_string()),
            'E' => record
                .error()
                .map_or_else(|| NULL_TEXT.to_string(), |info| info.trace()),
            'm' => caller_path(false, false, true),
            'c' => caller_path(false, true, true),
            'p' => caller_path(true, true, true),
            'P' => caller_path(true, true, false),
            'h' => record.thread_name().to_string(),
            '@' => "@".to_string(),
            _ => UNKNOWN_TAG_TEXT.to_string(),
        }
    }
}

fn push_display(out: &mut String, arg: Option<&Arg>) {
    match arg {
        Some(arg) => out.push_str(&arg.to_string()),
        None => out.push_str(NULL_TEXT),
    }
}

//! A captured log event

use super::arg::{Arg, ErrorInfo};
use super::caller::CallSite;
use super::level::Level;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;

/// One log event awaiting rendering and dispatch.
///
/// Every field is fixed at construction; the render cache only ever gains
/// entries, and a signature always maps to the same rendered text.
pub struct Record {
    level: Level,
    template: String,
    args: Vec<Arg>,
    timestamp: DateTime<Local>,
    thread_name: String,
    caller: CallSite,
    render_cache: Mutex<HashMap<String, String>>,
}

impl Record {
    pub fn new(level: Level, template: impl Into<String>, args: Vec<Arg>, caller: CallSite) -> Self {
        Self {
            level,
            template: template.into(),
            args,
            timestamp: Local::now(),
            thread_name: current_thread_name(),
            caller,
            render_cache: Mutex::new(HashMap::new()),
        }
    }

    /// A record carrying an error, addressable by templates as argument 1
    pub fn with_error(
        level: Level,
        template: impl Into<String>,
        error: ErrorInfo,
        mut args: Vec<Arg>,
        caller: CallSite,
    ) -> Self {
        args.insert(0, Arg::Error(error));
        Self::new(level, template, args, caller)
    }

    /// Override the capture time
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Local>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Override the producer thread name
    #[must_use]
    pub fn on_thread(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// 1-based argument lookup
    pub fn arg(&self, index: usize) -> Option<&Arg> {
        index.checked_sub(1).and_then(|i| self.args.get(i))
    }

    /// The error passed as argument 1, if any
    pub fn error(&self) -> Option<&ErrorInfo> {
        self.args.first().and_then(Arg::as_error)
    }

    pub fn timestamp(&self) -> &DateTime<Local> {
        &self.timestamp
    }

    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    pub fn caller(&self) -> &CallSite {
        &self.caller
    }

    pub fn cached_render(&self, signature: &str) -> Option<String> {
        self.render_cache.lock().get(signature).cloned()
    }

    /// Return the cached text for `signature`, rendering and storing it on a miss
    pub fn render_cached<F>(&self, signature: &str, render: F) -> String
    where
        F: FnOnce(&Record) -> String,
    {
        if let Some(hit) = self.cached_render(signature) {
            return hit;
        }
        let rendered = render(self);
        self.render_cache
            .lock()
            .entry(signature.to_string())
            .or_insert(rendered)
            .clone()
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("level", &self.level)
            .field("template", &self.template)
            .field("args", &self.args)
            .field("timestamp", &self.timestamp)
            .field("thread_name", &self.thread_name)
            .field("caller", &self.caller)
            .finish()
    }
}

fn current_thread_name() -> String {
    let thread = std::thread::current();
    match thread.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", thread.id()),
    }
}

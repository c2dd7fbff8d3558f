//! Structure dumps for `@o` and `@O`
//!
//! Values are first converted into a [`Shape`], a small closed tree of node
//! kinds, which [`ObjectDumper`] walks with depth and width limits. Shared
//! subtrees (the same `Arc` reachable twice) are printed once.

use super::arg::ErrorInfo;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

/// Hard upper bound on dump depth
pub const MAX_DUMP_DEPTH: usize = 5;
/// Hard upper bound on elements shown per sequence or mapping
pub const MAX_DUMP_WIDTH: usize = 100;

pub const DEFAULT_DUMP_DEPTH: usize = 3;
pub const DEFAULT_DUMP_WIDTH: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Null,
    Scalar {
        type_name: String,
        text: String,
    },
    Sequence {
        type_name: String,
        items: Vec<Arc<Shape>>,
    },
    Mapping {
        type_name: String,
        entries: Vec<(String, Arc<Shape>)>,
    },
    Error(ErrorInfo),
    Object {
        type_name: String,
        fields: Vec<(String, Arc<Shape>)>,
    },
}

impl Shape {
    pub fn scalar(type_name: impl Into<String>, text: impl Into<String>) -> Self {
        Shape::Scalar {
            type_name: type_name.into(),
            text: text.into(),
        }
    }

    /// Build from a JSON tree; a top-level object becomes an [`Shape::Object`]
    /// named `type_name`, nested objects become mappings.
    pub fn from_json(type_name: &str, value: serde_json::Value) -> Self {
        match Shape::from(value) {
            Shape::Mapping { entries, .. } => Shape::Object {
                type_name: type_name.to_string(),
                fields: entries,
            },
            other => other,
        }
    }

    fn type_name(&self) -> &str {
        match self {
            Shape::Null => "null",
            Shape::Scalar { type_name, .. }
            | Shape::Sequence { type_name, .. }
            | Shape::Mapping { type_name, .. }
            | Shape::Object { type_name, .. } => type_name,
            Shape::Error(info) => info.type_name(),
        }
    }

    /// One-line rendering used by generic display
    pub fn inline(&self) -> String {
        match self {
            Shape::Null => "(null)".to_string(),
            Shape::Scalar { text, .. } => text.clone(),
            Shape::Sequence { items, .. } => {
                let parts: Vec<String> = items.iter().map(|item| item.inline()).collect();
                format!("[{}]", parts.join(", "))
            }
            Shape::Mapping { entries, .. } => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key, value.inline()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            Shape::Error(info) => info.message().to_string(),
            Shape::Object { type_name, fields } => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key, value.inline()))
                    .collect();
                format!("{} {{ {} }}", type_name, parts.join(", "))
            }
        }
    }
}

impl From<serde_json::Value> for Shape {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Shape::Null,
            Value::Bool(b) => Shape::scalar("bool", b.to_string()),
            Value::Number(n) => {
                let type_name = if n.is_i64() {
                    "i64"
                } else if n.is_u64() {
                    "u64"
                } else {
                    "f64"
                };
                Shape::scalar(type_name, n.to_string())
            }
            Value::String(s) => Shape::scalar("String", s),
            Value::Array(items) => Shape::Sequence {
                type_name: "Array".to_string(),
                items: items.into_iter().map(|v| Arc::new(Shape::from(v))).collect(),
            },
            Value::Object(map) => Shape::Mapping {
                type_name: "Map".to_string(),
                entries: map
                    .into_iter()
                    .map(|(k, v)| (k, Arc::new(Shape::from(v))))
                    .collect(),
            },
        }
    }
}

/// Walks a [`Shape`] into indented text, two spaces per level.
#[derive(Debug, Clone, Copy)]
pub struct ObjectDumper {
    max_depth: usize,
    max_width: usize,
}

impl Default for ObjectDumper {
    fn default() -> Self {
        Self::new(DEFAULT_DUMP_DEPTH, DEFAULT_DUMP_WIDTH)
    }
}

struct DumpState {
    buffer: String,
    visited: HashSet<*const Shape>,
}

impl ObjectDumper {
    pub fn new(max_depth: usize, max_width: usize) -> Self {
        Self {
            max_depth: max_depth.min(MAX_DUMP_DEPTH),
            max_width: max_width.min(MAX_DUMP_WIDTH),
        }
    }

    /// Only the node itself and its direct children
    pub fn shallow(max_width: usize) -> Self {
        Self::new(1, max_width)
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn max_width(&self) -> usize {
        self.max_width
    }

    pub fn dump(&self, shape: &Shape, name: &str) -> String {
        let mut state = DumpState {
            buffer: String::new(),
            visited: HashSet::new(),
        };
        self.dump_node(&mut state, shape, name, 0);
        state.buffer
    }

    fn dump_node(&self, state: &mut DumpState, shape: &Shape, name: &str, depth: usize) {
        if depth > self.max_depth {
            return;
        }

        if let Shape::Null = shape {
            self.line(state, depth, &format!("{} (null)", name));
            return;
        }

        self.line(state, depth, &format!("{} {}", shape.type_name(), name));

        match shape {
            Shape::Null => {}
            Shape::Scalar { text, .. } => {
                let _ = write!(state.buffer, " = {}", text);
            }
            Shape::Error(info) => {
                let _ = write!(state.buffer, " = {}", info.message());
                for cause in info.causes() {
                    self.line(state, depth + 1, &format!("Caused by: {}", cause));
                }
            }
            Shape::Sequence { items, .. } => {
                if self.already_visited(state, shape) {
                    return;
                }
                let _ = write!(state.buffer, " [");
                for (index, item) in items.iter().take(self.max_width).enumerate() {
                    self.dump_node(state, item, &format!("[{}]", index), depth + 1);
                }
                self.close(state, items.len(), depth, "]");
            }
            Shape::Mapping { entries, .. } | Shape::Object { fields: entries, .. } => {
                if self.already_visited(state, shape) {
                    return;
                }
                let (open, close, keyed) = match shape {
                    Shape::Mapping { .. } => (" [", "]", true),
                    _ => (" {", "}", false),
                };
                let _ = write!(state.buffer, "{}", open);
                for (key, value) in entries.iter().take(self.max_width) {
                    let label = if keyed {
                        format!("[{}]", key)
                    } else {
                        key.clone()
                    };
                    self.dump_node(state, value, &label, depth + 1);
                }
                self.close(state, entries.len(), depth, close);
            }
        }
    }

    fn close(&self, state: &mut DumpState, total: usize, depth: usize, bracket: &str) {
        if total > self.max_width && depth < self.max_depth {
            self.line(
                state,
                depth + 1,
                &format!("...and {} more.", total - self.max_width),
            );
        }
        self.line(state, depth, bracket);
    }

    fn already_visited(&self, state: &mut DumpState, shape: &Shape) -> bool {
        if state.visited.insert(shape as *const Shape) {
            false
        } else {
            state.buffer.push_str(" (already shown above)");
            true
        }
    }

    fn line(&self, state: &mut DumpState, depth: usize, text: &str) {
        if !state.buffer.is_empty() {
            state.buffer.push('\n');
        }
        for _ in 0..depth {
            state.buffer.push_str("  ");
        }
        state.buffer.push_str(text);
    }
}

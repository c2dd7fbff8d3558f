//! Call-site provenance
//!
//! Rust has no runtime stack inspection, so the first frame outside the
//! library is found with `#[track_caller]` on every public logging entry, and
//! the macros in [`crate::macros`] add the module path and the enclosing
//! function name.

use std::panic::Location;

/// Longest package prefix kept by [`abbreviate`]
pub const MAX_ABBREV_LEN: usize = 16;

/// Where a log call was made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    module_path: Option<&'static str>,
    function: Option<&'static str>,
    file: &'static str,
    line: u32,
}

impl CallSite {
    /// Full provenance, as captured by the macros
    pub const fn new(
        module_path: &'static str,
        function: &'static str,
        file: &'static str,
        line: u32,
    ) -> Self {
        Self {
            module_path: Some(module_path),
            function: Some(function),
            file,
            line,
        }
    }

    /// Provenance known only from a source location
    pub fn from_location(location: &'static Location<'static>) -> Self {
        Self {
            module_path: None,
            function: None,
            file: location.file(),
            line: location.line(),
        }
    }

    /// The location of whoever called the `#[track_caller]` chain
    #[track_caller]
    pub fn caller() -> Self {
        Self::from_location(Location::caller())
    }

    pub fn file(&self) -> &'static str {
        self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    /// Dotted module path (`app::db::pool` becomes `app.db.pool`); without a
    /// module path the source file stands in (`src/db/pool.rs` becomes
    /// `src.db.pool`).
    pub fn class_name(&self) -> String {
        match self.module_path {
            Some(path) => dotted_module_path(path),
            None => dotted_file_path(self.file),
        }
    }

    /// Enclosing function, or `L<line>` when unknown
    pub fn method_name(&self) -> String {
        match self.function {
            Some(function) if !function.is_empty() => function.to_string(),
            _ => format!("L{}", self.line),
        }
    }
}

/// `a::b::c` to `a.b.c`
pub fn dotted_module_path(path: &str) -> String {
    path.replace("::", ".")
}

fn dotted_file_path(file: &str) -> String {
    let trimmed = file.strip_suffix(".rs").unwrap_or(file);
    trimmed
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join(".")
}

/// Extract the enclosing function name from the type name of a marker item
/// declared inside it, e.g. `app::db::connect::{{closure}}::__quill_here` gives
/// `connect`.
pub fn enclosing_function(marker_type_name: &'static str) -> &'static str {
    let mut path = marker_type_name
        .rsplit_once("::")
        .map(|(head, _)| head)
        .unwrap_or(marker_type_name);
    while let Some(head) = path.strip_suffix("::{{closure}}") {
        path = head;
    }
    path.rsplit("::").next().unwrap_or(path)
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Abbreviate a dotted package name (normally ending with a dot) to at most
/// [`MAX_ABBREV_LEN`] characters.
///
/// Names longer than twice the limit first lose every vowel that does not
/// directly follow a dot. Then segments are shortened one character at a
/// time, cycling through them, without emptying any segment.
pub fn abbreviate(dotted: &str) -> String {
    let mut chars: Vec<char> = dotted.chars().collect();

    if chars.len() > MAX_ABBREV_LEN * 2 {
        let mut squeezed = Vec::with_capacity(chars.len());
        let mut i = 0;
        while i < chars.len() {
            squeezed.push(chars[i]);
            if i + 1 < chars.len() && chars[i] != '.' && is_vowel(chars[i + 1]) {
                i += 2;
            } else {
                i += 1;
            }
        }
        chars = squeezed;
    }

    let mut made_progress = true;
    while chars.len() > MAX_ABBREV_LEN && made_progress {
        made_progress = false;
        let mut pos = 0;
        while pos < chars.len() && chars.len() > MAX_ABBREV_LEN {
            if chars[pos] == '.' {
                let segment_start = chars[..pos]
                    .iter()
                    .rposition(|&c| c == '.')
                    .map_or(0, |dot| dot + 1);
                if pos - segment_start > 1 {
                    chars.remove(pos - 1);
                    made_progress = true;
                    // the dot moved one position left
                    pos -= 1;
                }
            }
            pos += 1;
        }
    }

    chars.into_iter().collect()
}

/// Assemble `package.class.method` from a dotted class name.
pub fn assemble_caller_path(
    class_name: &str,
    method_name: &str,
    show_package: bool,
    show_class: bool,
    abbreviated: bool,
) -> String {
    if !show_class {
        return method_name.to_string();
    }

    let (package, class) = match class_name.rfind('.') {
        Some(dot) if dot > 0 => (&class_name[..=dot], &class_name[dot + 1..]),
        _ => ("", class_name),
    };

    let package = match (show_package, abbreviated) {
        (false, _) => String::new(),
        (true, true) => abbreviate(package),
        (true, false) => package.to_string(),
    };

    format!("{}{}.{}", package, class, method_name)
}

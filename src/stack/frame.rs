use alloc::{string::String, vec::Vec};
use core::{fmt, panic::Location};

/// A single resolved stack frame.
///
/// Any of the fields may be missing when debug information is unavailable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// The demangled function path, without the trailing hash.
    pub function: Option<String>,
    /// The source file.
    pub file: Option<String>,
    /// The line number in [`file`](Self::file).
    pub line: Option<u32>,
    /// The instruction address the frame was resolved from, if any.
    pub address: Option<usize>,
}

impl Frame {
    pub(crate) fn from_location(location: &'static Location<'static>) -> Self {
        Self {
            function: None,
            file: Some(location.file().into()),
            line: Some(location.line()),
            address: None,
        }
    }

    /// The bare function name, with module path and generic arguments
    /// removed. `my_app::db::<impl Pool>::connect` becomes `connect`.
    #[must_use]
    pub fn function_name(&self) -> Option<&str> {
        self.function.as_deref().map(get_function_name)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file.as_deref().unwrap_or("<unknown>"))?;
        write!(f, ":{}", self.line.unwrap_or(0))?;
        match (&self.function, self.address) {
            (Some(function), _) => write!(f, " {function}"),
            (None, Some(address)) => write!(f, " {address:#x}"),
            (None, None) => Ok(()),
        }
    }
}

#[cfg(feature = "backtrace")]
pub(super) fn resolve(ip: usize) -> Vec<Frame> {
    use alloc::{format, string::ToString};

    let mut frames = Vec::new();
    backtrace::resolve(ip as *mut core::ffi::c_void, |symbol| {
        frames.push(Frame {
            function: symbol.name().map(|name| format!("{name:#}")),
            file: symbol.filename().map(|path| path.display().to_string()),
            line: symbol.lineno(),
            address: Some(ip),
        });
    });
    if frames.is_empty() {
        frames.push(Frame {
            function: None,
            file: None,
            line: None,
            address: Some(ip),
        });
    }
    frames
}

#[cfg(not(feature = "backtrace"))]
pub(super) fn resolve(ip: usize) -> Vec<Frame> {
    alloc::vec![Frame {
        function: None,
        file: None,
        line: None,
        address: Some(ip),
    }]
}

#[cfg(feature = "backtrace")]
fn is_ident_start(c: char) -> bool {
    unicode_ident::is_xid_start(c)
}

#[cfg(feature = "backtrace")]
fn is_ident_continue(c: char) -> bool {
    unicode_ident::is_xid_continue(c)
}

#[cfg(not(feature = "backtrace"))]
fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

#[cfg(not(feature = "backtrace"))]
fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/// Picks the last path segment outside of any `<...>` or `{...}` nesting.
fn get_function_name(s: &str) -> &str {
    let mut word_start = 0usize;
    let mut word_end = 0usize;
    let mut angle_nesting_level = 0u64;
    let mut curly_nesting_level = 0u64;
    let mut potential_function_arrow = false;
    let mut inside_word = false;

    for (i, c) in s.char_indices() {
        if curly_nesting_level == 0 && angle_nesting_level == 0 {
            if !inside_word && is_ident_start(c) {
                word_start = i;
                inside_word = true;
            } else if inside_word && !is_ident_continue(c) {
                word_end = i;
                inside_word = false;
            }
        }

        let was_potential_function_arrow = potential_function_arrow;
        potential_function_arrow = c == '-';

        if c == '<' {
            angle_nesting_level = angle_nesting_level.saturating_add(1);
        } else if c == '>' && !was_potential_function_arrow {
            angle_nesting_level = angle_nesting_level.saturating_sub(1);
        } else if c == '{' {
            curly_nesting_level = curly_nesting_level.saturating_add(1);
            if !inside_word && curly_nesting_level == 1 && angle_nesting_level == 0 {
                word_start = i;
                inside_word = true;
            }
        } else if c == '}' {
            curly_nesting_level = curly_nesting_level.saturating_sub(1);
            if inside_word && curly_nesting_level == 0 {
                word_end = i + 1;
                inside_word = false;
            }
        }
    }

    if word_start < word_end {
        &s[word_start..word_end]
    } else {
        &s[word_start..]
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    #[test]
    fn test_function_name_strips_paths_and_generics() {
        assert_eq!(get_function_name("my_app::db::connect"), "connect");
        assert_eq!(get_function_name("<my_app::Pool as Drop>::drop"), "drop");
        assert_eq!(
            get_function_name("my_app::run::{{closure}}"),
            "{{closure}}"
        );
        assert_eq!(get_function_name("main"), "main");
    }

    #[test]
    fn test_display_falls_back_to_address() {
        let frame = Frame {
            function: None,
            file: None,
            line: None,
            address: Some(0x10),
        };
        assert_eq!(frame.to_string(), "<unknown>:0 0x10");

        let frame = Frame {
            function: Some("app::main".into()),
            file: Some("src/main.rs".into()),
            line: Some(4),
            address: Some(0x10),
        };
        assert_eq!(frame.to_string(), "src/main.rs:4 app::main");
        assert_eq!(frame.function_name(), Some("main"));
    }
}

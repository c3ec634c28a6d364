use alloc::{string::String, vec::Vec};
use core::fmt;

use triomphe::Arc;
use unsize::CoerceUnsize;

use crate::hook_lock::HookLock;

/// Post-processing applied to rendered stack lines before they are shown.
///
/// Implemented for every `Fn(Vec<String>) -> Vec<String>` closure:
///
/// ```
/// use faultline::{Cleaner, Error};
///
/// let hide_tests = Cleaner::new(|lines: Vec<String>| {
///     lines.into_iter().filter(|line| !line.contains("test::")).collect()
/// });
/// let err = Error::new("db.timeout").with_caller_stack().with_stack_cleaner(hide_tests);
/// assert!(err.stack_cleaner().is_some());
/// ```
pub trait StackCleaner: 'static + Send + Sync {
    /// Filters or rewrites the rendered lines of one snapshot.
    fn clean(&self, lines: Vec<String>) -> Vec<String>;
}

impl<F> StackCleaner for F
where
    F: Fn(Vec<String>) -> Vec<String> + 'static + Send + Sync,
{
    fn clean(&self, lines: Vec<String>) -> Vec<String> {
        (self)(lines)
    }
}

/// A shared handle to a [`StackCleaner`].
#[derive(Clone)]
pub struct Cleaner(Arc<dyn StackCleaner>);

impl Cleaner {
    /// Wraps a cleaner.
    pub fn new(cleaner: impl StackCleaner) -> Self {
        Self(Arc::new(cleaner).unsize(unsize::Coercion!(to dyn StackCleaner)))
    }

    /// Runs several cleaners one after another.
    pub fn chain(cleaners: impl IntoIterator<Item = Cleaner>) -> Self {
        let cleaners: Vec<Cleaner> = cleaners.into_iter().collect();
        Self::new(move |lines: Vec<String>| {
            cleaners
                .iter()
                .fold(lines, |lines, cleaner| cleaner.clean(lines))
        })
    }

    /// Applies the cleaner.
    #[must_use]
    pub fn clean(&self, lines: Vec<String>) -> Vec<String> {
        self.0.clean(lines)
    }
}

impl fmt::Debug for Cleaner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cleaner")
    }
}

/// Drops frames that belong to the listed crates.
///
/// A line belongs to a crate when its function path starts with
/// `crate_name::`, or when its file lives in that crate's sources inside the
/// Rust toolchain (`std`, `core`, `alloc`) or the cargo registry.
#[derive(Clone, Copy, Debug)]
pub struct SkipCrates(pub &'static [&'static str]);

impl SkipCrates {
    /// Crates hidden by the default cleaner.
    pub const DEFAULT: Self = Self(&["std", "core", "alloc", "backtrace"]);

    fn is_skipped(&self, line: &str) -> bool {
        self.0.iter().any(|krate| {
            line.split_once(' ')
                .is_some_and(|(_, function)| belongs_to(function, krate))
                || line_crate(line).is_some_and(|found| found == *krate)
        })
    }
}

impl StackCleaner for SkipCrates {
    fn clean(&self, mut lines: Vec<String>) -> Vec<String> {
        lines.retain(|line| !self.is_skipped(line));
        lines
    }
}

fn belongs_to(function: &str, krate: &str) -> bool {
    let function = function.trim_start_matches('<');
    function
        .strip_prefix(krate)
        .is_some_and(|rest| rest.starts_with("::"))
}

#[cfg(feature = "backtrace")]
fn line_crate(line: &str) -> Option<&str> {
    let [std_regex, registry_regex] = path_regexes();
    std_regex
        .captures(line)
        .or_else(|| registry_regex.captures(line))
        .and_then(|captures| captures.get(1))
        .map(|krate| krate.as_str())
}

#[cfg(not(feature = "backtrace"))]
fn line_crate(_line: &str) -> Option<&str> {
    None
}

#[cfg(feature = "backtrace")]
fn path_regexes() -> &'static [regex::Regex; 2] {
    use std::sync::OnceLock;

    static REGEXES: OnceLock<[regex::Regex; 2]> = OnceLock::new();
    REGEXES.get_or_init(|| {
        [
            // Rust standard library paths:
            // - /lib/rustlib/src/rust/library/{std|core|alloc}/src/...
            // - /rustc/{40-char-hash}/library/{std|core|alloc}/src/...
            regex::Regex::new(
                r"(?:/lib/rustlib/src/rust|/rustc/[0-9a-f]{40})/library/(std|core|alloc)/src/",
            )
            .expect("built-in regex pattern for std library paths should be valid"),
            // Cargo registry paths:
            // - /.cargo/registry/src/{index}-{16-char-hash}/{crate}-{version}/src/...
            regex::Regex::new(r"/\.cargo/registry/src/[^/]+-[0-9a-f]{16}/([^./]+)-[0-9]+\.[^/]*/src/")
                .expect("built-in regex pattern for cargo registry paths should be valid"),
        ]
    })
}

/// Shortens toolchain and cargo registry paths to `[..]/<suffix>`.
///
/// `/home/me/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/tokio-1.47.0/src/runtime/mod.rs:12 ...`
/// becomes `[..]/tokio-1.47.0/src/runtime/mod.rs:12 ...`.
#[cfg(feature = "backtrace")]
#[derive(Clone, Copy, Debug, Default)]
pub struct ShortenPaths;

#[cfg(feature = "backtrace")]
impl ShortenPaths {
    fn shorten(line: &str) -> Option<String> {
        let [std_regex, registry_regex] = path_regexes();
        let krate = std_regex
            .captures(line)
            .or_else(|| registry_regex.captures(line))?
            .get(1)?;
        let prefix_end = line[..krate.start()].rfind('/')?;
        let path_start = line[..prefix_end]
            .rfind(char::is_whitespace)
            .map_or(0, |i| i + 1);
        let mut shortened = String::with_capacity(line.len());
        shortened.push_str(&line[..path_start]);
        shortened.push_str("[..]");
        shortened.push_str(&line[prefix_end..]);
        Some(shortened)
    }
}

#[cfg(feature = "backtrace")]
impl StackCleaner for ShortenPaths {
    fn clean(&self, lines: Vec<String>) -> Vec<String> {
        lines
            .into_iter()
            .map(|line| Self::shorten(&line).unwrap_or(line))
            .collect()
    }
}

static DEFAULT_CLEANER: HookLock<Cleaner> = HookLock::new();

/// Installs the cleaner used for errors that carry no cleaner of their own,
/// returning the previously installed one.
pub fn set_default_cleaner(cleaner: Cleaner) -> Option<Cleaner> {
    tracing::debug!("installing default stack cleaner");
    DEFAULT_CLEANER.replace(Some(cleaner))
}

/// Removes an installed default cleaner, restoring the environment-derived
/// default.
pub fn clear_default_cleaner() -> Option<Cleaner> {
    tracing::debug!("clearing default stack cleaner");
    DEFAULT_CLEANER.replace(None)
}

/// The cleaner applied to errors without their own.
///
/// This is the cleaner installed with [`set_default_cleaner`], if any.
/// Otherwise, with the `backtrace` feature, it hides frames from
/// [`SkipCrates::DEFAULT`] and shortens paths, unless the environment asks
/// for full traces (see [`StackConfig`](crate::StackConfig)).
#[must_use]
pub fn default_cleaner() -> Option<Cleaner> {
    DEFAULT_CLEANER.snapshot().or_else(env_cleaner)
}

#[cfg(feature = "backtrace")]
fn env_cleaner() -> Option<Cleaner> {
    use std::sync::OnceLock;

    use super::StackConfig;

    static ENV_CLEANER: OnceLock<Option<Cleaner>> = OnceLock::new();
    ENV_CLEANER
        .get_or_init(|| {
            let config = StackConfig::get();
            if config.rust_backtrace_full {
                None
            } else if config.show_full_path {
                Some(Cleaner::new(SkipCrates::DEFAULT))
            } else {
                Some(Cleaner::chain([
                    Cleaner::new(SkipCrates::DEFAULT),
                    Cleaner::new(ShortenPaths),
                ]))
            }
        })
        .clone()
}

#[cfg(not(feature = "backtrace"))]
fn env_cleaner() -> Option<Cleaner> {
    None
}

#[cfg(test)]
mod tests {
    use alloc::{string::ToString, vec};

    use super::*;

    static_assertions::assert_impl_all!(Cleaner: Send, Sync, Clone);

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|line| line.to_string()).collect()
    }

    #[test]
    fn test_skip_crates_by_function_path() {
        let cleaned = SkipCrates(&["tokio"]).clean(lines(&[
            "src/main.rs:3 app::main",
            "src/rt.rs:9 tokio::runtime::block_on",
            "src/rt.rs:9 <tokio::runtime::Runtime as Drop>::drop",
        ]));
        assert_eq!(cleaned, vec!["src/main.rs:3 app::main".to_string()]);
    }

    #[cfg(feature = "backtrace")]
    #[test]
    fn test_skip_crates_by_registry_path() {
        let cleaned = SkipCrates(&["tokio"]).clean(lines(&[
            "/home/me/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/tokio-1.47.0/src/runtime/mod.rs:12 {{closure}}",
            "src/main.rs:3 app::main",
        ]));
        assert_eq!(cleaned, vec!["src/main.rs:3 app::main".to_string()]);
    }

    #[cfg(feature = "backtrace")]
    #[test]
    fn test_shorten_paths() {
        let cleaned = ShortenPaths.clean(lines(&[
            "/home/me/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/tokio-1.47.0/src/runtime/mod.rs:12 tokio::run",
            "/rustc/90b35a6239c3d8bdabc530a6a0816f7ff89a0aaf/library/std/src/rt.rs:195 std::rt::lang_start",
            "src/main.rs:3 app::main",
        ]));
        assert_eq!(
            cleaned,
            vec![
                "[..]/tokio-1.47.0/src/runtime/mod.rs:12 tokio::run".to_string(),
                "[..]/std/src/rt.rs:195 std::rt::lang_start".to_string(),
                "src/main.rs:3 app::main".to_string(),
            ]
        );
    }

    #[test]
    fn test_chain_runs_in_order() {
        let upper = Cleaner::new(|lines: Vec<String>| {
            lines.into_iter().map(|l| l.to_uppercase()).collect()
        });
        let first = Cleaner::new(|mut lines: Vec<String>| {
            lines.truncate(1);
            lines
        });
        let chained = Cleaner::chain([first, upper]);
        assert_eq!(chained.clean(lines(&["a", "b"])), vec!["A".to_string()]);
    }
}

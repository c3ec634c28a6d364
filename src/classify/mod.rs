//! Dynamic category resolution.
//!
//! An error's category is resolved in priority order:
//!
//! 1. the explicit category set with [`Error::with_category`], unless it is
//!    [`Category::UNKNOWN`];
//! 2. the error's own [`Classifier`], set with [`Error::with_classifier`];
//! 3. the process-wide classifier installed with [`set_global_classifier`];
//! 4. [`Category::UNKNOWN`].
//!
//! A classifier answering [`Category::UNKNOWN`] passes the decision on to the
//! next step. The first result is cached on the error, so each classifier
//! runs at most once per error value.
//!
//! Classifiers may resolve other errors, including the cause of the error
//! they are classifying. When resolution re-enters an error that the same
//! thread is already resolving, the inner call returns the explicit category (or
//! [`Category::UNKNOWN`]) instead of running the classifier again. Note that
//! this makes "the classifier gave up" and "resolution was cut short"
//! indistinguishable for the inner caller.
//!
//! ```
//! use faultline::{Category, Classifier, Error};
//!
//! let classifier = Classifier::chain([
//!     Classifier::id_pattern([("db.*", "app.database")]),
//!     Classifier::id_contains([("timeout", "app.timeout")]),
//! ]);
//!
//! let err = Error::new("db.timeout").with_classifier(classifier.clone());
//! assert_eq!(err.resolve(), "app.database");
//!
//! let err = Error::new("http.timeout").with_classifier(classifier);
//! assert_eq!(err.resolve(), "app.timeout");
//! ```

mod glob;
mod resolve;

use alloc::{borrow::Cow, string::String, vec::Vec};
use core::fmt;

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use triomphe::Arc;
use unsize::CoerceUnsize;

pub(crate) use self::resolve::{Resolution, resolve};
use crate::{Category, Error, Frame, hook_lock::HookLock};

/// Computes a category for an error.
///
/// Implemented for every `Fn(&Error) -> Category` closure. Return
/// [`Category::UNKNOWN`] to leave the decision to the next resolution step.
pub trait Classify: 'static + Send + Sync {
    /// Classifies `error`.
    fn classify(&self, error: &Error) -> Category;
}

impl<F> Classify for F
where
    F: Fn(&Error) -> Category + 'static + Send + Sync,
{
    fn classify(&self, error: &Error) -> Category {
        (self)(error)
    }
}

/// A shared handle to a [`Classify`] implementation.
///
/// Cloning is cheap. The constructors below are the usual building blocks;
/// any closure works through [`Classifier::new`].
#[derive(Clone)]
pub struct Classifier(Arc<dyn Classify>);

type PatternMap = IndexMap<String, Category, FxBuildHasher>;

impl Classifier {
    /// Wraps a classifier.
    pub fn new(classifier: impl Classify) -> Self {
        Self(Arc::new(classifier).unsize(unsize::Coercion!(to dyn Classify)))
    }

    /// Runs the classifier.
    #[must_use]
    pub fn classify(&self, error: &Error) -> Category {
        self.0.classify(error)
    }

    /// Classifies by matching the error id against glob patterns.
    ///
    /// Patterns support `*` (any run of characters), `?` (one character) and
    /// `\` escapes, and must match the whole id. They are tried in the order
    /// given; the first match wins. Ids matching nothing resolve to
    /// [`Category::UNKNOWN`].
    ///
    /// ```
    /// use faultline::{Classifier, Error};
    ///
    /// let classifier = Classifier::id_pattern([
    ///     ("user.*", "app.user"),
    ///     ("*.not_found", "app.missing"),
    /// ]);
    /// assert_eq!(classifier.classify(&Error::new("user.not_found")), "app.user");
    /// assert_eq!(classifier.classify(&Error::new("order.not_found")), "app.missing");
    /// assert!(classifier.classify(&Error::new("order.closed")).is_unknown());
    /// ```
    pub fn id_pattern<P, C>(patterns: impl IntoIterator<Item = (P, C)>) -> Self
    where
        P: Into<String>,
        C: Into<Category>,
    {
        let patterns = collect_patterns(patterns);
        Self::new(move |error: &Error| {
            patterns
                .iter()
                .find(|(pattern, _)| glob::matches(pattern, error.id()))
                .map_or(Category::UNKNOWN, |(_, category)| category.clone())
        })
    }

    /// Classifies by checking whether the error id contains a substring.
    ///
    /// Substrings are tried in the order given; the first one found wins.
    pub fn id_contains<S, C>(substrings: impl IntoIterator<Item = (S, C)>) -> Self
    where
        S: Into<String>,
        C: Into<Category>,
    {
        let substrings = collect_patterns(substrings);
        Self::new(move |error: &Error| {
            substrings
                .iter()
                .find(|(substring, _)| error.id().contains(substring.as_str()))
                .map_or(Category::UNKNOWN, |(_, category)| category.clone())
        })
    }

    /// Tries each classifier in order and returns the first answer that is
    /// not [`Category::UNKNOWN`].
    pub fn chain(classifiers: impl IntoIterator<Item = Classifier>) -> Self {
        let classifiers: Vec<Classifier> = classifiers.into_iter().collect();
        Self::new(move |error: &Error| {
            classifiers
                .iter()
                .map(|classifier| classifier.classify(error))
                .find(|category| !category.is_unknown())
                .unwrap_or(Category::UNKNOWN)
        })
    }

    /// Classifies by where the error was raised and what it wraps.
    ///
    /// `matcher` receives:
    /// - the topmost frame of the error's most recent stack snapshot,
    /// - the type name of the error's root cause: the resolved category of a
    ///   native root cause, the concrete type name of a foreign one (or
    ///   `"undefined"` when it is not known), and `""` when the error has no
    ///   cause,
    /// - the explicit category, if one is set.
    ///
    /// Errors without a stack snapshot resolve to [`Category::UNKNOWN`]
    /// without calling `matcher`.
    ///
    /// ```
    /// use faultline::{Category, Classifier, Error};
    ///
    /// let classifier = Classifier::stack_trace(|frame, root_type, _explicit| {
    ///     if root_type.contains("io::error") || frame.function_name() == Some("load") {
    ///         Category::from_static("app.io")
    ///     } else {
    ///         Category::UNKNOWN
    ///     }
    /// });
    ///
    /// let err = Error::new("config.load")
    ///     .with_classifier(classifier)
    ///     .with_cause(std::io::Error::other("disk gone"));
    /// assert_eq!(err.resolve(), "app.io");
    /// ```
    pub fn stack_trace<F>(matcher: F) -> Self
    where
        F: Fn(&Frame, &str, Option<&Category>) -> Category + 'static + Send + Sync,
    {
        Self::new(move |error: &Error| {
            let Some(stack) = error.stacks().first() else {
                return Category::UNKNOWN;
            };
            let top = stack.top_frame();
            let root_type = root_type_name(error);
            let explicit = Some(error.explicit_category()).filter(|c| !c.is_unknown());
            matcher(&top, &root_type, explicit)
        })
    }

    /// Returns `true` if both handles share the same classifier.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Classifier")
    }
}

fn collect_patterns<P, C>(patterns: impl IntoIterator<Item = (P, C)>) -> PatternMap
where
    P: Into<String>,
    C: Into<Category>,
{
    patterns
        .into_iter()
        .map(|(pattern, category)| (pattern.into(), category.into()))
        .collect()
}

/// The structural type name of an error's root cause.
///
/// Follows native causes to the innermost one. A foreign cause ends the
/// walk: its own captured type name is used when it wraps nothing further,
/// and `"undefined"` otherwise, since the types behind a foreign `source()`
/// chain are not known.
fn root_type_name(error: &Error) -> Cow<'static, str> {
    let mut current = error;
    loop {
        let Some(cause) = current.cause() else {
            return if current.ptr_eq(error) {
                Cow::Borrowed("")
            } else {
                current.resolve().into_name()
            };
        };
        match cause.native() {
            Some(native) => current = native,
            None if cause.as_error().source().is_none() => {
                return Cow::Borrowed(cause.type_name().unwrap_or("undefined"));
            }
            None => return Cow::Borrowed("undefined"),
        }
    }
}

static GLOBAL_CLASSIFIER: HookLock<Classifier> = HookLock::new();

/// Installs the process-wide classifier, consulted for errors whose explicit
/// category and own classifier produced no answer. Returns the previously
/// installed classifier.
///
/// Errors that already cached a resolution keep it.
pub fn set_global_classifier(classifier: Classifier) -> Option<Classifier> {
    tracing::debug!("installing global classifier");
    GLOBAL_CLASSIFIER.replace(Some(classifier))
}

/// Removes the process-wide classifier, returning it.
pub fn clear_global_classifier() -> Option<Classifier> {
    tracing::debug!("clearing global classifier");
    GLOBAL_CLASSIFIER.replace(None)
}

/// The currently installed process-wide classifier.
///
/// The returned handle is a snapshot; running it does not hold the lock, so
/// a classifier may itself install or clear the global classifier.
#[must_use]
pub fn global_classifier() -> Option<Classifier> {
    GLOBAL_CLASSIFIER.snapshot()
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_impl_all!(Classifier: Send, Sync, Clone);

    #[test]
    fn test_first_pattern_in_order_wins() {
        let classifier = Classifier::id_pattern([("db.*", "first"), ("*.timeout", "second")]);
        assert_eq!(classifier.classify(&Error::new("db.timeout")), "first");
        assert_eq!(classifier.classify(&Error::new("http.timeout")), "second");
    }

    #[test]
    fn test_id_contains() {
        let classifier = Classifier::id_contains([("auth", "app.auth")]);
        assert_eq!(classifier.classify(&Error::new("user.auth.failed")), "app.auth");
        assert!(classifier.classify(&Error::new("user.failed")).is_unknown());
    }

    #[test]
    fn test_chain_skips_unknown_answers() {
        let never = Classifier::new(|_: &Error| Category::UNKNOWN);
        let always = Classifier::new(|_: &Error| Category::from_static("x"));
        assert_eq!(Classifier::chain([never, always]).classify(&Error::new("a")), "x");
        assert!(Classifier::chain(core::iter::empty()).classify(&Error::new("a")).is_unknown());
    }

    #[test]
    fn test_root_type_name() {
        let plain = Error::new("a");
        assert_eq!(root_type_name(&plain), "");

        let native_root = Error::new("root").with_category("app.root");
        let wrapped = Error::new("mid").with_cause(native_root);
        let outer = Error::new("outer").with_cause(wrapped);
        assert_eq!(root_type_name(&outer), "app.root");

        let foreign = Error::new("io").with_cause(core::fmt::Error);
        assert!(root_type_name(&foreign).ends_with("fmt::Error"));
    }
}

use alloc::{
    borrow::Cow,
    string::{String, ToString},
    vec::Vec,
};
use core::{error::Error as StdError, fmt};

use triomphe::Arc;

use crate::{
    Category, Cause, Classifier, Cleaner, Payload, StackTrace,
    classify::{self, Resolution},
};

/// A configurator accepted by [`Error::new_with`].
///
/// Each option corresponds to one of the `with_*` builders and has the same
/// effect. Options are applied in order, so later options win when they set
/// the same field.
///
/// ```
/// use faultline::{Category, Error, ErrorOption};
///
/// let err = Error::new_with(
///     "user.not_found",
///     [
///         ErrorOption::HttpStatus(404),
///         ErrorOption::Category(Category::NOT_FOUND),
///         ErrorOption::NotFound,
///     ],
/// );
/// assert_eq!(err.http_status(), Some(404));
/// assert!(err.is_not_found());
/// ```
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum ErrorOption {
    /// See [`Error::with_category`].
    Category(Category),
    /// See [`Error::with_classifier`].
    Classifier(Classifier),
    /// See [`Error::with_http_status`].
    HttpStatus(u16),
    /// See [`Error::with_payload`].
    Payload(Payload),
    /// See [`Error::with_not_found`].
    NotFound,
    /// See [`Error::with_retryable`].
    Retryable,
}

#[derive(Clone)]
struct ErrorData {
    id: Cow<'static, str>,
    message: Cow<'static, str>,
    category: Category,
    classifier: Option<Classifier>,
    http_status: u16,
    payload: Option<Payload>,
    cause: Option<Cause>,
    stacks: Vec<StackTrace>,
    stack_cleaner: Option<Cleaner>,
    has_captured_stack: bool,
    not_found: bool,
    retryable: bool,
    resolution: Resolution,
}

impl ErrorData {
    fn apply(&mut self, option: ErrorOption) {
        match option {
            ErrorOption::Category(category) => {
                self.category = category;
                self.classifier = None;
            }
            ErrorOption::Classifier(classifier) => {
                self.classifier = Some(classifier);
                self.category = Category::UNKNOWN;
            }
            ErrorOption::HttpStatus(status) => self.http_status = status,
            ErrorOption::Payload(payload) => self.payload = Some(payload),
            ErrorOption::NotFound => self.not_found = true,
            ErrorOption::Retryable => self.retryable = true,
        }
    }
}

/// A structured error value.
///
/// An `Error` has a stable `id` naming the logical fault (`"db.timeout"`),
/// a message (the id unless changed), an optional explicit [`Category`] or
/// [`Classifier`], an HTTP status, a [`Payload`] for user-facing data, an
/// optional [`Cause`], and the [`StackTrace`]s captured along the way.
///
/// ## Values never change
///
/// `Error` is a cheap handle to immutable data. Every `with_*` builder takes
/// the handle by value and returns an updated error; other handles to the
/// original keep seeing the original. This makes it safe to keep errors in
/// statics and hand them out to many callers:
///
/// ```
/// use faultline::Error;
///
/// let base = Error::new("user.not_found").with_payload("User not found");
/// let localized = base.clone().with_payload("Utilisateur introuvable");
///
/// assert_eq!(base.payload().and_then(|p| p.as_str()), Some("User not found"));
/// assert_eq!(localized.payload().and_then(|p| p.as_str()), Some("Utilisateur introuvable"));
/// ```
///
/// ## Stacks are captured once
///
/// [`with_stack`](Self::with_stack), [`with_caller_stack`](Self::with_caller_stack)
/// and [`with_cause`](Self::with_cause) all capture the current call stack,
/// and they share one rule: an error captures at most once. Whichever of them
/// runs first takes effect; any later call returns the error unchanged. In
/// particular, attaching a cause to an error that already has a stack does
/// nothing:
///
/// ```
/// use faultline::Error;
///
/// let err = Error::new("db.timeout").with_caller_stack();
/// let wrapped = err.clone().with_cause(std::io::Error::other("conn refused"));
///
/// assert!(wrapped.ptr_eq(&err));
/// assert!(wrapped.cause().is_none());
/// ```
///
/// When a cause is attached, the stacks it carries are kept after the newly
/// captured one, so [`stacks`](Self::stacks) lists snapshots from the
/// outermost layer to the innermost.
#[derive(Clone)]
pub struct Error(Arc<ErrorData>);

impl Error {
    /// Creates an error with the given id. The message starts out equal to
    /// the id and the category is [`Category::UNKNOWN`].
    #[must_use]
    pub fn new(id: impl Into<Cow<'static, str>>) -> Self {
        let id = id.into();
        Self(Arc::new(ErrorData {
            message: id.clone(),
            id,
            category: Category::UNKNOWN,
            classifier: None,
            http_status: 0,
            payload: None,
            cause: None,
            stacks: Vec::new(),
            stack_cleaner: None,
            has_captured_stack: false,
            not_found: false,
            retryable: false,
            resolution: Resolution::new(),
        }))
    }

    /// Creates an error and applies `options` in order.
    #[must_use]
    pub fn new_with(
        id: impl Into<Cow<'static, str>>,
        options: impl IntoIterator<Item = ErrorOption>,
    ) -> Self {
        let mut error = Self::new(id);
        let data = Arc::make_mut(&mut error.0);
        for option in options {
            data.apply(option);
        }
        error
    }

    /// Creates an error flagged as "not found".
    #[must_use]
    pub fn not_found(id: impl Into<Cow<'static, str>>) -> Self {
        Self::new(id).with_not_found()
    }

    /// Creates an error flagged as retryable.
    #[must_use]
    pub fn retryable(id: impl Into<Cow<'static, str>>) -> Self {
        Self::new(id).with_retryable()
    }

    fn update(mut self, f: impl FnOnce(&mut ErrorData)) -> Self {
        let data = Arc::make_mut(&mut self.0);
        f(data);
        data.resolution = Resolution::new();
        self
    }

    /// Replaces the message. All other fields, including stacks, are kept.
    #[must_use]
    pub fn with_message(self, message: impl Into<Cow<'static, str>>) -> Self {
        let message = message.into();
        self.update(|data| data.message = message)
    }

    /// Replaces the message with formatted text.
    ///
    /// ```
    /// use faultline::Error;
    ///
    /// let err = Error::new("db.timeout").with_message_args(format_args!("timed out after {}s", 30));
    /// assert_eq!(err.message(), "timed out after 30s");
    /// ```
    #[must_use]
    pub fn with_message_args(self, args: fmt::Arguments<'_>) -> Self {
        let message = match args.as_str() {
            Some(text) => Cow::Borrowed(text),
            None => Cow::Owned(alloc::fmt::format(args)),
        };
        self.with_message(message)
    }

    /// Replaces the payload as a whole.
    #[must_use]
    pub fn with_payload<T>(self, payload: T) -> Self
    where
        T: core::any::Any + fmt::Debug + Send + Sync,
    {
        self.with_payload_value(Payload::new(payload))
    }

    /// Replaces the payload with an already wrapped [`Payload`].
    #[must_use]
    pub fn with_payload_value(self, payload: Payload) -> Self {
        self.update(|data| data.payload = Some(payload))
    }

    /// Sets the explicit category and removes any classifier.
    #[must_use]
    pub fn with_category(self, category: impl Into<Category>) -> Self {
        let category = category.into();
        self.update(|data| data.apply(ErrorOption::Category(category)))
    }

    /// Sets the per-error classifier and removes any explicit category.
    #[must_use]
    pub fn with_classifier(self, classifier: Classifier) -> Self {
        self.update(|data| data.apply(ErrorOption::Classifier(classifier)))
    }

    /// Sets the HTTP status. `0` means unset.
    #[must_use]
    pub fn with_http_status(self, status: u16) -> Self {
        self.update(|data| data.http_status = status)
    }

    /// Flags the error as "not found".
    #[must_use]
    pub fn with_not_found(self) -> Self {
        self.update(|data| data.not_found = true)
    }

    /// Flags the error as retryable.
    #[must_use]
    pub fn with_retryable(self) -> Self {
        self.update(|data| data.retryable = true)
    }

    /// Sets the cleaner applied when this error's stacks are rendered,
    /// instead of the [default cleaner](crate::default_cleaner).
    #[must_use]
    pub fn with_stack_cleaner(self, cleaner: Cleaner) -> Self {
        self.update(|data| data.stack_cleaner = Some(cleaner))
    }

    /// Captures the current call stack, unless this error already holds one.
    ///
    /// With `skip = 0` the topmost frame is the caller of `with_stack`. Pass
    /// `1` when calling from a helper function so the helper's caller shows
    /// up on top instead, and so on.
    #[inline(never)]
    #[track_caller]
    #[must_use]
    pub fn with_stack(self, skip: usize) -> Self {
        if self.0.has_captured_stack {
            tracing::trace!(id = self.id(), "error already holds a stack, not capturing");
            return self;
        }
        let stack = StackTrace::capture(self.message(), skip.saturating_add(1));
        self.push_stack(stack)
    }

    /// Captures the current call stack with the caller of this method on top,
    /// unless this error already holds one.
    ///
    /// Behaves like [`with_stack(1)`](Self::with_stack) would if that call
    /// were made from inside this method.
    #[inline(never)]
    #[track_caller]
    #[must_use]
    pub fn with_caller_stack(self) -> Self {
        if self.0.has_captured_stack {
            tracing::trace!(id = self.id(), "error already holds a stack, not capturing");
            return self;
        }
        let stack = StackTrace::capture(self.message(), 1);
        self.push_stack(stack)
    }

    /// Attaches `cause` and captures the call stack with the caller of this
    /// method on top, unless this error already holds a stack, in which case
    /// the error is returned unchanged and `cause` is dropped.
    ///
    /// If `cause` is a native [`Error`] with stacks of its own, they are
    /// appended after the newly captured stack.
    ///
    /// ```
    /// use faultline::Error;
    ///
    /// let inner = Error::new("db.timeout").with_caller_stack();
    /// let outer = Error::new("user.load_failed").with_cause(inner);
    ///
    /// let messages: Vec<_> = outer.stacks().iter().map(|s| s.message()).collect();
    /// assert_eq!(messages, ["user.load_failed", "db.timeout"]);
    /// ```
    #[inline(never)]
    #[track_caller]
    #[must_use]
    pub fn with_cause(self, cause: impl Into<Cause>) -> Self {
        if self.0.has_captured_stack {
            tracing::trace!(id = self.id(), "error already holds a stack, not attaching cause");
            return self;
        }
        let cause = cause.into();
        let stack = StackTrace::capture(self.message(), 1);
        self.update(|data| {
            data.stacks.insert(0, stack);
            data.has_captured_stack = true;
            if let Some(native) = cause.native() {
                data.stacks.extend(native.stacks().iter().cloned());
            }
            data.cause = Some(cause);
        })
    }

    fn push_stack(self, stack: StackTrace) -> Self {
        self.update(|data| {
            data.stacks.insert(0, stack);
            data.has_captured_stack = true;
        })
    }

    /// The stable identifier of the logical fault.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.0.id
    }

    /// The message, which is the id unless it was replaced.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.0.message
    }

    /// The wrapped cause, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&Cause> {
        self.0.cause.as_ref()
    }

    /// The captured stacks, outermost layer first.
    #[must_use]
    pub fn stacks(&self) -> &[StackTrace] {
        &self.0.stacks
    }

    /// Returns `true` once a stack was captured by
    /// [`with_stack`](Self::with_stack), [`with_caller_stack`](Self::with_caller_stack)
    /// or [`with_cause`](Self::with_cause).
    #[must_use]
    pub fn has_captured_stack(&self) -> bool {
        self.0.has_captured_stack
    }

    /// The HTTP status, if one was set.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        Some(self.0.http_status).filter(|&status| status != 0)
    }

    /// Returns `true` if the error is flagged as "not found".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.0.not_found
    }

    /// Returns `true` if the error is flagged as retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.0.retryable
    }

    /// The payload, if one was set.
    #[must_use]
    pub fn payload(&self) -> Option<&Payload> {
        self.0.payload.as_ref()
    }

    /// The explicitly set category, or [`Category::UNKNOWN`].
    ///
    /// Use [`resolve`](Self::resolve) to take classifiers into account.
    #[must_use]
    pub fn explicit_category(&self) -> &Category {
        &self.0.category
    }

    /// The per-error classifier, if one was set.
    #[must_use]
    pub fn classifier(&self) -> Option<&Classifier> {
        self.0.classifier.as_ref()
    }

    /// The per-error stack cleaner, if one was set.
    #[must_use]
    pub fn stack_cleaner(&self) -> Option<&Cleaner> {
        self.0.stack_cleaner.as_ref()
    }

    /// The cleaner used to render this error's stacks: its own, or else the
    /// process default.
    #[must_use]
    pub fn effective_stack_cleaner(&self) -> Option<Cleaner> {
        self.0.stack_cleaner.clone().or_else(crate::default_cleaner)
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub(crate) fn resolution(&self) -> &Resolution {
        &self.0.resolution
    }

    /// Resolves the error's category.
    ///
    /// See the [`classify`](crate::classify) module for the rules. The result
    /// is computed once and cached on this value.
    #[must_use]
    pub fn resolve(&self) -> Category {
        classify::resolve(self)
    }

    /// Returns `true` if `target` names the same logical error.
    ///
    /// Two native errors are the same logical error when their ids are equal,
    /// whatever their categories. For any other `target`, the comparison is
    /// delegated to this error's cause chain.
    ///
    /// ```
    /// use faultline::Error;
    ///
    /// let a = Error::new("db.timeout").with_category("app.database");
    /// let b = Error::new("db.timeout").with_category("app.retry");
    /// assert!(a.is(&b));
    /// assert!(!a.is(&Error::new("db.closed")));
    /// ```
    #[must_use]
    pub fn is(&self, target: &(dyn StdError + 'static)) -> bool {
        match target.downcast_ref::<Error>() {
            Some(target) => self.id() == target.id(),
            None => self
                .cause()
                .is_some_and(|cause| crate::chain::is(cause.as_error(), target)),
        }
    }

    /// Returns `true` if both handles refer to the same value.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Renders the error's stacks, each passed through the
    /// [effective cleaner](Self::effective_stack_cleaner).
    #[must_use]
    pub fn stack_lines(&self) -> Vec<(String, Vec<String>)> {
        let cleaner = self.effective_stack_cleaner();
        self.stacks()
            .iter()
            .map(|stack| (stack.message().to_string(), stack.cleaned_lines(cleaner.as_ref())))
            .collect()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = &*self.0;
        let mut debug = f.debug_struct("Error");
        debug.field("id", &data.id);
        if data.message != data.id {
            debug.field("message", &data.message);
        }
        if !data.category.is_unknown() {
            debug.field("category", &data.category);
        }
        if data.classifier.is_some() {
            debug.field("classifier", &data.classifier);
        }
        if data.http_status != 0 {
            debug.field("http_status", &data.http_status);
        }
        if let Some(payload) = &data.payload {
            debug.field("payload", payload);
        }
        if data.not_found {
            debug.field("not_found", &true);
        }
        if data.retryable {
            debug.field("retryable", &true);
        }
        if let Some(cause) = &data.cause {
            debug.field("cause", cause);
        }
        debug.field("stacks", &data.stacks.len());
        debug.finish()
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause().map(Cause::as_error)
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;

    use super::*;

    static_assertions::assert_impl_all!(Error: Send, Sync, Clone, StdError);

    #[test]
    fn test_new_defaults() {
        let err = Error::new("db.timeout");
        assert_eq!(err.id(), "db.timeout");
        assert_eq!(err.message(), "db.timeout");
        assert!(err.explicit_category().is_unknown());
        assert_eq!(err.http_status(), None);
        assert!(!err.is_not_found());
        assert!(!err.is_retryable());
        assert!(err.stacks().is_empty());
        assert!(err.cause().is_none());
        assert!(err.payload().is_none());
    }

    #[test]
    fn test_builders_do_not_touch_other_handles() {
        let base = Error::new("x").with_http_status(400);
        let changed = base.clone().with_http_status(500).with_message("changed");

        assert_eq!(base.http_status(), Some(400));
        assert_eq!(base.message(), "x");
        assert_eq!(changed.http_status(), Some(500));
        assert_eq!(changed.message(), "changed");
        assert!(!base.ptr_eq(&changed));
    }

    #[test]
    fn test_later_options_win() {
        let err = Error::new_with(
            "x",
            [
                ErrorOption::HttpStatus(400),
                ErrorOption::Classifier(Classifier::new(|_: &Error| Category::from_static("c"))),
                ErrorOption::Category(Category::VALIDATION),
                ErrorOption::HttpStatus(422),
            ],
        );
        assert_eq!(err.http_status(), Some(422));
        assert!(err.classifier().is_none());
        assert_eq!(err.resolve(), Category::VALIDATION);
    }

    #[test]
    fn test_category_and_classifier_exclude_each_other() {
        let err = Error::new("x")
            .with_category("a")
            .with_classifier(Classifier::new(|_: &Error| Category::from_static("b")));
        assert!(err.explicit_category().is_unknown());
        assert_eq!(err.resolve(), "b");

        let err = err.with_category("c");
        assert!(err.classifier().is_none());
        assert_eq!(err.resolve(), "c");
    }

    #[test]
    fn test_flags_coexist() {
        let err = Error::not_found("x").with_retryable().with_http_status(404);
        assert!(err.is_not_found());
        assert!(err.is_retryable());
        assert_eq!(err.http_status(), Some(404));
        assert!(Error::retryable("y").is_retryable());
    }

    #[test]
    fn test_message_keeps_stacks() {
        let err = Error::new("x").with_caller_stack().with_message("now with text");
        assert_eq!(err.stacks().len(), 1);
        assert_eq!(err.message(), "now with text");
        assert_eq!(err.id(), "x");
        assert_eq!(format!("{err}"), "now with text");
    }

    #[test]
    fn test_source_is_cause() {
        let err = Error::new("outer").with_cause(Error::new("inner"));
        let source = err.source().and_then(|s| s.downcast_ref::<Error>());
        assert_eq!(source.map(Error::id), Some("inner"));
    }

    #[test]
    fn test_debug_lists_set_fields() {
        let err = Error::new("x").with_http_status(404);
        assert_eq!(format!("{err:?}"), r#"Error { id: "x", http_status: 404, stacks: 0 }"#);
    }
}

//! The underlying error stored by a wrapping [`Error`].

use alloc::boxed::Box;
use core::{any::Any, error::Error as StdError, fmt};

use triomphe::Arc;
use unsize::CoerceUnsize;

use crate::Error;

/// Foreign errors are held behind this trait so the handle stays
/// `Send + Sync` and can hand out `&(dyn Error + 'static)`.
trait SharedError: StdError + Send + Sync + 'static {
    fn as_error(&self) -> &(dyn StdError + 'static);
}

impl<E> SharedError for E
where
    E: StdError + Send + Sync + 'static,
{
    fn as_error(&self) -> &(dyn StdError + 'static) {
        self
    }
}

#[derive(Clone)]
enum Repr {
    Native(Error),
    Foreign {
        error: Arc<dyn SharedError>,
        type_name: &'static str,
    },
    Boxed(Arc<Box<dyn StdError + Send + Sync + 'static>>),
}

/// An error attached as the cause of a native [`Error`], or as a member of a
/// [`Join`](crate::Join).
///
/// A cause is either another native [`Error`] or a foreign error type. Any
/// `core::error::Error + Send + Sync + 'static` value converts into a cause;
/// native errors are recognized during the conversion and kept as native, so
/// stack snapshots and categories stay reachable.
///
/// ```
/// use faultline::{Cause, Error};
///
/// let io = std::io::Error::other("conn refused");
/// let cause = Cause::from(io);
/// assert!(cause.native().is_none());
/// assert!(cause.type_name().is_some_and(|name| name.contains("io")));
///
/// let cause = Cause::from(Error::new("db.timeout"));
/// assert_eq!(cause.native().map(Error::id), Some("db.timeout"));
/// ```
#[derive(Clone)]
pub struct Cause(Repr);

impl Cause {
    /// Wraps any error type, recording its concrete type name.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        if let Some(native) = (&error as &dyn Any).downcast_ref::<Error>() {
            return Self(Repr::Native(native.clone()));
        }
        Self(Repr::Foreign {
            error: Arc::new(error).unsize(unsize::Coercion!(to dyn SharedError)),
            type_name: core::any::type_name::<E>(),
        })
    }

    /// Wraps an already boxed error.
    ///
    /// The concrete type is erased at this point, so unless the box holds a
    /// native [`Error`] the cause reports no type name.
    pub fn from_boxed(error: Box<dyn StdError + Send + Sync + 'static>) -> Self {
        match error.downcast::<Error>() {
            Ok(native) => Self(Repr::Native(*native)),
            Err(error) => Self(Repr::Boxed(Arc::new(error))),
        }
    }

    /// The cause as a plain error reference, ready for chain traversal.
    #[must_use]
    pub fn as_error(&self) -> &(dyn StdError + 'static) {
        match &self.0 {
            Repr::Native(native) => native,
            Repr::Foreign { error, .. } => (**error).as_error(),
            Repr::Boxed(error) => &***error,
        }
    }

    /// The native error, if this cause is one.
    #[must_use]
    pub fn native(&self) -> Option<&Error> {
        match &self.0 {
            Repr::Native(native) => Some(native),
            Repr::Foreign { .. } | Repr::Boxed(_) => None,
        }
    }

    /// The concrete type name of a foreign cause, when it was known at
    /// wrapping time. Native causes return `None`; their structural name is
    /// their resolved category.
    #[must_use]
    pub fn type_name(&self) -> Option<&'static str> {
        match &self.0 {
            Repr::Native(_) | Repr::Boxed(_) => None,
            Repr::Foreign { type_name, .. } => Some(*type_name),
        }
    }

    /// Returns `true` if both causes refer to the same underlying object.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        core::ptr::addr_eq(self.as_error(), other.as_error())
    }
}

impl<E> From<E> for Cause
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Debug for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Native(native) => fmt::Debug::fmt(native, f),
            Repr::Foreign { .. } | Repr::Boxed(_) => fmt::Debug::fmt(self.as_error(), f),
        }
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.as_error(), f)
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    static_assertions::assert_impl_all!(Cause: Send, Sync, Clone);

    #[derive(Debug)]
    struct Refused;

    impl fmt::Display for Refused {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("conn refused")
        }
    }

    impl StdError for Refused {}

    #[test]
    fn test_foreign_cause_keeps_type_name() {
        let cause = Cause::new(Refused);
        assert!(cause.native().is_none());
        assert!(cause.type_name().is_some_and(|name| name.ends_with("Refused")));
        assert_eq!(cause.to_string(), "conn refused");
        assert!(cause.as_error().is::<Refused>());
    }

    #[test]
    fn test_native_error_is_detected() {
        let err = Error::new("db.timeout");
        let cause = Cause::new(err.clone());
        assert!(cause.native().is_some_and(|native| native.ptr_eq(&err)));
        assert_eq!(cause.type_name(), None);
    }

    #[test]
    fn test_boxed_error_loses_type_name_but_not_nativeness() {
        let boxed: Box<dyn StdError + Send + Sync> = Box::new(Refused);
        let cause = Cause::from_boxed(boxed);
        assert_eq!(cause.type_name(), None);
        assert_eq!(cause.to_string(), "conn refused");

        let boxed: Box<dyn StdError + Send + Sync> = Box::new(Error::new("x"));
        assert!(Cause::from_boxed(boxed).native().is_some());
    }

    #[test]
    fn test_clones_share_the_same_object() {
        let cause = Cause::new(Refused);
        let clone = cause.clone();
        assert!(cause.ptr_eq(&clone));
        assert!(!cause.ptr_eq(&Cause::new(Refused)));
    }
}

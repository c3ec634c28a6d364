//! Opaque user-facing data carried by an error.

use core::{
    any::{Any, TypeId},
    fmt,
};

use triomphe::Arc;
use unsize::CoerceUnsize;

trait PayloadData: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<T> PayloadData for T
where
    T: Any + fmt::Debug + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        core::any::type_name::<T>()
    }
}

/// Display or translation data attached to an error.
///
/// The payload is usually a user-facing string or a map of translations, but
/// it can be any `Debug + Send + Sync` value. It is shared between clones and
/// replaced wholesale by [`Error::with_payload`].
///
/// ```
/// use faultline::{Error, Payload};
///
/// let err = Error::new("user.not_found").with_payload("User not found");
/// assert_eq!(err.payload().and_then(Payload::downcast_ref::<&str>), Some(&"User not found"));
/// ```
///
/// [`Error::with_payload`]: crate::Error::with_payload
#[derive(Clone)]
pub struct Payload(Arc<dyn PayloadData>);

impl Payload {
    /// Wraps a value as a payload.
    pub fn new<T>(value: T) -> Self
    where
        T: Any + fmt::Debug + Send + Sync,
    {
        Self(Arc::new(value).unsize(unsize::Coercion!(to dyn PayloadData)))
    }

    /// Returns the payload as `T` if that is its concrete type.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (*self.0).as_any().downcast_ref()
    }

    /// Returns `true` if the payload's concrete type is `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        (*self.0).as_any().type_id() == TypeId::of::<T>()
    }

    /// The concrete type name of the payload.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        (*self.0).type_name()
    }

    /// Returns the payload as a string slice if it is a `String` or a
    /// `&'static str`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        let any = (*self.0).as_any();
        any.downcast_ref::<alloc::string::String>()
            .map(|s| s.as_str())
            .or_else(|| any.downcast_ref::<&'static str>().copied())
    }

    /// Returns `true` if both handles share the same payload value.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use alloc::{collections::BTreeMap, format, string::String};

    use super::*;

    static_assertions::assert_impl_all!(Payload: Send, Sync, Clone);

    #[test]
    fn test_downcast_to_concrete_type() {
        let mut translations = BTreeMap::new();
        translations.insert("en", "User not found");
        let payload = Payload::new(translations);

        assert!(payload.is::<BTreeMap<&str, &str>>());
        assert_eq!(
            payload
                .downcast_ref::<BTreeMap<&str, &str>>()
                .and_then(|m| m.get("en")),
            Some(&"User not found")
        );
        assert!(payload.downcast_ref::<String>().is_none());
        assert!(payload.as_str().is_none());
    }

    #[test]
    fn test_as_str_accepts_both_string_kinds() {
        assert_eq!(Payload::new("static").as_str(), Some("static"));
        assert_eq!(Payload::new(String::from("owned")).as_str(), Some("owned"));
        assert_eq!(format!("{:?}", Payload::new("static")), "\"static\"");
    }
}

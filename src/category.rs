//! Error categories.
//!
//! A [`Category`] is a string tag naming the class of an error, such as
//! `"app.database"` or [`Category::VALIDATION`]. Categories are how handlers
//! decide what to do with an error without matching on ids one by one.

use alloc::{borrow::Cow, string::String};
use core::fmt;

/// A string-based error category used for classification and filtering.
///
/// Categories are cheap to clone when built from `'static` strings, which is
/// the common case for the constants an application defines:
///
/// ```
/// use faultline::{Category, Error};
///
/// const DATABASE: Category = Category::from_static("app.database");
///
/// let err = Error::new("db.timeout").with_category(DATABASE);
/// assert_eq!(err.resolve(), DATABASE);
/// ```
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Category(Cow<'static, str>);

impl Category {
    /// The sentinel meaning "no category could be determined".
    ///
    /// Every error starts out with this category, and resolution falls back
    /// to it when neither an explicit category nor any classifier produced an
    /// answer.
    pub const UNKNOWN: Self = Self::from_static("faultline.unknown");

    /// Errors raised while a system or component initializes.
    pub const INITIALIZATION: Self = Self::from_static("faultline.initialization");

    /// Errors caused by invalid input.
    pub const VALIDATION: Self = Self::from_static("faultline.validation");

    /// Errors for resources that do not exist.
    pub const NOT_FOUND: Self = Self::from_static("faultline.not_found");

    /// Creates a category from a string literal. Usable in `const` items.
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Creates a category from any string.
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// The category name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn into_name(self) -> Cow<'static, str> {
        self.0
    }

    /// Returns `true` if this is [`Category::UNKNOWN`].
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        *self == Self::UNKNOWN
    }
}

impl Default for Category {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl From<&'static str> for Category {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for Category {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl AsRef<str> for Category {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Category {
    fn eq(&self, other: &str) -> bool {
        *self.0 == *other
    }
}

impl PartialEq<&str> for Category {
    fn eq(&self, other: &&str) -> bool {
        *self.0 == **other
    }
}

use alloc::vec::Vec;
use core::{error::Error as StdError, fmt};

use crate::Cause;

/// Several errors reported as one.
///
/// A `Join` has no identity of its own. It displays as its members' messages
/// separated by `"; "`, and the chain functions in [`chain`](crate::chain)
/// descend into every member.
#[derive(Clone)]
pub struct Join {
    errors: Vec<Cause>,
}

impl Join {
    /// The joined errors, in the order they were given.
    #[must_use]
    pub fn errors(&self) -> &[Cause] {
        &self.errors
    }
}

/// Joins errors into one, dropping `None` entries.
///
/// Returns `None` when no error remains.
///
/// ```
/// use faultline::{Error, chain};
///
/// let joined = chain::join([
///     Some(Error::new("validation.email")),
///     None,
///     Some(Error::new("validation.password")),
/// ])
/// .unwrap();
/// assert_eq!(joined.to_string(), "validation.email; validation.password");
/// assert_eq!(joined.errors().len(), 2);
///
/// assert!(chain::join([None::<Error>, None]).is_none());
/// ```
pub fn join<C>(errors: impl IntoIterator<Item = Option<C>>) -> Option<Join>
where
    C: Into<Cause>,
{
    let errors: Vec<Cause> = errors.into_iter().flatten().map(Into::into).collect();
    if errors.is_empty() {
        None
    } else {
        Some(Join { errors })
    }
}

impl fmt::Display for Join {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            fmt::Display::fmt(error, f)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Join {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Join").field(&self.errors).finish()
    }
}

impl StdError for Join {}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;
    use crate::Error;

    static_assertions::assert_impl_all!(Join: Send, Sync, Clone, StdError);

    #[test]
    fn test_single_member() {
        let joined = join([Some(Error::new("a").with_message("only"))]);
        assert_eq!(joined.map(|j| j.to_string()).as_deref(), Some("only"));
    }

    #[test]
    fn test_members_keep_order_and_identity() {
        let a = Error::new("a");
        let b = Error::new("b");
        let joined = join([Some(a.clone()), Some(b.clone())]);
        let members: Vec<_> = joined
            .iter()
            .flat_map(|j| j.errors())
            .filter_map(Cause::native)
            .collect();
        assert_eq!(members.len(), 2);
        assert!(members[0].ptr_eq(&a));
        assert!(members[1].ptr_eq(&b));
    }
}

use alloc::vec::Vec;
use core::{error::Error as StdError, iter::FusedIterator};

use super::Join;

/// An iterator over an error and everything it wraps, in depth-first order.
///
/// A [`Join`] yields itself and then each member's subtree in order. Any
/// other error yields itself and then its [`source`](StdError::source)
/// chain; for a native [`Error`](crate::Error) that is its cause.
#[must_use]
pub struct Iter<'a> {
    stack: Vec<&'a (dyn StdError + 'static)>,
}

impl<'a> Iter<'a> {
    pub(super) fn new(root: &'a (dyn StdError + 'static)) -> Self {
        Self {
            stack: alloc::vec![root],
        }
    }
}

/// The nodes directly wrapped by `error`.
pub(super) fn children<'a>(
    error: &'a (dyn StdError + 'static),
) -> impl DoubleEndedIterator<Item = &'a (dyn StdError + 'static)> {
    let (members, source) = match error.downcast_ref::<Join>() {
        Some(join) => (join.errors(), None),
        None => (&[][..], error.source()),
    };
    members.iter().map(|cause| cause.as_error()).chain(source)
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a (dyn StdError + 'static);

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.stack.pop()?;
        self.stack.extend(children(cur).rev());
        Some(cur)
    }
}

impl FusedIterator for Iter<'_> {}

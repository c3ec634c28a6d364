use core::fmt;

use crate::{Category, Error};

/// Per-error resolution state: the cached result, plus the re-entrancy flag
/// on targets without thread-locals.
///
/// Clones start out empty, so a value produced by a builder always resolves
/// afresh.
pub(crate) struct Resolution {
    cached: spin::Once<Category>,
    #[cfg(not(feature = "std"))]
    in_progress: core::sync::atomic::AtomicBool,
}

impl Resolution {
    pub(crate) const fn new() -> Self {
        Self {
            cached: spin::Once::new(),
            #[cfg(not(feature = "std"))]
            in_progress: core::sync::atomic::AtomicBool::new(false),
        }
    }
}

impl Clone for Resolution {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolution")
            .field("cached", &self.cached.get())
            .finish_non_exhaustive()
    }
}

/// Marks an error as being resolved by the current thread until dropped,
/// including when a classifier panics.
///
/// Only a re-entry from the same thread is refused. Other threads resolving
/// the same value at the same time compute the category themselves and the
/// first result to finish is cached.
#[cfg(feature = "std")]
struct InProgress {
    identity: usize,
}

#[cfg(feature = "std")]
std::thread_local! {
    static RESOLVING: core::cell::RefCell<alloc::vec::Vec<usize>> =
        const { core::cell::RefCell::new(alloc::vec::Vec::new()) };
}

#[cfg(feature = "std")]
impl InProgress {
    fn enter(error: &Error) -> Option<Self> {
        let identity = error.identity();
        RESOLVING.with_borrow_mut(|resolving| {
            if resolving.contains(&identity) {
                None
            } else {
                resolving.push(identity);
                Some(Self { identity })
            }
        })
    }
}

#[cfg(feature = "std")]
impl Drop for InProgress {
    fn drop(&mut self) {
        // Thread-locals are gone while the thread itself is torn down.
        let _ = RESOLVING.try_with(|resolving| {
            let mut resolving = resolving.borrow_mut();
            if let Some(index) = resolving.iter().rposition(|&id| id == self.identity) {
                resolving.swap_remove(index);
            }
        });
    }
}

/// Without thread-locals the flag lives on the value, so a concurrent
/// resolution from another thread is treated like a re-entry.
#[cfg(not(feature = "std"))]
struct InProgress<'a>(&'a core::sync::atomic::AtomicBool);

#[cfg(not(feature = "std"))]
impl<'a> InProgress<'a> {
    fn enter(error: &'a Error) -> Option<Self> {
        use core::sync::atomic::Ordering;

        let flag = &error.resolution().in_progress;
        if flag.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

#[cfg(not(feature = "std"))]
impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.0.store(false, core::sync::atomic::Ordering::Release);
    }
}

pub(crate) fn resolve(error: &Error) -> Category {
    let resolution = error.resolution();
    if let Some(category) = resolution.cached.get() {
        return category.clone();
    }

    let Some(_guard) = InProgress::enter(error) else {
        tracing::trace!(id = error.id(), "re-entrant category resolution cut short");
        return error.explicit_category().clone();
    };

    let category = compute(error);
    resolution.cached.call_once(|| category).clone()
}

fn compute(error: &Error) -> Category {
    let explicit = error.explicit_category();
    if !explicit.is_unknown() {
        return explicit.clone();
    }

    if let Some(classifier) = error.classifier() {
        let category = classifier.classify(error);
        if !category.is_unknown() {
            return category;
        }
    }

    if let Some(global) = super::global_classifier() {
        let category = global.classify(error);
        if !category.is_unknown() {
            return category;
        }
    }

    Category::UNKNOWN
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn test_guard_is_released_on_drop() {
        let err = Error::new("x");
        let guard = InProgress::enter(&err);
        assert!(guard.is_some());
        assert!(InProgress::enter(&err).is_none());
        drop(guard);
        assert!(InProgress::enter(&err).is_some());
    }

    #[test]
    fn test_guard_is_per_thread() {
        let err = Error::new("x");
        let _guard = InProgress::enter(&err);
        let other = err.clone();
        let entered = std::thread::spawn(move || InProgress::enter(&other).is_some())
            .join()
            .unwrap();
        assert!(entered);
    }
}

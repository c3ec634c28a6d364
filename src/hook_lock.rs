//! Process-wide optional slot guarded by a reader-writer lock.
//!
//! Used for the global classifier and the default stack cleaner. Reads are
//! frequent (every resolution that falls through to the global classifier),
//! writes are rare configuration events.

#[cfg(feature = "std")]
use std::sync as impl_;

#[cfg(not(feature = "std"))]
use spin as impl_;

#[repr(transparent)]
pub(crate) struct HookLock<T: 'static + Send + Sync>(impl_::RwLock<Option<T>>);

#[repr(transparent)]
pub(crate) struct HookLockReadGuard<T: 'static + Send + Sync>(
    impl_::RwLockReadGuard<'static, Option<T>>,
);

#[repr(transparent)]
pub(crate) struct HookLockWriteGuard<T: 'static + Send + Sync>(
    impl_::RwLockWriteGuard<'static, Option<T>>,
);

impl<T: 'static + Send + Sync> HookLock<T> {
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self(impl_::RwLock::new(None))
    }

    #[inline]
    pub(crate) fn read(&'static self) -> HookLockReadGuard<T> {
        #[cfg(not(feature = "std"))]
        let guard = self.0.read();

        // A poisoned lock still holds a valid `Option<T>`: writers only ever
        // swap the whole value.
        #[cfg(feature = "std")]
        let guard = self.0.read().unwrap_or_else(|poisoned| poisoned.into_inner());

        HookLockReadGuard(guard)
    }

    #[inline]
    pub(crate) fn write(&'static self) -> HookLockWriteGuard<T> {
        #[cfg(not(feature = "std"))]
        let guard = self.0.write();

        #[cfg(feature = "std")]
        let guard = self.0.write().unwrap_or_else(|poisoned| poisoned.into_inner());

        HookLockWriteGuard(guard)
    }
}

impl<T: 'static + Send + Sync + Clone> HookLock<T> {
    /// Clones the current value out so the lock is not held while it runs.
    #[inline]
    pub(crate) fn snapshot(&'static self) -> Option<T> {
        self.read().get().cloned()
    }

    /// Stores `value`, returning whatever was installed before.
    pub(crate) fn replace(&'static self, value: Option<T>) -> Option<T> {
        core::mem::replace(self.write().get(), value)
    }
}

impl<T: 'static + Send + Sync> HookLockReadGuard<T> {
    #[inline]
    pub(crate) fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }
}

impl<T: 'static + Send + Sync> HookLockWriteGuard<T> {
    #[inline]
    pub(crate) fn get(&mut self) -> &mut Option<T> {
        &mut self.0
    }
}

//! A simple ticketless spinlock implementation.

use core::cell::UnsafeCell;
use core::hint;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// Marker trait for types protected by a [`SpinLock`].
///
/// Exists as a hook so wrapped types can run cleanup just before the lock is
/// released, without the caller having to remember to do it.
pub trait SpinLockable {
    /// Additional cleanup code for the spinlock, that will be called **BEFORE** the lock is
    /// released.
    /// NOTE: There is no need to release the lock here, it will be released for you. This is
    /// simply an option for when you need to run some code before the lock is released.
    unsafe fn custom_unlock(&mut self) {}
}

/// A simple spinlock implementation
pub struct SpinLock<T>
where
    T: SpinLockable,
{
    lock: AtomicBool,
    data: UnsafeCell<T>,
}

/// A guard for the spinlock, which unlocks the spinlock when dropped
pub struct SpinLockGuard<'a, T>
where
    T: SpinLockable,
{
    lock: &'a SpinLock<T>,
    data: &'a mut T,
}

unsafe impl<T: Send + SpinLockable> Send for SpinLock<T> {}
unsafe impl<T: Send + SpinLockable> Sync for SpinLock<T> {}

impl<T> SpinLock<T>
where
    T: SpinLockable,
{
    /// Create a new spinlock with the given data
    pub const fn new(data: T) -> Self {
        SpinLock {
            lock: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    /// Spin until you can lock the spinlock, then lock it
    pub fn lock(&self) -> SpinLockGuard<T> {
        loop {
            hint::spin_loop();

            if !self.lock.swap(true, Ordering::Acquire) {
                break;
            }
        }

        SpinLockGuard {
            lock: self,
            data: unsafe { self.data.get().as_mut().unwrap() },
        }
    }

    /// Try to lock the spinlock once, without spinning.
    pub fn try_lock(&self) -> Option<SpinLockGuard<T>> {
        if self.lock.swap(true, Ordering::Acquire) {
            return None;
        }

        Some(SpinLockGuard {
            lock: self,
            data: unsafe { self.data.get().as_mut().unwrap() },
        })
    }

    unsafe fn unlock(&self) {
        self.lock.store(false, Ordering::Release);
    }
}

impl<T> Drop for SpinLockGuard<'_, T>
where
    T: SpinLockable,
{
    fn drop(&mut self) {
        unsafe {
            self.data.custom_unlock();
            self.lock.unlock()
        };
    }
}

impl<T> Deref for SpinLockGuard<'_, T>
where
    T: SpinLockable,
{
    type Target = T;
    fn deref(&self) -> &Self::Target {
        self.data
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T>
where
    T: SpinLockable,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(u32);
    impl SpinLockable for Counter {}

    #[test]
    fn lock_and_mutate() {
        let lock = SpinLock::new(Counter(0));
        {
            let mut guard = lock.lock();
            guard.0 += 1;
        }
        assert_eq!(lock.lock().0, 1);
    }

    #[test]
    fn try_lock_contended() {
        let lock = SpinLock::new(Counter(0));
        let _guard = lock.lock();
        assert!(lock.try_lock().is_none());
    }
}

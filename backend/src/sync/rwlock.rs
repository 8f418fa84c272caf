//! Reader-writer lock with explicit reader/writer bookkeeping.
//!
//! Built on a `parking_lot` mutex + condvar pair rather than
//! `std::sync::RwLock`, because the protocol here is pinned down to a
//! specific (and deliberately imperfect) fairness contract:
//!
//! - `read` blocks only while a writer is **active**. Waiting writers are
//!   not consulted, so a continuous stream of readers can starve a writer
//!   indefinitely. This is a documented property, not a bug to fix.
//! - Releasing a write lock wakes **all** waiters, who re-check their
//!   condition; releasing the last read lock wakes one waiting writer.
//! - The lock is not reentrant. Acquiring it twice from the same thread
//!   deadlocks.
//!
//! A release with no matching acquisition is logged as a diagnostic and
//! otherwise ignored; the RAII guards make that unreachable from safe
//! code, but the counters are still checked.

use parking_lot::{Condvar, Mutex};
use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};

#[derive(Debug, Default)]
struct LockState {
    active_readers: usize,
    active_writers: usize,
    waiting_writers: usize,
}

/// Reader-writer lock owning the data it guards.
pub struct ReadWriteLock<T: ?Sized> {
    state: Mutex<LockState>,
    cond: Condvar,
    data: UnsafeCell<T>,
}

// Same bounds as std::sync::RwLock.
unsafe impl<T: ?Sized + Send> Send for ReadWriteLock<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for ReadWriteLock<T> {}

impl<T> ReadWriteLock<T> {
    pub fn new(data: T) -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            cond: Condvar::new(),
            data: UnsafeCell::new(data),
        }
    }
}

impl<T: ?Sized> ReadWriteLock<T> {
    /// Acquire a shared read lock, blocking while a writer is active.
    ///
    /// Waiting writers are intentionally ignored here: readers keep
    /// getting in ahead of a parked writer as long as any reader is
    /// active (writer starvation is possible by design).
    pub fn read(&self) -> ReadGuard<'_, T> {
        let mut state = self.state.lock();
        while state.active_writers > 0 {
            self.cond.wait(&mut state);
        }
        state.active_readers += 1;
        ReadGuard { lock: self }
    }

    /// Acquire the exclusive write lock, blocking while any reader or
    /// writer is active. Registers as a waiting writer for the duration
    /// of the wait so that read-release can hand off to it.
    pub fn write(&self) -> WriteGuard<'_, T> {
        let mut state = self.state.lock();
        while state.active_readers > 0 || state.active_writers > 0 {
            state.waiting_writers += 1;
            self.cond.wait(&mut state);
            state.waiting_writers -= 1;
        }
        state.active_writers += 1;
        WriteGuard { lock: self }
    }

    fn release_read(&self) {
        let mut state = self.state.lock();
        if state.active_readers == 0 {
            log::error!("read lock released without an active reader");
            return;
        }
        state.active_readers -= 1;
        if state.active_readers == 0 && state.waiting_writers > 0 {
            self.cond.notify_one();
        }
    }

    fn release_write(&self) {
        let mut state = self.state.lock();
        if state.active_writers > 0 {
            state.active_writers -= 1;
        } else {
            log::error!("write lock released without an active writer");
        }
        // Wake everything; readers and writers re-check their conditions.
        self.cond.notify_all();
    }
}

impl<T: Default> Default for ReadWriteLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized + std::fmt::Debug> std::fmt::Debug for ReadWriteLock<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadWriteLock").finish_non_exhaustive()
    }
}

/// Shared access to the guarded data. Released on drop.
pub struct ReadGuard<'a, T: ?Sized> {
    lock: &'a ReadWriteLock<T>,
}

impl<T: ?Sized> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

/// Exclusive access to the guarded data. Released on drop.
pub struct WriteGuard<'a, T: ?Sized> {
    lock: &'a ReadWriteLock<T>,
}

impl<T: ?Sized> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_write();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_multiple_readers_share_the_lock() {
        let lock = ReadWriteLock::new(7);
        let a = lock.read();
        let b = lock.read();
        assert_eq!(*a, 7);
        assert_eq!(*b, 7);
    }

    #[test]
    fn test_writer_excludes_readers_and_writers() {
        let lock = Arc::new(ReadWriteLock::new(0u64));
        let observed = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let lock = Arc::clone(&lock);
            let observed = Arc::clone(&observed);
            handles.push(thread::spawn(move || {
                for _ in 0..500 {
                    let mut guard = lock.write();
                    let before = *guard;
                    *guard = before + 1;
                    observed.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*lock.read(), 2000, "writers must not interleave");
        assert_eq!(observed.load(Ordering::SeqCst), 2000);
    }

    #[test]
    fn test_readers_admitted_while_writer_waits() {
        // The documented fairness property: a reader arriving while a
        // writer is parked gets in ahead of the writer.
        let lock = Arc::new(ReadWriteLock::new(()));
        let first_reader = lock.read();

        let writer_done = Arc::new(AtomicUsize::new(0));
        let writer = {
            let lock = Arc::clone(&lock);
            let writer_done = Arc::clone(&writer_done);
            thread::spawn(move || {
                let _guard = lock.write();
                writer_done.store(1, Ordering::SeqCst);
            })
        };

        // Give the writer time to park.
        thread::sleep(Duration::from_millis(50));
        assert_eq!(writer_done.load(Ordering::SeqCst), 0);

        // A new reader must not block on the parked writer.
        let second_reader = lock.read();
        assert_eq!(writer_done.load(Ordering::SeqCst), 0);

        drop(first_reader);
        drop(second_reader);
        writer.join().unwrap();
        assert_eq!(writer_done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_write_release_wakes_all_waiters() {
        let lock = Arc::new(ReadWriteLock::new(()));
        let guard = lock.write();

        let woken = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..3 {
            let lock = Arc::clone(&lock);
            let woken = Arc::clone(&woken);
            handles.push(thread::spawn(move || {
                let _guard = lock.read();
                woken.fetch_add(1, Ordering::SeqCst);
            }));
        }

        thread::sleep(Duration::from_millis(50));
        assert_eq!(woken.load(Ordering::SeqCst), 0);

        drop(guard);
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(woken.load(Ordering::SeqCst), 3, "all readers proceed together");
    }
}

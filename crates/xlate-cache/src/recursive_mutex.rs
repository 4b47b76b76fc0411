//! A mutex a thread already holding the lock can take again.
//!
//! The lookup cache's erase path runs delinkers while holding the cache
//! lock (spec §4.2/§5); a delinker is just a closure over already-captured
//! patch data in this crate, but the lock still needs to survive a caller
//! that, say, triggers a fresh lookup (and thus a fresh lock attempt) from
//! inside its own delinker. `std::sync::Mutex` deadlocks on that; this
//! doesn't.
//!
//! Implemented as a spin-with-yield on an owner/depth pair rather than
//! pulling in `parking_lot`'s `ReentrantMutex` — the reference workspace
//! doesn't carry a lock-free-primitives crate anywhere, and cache lock hold
//! times here are a handful of hashmap/array operations, not I/O.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread::{self, ThreadId};

pub struct ReentrantMutex<T> {
    owner: Mutex<Option<ThreadId>>,
    depth: AtomicUsize,
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is only ever granted to the thread recorded as
// `owner`, serialized by `owner`'s own mutex.
unsafe impl<T: Send> Send for ReentrantMutex<T> {}
unsafe impl<T: Send> Sync for ReentrantMutex<T> {}

impl<T> ReentrantMutex<T> {
    pub fn new(data: T) -> Self {
        Self {
            owner: Mutex::new(None),
            depth: AtomicUsize::new(0),
            data: UnsafeCell::new(data),
        }
    }

    pub fn lock(&self) -> ReentrantMutexGuard<'_, T> {
        let this = thread::current().id();
        loop {
            let mut owner = self.owner.lock().unwrap();
            match *owner {
                Some(holder) if holder == this => {
                    self.depth.fetch_add(1, Ordering::Relaxed);
                    return ReentrantMutexGuard { mutex: self };
                }
                None => {
                    *owner = Some(this);
                    self.depth.store(1, Ordering::Relaxed);
                    return ReentrantMutexGuard { mutex: self };
                }
                Some(_) => {
                    drop(owner);
                    thread::yield_now();
                }
            }
        }
    }
}

pub struct ReentrantMutexGuard<'a, T> {
    mutex: &'a ReentrantMutex<T>,
}

impl<T> Deref for ReentrantMutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: only the holding thread ever dereferences a live guard.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T> DerefMut for ReentrantMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: same as above.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T> Drop for ReentrantMutexGuard<'_, T> {
    fn drop(&mut self) {
        if self.mutex.depth.fetch_sub(1, Ordering::Relaxed) == 1 {
            let mut owner = self.mutex.owner.lock().unwrap();
            *owner = None;
        }
    }
}

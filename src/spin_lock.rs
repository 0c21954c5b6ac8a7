// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Test-and-set spin lock with exponential backoff.
// Checked builds (debug_assertions or feature "checked") track the owning
// thread to catch recursive locking and unlock by a non-owner.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[cfg(any(debug_assertions, feature = "checked"))]
use std::sync::atomic::AtomicU64;

use crate::backoff::Backoff;

/// Raw lock interface used by [`ScopedLock`](crate::ScopedLock).
pub trait RawSpinLock {
    fn lock(&self);
    fn try_lock(&self) -> bool;
    fn unlock(&self);
}

// ---------------------------------------------------------------------------
// Flag helpers shared with UnfairSpinLock
// ---------------------------------------------------------------------------

#[inline]
pub(crate) fn try_acquire_flag(flag: &AtomicBool) -> bool {
    !flag.load(Ordering::Relaxed) && !flag.swap(true, Ordering::Acquire)
}

/// Fast-path test-and-set, then test-and-test-and-set under `Backoff::spin`.
#[inline]
pub(crate) fn acquire_flag(flag: &AtomicBool) {
    if !flag.swap(true, Ordering::Acquire) {
        return;
    }
    let mut backoff = Backoff::new();
    loop {
        while flag.load(Ordering::Relaxed) {
            backoff.spin();
        }
        if !flag.swap(true, Ordering::Acquire) {
            return;
        }
    }
}

pub(crate) fn try_acquire_flag_for(flag: &AtomicBool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let mut backoff = Backoff::new();
    loop {
        if try_acquire_flag(flag) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        backoff.spin();
    }
}

pub(crate) fn wait_flag(flag: &AtomicBool) {
    let mut backoff = Backoff::new();
    while flag.load(Ordering::Acquire) {
        backoff.spin();
    }
}

// ---------------------------------------------------------------------------
// Owner tags (checked builds only)
// ---------------------------------------------------------------------------

/// Small per-thread id; 0 is reserved for "no owner".
#[cfg(any(debug_assertions, feature = "checked"))]
fn current_thread_tag() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    thread_local! {
        static TAG: u64 = NEXT.fetch_add(1, Ordering::Relaxed);
    }
    TAG.with(|t| *t)
}

/// A test-and-set spin lock.
///
/// `lock` spins with exponentially growing pause bursts and starts
/// yielding to the scheduler once the burst passes half its cap.
///
/// In checked builds, locking twice from the same thread panics instead of
/// hanging, and `unlock` from a thread that does not own the lock aborts
/// the process. Both checks compile out otherwise.
pub struct SpinLock {
    flag: AtomicBool,
    #[cfg(any(debug_assertions, feature = "checked"))]
    owner: AtomicU64,
}

impl SpinLock {
    /// Create a new unlocked spin lock.
    pub const fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
            #[cfg(any(debug_assertions, feature = "checked"))]
            owner: AtomicU64::new(0),
        }
    }

    /// Acquire the lock, spinning until it is free.
    ///
    /// # Panics
    /// In checked builds, if the calling thread already holds the lock.
    pub fn lock(&self) {
        #[cfg(any(debug_assertions, feature = "checked"))]
        {
            let me = current_thread_tag();
            if self.owner.load(Ordering::Relaxed) == me {
                panic!("SpinLock::lock: resource deadlock would occur (lock already held by this thread)");
            }
        }
        acquire_flag(&self.flag);
        self.set_owner();
    }

    /// Try to acquire the lock without blocking.
    pub fn try_lock(&self) -> bool {
        if try_acquire_flag(&self.flag) {
            self.set_owner();
            true
        } else {
            false
        }
    }

    /// Poll `try_lock` with backoff until it succeeds or `timeout` elapses.
    pub fn try_lock_for(&self, timeout: Duration) -> bool {
        if try_acquire_flag_for(&self.flag, timeout) {
            self.set_owner();
            true
        } else {
            false
        }
    }

    /// Release the lock.
    ///
    /// There is no kernel wait queue behind the flag: waiters are spinning
    /// and observe the release on their next poll.
    pub fn unlock(&self) {
        #[cfg(any(debug_assertions, feature = "checked"))]
        {
            let me = current_thread_tag();
            let owner = self.owner.load(Ordering::Relaxed);
            if owner != me {
                log::error!(
                    "SpinLock::unlock called by thread tag {me}, owner is {owner}; aborting"
                );
                std::process::abort();
            }
            self.owner.store(0, Ordering::Relaxed);
        }
        self.flag.store(false, Ordering::Release);
    }

    /// Block until the lock is observed free, without acquiring it.
    pub fn wait(&self) {
        wait_flag(&self.flag);
    }

    /// Whether the lock is currently held by anyone.
    pub fn is_locked(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    #[inline]
    fn set_owner(&self) {
        #[cfg(any(debug_assertions, feature = "checked"))]
        self.owner.store(current_thread_tag(), Ordering::Relaxed);
    }
}

impl Default for SpinLock {
    fn default() -> Self {
        Self::new()
    }
}

impl RawSpinLock for SpinLock {
    fn lock(&self) {
        SpinLock::lock(self)
    }

    fn try_lock(&self) -> bool {
        SpinLock::try_lock(self)
    }

    fn unlock(&self) {
        SpinLock::unlock(self)
    }
}

impl std::fmt::Debug for SpinLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpinLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}

// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Spin-then-yield lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::backoff::Backoff;
use crate::spin_lock::{self, RawSpinLock};

/// Spins for [`SPIN_ATTEMPTS`](Self::SPIN_ATTEMPTS) backoff rounds, then
/// falls back to a pure `yield_now` + retry loop for the rest of the call.
///
/// Light contention is resolved during the short spin phase; heavy
/// contention parks the waiter in the scheduler instead of burning a core.
#[derive(Debug, Default)]
pub struct AdaptiveSpinLock {
    flag: AtomicBool,
}

impl AdaptiveSpinLock {
    pub const SPIN_ATTEMPTS: u32 = 16;

    pub const fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
        }
    }

    pub fn lock(&self) {
        let mut backoff = Backoff::new();
        for _ in 0..Self::SPIN_ATTEMPTS {
            if self.try_lock() {
                return;
            }
            backoff.spin();
        }
        while !self.try_lock() {
            std::thread::yield_now();
        }
    }

    pub fn try_lock(&self) -> bool {
        spin_lock::try_acquire_flag(&self.flag)
    }

    pub fn try_lock_for(&self, timeout: Duration) -> bool {
        spin_lock::try_acquire_flag_for(&self.flag, timeout)
    }

    pub fn unlock(&self) {
        self.flag.store(false, Ordering::Release);
    }

    pub fn is_locked(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

impl RawSpinLock for AdaptiveSpinLock {
    fn lock(&self) {
        AdaptiveSpinLock::lock(self)
    }

    fn try_lock(&self) -> bool {
        AdaptiveSpinLock::try_lock(self)
    }

    fn unlock(&self) {
        AdaptiveSpinLock::unlock(self)
    }
}

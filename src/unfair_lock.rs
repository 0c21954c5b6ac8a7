// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Spin lock without ownership bookkeeping or fairness.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::spin_lock::{self, RawSpinLock};

/// The cheapest lock of the family.
///
/// Same acquire path as [`SpinLock`](crate::SpinLock) but never records an
/// owner, even in checked builds. A thread may be starved indefinitely
/// under sustained contention.
#[derive(Debug, Default)]
pub struct UnfairSpinLock {
    flag: AtomicBool,
}

impl UnfairSpinLock {
    pub const fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
        }
    }

    pub fn lock(&self) {
        spin_lock::acquire_flag(&self.flag);
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

    pub fn wait(&self) {
        spin_lock::wait_flag(&self.flag);
    }

    pub fn is_locked(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

impl RawSpinLock for UnfairSpinLock {
    fn lock(&self) {
        UnfairSpinLock::lock(self)
    }

    fn try_lock(&self) -> bool {
        UnfairSpinLock::try_lock(self)
    }

    fn unlock(&self) {
        UnfairSpinLock::unlock(self)
    }
}

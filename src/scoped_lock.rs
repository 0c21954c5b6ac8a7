// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// RAII guards for the spin lock family.

use std::marker::PhantomData;
use std::time::Duration;

use crate::error::LockError;
use crate::spin_lock::RawSpinLock;
use crate::ticket_lock::TicketSpinLock;

/// RAII guard: locks on construction, unlocks on drop unless already
/// released with [`unlock`](Self::unlock).
///
/// Guards are `!Send`: the owner-tracking [`SpinLock`](crate::SpinLock)
/// must be released by the thread that acquired it.
pub struct ScopedLock<'a, L: RawSpinLock + ?Sized> {
    lock: &'a L,
    locked: bool,
    _not_send: PhantomData<*const ()>,
}

impl<'a, L: RawSpinLock + ?Sized> ScopedLock<'a, L> {
    /// Acquire `lock`, blocking until it is available.
    ///
    /// Misuse detected by the lock itself (e.g. recursive locking in checked
    /// builds) propagates out of this constructor.
    pub fn new(lock: &'a L) -> Self {
        lock.lock();
        Self::held(lock)
    }

    /// Acquire `lock` only if it is immediately available.
    pub fn try_new(lock: &'a L) -> Option<Self> {
        lock.try_lock().then(|| Self::held(lock))
    }

    /// Poll `try_lock` until it succeeds or `timeout` elapses.
    pub fn try_new_for(lock: &'a L, timeout: Duration) -> Option<Self> {
        let deadline = std::time::Instant::now() + timeout;
        let mut k = 0u32;
        loop {
            if lock.try_lock() {
                return Some(Self::held(lock));
            }
            if std::time::Instant::now() >= deadline {
                return None;
            }
            crate::backoff::adaptive_yield(&mut k);
        }
    }

    fn held(lock: &'a L) -> Self {
        Self {
            lock,
            locked: true,
            _not_send: PhantomData,
        }
    }

    /// Release early. Further calls (and the drop) are no-ops.
    pub fn unlock(&mut self) {
        if self.locked {
            self.locked = false;
            self.lock.unlock();
        }
    }

    pub fn owns_lock(&self) -> bool {
        self.locked
    }
}

impl<'a, L: RawSpinLock + ?Sized> Drop for ScopedLock<'a, L> {
    fn drop(&mut self) {
        self.unlock();
    }
}

/// RAII guard for [`TicketSpinLock`], carrying the drawn ticket to the
/// release.
pub struct TicketGuard<'a> {
    lock: &'a TicketSpinLock,
    ticket: u64,
    locked: bool,
    _not_send: PhantomData<*const ()>,
}

impl<'a> TicketGuard<'a> {
    /// Draw a ticket and wait until it is served.
    pub fn new(lock: &'a TicketSpinLock) -> Self {
        let ticket = lock.lock();
        Self::held(lock, ticket)
    }

    /// Acquire only if the lock is free and nobody is queued.
    pub fn try_new(lock: &'a TicketSpinLock) -> Option<Self> {
        lock.try_lock().map(|ticket| Self::held(lock, ticket))
    }

    fn held(lock: &'a TicketSpinLock, ticket: u64) -> Self {
        Self {
            lock,
            ticket,
            locked: true,
            _not_send: PhantomData,
        }
    }

    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Release early. Returns `Ok(())` if already released.
    pub fn unlock(&mut self) -> Result<(), LockError> {
        if !self.locked {
            return Ok(());
        }
        self.locked = false;
        self.lock.unlock(self.ticket)
    }

    pub fn owns_lock(&self) -> bool {
        self.locked
    }
}

impl<'a> Drop for TicketGuard<'a> {
    fn drop(&mut self) {
        let _ = self.unlock();
    }
}

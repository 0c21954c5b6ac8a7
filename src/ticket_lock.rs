// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// FIFO ticket spin lock.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::backoff::Backoff;
use crate::error::LockError;

/// A fair spin lock: threads are served strictly in the order they drew
/// their tickets.
///
/// `lock` returns the drawn ticket, which must be handed back to
/// [`unlock`](Self::unlock). [`TicketGuard`](crate::TicketGuard) does that
/// automatically.
///
/// Invariants: `now_serving` never decreases and never passes
/// `next_ticket`; a thread holds the lock iff its ticket equals
/// `now_serving`.
#[derive(Debug, Default)]
pub struct TicketSpinLock {
    next_ticket: AtomicU64,
    now_serving: AtomicU64,
}

impl TicketSpinLock {
    /// Pause rounds before yielding to the scheduler and starting over.
    pub const SPIN_BOUND: u32 = 64;

    pub const fn new() -> Self {
        Self {
            next_ticket: AtomicU64::new(0),
            now_serving: AtomicU64::new(0),
        }
    }

    /// Draw a ticket and spin until it is served. Returns the ticket.
    pub fn lock(&self) -> u64 {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        if self.now_serving.load(Ordering::Acquire) == ticket {
            return ticket;
        }
        let mut spins = 0u32;
        while self.now_serving.load(Ordering::Acquire) != ticket {
            if spins < Self::SPIN_BOUND {
                Backoff::pause();
                spins += 1;
            } else {
                std::thread::yield_now();
                spins = 0;
            }
        }
        ticket
    }

    /// Take the lock only if nobody holds it or is queued for it.
    pub fn try_lock(&self) -> Option<u64> {
        let serving = self.now_serving.load(Ordering::Acquire);
        self.next_ticket
            .compare_exchange(serving, serving.wrapping_add(1), Ordering::Acquire, Ordering::Relaxed)
            .ok()
    }

    /// Release the lock held with `ticket`, admitting the next ticket holder.
    ///
    /// Fails without touching the lock if `ticket` is not being served.
    pub fn unlock(&self, ticket: u64) -> Result<(), LockError> {
        let serving = self.now_serving.load(Ordering::Relaxed);
        if serving != ticket {
            #[cfg(any(debug_assertions, feature = "checked"))]
            log::error!("TicketSpinLock::unlock: ticket {ticket} released while serving {serving}");
            return Err(LockError::TicketMismatch { ticket, serving });
        }
        self.now_serving
            .store(serving.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Whether some ticket is currently being served.
    pub fn is_locked(&self) -> bool {
        self.next_ticket.load(Ordering::Relaxed) != self.now_serving.load(Ordering::Relaxed)
    }

    /// Number of threads holding or waiting for the lock.
    pub fn queue_len(&self) -> u64 {
        self.next_ticket
            .load(Ordering::Relaxed)
            .wrapping_sub(self.now_serving.load(Ordering::Relaxed))
    }

    /// The ticket currently being served.
    pub fn now_serving(&self) -> u64 {
        self.now_serving.load(Ordering::Acquire)
    }
}

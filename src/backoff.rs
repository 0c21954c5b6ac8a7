// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Pause / yield primitives shared by every spin loop in the crate.

use std::time::Duration;

/// Backoff state for a single acquire attempt.
///
/// `spin()` doubles the number of CPU pause hints on every call up to
/// `1 << SPIN_LIMIT`; once past half that cap it also yields to the
/// scheduler so other runnable threads are not starved.
#[derive(Debug, Default)]
pub struct Backoff {
    step: u32,
}

impl Backoff {
    /// Exponent of the largest pause burst (1024 pause hints).
    pub const SPIN_LIMIT: u32 = 10;

    pub const fn new() -> Self {
        Self { step: 0 }
    }

    /// Single CPU pause hint (`pause` on x86, `yield`/`isb` on ARM).
    #[inline]
    pub fn pause() {
        std::hint::spin_loop();
    }

    /// Exponential spin with escalation to `yield_now`.
    #[inline]
    pub fn spin(&mut self) {
        for _ in 0..(1u32 << self.step) {
            Self::pause();
        }
        if self.step > Self::SPIN_LIMIT / 2 {
            std::thread::yield_now();
        }
        if self.step < Self::SPIN_LIMIT {
            self.step += 1;
        }
    }

    /// Whether the spin burst has reached its cap.
    pub fn is_saturated(&self) -> bool {
        self.step >= Self::SPIN_LIMIT
    }

    pub fn reset(&mut self) {
        self.step = 0;
    }
}

/// Adaptive ladder used for waits that may last a while:
///
/// - k < 4:  busy spin (do nothing)
/// - k < 16: CPU pause hint
/// - k < 32: thread yield
/// - k >= 32: sleep 1ms
#[inline]
pub(crate) fn adaptive_yield(k: &mut u32) {
    if *k < 4 {
        // busy spin
    } else if *k < 16 {
        std::hint::spin_loop();
    } else if *k < 32 {
        std::thread::yield_now();
    } else {
        std::thread::sleep(Duration::from_millis(1));
        return;
    }
    *k += 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spin_saturates_at_limit() {
        let mut b = Backoff::new();
        assert!(!b.is_saturated());
        for _ in 0..Backoff::SPIN_LIMIT + 3 {
            b.spin();
        }
        assert!(b.is_saturated());
        b.reset();
        assert!(!b.is_saturated());
    }

    #[test]
    fn adaptive_yield_stops_counting_at_sleep() {
        let mut k = 0u32;
        for _ in 0..40 {
            adaptive_yield(&mut k);
        }
        assert_eq!(k, 32);
    }
}

// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Control block placed at offset 0 of every SharedMemory segment.
//
// Layout (repr(C), natural alignment):
//   [lock_flag: u8][pad][size: usize][version: u64][initialized: u8][pad][payload...]
// The payload starts at HEADER_SIZE.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Fixed-layout header shared by every process mapping the segment.
///
/// `lock_flag` is the embedded cross-process spin lock. It is a plain flag
/// in mapped memory: if a process dies while holding it, the segment stays
/// locked and every later acquire runs into its timeout. Nothing here
/// tries to recover from that.
#[repr(C)]
pub struct SharedMemoryHeader {
    lock_flag: AtomicBool,
    size: AtomicUsize,
    version: AtomicU64,
    initialized: AtomicBool,
}

/// Byte offset of the payload inside a mapped segment.
pub const HEADER_SIZE: usize = std::mem::size_of::<SharedMemoryHeader>();

impl SharedMemoryHeader {
    /// Reinterpret the start of a mapping as a header.
    ///
    /// # Safety
    /// `base` must point to at least `HEADER_SIZE` mapped, suitably aligned
    /// bytes that outlive `'a`.
    pub(crate) unsafe fn from_ptr<'a>(base: *mut u8) -> &'a SharedMemoryHeader {
        &*(base as *const SharedMemoryHeader)
    }

    /// Creator-side initialisation: free lock, `payload_size`, version 0,
    /// not initialised.
    pub(crate) fn init(&self, payload_size: usize) {
        self.lock_flag.store(false, Ordering::Relaxed);
        self.size.store(payload_size, Ordering::Relaxed);
        self.version.store(0, Ordering::Relaxed);
        self.initialized.store(false, Ordering::Release);
    }

    /// Spin on the embedded flag, sleeping `retry` between attempts.
    ///
    /// A zero `timeout` waits without deadline. Returns `false` if the
    /// deadline passed first.
    pub(crate) fn acquire(&self, timeout: Duration, retry: Duration) -> bool {
        let start = Instant::now();
        while self.lock_flag.swap(true, Ordering::Acquire) {
            if !timeout.is_zero() && start.elapsed() >= timeout {
                return false;
            }
            std::thread::sleep(retry);
        }
        true
    }

    pub(crate) fn release(&self) {
        self.lock_flag.store(false, Ordering::Release);
    }

    pub fn is_locked(&self) -> bool {
        self.lock_flag.load(Ordering::Acquire)
    }

    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Record a successful mutation. Returns the new version.
    pub(crate) fn bump_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn set_initialized(&self, initialized: bool) {
        self.initialized.store(initialized, Ordering::Release);
    }
}

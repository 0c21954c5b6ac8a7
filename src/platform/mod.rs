// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Segment backend interface. One implementation per OS, chosen at build
// time and re-exported under uniform names.

use std::io;
use std::time::Duration;

use crate::error::Result;

#[cfg(unix)]
pub mod posix;

#[cfg(windows)]
pub mod windows;

#[cfg(unix)]
pub use posix::{NativeHandle, PlatformSegment, PlatformSignal};

#[cfg(windows)]
pub use windows::{NativeHandle, PlatformSegment, PlatformSignal};

/// A named, mapped OS shared-memory object. Unmapped on drop.
pub trait SegmentBackend: Sized + Send + Sync {
    /// Create a new object of `size` bytes and map it.
    /// Fails with `ALREADY_EXISTS` if the name is taken.
    fn create(name: &str, size: usize) -> Result<Self>;

    /// Map an existing object, requiring at least `size` bytes.
    /// Fails with `NOT_FOUND` if absent.
    fn open(name: &str, size: usize) -> Result<Self>;

    /// Probe for the object without creating or keeping it.
    fn exists(name: &str) -> bool;

    fn as_mut_ptr(&self) -> *mut u8;

    /// Mapped length in bytes.
    fn len(&self) -> usize;

    fn native_handle(&self) -> NativeHandle;

    /// Remove the name so that no new process can attach. Mappings that
    /// are already established stay valid.
    fn unlink(&self);
}

/// Named cross-process wake primitive paired with a segment.
pub trait WakeSignal: Sized + Send + Sync {
    fn open(name: &str) -> io::Result<Self>;

    /// Wake (at least) one waiter.
    fn post(&self);

    /// Wait up to `timeout`. `Ok(true)` if signalled, `Ok(false)` on timeout.
    fn wait(&self, timeout: Duration) -> io::Result<bool>;

    fn unlink(&self);
}

// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Runtime tuning for SharedMemory handles.

use std::time::Duration;

/// Tuning knobs for a [`SharedMemory`](crate::SharedMemory) handle.
///
/// ```
/// use std::time::Duration;
/// use spinshm::SharedMemoryOptions;
///
/// let opts = SharedMemoryOptions::default()
///     .watch_interval(Duration::from_millis(20))
///     .lock_retry_interval(Duration::from_micros(200));
/// assert_eq!(opts.get_watch_interval(), Duration::from_millis(20));
/// ```
#[derive(Debug, Clone)]
pub struct SharedMemoryOptions {
    pub(crate) watch_interval: Duration,
    pub(crate) lock_retry_interval: Duration,
    pub(crate) init_timeout: Duration,
    pub(crate) watcher_read_timeout: Duration,
    pub(crate) start_watcher: bool,
}

impl Default for SharedMemoryOptions {
    fn default() -> Self {
        Self {
            watch_interval: Duration::from_millis(100),
            lock_retry_interval: Duration::from_millis(1),
            init_timeout: Duration::from_millis(100),
            watcher_read_timeout: Duration::from_millis(50),
            start_watcher: true,
        }
    }
}

impl SharedMemoryOptions {
    /// How long the watcher blocks on the wake primitive (or sleeps when
    /// none is available) between version checks.
    pub fn watch_interval(mut self, interval: Duration) -> Self {
        self.watch_interval = interval;
        self
    }

    /// Sleep between attempts to take the embedded cross-process lock.
    pub fn lock_retry_interval(mut self, interval: Duration) -> Self {
        self.lock_retry_interval = interval;
        self
    }

    /// Lock timeout for writing the initial payload on creation.
    pub fn init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    /// Lock timeout for the watcher's read of a changed value.
    pub fn watcher_read_timeout(mut self, timeout: Duration) -> Self {
        self.watcher_read_timeout = timeout;
        self
    }

    /// Whether to run the background watcher thread.
    pub fn start_watcher(mut self, start: bool) -> Self {
        self.start_watcher = start;
        self
    }

    pub fn get_watch_interval(&self) -> Duration {
        self.watch_interval
    }

    pub fn get_lock_retry_interval(&self) -> Duration {
        self.lock_retry_interval
    }
}

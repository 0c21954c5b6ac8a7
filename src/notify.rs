// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Process-local change notification: callback registry plus the
// condition variable behind `wait_for_change`.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Callback invoked with the new value after a change.
pub type ChangeCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Registry of `(id, callback)` pairs and the change condition.
///
/// Protected by its own locks, distinct from the segment's embedded
/// cross-process flag.
pub(crate) struct Notifier<T> {
    callbacks: Mutex<Registry<T>>,
    changed: Mutex<()>,
    cond: Condvar,
}

struct Registry<T> {
    entries: Vec<(usize, ChangeCallback<T>)>,
    next_id: usize,
}

impl<T> Notifier<T> {
    pub(crate) fn new() -> Self {
        Self {
            callbacks: Mutex::new(Registry {
                entries: Vec::new(),
                next_id: 1,
            }),
            changed: Mutex::new(()),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn register(&self, callback: ChangeCallback<T>) -> usize {
        let mut reg = self.callbacks.lock();
        let id = reg.next_id;
        reg.next_id += 1;
        reg.entries.push((id, callback));
        id
    }

    pub(crate) fn unregister(&self, id: usize) -> bool {
        let mut reg = self.callbacks.lock();
        match reg.entries.iter().position(|(i, _)| *i == id) {
            Some(pos) => {
                reg.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.callbacks.lock().entries.len()
    }

    /// Invoke every callback with `data`.
    ///
    /// Runs on a snapshot of the registry so callbacks may (un)register.
    /// A panicking callback is logged and skipped.
    pub(crate) fn notify_listeners(&self, name: &str, data: &T) {
        let snapshot: Vec<(usize, ChangeCallback<T>)> = self.callbacks.lock().entries.clone();
        for (id, callback) in snapshot {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(data))) {
                log::error!(
                    "change callback {id} for shared memory {name} panicked: {}",
                    panic_message(&payload)
                );
            }
        }
    }

    /// Wake every `wait_until` caller.
    pub(crate) fn wake_waiters(&self) {
        // Taking the mutex orders this wake after any waiter's predicate
        // check, so the wake cannot be lost.
        drop(self.changed.lock());
        self.cond.notify_all();
    }

    /// Block until `changed()` holds, `timeout` elapses (`None` = never),
    /// or forever. Re-evaluates `changed` at least every `poll` so changes
    /// made without a local wake (other processes, no watcher) are seen.
    pub(crate) fn wait_until<F>(&self, timeout: Option<Duration>, poll: Duration, mut changed: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut guard = self.changed.lock();
        loop {
            if changed() {
                return true;
            }
            let now = Instant::now();
            let wake_at = match deadline {
                Some(d) if now >= d => return false,
                Some(d) => d.min(now + poll),
                None => now + poll,
            };
            self.cond.wait_until(&mut guard, wake_at);
        }
    }
}

fn panic_message(payload: &Box<dyn Any + Send>) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

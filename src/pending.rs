// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Handle to a read/write running on a background thread.

use std::thread::{self, JoinHandle};

use crate::error::Result;

/// The eventual result of [`SharedMemory::read_async`] or
/// [`SharedMemory::write_async`].
///
/// Dropping a `Pending` detaches the thread; the operation still runs to
/// completion.
///
/// [`SharedMemory::read_async`]: crate::SharedMemory::read_async
/// [`SharedMemory::write_async`]: crate::SharedMemory::write_async
#[must_use = "a Pending does nothing unless waited on"]
pub struct Pending<R> {
    handle: JoinHandle<Result<R>>,
}

impl<R: Send + 'static> Pending<R> {
    pub(crate) fn spawn<F>(task: F) -> Self
    where
        F: FnOnce() -> Result<R> + Send + 'static,
    {
        Self {
            handle: thread::spawn(task),
        }
    }

    /// Block until the operation finishes and return its result.
    ///
    /// A panic inside the operation resumes on the calling thread.
    pub fn wait(self) -> Result<R> {
        match self.handle.join() {
            Ok(result) => result,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<R> std::fmt::Debug for Pending<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pending")
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, ShmError};

    #[test]
    fn wait_returns_task_result() {
        let p = Pending::spawn(|| Ok(41 + 1));
        assert_eq!(p.wait().unwrap(), 42);
    }

    #[test]
    fn wait_returns_task_error() {
        let p: Pending<()> = Pending::spawn(|| Err(ShmError::new(ErrorCode::Timeout, "late")));
        assert_eq!(p.wait().unwrap_err().code(), ErrorCode::Timeout);
    }

    #[test]
    #[should_panic(expected = "inside task")]
    fn wait_resumes_panic() {
        let p: Pending<()> = Pending::spawn(|| panic!("inside task"));
        let _ = p.wait();
    }
}

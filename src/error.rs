// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Error types for shared memory operations and lock misuse.

use std::fmt;
use std::io;
use std::panic::Location;

use thiserror::Error;

/// Machine-readable classification of a [`ShmError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The OS object could not be created or opened.
    CreationFailed,
    /// The OS object exists but could not be mapped.
    MappingFailed,
    /// The operation is not permitted for this handle (e.g. resize by a non-creator).
    AccessDenied,
    /// The embedded lock or a wait deadline expired.
    Timeout,
    /// Out-of-bounds partial/span access or an undersized segment.
    SizeError,
    /// `create` was requested but the name is already taken.
    AlreadyExists,
    /// `open` was requested but no object with that name exists.
    NotFound,
    /// The payload has never been written (or was cleared).
    NotInitialized,
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::CreationFailed => "CREATION_FAILED",
            ErrorCode::MappingFailed => "MAPPING_FAILED",
            ErrorCode::AccessDenied => "ACCESS_DENIED",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::SizeError => "SIZE_ERROR",
            ErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::NotInitialized => "NOT_INITIALIZED",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised by [`SharedMemory`](crate::SharedMemory) and its backend.
///
/// Carries the [`ErrorCode`], a human-readable message, the source
/// location inside the crate where the error was raised and, for OS
/// failures, the underlying `io::Error`.
#[derive(Debug, Error)]
#[error("{code}: {message} ({location})")]
pub struct ShmError {
    code: ErrorCode,
    message: String,
    location: &'static Location<'static>,
    #[source]
    source: Option<io::Error>,
}

impl ShmError {
    #[track_caller]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            location: Location::caller(),
            source: None,
        }
    }

    /// Build an error wrapping an OS failure.
    #[track_caller]
    pub fn os(code: ErrorCode, message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code,
            message: format!("{} - {}", message.into(), source),
            location: Location::caller(),
            source: Some(source),
        }
    }

    #[track_caller]
    pub(crate) fn timeout(name: &str) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("failed to acquire lock within timeout for shared memory: {name}"),
        )
    }

    #[track_caller]
    pub(crate) fn not_initialized(name: &str) -> Self {
        Self::new(
            ErrorCode::NotInitialized,
            format!("shared memory not initialized yet: {name}"),
        )
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    pub fn is_timeout(&self) -> bool {
        self.code == ErrorCode::Timeout
    }

    pub fn is_not_initialized(&self) -> bool {
        self.code == ErrorCode::NotInitialized
    }

    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::NotFound
    }
}

pub type Result<T, E = ShmError> = std::result::Result<T, E>;

/// Recoverable lock misuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LockError {
    /// A ticket lock was released with a ticket that is not being served.
    /// The lock state is left untouched.
    #[error("ticket {ticket} released while serving {serving}")]
    TicketMismatch { ticket: u64, serving: u64 },
}

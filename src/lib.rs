// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Spin-lock family for intra-process critical sections, and a typed
// cross-process shared-memory segment guarded by a spin flag embedded in
// the mapped bytes.
//
// Owner and ticket validation is compiled in for debug builds and for
// release builds with the `checked` feature.

mod backoff;
pub use backoff::Backoff;

mod spin_lock;
pub use spin_lock::{RawSpinLock, SpinLock};

mod unfair_lock;
pub use unfair_lock::UnfairSpinLock;

mod ticket_lock;
pub use ticket_lock::TicketSpinLock;

mod adaptive_lock;
pub use adaptive_lock::AdaptiveSpinLock;

mod scoped_lock;
pub use scoped_lock::{ScopedLock, TicketGuard};

mod error;
pub use error::{ErrorCode, LockError, Result, ShmError};

mod pod;
pub use pod::Pod;

mod options;
pub use options::SharedMemoryOptions;

mod header;
pub use header::{SharedMemoryHeader, HEADER_SIZE};

pub mod shm_name;

mod platform;
pub use platform::NativeHandle;

mod shm;

mod notify;
pub use notify::ChangeCallback;

mod pending;
pub use pending::Pending;

mod shared_memory;
pub use shared_memory::SharedMemory;

/// Whether lock misuse checks (owner tracking, recursion detection) are
/// compiled into this build.
pub const CHECKED: bool = cfg!(any(debug_assertions, feature = "checked"));

// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// A mapped segment: header + payload, plus its wake primitive.
// Delegates to platform::PlatformSegment / PlatformSignal (POSIX or Windows).

use std::io;
use std::time::Duration;

use crate::error::{ErrorCode, Result, ShmError};
use crate::header::{SharedMemoryHeader, HEADER_SIZE};
use crate::platform::{NativeHandle, PlatformSegment, PlatformSignal, SegmentBackend, WakeSignal};

/// Open mode for a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SegmentMode {
    /// Create exclusively and initialise the header.
    Create,
    /// Attach to an existing segment; the header is never touched.
    Open,
}

pub(crate) struct Segment {
    map: PlatformSegment,
    signal: Option<PlatformSignal>,
    creator: bool,
}

/// Header plus `payload_size`, or `SIZE_ERROR` if the mapping could not be
/// addressed as one slice.
pub(crate) fn total_size(name: &str, payload_size: usize) -> Result<usize> {
    HEADER_SIZE
        .checked_add(payload_size)
        .filter(|&total| total <= isize::MAX as usize)
        .ok_or_else(|| {
            ShmError::new(
                ErrorCode::SizeError,
                format!("payload of {payload_size} bytes is too large for shared memory {name}"),
            )
        })
}

impl Segment {
    /// Acquire a segment with room for `payload_size` bytes after the header.
    pub(crate) fn acquire(name: &str, payload_size: usize, mode: SegmentMode) -> Result<Self> {
        let total = total_size(name, payload_size)?;
        let map = match mode {
            SegmentMode::Create => PlatformSegment::create(name, total)?,
            SegmentMode::Open => PlatformSegment::open(name, total)?,
        };
        let creator = mode == SegmentMode::Create;
        if creator {
            // Safety: the mapping is at least HEADER_SIZE bytes and page aligned.
            let header = unsafe { SharedMemoryHeader::from_ptr(map.as_mut_ptr()) };
            header.init(payload_size);
        }

        let signal = match PlatformSignal::open(name) {
            Ok(s) => Some(s),
            Err(e) => {
                log::warn!("failed to create wake primitive for shared memory {name}: {e}; falling back to polling");
                None
            }
        };

        Ok(Self {
            map,
            signal,
            creator,
        })
    }

    pub(crate) fn exists(name: &str) -> bool {
        PlatformSegment::exists(name)
    }

    pub(crate) fn header(&self) -> &SharedMemoryHeader {
        // Safety: see `acquire`; the mapping lives as long as `self`.
        unsafe { SharedMemoryHeader::from_ptr(self.map.as_mut_ptr()) }
    }

    /// Start of the payload (right after the header).
    pub(crate) fn payload_ptr(&self) -> *mut u8 {
        unsafe { self.map.as_mut_ptr().add(HEADER_SIZE) }
    }

    /// Payload bytes actually mapped by this handle.
    pub(crate) fn capacity(&self) -> usize {
        self.map.len() - HEADER_SIZE
    }

    pub(crate) fn mapped_size(&self) -> usize {
        self.map.len()
    }

    pub(crate) fn native_handle(&self) -> NativeHandle {
        self.map.native_handle()
    }

    pub(crate) fn is_creator(&self) -> bool {
        self.creator
    }

    /// Unlink the names now and give up ownership, so dropping `self`
    /// later only unmaps. Used before re-creating under the same name.
    pub(crate) fn disown(&mut self) {
        if self.creator {
            self.unlink_names();
            self.creator = false;
        }
    }

    fn unlink_names(&self) {
        self.map.unlink();
        if let Some(s) = &self.signal {
            s.unlink();
        }
    }

    pub(crate) fn has_signal(&self) -> bool {
        self.signal.is_some()
    }

    /// Wake other attachers' watchers.
    pub(crate) fn post(&self) {
        if let Some(s) = &self.signal {
            s.post();
        }
    }

    /// Block on the wake primitive; `None` if there is none.
    pub(crate) fn wait_signal(&self, timeout: Duration) -> Option<io::Result<bool>> {
        self.signal.as_ref().map(|s| s.wait(timeout))
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        if self.creator {
            self.unlink_names();
        }
    }
}

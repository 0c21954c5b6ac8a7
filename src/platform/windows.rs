// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Windows backend: pagefile-backed file mapping for the segment, a
// manual-reset named event "<name>_event" as the wake primitive.

use std::io;
use std::ptr;
use std::time::Duration;

use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, ERROR_ACCESS_DENIED, ERROR_ALREADY_EXISTS, ERROR_FILE_NOT_FOUND,
    FALSE, HANDLE, INVALID_HANDLE_VALUE, TRUE, WAIT_OBJECT_0, WAIT_TIMEOUT,
};
use windows_sys::Win32::System::Memory::{
    CreateFileMappingW, MapViewOfFile, OpenFileMappingW, UnmapViewOfFile, FILE_MAP_ALL_ACCESS,
    FILE_MAP_READ, MEMORY_MAPPED_VIEW_ADDRESS, PAGE_READWRITE,
};
use windows_sys::Win32::System::Threading::{CreateEventW, ResetEvent, SetEvent, WaitForSingleObject};

use super::{SegmentBackend, WakeSignal};
use crate::error::{ErrorCode, Result, ShmError};

pub type NativeHandle = HANDLE;

/// Encode a name as a null-terminated wide string for Win32 APIs.
fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

// ---------------------------------------------------------------------------
// PlatformSegment
// ---------------------------------------------------------------------------

pub struct PlatformSegment {
    handle: HANDLE,
    mem: *mut u8,
    size: usize,
}

unsafe impl Send for PlatformSegment {}
unsafe impl Sync for PlatformSegment {}

impl PlatformSegment {
    fn map(handle: HANDLE, size: usize, name: &str) -> Result<Self> {
        let view = unsafe { MapViewOfFile(handle, FILE_MAP_ALL_ACCESS, 0, 0, size) };
        if view.Value.is_null() {
            let err = io::Error::last_os_error();
            unsafe { CloseHandle(handle) };
            return Err(ShmError::os(
                ErrorCode::MappingFailed,
                format!("failed to map view of file: {name}"),
                err,
            ));
        }
        Ok(Self {
            handle,
            mem: view.Value as *mut u8,
            size,
        })
    }
}

impl SegmentBackend for PlatformSegment {
    fn create(name: &str, size: usize) -> Result<Self> {
        if name.is_empty() {
            return Err(ShmError::new(ErrorCode::CreationFailed, "name is empty"));
        }
        let wide_name = to_wide(name);
        let size64 = size as u64;
        let handle = unsafe {
            CreateFileMappingW(
                INVALID_HANDLE_VALUE,
                ptr::null(),
                PAGE_READWRITE,
                (size64 >> 32) as u32,
                size64 as u32,
                wide_name.as_ptr(),
            )
        };
        let last = unsafe { GetLastError() };
        if handle.is_null() {
            return Err(ShmError::os(
                ErrorCode::CreationFailed,
                format!("failed to create file mapping: {name}"),
                io::Error::from_raw_os_error(last as i32),
            ));
        }
        if last == ERROR_ALREADY_EXISTS {
            unsafe { CloseHandle(handle) };
            return Err(ShmError::new(
                ErrorCode::AlreadyExists,
                format!("shared memory already exists: {name}"),
            ));
        }
        Self::map(handle, size, name)
    }

    fn open(name: &str, size: usize) -> Result<Self> {
        if name.is_empty() {
            return Err(ShmError::new(ErrorCode::CreationFailed, "name is empty"));
        }
        let wide_name = to_wide(name);
        let handle = unsafe { OpenFileMappingW(FILE_MAP_ALL_ACCESS, FALSE, wide_name.as_ptr()) };
        if handle.is_null() {
            let last = unsafe { GetLastError() };
            let err = io::Error::from_raw_os_error(last as i32);
            return Err(match last {
                ERROR_FILE_NOT_FOUND => ShmError::new(
                    ErrorCode::NotFound,
                    format!("shared memory not found: {name}"),
                ),
                ERROR_ACCESS_DENIED => ShmError::os(
                    ErrorCode::AccessDenied,
                    format!("access denied opening shared memory: {name}"),
                    err,
                ),
                _ => ShmError::os(
                    ErrorCode::CreationFailed,
                    format!("failed to open file mapping: {name}"),
                    err,
                ),
            });
        }
        Self::map(handle, size, name)
    }

    fn exists(name: &str) -> bool {
        let wide_name = to_wide(name);
        let handle = unsafe { OpenFileMappingW(FILE_MAP_READ, FALSE, wide_name.as_ptr()) };
        if handle.is_null() {
            return false;
        }
        unsafe { CloseHandle(handle) };
        true
    }

    fn as_mut_ptr(&self) -> *mut u8 {
        self.mem
    }

    fn len(&self) -> usize {
        self.size
    }

    fn native_handle(&self) -> NativeHandle {
        self.handle
    }

    fn unlink(&self) {
        // The mapping disappears with its last handle; nothing to remove.
    }
}

impl Drop for PlatformSegment {
    fn drop(&mut self) {
        if !self.mem.is_null() {
            let view = MEMORY_MAPPED_VIEW_ADDRESS {
                Value: self.mem as *mut core::ffi::c_void,
            };
            unsafe { UnmapViewOfFile(view) };
            self.mem = ptr::null_mut();
        }
        if !self.handle.is_null() {
            unsafe { CloseHandle(self.handle) };
        }
    }
}

// ---------------------------------------------------------------------------
// PlatformSignal: manual-reset named event "<name>_event"
// ---------------------------------------------------------------------------

pub struct PlatformSignal {
    event: HANDLE,
}

unsafe impl Send for PlatformSignal {}
unsafe impl Sync for PlatformSignal {}

impl WakeSignal for PlatformSignal {
    fn open(name: &str) -> io::Result<Self> {
        let wide_name = to_wide(&format!("{name}_event"));
        let event = unsafe { CreateEventW(ptr::null(), TRUE, FALSE, wide_name.as_ptr()) };
        if event.is_null() {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { event })
    }

    /// Pulse: release current waiters, then reset.
    fn post(&self) {
        unsafe {
            SetEvent(self.event);
            ResetEvent(self.event);
        }
    }

    fn wait(&self, timeout: Duration) -> io::Result<bool> {
        let ms = timeout.as_millis().min(u32::MAX as u128 - 1) as u32;
        match unsafe { WaitForSingleObject(self.event, ms) } {
            WAIT_OBJECT_0 => Ok(true),
            WAIT_TIMEOUT => Ok(false),
            _ => Err(io::Error::last_os_error()),
        }
    }

    fn unlink(&self) {}
}

impl Drop for PlatformSignal {
    fn drop(&mut self) {
        if !self.event.is_null() {
            unsafe { CloseHandle(self.event) };
        }
    }
}

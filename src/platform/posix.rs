// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// POSIX backend: shm_open + ftruncate + mmap for the segment, a named
// semaphore (sem_open) as the wake primitive.

use std::ffi::CString;
use std::io;
use std::os::fd::RawFd;
use std::ptr;
use std::time::Duration;

use super::{SegmentBackend, WakeSignal};
use crate::error::{ErrorCode, Result, ShmError};
use crate::shm_name;

pub type NativeHandle = RawFd;

const PERMS: libc::mode_t = 0o600;

fn c_string(name: &str) -> io::Result<CString> {
    CString::new(name.as_bytes()).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

fn shm_unlink(posix_name: &str) {
    if let Ok(c_name) = c_string(posix_name) {
        unsafe { libc::shm_unlink(c_name.as_ptr()) };
    }
}

// ---------------------------------------------------------------------------
// PlatformSegment
// ---------------------------------------------------------------------------

pub struct PlatformSegment {
    mem: *mut u8,
    size: usize,
    fd: RawFd,
    name: String, // POSIX name (with leading '/')
}

// Safety: the mapping is process-shared by design; all access to its
// contents goes through the header's embedded lock.
unsafe impl Send for PlatformSegment {}
unsafe impl Sync for PlatformSegment {}

impl PlatformSegment {
    fn c_name(name: &str) -> Result<(String, CString)> {
        if name.is_empty() {
            return Err(ShmError::new(ErrorCode::CreationFailed, "name is empty"));
        }
        let posix_name = shm_name::make_shm_name(name);
        let c_name = c_string(&posix_name).map_err(|e| {
            ShmError::os(ErrorCode::CreationFailed, format!("invalid name: {name}"), e)
        })?;
        Ok((posix_name, c_name))
    }

    /// mmap `fd`; on failure closes `fd` and, for the creator, unlinks.
    fn map(fd: RawFd, size: usize, posix_name: String, created: bool) -> Result<Self> {
        let mem = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if mem == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            if created {
                shm_unlink(&posix_name);
            }
            return Err(ShmError::os(
                ErrorCode::MappingFailed,
                format!("failed to map shared memory: {posix_name}"),
                err,
            ));
        }
        Ok(Self {
            mem: mem as *mut u8,
            size,
            fd,
            name: posix_name,
        })
    }
}

impl SegmentBackend for PlatformSegment {
    fn create(name: &str, size: usize) -> Result<Self> {
        let (posix_name, c_name) = Self::c_name(name)?;
        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_RDWR | libc::O_CREAT | libc::O_EXCL,
                PERMS as libc::c_uint,
            )
        };
        if fd == -1 {
            let err = io::Error::last_os_error();
            return Err(match err.raw_os_error() {
                Some(libc::EEXIST) => ShmError::new(
                    ErrorCode::AlreadyExists,
                    format!("shared memory already exists: {name}"),
                ),
                Some(libc::EACCES) => ShmError::os(
                    ErrorCode::AccessDenied,
                    format!("access denied creating shared memory: {name}"),
                    err,
                ),
                _ => ShmError::os(
                    ErrorCode::CreationFailed,
                    format!("failed to create shared memory: {name}"),
                    err,
                ),
            });
        }

        let Ok(len) = libc::off_t::try_from(size) else {
            unsafe { libc::close(fd) };
            shm_unlink(&posix_name);
            return Err(ShmError::new(
                ErrorCode::SizeError,
                format!("shared memory {name} cannot be sized to {size} bytes"),
            ));
        };
        if unsafe { libc::ftruncate(fd, len) } != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            shm_unlink(&posix_name);
            return Err(ShmError::os(
                ErrorCode::SizeError,
                format!("failed to size shared memory {name} to {size} bytes"),
                err,
            ));
        }

        Self::map(fd, size, posix_name, true)
    }

    fn open(name: &str, size: usize) -> Result<Self> {
        let (posix_name, c_name) = Self::c_name(name)?;
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, PERMS as libc::c_uint) };
        if fd == -1 {
            let err = io::Error::last_os_error();
            return Err(match err.raw_os_error() {
                Some(libc::ENOENT) => ShmError::new(
                    ErrorCode::NotFound,
                    format!("shared memory not found: {name}"),
                ),
                Some(libc::EACCES) => ShmError::os(
                    ErrorCode::AccessDenied,
                    format!("access denied opening shared memory: {name}"),
                    err,
                ),
                _ => ShmError::os(
                    ErrorCode::CreationFailed,
                    format!("failed to open shared memory: {name}"),
                    err,
                ),
            });
        }

        let mut st: libc::stat = unsafe { std::mem::zeroed() };
        if unsafe { libc::fstat(fd, &mut st) } != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(ShmError::os(
                ErrorCode::MappingFailed,
                format!("failed to stat shared memory: {name}"),
                err,
            ));
        }
        if (st.st_size as u64) < size as u64 {
            unsafe { libc::close(fd) };
            return Err(ShmError::new(
                ErrorCode::SizeError,
                format!(
                    "shared memory {name} is {} bytes, {size} required",
                    st.st_size
                ),
            ));
        }

        Self::map(fd, size, posix_name, false)
    }

    fn exists(name: &str) -> bool {
        let Ok((_, c_name)) = Self::c_name(name) else {
            return false;
        };
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDONLY, 0) };
        if fd == -1 {
            return false;
        }
        unsafe { libc::close(fd) };
        true
    }

    fn as_mut_ptr(&self) -> *mut u8 {
        self.mem
    }

    fn len(&self) -> usize {
        self.size
    }

    fn native_handle(&self) -> NativeHandle {
        self.fd
    }

    fn unlink(&self) {
        shm_unlink(&self.name);
    }
}

impl Drop for PlatformSegment {
    fn drop(&mut self) {
        if !self.mem.is_null() {
            unsafe { libc::munmap(self.mem as *mut libc::c_void, self.size) };
            self.mem = ptr::null_mut();
        }
        if self.fd != -1 {
            unsafe { libc::close(self.fd) };
            self.fd = -1;
        }
    }
}

// ---------------------------------------------------------------------------
// PlatformSignal: named semaphore "/<name>_sem"
// ---------------------------------------------------------------------------

pub struct PlatformSignal {
    sem: *mut libc::sem_t,
    name: CString,
}

// Safety: sem_t handles from sem_open may be used from any thread.
unsafe impl Send for PlatformSignal {}
unsafe impl Sync for PlatformSignal {}

impl WakeSignal for PlatformSignal {
    fn open(name: &str) -> io::Result<Self> {
        let c_name = c_string(&shm_name::make_sem_name(name))?;
        let sem = unsafe {
            libc::sem_open(
                c_name.as_ptr(),
                libc::O_CREAT,
                PERMS as libc::c_uint,
                0 as libc::c_uint,
            )
        };
        if sem == libc::SEM_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { sem, name: c_name })
    }

    fn post(&self) {
        unsafe { libc::sem_post(self.sem) };
    }

    #[cfg(not(target_os = "macos"))]
    fn wait(&self, timeout: Duration) -> io::Result<bool> {
        let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
        unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts) };
        let ns_total = ts.tv_nsec as u64 + timeout.subsec_nanos() as u64;
        ts.tv_sec += timeout.as_secs() as libc::time_t + (ns_total / 1_000_000_000) as libc::time_t;
        ts.tv_nsec = (ns_total % 1_000_000_000) as libc::c_long;
        loop {
            if unsafe { libc::sem_timedwait(self.sem, &ts) } == 0 {
                return Ok(true);
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::ETIMEDOUT) => return Ok(false),
                Some(libc::EINTR) => continue,
                _ => return Err(err),
            }
        }
    }

    // macOS has no sem_timedwait; poll sem_trywait instead.
    #[cfg(target_os = "macos")]
    fn wait(&self, timeout: Duration) -> io::Result<bool> {
        let deadline = std::time::Instant::now() + timeout;
        let mut k = 0u32;
        loop {
            if unsafe { libc::sem_trywait(self.sem) } == 0 {
                return Ok(true);
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EAGAIN) | Some(libc::EINTR) => {}
                _ => return Err(err),
            }
            if std::time::Instant::now() >= deadline {
                return Ok(false);
            }
            crate::backoff::adaptive_yield(&mut k);
        }
    }

    fn unlink(&self) {
        unsafe { libc::sem_unlink(self.name.as_ptr()) };
    }
}

impl Drop for PlatformSignal {
    fn drop(&mut self) {
        unsafe { libc::sem_close(self.sem) };
    }
}

// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Typed cross-process segment: header-guarded payload of one `Pod` value,
// versioned mutations, and per-instance change notification.

use std::mem::size_of;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::RwLock;

use crate::error::{ErrorCode, Result, ShmError};
use crate::header::SharedMemoryHeader;
use crate::notify::Notifier;
use crate::options::SharedMemoryOptions;
use crate::pending::Pending;
use crate::platform::NativeHandle;
use crate::pod::{self, Pod};
use crate::shm::{self, Segment, SegmentMode};

/// A named shared-memory segment holding one `T`.
///
/// Every access to the payload goes through the spin flag embedded in the
/// segment header, so unrelated processes mapping the same name see a
/// consistent value. Each successful mutation bumps the header version by
/// exactly one and wakes the other attachers' watchers.
///
/// The embedded flag cannot be recovered if its holder dies: later
/// operations on the segment then fail with `TIMEOUT` (or block forever
/// when called with a zero timeout).
///
/// Version convention: a segment created with initial data is at version 1
/// once construction returns; one created without is at version 0.
///
/// ```no_run
/// use std::time::Duration;
/// use spinshm::SharedMemory;
///
/// let shm = SharedMemory::<u64>::create("doc_counter", Some(5))?;
/// shm.write(&7, Duration::from_millis(10))?;
/// assert_eq!(shm.read(Duration::from_millis(10))?, 7);
/// # Ok::<(), spinshm::ShmError>(())
/// ```
pub struct SharedMemory<T: Pod> {
    inner: Arc<Inner<T>>,
    watcher: Option<JoinHandle<()>>,
}

struct Inner<T: Pod> {
    name: String,
    segment: RwLock<Segment>,
    options: SharedMemoryOptions,
    notifier: Notifier<T>,
    stop: AtomicBool,
    /// Highest version whose change this instance has already dispatched
    /// (or produced itself). Drives the watcher.
    dispatched: AtomicU64,
    /// Version last seen by a read or `wait_for_change`.
    observed: AtomicU64,
}

/// Clears the embedded flag on every exit path, unwinding included.
struct EmbeddedLock<'a>(&'a SharedMemoryHeader);

impl Drop for EmbeddedLock<'_> {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Payload size required for `T`, checked against what is actually mapped.
fn ensure_capacity(name: &str, seg: &Segment, needed: usize) -> Result<()> {
    if needed > seg.capacity() {
        return Err(ShmError::new(
            ErrorCode::SizeError,
            format!(
                "shared memory {name} holds {} payload bytes, {needed} required",
                seg.capacity()
            ),
        ));
    }
    Ok(())
}

fn check_range<T, U>(name: &str, offset: usize) -> Result<()> {
    match offset.checked_add(size_of::<U>()) {
        Some(end) if end <= size_of::<T>() => Ok(()),
        _ => Err(ShmError::new(
            ErrorCode::SizeError,
            format!(
                "access of {} bytes at offset {offset} exceeds {} byte payload of {name}",
                size_of::<U>(),
                size_of::<T>()
            ),
        )),
    }
}

impl<T: Pod> Inner<T> {
    /// Run `f` while holding the embedded flag.
    ///
    /// Holds the segment read guard for the duration, so `resize` cannot
    /// swap the mapping underneath. Never call into the notifier from `f`.
    fn locked<R>(&self, timeout: Duration, f: impl FnOnce(&Segment) -> Result<R>) -> Result<R> {
        let seg = self.segment.read();
        let header = seg.header();
        if !header.acquire(timeout, self.options.lock_retry_interval) {
            log::debug!("timed out after {timeout:?} acquiring shared memory {}", self.name);
            return Err(ShmError::timeout(&self.name));
        }
        let _release = EmbeddedLock(header);
        f(&*seg)
    }

    /// Recursive read so accessors stay usable inside `with_lock` even
    /// while a `resize` is queued.
    fn segment(&self) -> parking_lot::RwLockReadGuard<'_, Segment> {
        self.segment.read_recursive()
    }

    fn current_version(&self) -> u64 {
        self.segment().header().version()
    }

    /// Mark `version` dispatched. Returns whether it was news.
    fn mark_dispatched(&self, version: u64) -> bool {
        self.dispatched.fetch_max(version, Ordering::AcqRel) < version
    }

    fn mark_local(&self, version: u64) {
        self.mark_dispatched(version);
        self.observed.fetch_max(version, Ordering::AcqRel);
    }

    /// Copy the payload out. Caller holds the embedded flag.
    fn load(&self, seg: &Segment) -> Result<T> {
        ensure_capacity(&self.name, seg, size_of::<T>())?;
        if !seg.header().is_initialized() {
            return Err(ShmError::not_initialized(&self.name));
        }
        // Safety: capacity checked above; T is Pod.
        Ok(unsafe { pod::read_unaligned::<T>(seg.payload_ptr()) })
    }

    /// Publish a completed mutation: bump, record, post. Caller holds the flag.
    fn publish(&self, seg: &Segment, initialized: bool) -> u64 {
        let header = seg.header();
        header.set_initialized(initialized);
        let version = header.bump_version();
        self.mark_local(version);
        seg.post();
        version
    }

    /// Fan a locally produced value out to callbacks and waiters.
    fn announce(&self, value: Option<&T>) {
        if let Some(v) = value {
            self.notifier.notify_listeners(&self.name, v);
        }
        self.notifier.wake_waiters();
    }

    fn write(&self, data: &T, timeout: Duration, notify: bool) -> Result<()> {
        let version = self.locked(timeout, |seg| {
            ensure_capacity(&self.name, seg, size_of::<T>())?;
            let bytes = pod::bytes_of(data);
            // Safety: capacity checked; exclusive under the embedded flag.
            unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), seg.payload_ptr(), bytes.len()) };
            Ok(self.publish(seg, true))
        })?;
        log::debug!("wrote shared memory {} at version {version}", self.name);
        if notify {
            self.announce(Some(data));
        }
        Ok(())
    }

    fn read(&self, timeout: Duration) -> Result<T> {
        let (value, version) = self.locked(timeout, |seg| {
            let value = self.load(seg)?;
            Ok((value, seg.header().version()))
        })?;
        self.observed.fetch_max(version, Ordering::AcqRel);
        Ok(value)
    }

    fn clear(&self, timeout: Duration) -> Result<()> {
        let version = self.locked(timeout, |seg| {
            // Safety: `capacity` bytes are mapped after the header.
            unsafe { std::ptr::write_bytes(seg.payload_ptr(), 0, seg.capacity()) };
            Ok(self.publish(seg, false))
        })?;
        log::debug!("cleared shared memory {} at version {version}", self.name);
        self.announce(None);
        Ok(())
    }

    fn write_partial<U: Pod>(&self, data: &U, offset: usize, timeout: Duration) -> Result<()> {
        check_range::<T, U>(&self.name, offset)?;
        let snapshot = self.locked(timeout, |seg| {
            ensure_capacity(&self.name, seg, size_of::<T>())?;
            let bytes = pod::bytes_of(data);
            // Safety: offset + size_of::<U>() <= size_of::<T>() <= capacity.
            unsafe {
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), seg.payload_ptr().add(offset), bytes.len())
            };
            self.publish(seg, true);
            // Safety: as above.
            Ok(unsafe { pod::read_unaligned::<T>(seg.payload_ptr()) })
        })?;
        self.announce(Some(&snapshot));
        Ok(())
    }

    fn read_partial<U: Pod>(&self, offset: usize, timeout: Duration) -> Result<U> {
        check_range::<T, U>(&self.name, offset)?;
        self.locked(timeout, |seg| {
            ensure_capacity(&self.name, seg, size_of::<T>())?;
            if !seg.header().is_initialized() {
                return Err(ShmError::not_initialized(&self.name));
            }
            // Safety: range checked against T and capacity.
            Ok(unsafe { pod::read_unaligned::<U>(seg.payload_ptr().add(offset)) })
        })
    }

    fn write_span(&self, bytes: &[u8], timeout: Duration) -> Result<()> {
        if bytes.len() > size_of::<T>() {
            return Err(ShmError::new(
                ErrorCode::SizeError,
                format!(
                    "span of {} bytes exceeds {} byte payload of {}",
                    bytes.len(),
                    size_of::<T>(),
                    self.name
                ),
            ));
        }
        let snapshot = self.locked(timeout, |seg| {
            ensure_capacity(&self.name, seg, bytes.len())?;
            // Safety: length checked against capacity.
            unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), seg.payload_ptr(), bytes.len()) };
            self.publish(seg, true);
            Ok(if seg.capacity() >= size_of::<T>() {
                // Safety: capacity covers a whole T.
                Some(unsafe { pod::read_unaligned::<T>(seg.payload_ptr()) })
            } else {
                None
            })
        })?;
        self.announce(snapshot.as_ref());
        Ok(())
    }

    fn read_span(&self, buffer: &mut [u8], timeout: Duration) -> Result<usize> {
        self.locked(timeout, |seg| {
            if !seg.header().is_initialized() {
                return Err(ShmError::not_initialized(&self.name));
            }
            let n = buffer.len().min(size_of::<T>()).min(seg.capacity());
            // Safety: n bytes are mapped and fit in `buffer`.
            unsafe { std::ptr::copy_nonoverlapping(seg.payload_ptr(), buffer.as_mut_ptr(), n) };
            Ok(n)
        })
    }

    fn resize(&self, new_size: usize) -> Result<()> {
        shm::total_size(&self.name, new_size)?;
        let outcome = {
            let mut seg = self.segment.write();
            if !seg.is_creator() {
                return Err(ShmError::new(
                    ErrorCode::AccessDenied,
                    format!("only the creator may resize shared memory {}", self.name),
                ));
            }

            let snapshot = {
                let header = seg.header();
                if !header.acquire(self.options.init_timeout, self.options.lock_retry_interval) {
                    return Err(ShmError::timeout(&self.name));
                }
                let _release = EmbeddedLock(header);
                if header.is_initialized() {
                    let mut bytes = vec![0u8; seg.capacity()];
                    // Safety: `capacity` bytes are mapped after the header.
                    unsafe { std::ptr::copy_nonoverlapping(seg.payload_ptr(), bytes.as_mut_ptr(), bytes.len()) };
                    Some(bytes)
                } else {
                    None
                }
            };

            let old_size = seg.capacity();
            seg.disown();
            match self.recreate(&mut seg, new_size, snapshot.as_deref()) {
                Ok(version) => Ok(version),
                Err(err) => {
                    log::warn!(
                        "failed to resize shared memory {} to {new_size} bytes: {err}; restoring {old_size} bytes",
                        self.name
                    );
                    if let Err(restore) = self.recreate(&mut seg, old_size, snapshot.as_deref()) {
                        log::error!(
                            "failed to restore shared memory {} after resize: {restore}",
                            self.name
                        );
                    }
                    Err(err)
                }
            }
        };
        self.notifier.wake_waiters();
        let version = outcome?;
        log::info!(
            "resized shared memory {} to {new_size} payload bytes (version {version})",
            self.name
        );
        Ok(())
    }

    /// Create a fresh segment under this name holding `snapshot`, and
    /// install it in `seg`. Returns the new header version.
    fn recreate(&self, seg: &mut Segment, size: usize, snapshot: Option<&[u8]>) -> Result<u64> {
        *seg = Segment::acquire(&self.name, size, SegmentMode::Create)?;

        let header = seg.header();
        if let Some(bytes) = snapshot {
            let n = bytes.len().min(seg.capacity());
            // Safety: n <= capacity; the new segment is not yet shared
            // with any handle that knows its header.
            unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), seg.payload_ptr(), n) };
            header.set_initialized(true);
            header.bump_version();
        }
        let version = header.version();
        self.dispatched.store(version, Ordering::Release);
        self.observed.store(version, Ordering::Release);
        seg.post();
        Ok(version)
    }

    fn wait_for_change(&self, timeout: Duration) -> bool {
        let current = self.current_version();
        let seen = self.observed.load(Ordering::Acquire);
        if current != seen {
            self.observed.store(current, Ordering::Release);
            return true;
        }
        let deadline = (!timeout.is_zero()).then_some(timeout);
        let mut latest = current;
        let changed = self
            .notifier
            .wait_until(deadline, self.options.watch_interval, || {
                latest = self.current_version();
                latest != current
            });
        if changed {
            self.observed.fetch_max(latest, Ordering::AcqRel);
        }
        changed
    }

    /// Watcher thread body. One per instance; exits once `stop` is set.
    fn watch(&self) {
        log::debug!("watcher started for shared memory {}", self.name);
        while !self.stop.load(Ordering::Acquire) {
            let waited = {
                let seg = self.segment.read();
                seg.wait_signal(self.options.watch_interval)
            };
            match waited {
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    log::warn!("wake wait failed for shared memory {}: {e}", self.name);
                    thread::sleep(self.options.watch_interval);
                }
                None => thread::sleep(self.options.watch_interval),
            }
            if self.stop.load(Ordering::Acquire) {
                break;
            }
            // Posts may be consumed by another attacher's watcher, so the
            // version is compared on timeouts too.
            self.check_for_change();
        }
        log::debug!("watcher stopped for shared memory {}", self.name);
    }

    fn check_for_change(&self) {
        let current = self.current_version();
        if current == self.dispatched.load(Ordering::Acquire) {
            return;
        }
        let read = self.locked(self.options.watcher_read_timeout, |seg| {
            let header = seg.header();
            let version = header.version();
            if !header.is_initialized() {
                return Ok((None, version));
            }
            Ok((Some(self.load(seg)?), version))
        });
        match read {
            Ok((value, version)) => {
                if self.mark_dispatched(version) {
                    if let Some(v) = value {
                        log::debug!("shared memory {} changed to version {version}", self.name);
                        self.notifier.notify_listeners(&self.name, &v);
                    }
                    self.notifier.wake_waiters();
                }
            }
            Err(e) if e.is_timeout() => {
                log::debug!("watcher of {} retries: segment busy", self.name);
            }
            Err(e) => log::error!("watcher failed to read shared memory {}: {e}", self.name),
        }
    }
}

impl<T: Pod> SharedMemory<T> {
    /// Create (`create == true`) or open a segment with default options.
    ///
    /// `initial` is written under the lock right after creation and
    /// ignored when opening.
    pub fn new(name: &str, create: bool, initial: Option<T>) -> Result<Self> {
        Self::with_options(name, create, initial, SharedMemoryOptions::default())
    }

    /// Create a new segment. Fails with `ALREADY_EXISTS` if `name` is taken.
    pub fn create(name: &str, initial: Option<T>) -> Result<Self> {
        Self::new(name, true, initial)
    }

    /// Attach to an existing segment. Fails with `NOT_FOUND` if absent and
    /// `SIZE_ERROR` if it is too small for `T`.
    pub fn open(name: &str) -> Result<Self> {
        Self::new(name, false, None)
    }

    pub fn with_options(
        name: &str,
        create: bool,
        initial: Option<T>,
        options: SharedMemoryOptions,
    ) -> Result<Self> {
        let mode = if create {
            SegmentMode::Create
        } else {
            SegmentMode::Open
        };
        let segment = Segment::acquire(name, size_of::<T>(), mode)?;
        if !segment.has_signal() {
            log::info!("shared memory {name} uses polling for change detection");
        }
        let version = segment.header().version();
        let inner = Arc::new(Inner {
            name: name.to_owned(),
            segment: RwLock::new(segment),
            options,
            notifier: Notifier::new(),
            stop: AtomicBool::new(false),
            dispatched: AtomicU64::new(version),
            observed: AtomicU64::new(version),
        });

        if create {
            if let Some(data) = initial {
                // On failure `inner` drops here, unlinking the new segment.
                inner.write(&data, inner.options.init_timeout, false)?;
            }
        }

        let watcher = if inner.options.start_watcher {
            let worker = Arc::clone(&inner);
            let handle = thread::Builder::new()
                .name(format!("shm-watch-{name}"))
                .spawn(move || worker.watch())
                .map_err(|e| {
                    ShmError::os(
                        ErrorCode::CreationFailed,
                        format!("failed to start watcher for shared memory {name}"),
                        e,
                    )
                })?;
            Some(handle)
        } else {
            None
        };

        log::info!(
            "{} shared memory {name} ({} payload bytes)",
            if create { "created" } else { "opened" },
            size_of::<T>()
        );
        Ok(Self { inner, watcher })
    }

    /// Whether a segment named `name` currently exists. Never creates one.
    pub fn exists(name: &str) -> bool {
        Segment::exists(name)
    }

    /// Run `f` on the raw payload bytes while holding the embedded lock.
    ///
    /// A zero `timeout` waits without deadline. The lock is released on
    /// every exit path, including a panic in `f`. Changes made here do not
    /// bump the version; use the `write*` methods to publish a change.
    pub fn with_lock<R>(&self, timeout: Duration, f: impl FnOnce(&mut [u8]) -> R) -> Result<R> {
        self.inner.locked(timeout, |seg| {
            // Safety: the embedded flag gives exclusive access to the
            // `capacity` mapped payload bytes until `_release` drops.
            let payload = unsafe { std::slice::from_raw_parts_mut(seg.payload_ptr(), seg.capacity()) };
            Ok(f(payload))
        })
    }

    /// Replace the payload, then run callbacks and wake waiters.
    pub fn write(&self, data: &T, timeout: Duration) -> Result<()> {
        self.inner.write(data, timeout, true)
    }

    /// Replace the payload without invoking this instance's callbacks.
    /// Other attachers' watchers still see the change.
    pub fn write_quiet(&self, data: &T, timeout: Duration) -> Result<()> {
        self.inner.write(data, timeout, false)
    }

    /// Copy the payload out. Fails with `NOT_INITIALIZED` before the first
    /// write or after `clear`.
    pub fn read(&self, timeout: Duration) -> Result<T> {
        self.inner.read(timeout)
    }

    /// `read`, with any failure logged and turned into `None`.
    pub fn try_read(&self, timeout: Duration) -> Option<T> {
        match self.inner.read(timeout) {
            Ok(v) => Some(v),
            Err(e) => {
                log::debug!("try_read on {} failed: {e}", self.inner.name);
                None
            }
        }
    }

    /// Zero the payload and mark it uninitialised. Idempotent.
    pub fn clear(&self, timeout: Duration) -> Result<()> {
        self.inner.clear(timeout)
    }

    /// Overwrite `size_of::<U>()` bytes at `offset` inside the payload.
    pub fn write_partial<U: Pod>(&self, data: &U, offset: usize, timeout: Duration) -> Result<()> {
        self.inner.write_partial(data, offset, timeout)
    }

    pub fn read_partial<U: Pod>(&self, offset: usize, timeout: Duration) -> Result<U> {
        self.inner.read_partial(offset, timeout)
    }

    /// Write raw bytes to the start of the payload. More than
    /// `size_of::<T>()` bytes fails with `SIZE_ERROR` and changes nothing.
    pub fn write_span(&self, bytes: &[u8], timeout: Duration) -> Result<()> {
        self.inner.write_span(bytes, timeout)
    }

    /// Copy up to `buffer.len()` payload bytes out; returns the count copied.
    pub fn read_span(&self, buffer: &mut [u8], timeout: Duration) -> Result<usize> {
        self.inner.read_span(buffer, timeout)
    }

    /// Recreate the segment with room for `new_size` payload bytes.
    ///
    /// Creator only. An initialised payload is carried over, truncated or
    /// zero-padded; the version restarts at 0 (1 if a payload was carried).
    /// Handles in other processes keep the old mapping and must reopen.
    /// A resize below `size_of::<T>()` makes typed access fail with
    /// `SIZE_ERROR` until the segment is grown again.
    ///
    /// A size that cannot be addressed fails with `SIZE_ERROR` before
    /// anything changes. If the new segment cannot be created, the name is
    /// recreated at the previous size holding the same payload, and this
    /// handle stays the creator.
    pub fn resize(&self, new_size: usize) -> Result<()> {
        self.inner.resize(new_size)
    }

    /// `read` on a background thread.
    pub fn read_async(&self, timeout: Duration) -> Pending<T> {
        let inner = Arc::clone(&self.inner);
        Pending::spawn(move || inner.read(timeout))
    }

    /// `write` on a background thread.
    pub fn write_async(&self, data: T, timeout: Duration) -> Pending<()> {
        let inner = Arc::clone(&self.inner);
        Pending::spawn(move || inner.write(&data, timeout, true))
    }

    /// Register `f` to run with the new value after every change this
    /// instance observes. Returns an id for `unregister_change_callback`.
    ///
    /// Callbacks run on the watcher thread for remote changes and on the
    /// writing thread for local ones.
    pub fn register_change_callback<F>(&self, f: F) -> usize
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.notifier.register(Arc::new(f))
    }

    pub fn unregister_change_callback(&self, id: usize) -> bool {
        self.inner.notifier.unregister(id)
    }

    pub fn callback_count(&self) -> usize {
        self.inner.notifier.len()
    }

    /// Block until the version moves past the last one this instance saw,
    /// or `timeout` elapses (zero waits forever). Returns whether a change
    /// was observed.
    pub fn wait_for_change(&self, timeout: Duration) -> bool {
        self.inner.wait_for_change(timeout)
    }

    /// Whether some thread or process currently holds the embedded lock.
    pub fn is_occupied(&self) -> bool {
        self.inner.segment().header().is_locked()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Payload size recorded in the header.
    pub fn size(&self) -> usize {
        self.inner.segment().header().size()
    }

    /// Header plus payload bytes mapped by this handle.
    pub fn mapped_size(&self) -> usize {
        self.inner.segment().mapped_size()
    }

    pub fn version(&self) -> u64 {
        self.inner.current_version()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.segment().header().is_initialized()
    }

    pub fn is_creator(&self) -> bool {
        self.inner.segment().is_creator()
    }

    /// Underlying OS handle (fd on POSIX, HANDLE on Windows).
    pub fn native_handle(&self) -> NativeHandle {
        self.inner.segment().native_handle()
    }

    /// Start of the payload. Invalidated by `resize`; any access through it
    /// must happen inside `with_lock` to be race free.
    pub fn data_ptr(&self) -> *mut u8 {
        self.inner.segment().payload_ptr()
    }
}

impl<T: Pod> Drop for SharedMemory<T> {
    fn drop(&mut self) {
        self.inner.stop.store(true, Ordering::Release);
        if let Some(handle) = self.watcher.take() {
            if handle.join().is_err() {
                log::error!("watcher for shared memory {} panicked", self.inner.name);
            }
        }
        log::debug!("closed shared memory {}", self.inner.name);
    }
}

impl<T: Pod> std::fmt::Debug for SharedMemory<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedMemory")
            .field("name", &self.inner.name)
            .field("version", &self.version())
            .field("creator", &self.is_creator())
            .finish()
    }
}

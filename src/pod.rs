// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Marker for payload types that can be copied into and out of a mapped
// segment as raw bytes.

/// A plain-old-data type with a fixed, byte-copyable layout.
///
/// # Safety
/// Implementors must guarantee that:
/// - the type is `#[repr(C)]` or `#[repr(transparent)]` (or a primitive),
/// - it contains no padding bytes,
/// - every bit pattern of `size_of::<Self>()` bytes is a valid value,
/// - it holds no pointers or references (another process maps the same
///   bytes at a different address).
///
/// `bool` and `char` are deliberately not `Pod`: not every bit pattern is
/// valid for them. Use `u8` / `u32` fields instead.
pub unsafe trait Pod: Copy + Send + Sync + 'static {}

macro_rules! impl_pod {
    ($($t:ty),* $(,)?) => {
        $(unsafe impl Pod for $t {})*
    };
}

impl_pod!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64);

unsafe impl<T: Pod, const N: usize> Pod for [T; N] {}

/// View a `Pod` value as its raw bytes.
pub(crate) fn bytes_of<T: Pod>(value: &T) -> &[u8] {
    // Safety: Pod guarantees no padding, so every byte is initialised.
    unsafe { std::slice::from_raw_parts(value as *const T as *const u8, std::mem::size_of::<T>()) }
}

/// Read a `Pod` value from possibly unaligned memory.
///
/// # Safety
/// `src` must be valid for reads of `size_of::<T>()` bytes.
pub(crate) unsafe fn read_unaligned<T: Pod>(src: *const u8) -> T {
    std::ptr::read_unaligned(src as *const T)
}

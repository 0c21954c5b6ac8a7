// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// POSIX object names for a segment: the shm object itself and the named
// semaphore used as its wake primitive.

/// FNV-1a 64-bit hash.
pub fn fnv1a_64(data: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in data {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Maximum length for POSIX shm / semaphore names, 0 for no limit.
///
/// macOS caps both `PSHMNAMLEN` and `PSEMNAMLEN` at 31.
#[cfg(target_os = "macos")]
pub const NAME_MAX: usize = 31;

#[cfg(not(target_os = "macos"))]
pub const NAME_MAX: usize = 0;

/// Suffix appended to the segment name for its wake semaphore.
pub const SEM_SUFFIX: &str = "_sem";

/// POSIX shm object name for `name` (leading '/').
pub fn make_shm_name(name: &str) -> String {
    fit(with_slash(name))
}

/// POSIX named-semaphore name for `name`: `"/" + name + "_sem"`.
pub fn make_sem_name(name: &str) -> String {
    let mut s = with_slash(name);
    s.push_str(SEM_SUFFIX);
    fit(s)
}

fn with_slash(name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/{name}")
    }
}

/// Shorten names over `NAME_MAX` to `/<prefix>_<16 hex digits of FNV-1a>`,
/// keeping as much of the given name as fits for debuggability.
fn fit(posix: String) -> String {
    if NAME_MAX == 0 || posix.len() <= NAME_MAX {
        return posix;
    }
    const HASH_SUFFIX_LEN: usize = 1 + 16;
    let prefix_len = NAME_MAX.saturating_sub(HASH_SUFFIX_LEN + 1);
    let hash = fnv1a_64(posix.as_bytes());

    let body = &posix[1..];
    let mut take = prefix_len.min(body.len());
    while !body.is_char_boundary(take) {
        take -= 1;
    }
    format!("/{}_{hash:016x}", &body[..take])
}

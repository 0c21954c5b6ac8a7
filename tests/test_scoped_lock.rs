// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// ScopedLock over every RawSpinLock implementation.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use spinshm::{AdaptiveSpinLock, RawSpinLock, ScopedLock, SpinLock, UnfairSpinLock};

fn exercise<L: RawSpinLock>(lock: &L) {
    {
        let g = ScopedLock::new(lock);
        assert!(g.owns_lock());
        assert!(ScopedLock::try_new(lock).is_none());
    }
    let mut g = ScopedLock::try_new(lock).expect("released on drop");
    g.unlock();
    assert!(!g.owns_lock());
    g.unlock();
    drop(g);
    assert!(ScopedLock::try_new(lock).is_some());
}

#[test]
fn guard_semantics_for_all_locks() {
    exercise(&SpinLock::new());
    exercise(&UnfairSpinLock::new());
    exercise(&AdaptiveSpinLock::new());
}

#[test]
fn works_through_trait_object() {
    let lock: Box<dyn RawSpinLock> = Box::new(UnfairSpinLock::new());
    let g = ScopedLock::new(&*lock);
    assert!(g.owns_lock());
}

#[test]
fn try_new_for_waits_for_release() {
    let lock = Arc::new(UnfairSpinLock::new());
    lock.lock();
    assert!(ScopedLock::try_new_for(&*lock, Duration::from_millis(20)).is_none());

    let lk = Arc::clone(&lock);
    let t = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        lk.unlock();
    });
    let g = ScopedLock::try_new_for(&*lock, Duration::from_secs(5));
    assert!(g.is_some());
    t.join().unwrap();
}

#[test]
fn guard_releases_during_unwind() {
    let lock = SpinLock::new();
    let r = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _g = ScopedLock::new(&lock);
        panic!("in critical section");
    }));
    assert!(r.is_err());
    assert!(!lock.is_locked());
}

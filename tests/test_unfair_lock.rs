// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// UnfairSpinLock: plain test-and-set without owner tracking.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use spinshm::{ScopedLock, UnfairSpinLock};

#[test]
fn counter_no_lost_updates() {
    let lock = Arc::new(UnfairSpinLock::new());
    let counter = Arc::new(AtomicI32::new(0));
    let (threads, iters) = (8, 2000);

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let lock = Arc::clone(&lock);
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                for _ in 0..iters {
                    lock.lock();
                    let v = counter.load(Ordering::Relaxed);
                    counter.store(v + 1, Ordering::Relaxed);
                    lock.unlock();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(counter.load(Ordering::Relaxed), threads * iters);
}

#[test]
fn try_lock_on_held_lock_fails() {
    let lock = UnfairSpinLock::new();
    assert!(lock.try_lock());
    assert!(!lock.try_lock());
    lock.unlock();
    assert!(lock.try_lock());
    lock.unlock();
}

#[test]
fn any_thread_may_release() {
    let lock = Arc::new(UnfairSpinLock::new());
    lock.lock();
    let lk = Arc::clone(&lock);
    thread::spawn(move || lk.unlock()).join().unwrap();
    assert!(!lock.is_locked());
}

#[test]
fn try_lock_for_deadline() {
    let lock = Arc::new(UnfairSpinLock::new());
    lock.lock();
    assert!(!lock.try_lock_for(Duration::from_millis(20)));

    let lk = Arc::clone(&lock);
    let t = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        lk.unlock();
    });
    assert!(lock.try_lock_for(Duration::from_secs(5)));
    t.join().unwrap();
    lock.unlock();
}

#[test]
fn wait_observes_release() {
    let lock = Arc::new(UnfairSpinLock::new());
    let done = Arc::new(AtomicBool::new(false));
    lock.lock();

    let (lk, d) = (Arc::clone(&lock), Arc::clone(&done));
    let t = thread::spawn(move || {
        lk.wait();
        d.store(true, Ordering::SeqCst);
    });
    thread::sleep(Duration::from_millis(10));
    assert!(!done.load(Ordering::SeqCst));
    lock.unlock();
    t.join().unwrap();
    assert!(done.load(Ordering::SeqCst));
}

#[test]
fn scoped_guard_releases_on_drop() {
    let lock = UnfairSpinLock::new();
    {
        let _g = ScopedLock::new(&lock);
        assert!(lock.is_locked());
    }
    assert!(!lock.is_locked());
}

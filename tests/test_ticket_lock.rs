// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// TicketSpinLock: counting, strict FIFO admission, ticket validation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use spinshm::{LockError, TicketGuard, TicketSpinLock};

#[test]
fn lock_returns_consecutive_tickets() {
    let lock = TicketSpinLock::new();
    let t0 = lock.lock();
    lock.unlock(t0).unwrap();
    let t1 = lock.lock();
    assert_eq!(t1, t0 + 1);
    assert_eq!(lock.now_serving(), t1);
    lock.unlock(t1).unwrap();
    assert!(!lock.is_locked());
}

#[test]
fn counter_no_lost_updates() {
    let lock = Arc::new(TicketSpinLock::new());
    let counter = Arc::new(AtomicU64::new(0));
    let (threads, iters) = (6u64, 1000u64);

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let lock = Arc::clone(&lock);
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                for _ in 0..iters {
                    let _g = TicketGuard::new(&lock);
                    let v = counter.load(Ordering::Relaxed);
                    counter.store(v + 1, Ordering::Relaxed);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(counter.load(Ordering::Relaxed), threads * iters);
    assert_eq!(lock.queue_len(), 0);
}

#[test]
fn critical_sections_complete_in_ticket_order() {
    let lock = Arc::new(TicketSpinLock::new());
    let order = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let lock = Arc::clone(&lock);
            let order = Arc::clone(&order);
            thread::spawn(move || {
                for _ in 0..50 {
                    let g = TicketGuard::new(&lock);
                    order.lock().unwrap().push(g.ticket());
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let order = order.lock().unwrap();
    assert_eq!(order.len(), 400);
    assert!(order.windows(2).all(|w| w[1] == w[0] + 1), "admission out of ticket order");
}

#[test]
fn waiter_queued_behind_holder() {
    let lock = Arc::new(TicketSpinLock::new());
    let held = lock.lock();

    let lk = Arc::clone(&lock);
    let waiter = thread::spawn(move || {
        let t = lk.lock();
        lk.unlock(t).unwrap();
        t
    });

    while lock.queue_len() < 2 {
        thread::yield_now();
    }
    assert!(lock.try_lock().is_none());
    thread::sleep(Duration::from_millis(10));
    assert!(!waiter.is_finished());

    lock.unlock(held).unwrap();
    assert_eq!(waiter.join().unwrap(), held + 1);
}

#[test]
fn try_lock_only_when_free() {
    let lock = TicketSpinLock::new();
    let t = lock.try_lock().expect("free lock");
    assert!(lock.try_lock().is_none());
    lock.unlock(t).unwrap();
    let g = TicketGuard::try_new(&lock).expect("free again");
    assert!(g.owns_lock());
}

#[test]
fn wrong_ticket_is_rejected_without_release() {
    let lock = TicketSpinLock::new();
    let t = lock.lock();
    let err = lock.unlock(t + 5).unwrap_err();
    assert_eq!(
        err,
        LockError::TicketMismatch {
            ticket: t + 5,
            serving: t
        }
    );
    assert!(lock.is_locked());
    lock.unlock(t).unwrap();
    assert!(!lock.is_locked());
}

#[test]
fn guard_unlock_is_idempotent() {
    let lock = TicketSpinLock::new();
    let mut g = TicketGuard::new(&lock);
    assert!(g.unlock().is_ok());
    assert!(!g.owns_lock());
    assert!(g.unlock().is_ok());
    drop(g);
    assert!(!lock.is_locked());
}

// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Change notification between handles: watcher-driven callbacks, local
// callbacks, unregistering and wait_for_change.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use spinshm::{SharedMemory, SharedMemoryOptions};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn unique_name(prefix: &str) -> String {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{}_{n}", std::process::id())
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn fast() -> SharedMemoryOptions {
    SharedMemoryOptions::default().watch_interval(Duration::from_millis(10))
}

const TIMEOUT: Duration = Duration::from_millis(100);
const DELIVERY: Duration = Duration::from_secs(2);

/// Open a pair of handles on a fresh segment.
fn pair(prefix: &str, initial: u32) -> (SharedMemory<u32>, SharedMemory<u32>) {
    let name = unique_name(prefix);
    let a = SharedMemory::with_options(&name, true, Some(initial), fast()).unwrap();
    let b = SharedMemory::with_options(&name, false, None, fast()).unwrap();
    (a, b)
}

fn channel_callback(tx: mpsc::Sender<u32>) -> impl Fn(&u32) + Send + Sync + 'static {
    let tx = Mutex::new(tx);
    move |v: &u32| {
        let _ = tx.lock().unwrap().send(*v);
    }
}

#[test]
fn remote_write_reaches_callback() {
    init_logging();
    let (a, b) = pair("cb", 0);
    let (tx, rx) = mpsc::channel();
    b.register_change_callback(channel_callback(tx));

    a.write(&42, TIMEOUT).unwrap();
    assert_eq!(rx.recv_timeout(DELIVERY).unwrap(), 42);
    assert_eq!(b.read(TIMEOUT).unwrap(), 42);
}

#[test]
fn unregistered_callback_stays_silent() {
    let (a, b) = pair("unreg", 0);
    let (tx, rx) = mpsc::channel();
    let id = b.register_change_callback(channel_callback(tx));

    a.write(&1, TIMEOUT).unwrap();
    assert_eq!(rx.recv_timeout(DELIVERY).unwrap(), 1);

    assert!(b.unregister_change_callback(id));
    assert!(!b.unregister_change_callback(id));
    assert_eq!(b.callback_count(), 0);

    a.write(&2, TIMEOUT).unwrap();
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
}

#[test]
fn local_write_notifies_synchronously_once() {
    let (a, _b) = pair("local", 0);
    let hits = Arc::new(AtomicUsize::new(0));
    let h = Arc::clone(&hits);
    a.register_change_callback(move |v| {
        assert_eq!(*v, 5);
        h.fetch_add(1, Ordering::SeqCst);
    });

    a.write(&5, TIMEOUT).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // The watcher must not deliver our own change a second time.
    thread::sleep(Duration::from_millis(100));
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    a.write_quiet(&6, TIMEOUT).unwrap();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn panicking_callback_does_not_kill_watcher() {
    let (a, b) = pair("panic", 0);
    let (tx, rx) = mpsc::channel();
    b.register_change_callback(|_| panic!("callback failure"));
    b.register_change_callback(channel_callback(tx));

    a.write(&10, TIMEOUT).unwrap();
    assert_eq!(rx.recv_timeout(DELIVERY).unwrap(), 10);
    a.write(&11, TIMEOUT).unwrap();
    assert_eq!(rx.recv_timeout(DELIVERY).unwrap(), 11);
    assert_eq!(b.callback_count(), 2);
}

#[test]
fn callbacks_see_partial_and_span_writes() {
    let (a, b) = pair("partial_cb", 0);
    let (tx, rx) = mpsc::channel();
    b.register_change_callback(channel_callback(tx));

    a.write_partial(&0xffu8, 0, TIMEOUT).unwrap();
    assert_eq!(rx.recv_timeout(DELIVERY).unwrap(), u32::from_ne_bytes([0xff, 0, 0, 0]));

    a.write_span(&7u32.to_ne_bytes(), TIMEOUT).unwrap();
    assert_eq!(rx.recv_timeout(DELIVERY).unwrap(), 7);
}

#[test]
fn wait_for_change_times_out_without_writes() {
    let (_a, b) = pair("idle", 0);
    let start = Instant::now();
    assert!(!b.wait_for_change(Duration::from_millis(100)));
    assert!(start.elapsed() >= Duration::from_millis(100));
}

#[test]
fn wait_for_change_sees_write_during_wait() {
    let (a, b) = pair("wait", 0);
    thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(Duration::from_millis(30));
            a.write(&3, TIMEOUT).unwrap();
        });
        assert!(b.wait_for_change(DELIVERY));
    });
    // Nothing new since.
    assert!(!b.wait_for_change(Duration::from_millis(50)));
}

#[test]
fn wait_for_change_reports_missed_change() {
    let (a, b) = pair("missed", 0);
    a.write(&1, TIMEOUT).unwrap();
    let start = Instant::now();
    assert!(b.wait_for_change(DELIVERY));
    assert!(start.elapsed() < DELIVERY);
}

#[test]
fn wait_for_change_on_writer_itself() {
    let name = unique_name("self");
    let a = SharedMemory::<u32>::with_options(&name, true, Some(0), fast()).unwrap();
    // Own writes are already observed.
    a.write(&1, TIMEOUT).unwrap();
    assert!(!a.wait_for_change(Duration::from_millis(30)));

    thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(Duration::from_millis(20));
            a.write(&2, TIMEOUT).unwrap();
        });
        assert!(a.wait_for_change(DELIVERY));
    });
}

#[test]
fn clear_wakes_waiters_without_callbacks() {
    let (a, b) = pair("cleared", 9);
    let (tx, rx) = mpsc::channel();
    b.register_change_callback(channel_callback(tx));

    thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(Duration::from_millis(30));
            a.clear(TIMEOUT).unwrap();
        });
        assert!(b.wait_for_change(DELIVERY));
    });
    assert!(!b.is_initialized());
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
}

#[test]
fn polling_without_watcher() {
    let name = unique_name("poll");
    let a = SharedMemory::<u32>::with_options(&name, true, Some(0), fast()).unwrap();
    let b = SharedMemory::<u32>::with_options(&name, false, None, fast().start_watcher(false)).unwrap();
    thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(Duration::from_millis(30));
            a.write(&4, TIMEOUT).unwrap();
        });
        assert!(b.wait_for_change(DELIVERY));
    });
    assert_eq!(b.read(TIMEOUT).unwrap(), 4);
}

#[test]
fn handles_in_one_process_each_get_callbacks() {
    let name = unique_name("fanout");
    let a = SharedMemory::<u32>::with_options(&name, true, Some(0), fast()).unwrap();
    let b = SharedMemory::<u32>::with_options(&name, false, None, fast()).unwrap();
    let c = SharedMemory::<u32>::with_options(&name, false, None, fast()).unwrap();
    let (tx_b, rx_b) = mpsc::channel();
    let (tx_c, rx_c) = mpsc::channel();
    b.register_change_callback(channel_callback(tx_b));
    c.register_change_callback(channel_callback(tx_c));

    a.write(&77, TIMEOUT).unwrap();
    assert_eq!(rx_b.recv_timeout(DELIVERY).unwrap(), 77);
    assert_eq!(rx_c.recv_timeout(DELIVERY).unwrap(), 77);
}

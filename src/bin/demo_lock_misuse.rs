// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Usage:
//   demo_lock_misuse foreign-unlock
//
// Locks a SpinLock on the main thread, then releases it from a second
// thread. Checked builds abort the process; unchecked builds release the
// flag and print "released".

use std::sync::Arc;
use std::thread;

use spinshm::SpinLock;

fn usage() -> ! {
    eprintln!("usage: demo_lock_misuse foreign-unlock");
    std::process::exit(1);
}

fn foreign_unlock() {
    let lock = Arc::new(SpinLock::new());
    lock.lock();
    println!("locked");

    let other = Arc::clone(&lock);
    thread::spawn(move || other.unlock())
        .join()
        .expect("unlock thread");
    assert!(!lock.is_locked());
    println!("released");
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("foreign-unlock") => foreign_unlock(),
        _ => usage(),
    }
}

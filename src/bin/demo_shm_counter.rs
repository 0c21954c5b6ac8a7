// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Usage:
//   demo_shm_counter create <name> <initial> <hold_ms>
//   demo_shm_counter write  <name> <value>
//   demo_shm_counter incr   <name> <times>
//   demo_shm_counter watch  <name> <count> <timeout_ms>
//
// A u64 counter in a named SharedMemory segment.
// `create` owns the segment for <hold_ms> milliseconds, then prints the
// final value and unlinks it. `write` publishes one value. `incr` bumps the
// counter <times> times under the embedded lock. `watch` prints the next
// <count> values announced by other processes, or exits with status 2 if
// none arrives within <timeout_ms>.

use std::sync::mpsc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use spinshm::SharedMemory;

const TIMEOUT: Duration = Duration::from_secs(1);

fn usage() -> ! {
    eprintln!("usage: demo_shm_counter create <name> <initial> <hold_ms>");
    eprintln!("       demo_shm_counter write  <name> <value>");
    eprintln!("       demo_shm_counter incr   <name> <times>");
    eprintln!("       demo_shm_counter watch  <name> <count> <timeout_ms>");
    std::process::exit(1);
}

fn arg<T: std::str::FromStr>(args: &[String], i: usize) -> T {
    args.get(i)
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| usage())
}

fn do_create(name: &str, initial: u64, hold_ms: u64) {
    let shm = SharedMemory::<u64>::create(name, Some(initial)).expect("create");
    println!("ready");
    thread::sleep(Duration::from_millis(hold_ms));
    println!("final {}", shm.read(TIMEOUT).expect("read"));
}

fn do_write(name: &str, value: u64) {
    let shm = SharedMemory::<u64>::open(name).expect("open");
    shm.write(&value, TIMEOUT).expect("write");
    println!("wrote {value} (version {})", shm.version());
}

fn do_incr(name: &str, times: u64) {
    let shm = SharedMemory::<u64>::open(name).expect("open");
    for _ in 0..times {
        shm.with_lock(Duration::ZERO, |bytes| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[..8]);
            let next = u64::from_ne_bytes(raw) + 1;
            bytes[..8].copy_from_slice(&next.to_ne_bytes());
        })
        .expect("with_lock");
    }
    println!("incremented {times}");
}

fn do_watch(name: &str, count: usize, timeout_ms: u64) {
    let shm = SharedMemory::<u64>::open(name).expect("open");
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    shm.register_change_callback(move |v| {
        if let Ok(tx) = tx.lock() {
            let _ = tx.send(*v);
        }
    });
    println!("ready");
    for _ in 0..count {
        match rx.recv_timeout(Duration::from_millis(timeout_ms)) {
            Ok(v) => println!("changed {v}"),
            Err(_) => {
                eprintln!("watch: no change within {timeout_ms} ms");
                std::process::exit(2);
            }
        }
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        usage();
    }
    let name = args[2].as_str();

    match args[1].as_str() {
        "create" => do_create(name, arg(&args, 3), arg(&args, 4)),
        "write" => do_write(name, arg(&args, 3)),
        "incr" => do_incr(name, arg(&args, 3)),
        "watch" => do_watch(name, arg(&args, 3), arg(&args, 4)),
        _ => usage(),
    }
}

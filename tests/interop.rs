// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Cross-process tests driving the demo_shm_counter binary.

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::sync::Mutex;
use std::time::Duration;

use spinshm::SharedMemory;

const BIN: &str = env!("CARGO_BIN_EXE_demo_shm_counter");
const TIMEOUT: Duration = Duration::from_secs(1);

fn name(tag: &str) -> String {
    format!("interop_{tag}_{}", std::process::id())
}

fn run(args: &[&str]) -> String {
    let out = Command::new(BIN).args(args).output().expect("spawn demo");
    assert!(out.status.success(), "demo {args:?} failed: {out:?}");
    String::from_utf8_lossy(&out.stdout).into_owned()
}

/// Spawn the demo and block until it prints `ready`.
fn spawn_ready(args: &[&str]) -> (Child, BufReader<std::process::ChildStdout>) {
    let mut child = Command::new(BIN)
        .args(args)
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn demo");
    let mut out = BufReader::new(child.stdout.take().expect("stdout"));
    let mut line = String::new();
    out.read_line(&mut line).expect("read ready");
    assert_eq!(line.trim(), "ready");
    (child, out)
}

#[test]
fn child_write_reaches_parent() {
    let name = name("write");
    let shm = SharedMemory::<u64>::create(&name, Some(1)).unwrap();
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    shm.register_change_callback(move |v| {
        let _ = tx.lock().unwrap().send(*v);
    });

    let out = run(&["write", name.as_str(), "123"]);
    assert!(out.contains("wrote 123"));
    assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 123);
    assert_eq!(shm.read(TIMEOUT).unwrap(), 123);
    assert_eq!(shm.version(), 2);
}

#[test]
fn parent_write_reaches_child_watcher() {
    let name = name("watch");
    let shm = SharedMemory::<u64>::create(&name, Some(0)).unwrap();
    let (mut child, mut out) = spawn_ready(&["watch", name.as_str(), "1", "3000"]);

    shm.write(&77, TIMEOUT).unwrap();

    let mut line = String::new();
    out.read_line(&mut line).unwrap();
    assert_eq!(line.trim(), "changed 77");
    assert!(child.wait().unwrap().success());
}

#[test]
fn child_segment_visible_until_it_exits() {
    let name = name("owner");
    let (mut child, mut out) = spawn_ready(&["create", name.as_str(), "5", "300"]);

    assert!(SharedMemory::<u64>::exists(&name));
    let shm = SharedMemory::<u64>::open(&name).unwrap();
    assert!(!shm.is_creator());
    assert_eq!(shm.read(TIMEOUT).unwrap(), 5);
    shm.write(&6, TIMEOUT).unwrap();

    let mut line = String::new();
    out.read_line(&mut line).unwrap();
    assert_eq!(line.trim(), "final 6");
    drop(shm);
    assert!(child.wait().unwrap().success());
    assert!(!SharedMemory::<u64>::exists(&name));
}

#[test]
fn embedded_lock_serialises_processes() {
    let name = name("incr");
    let shm = SharedMemory::<u64>::create(&name, Some(0)).unwrap();

    let children: Vec<Child> = (0..3)
        .map(|_| {
            Command::new(BIN)
                .args(["incr", name.as_str(), "500"])
                .stdout(Stdio::null())
                .spawn()
                .expect("spawn demo")
        })
        .collect();
    for mut c in children {
        assert!(c.wait().unwrap().success());
    }
    assert_eq!(shm.read(TIMEOUT).unwrap(), 1500);
}

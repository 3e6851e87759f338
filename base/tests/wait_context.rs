// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fs::File;
use std::io::Write;
use std::os::unix::io::FromRawFd;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use base::register_stop_signals;
use base::WaitContext;

#[derive(Copy, Clone, Debug, PartialEq)]
enum Token {
    Drm,
    Stdin,
}

fn pipe() -> (File, File) {
    let mut fds = [0; 2];
    // SAFETY: fds is a valid array of two ints and the result is checked.
    let ret = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };
    assert_eq!(ret, 0);
    // SAFETY: both descriptors were just created and are owned by nothing else.
    unsafe { (File::from_raw_fd(fds[0]), File::from_raw_fd(fds[1])) }
}

#[test]
fn wakes_on_writer_thread() {
    let (drm_rx, mut drm_tx) = pipe();
    let (stdin_rx, _stdin_tx) = pipe();
    let ctx = WaitContext::build_with(&[(&drm_rx, Token::Drm), (&stdin_rx, Token::Stdin)]).unwrap();

    let writer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        drm_tx.write_all(&[1]).unwrap();
    });

    let events = ctx.wait_timeout(Duration::from_secs(5)).unwrap();
    writer.join().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].token, Token::Drm);
    assert!(events[0].is_readable);
}

#[test]
fn timeout_is_honoured() {
    let (rx, _tx) = pipe();
    let ctx = WaitContext::build_with(&[(&rx, Token::Stdin)]).unwrap();
    let start = Instant::now();
    let events = ctx.wait_timeout(Duration::from_millis(50)).unwrap();
    assert!(events.is_empty());
    assert!(start.elapsed() >= Duration::from_millis(40));
}

#[test]
fn signal_interrupts_blocked_wait() {
    let flag = register_stop_signals().unwrap();
    let (rx, _tx) = pipe();
    let (thread_tx, thread_rx) = mpsc::channel();
    let (done_tx, done_rx) = mpsc::channel();

    let waiter = thread::spawn(move || {
        let ctx = WaitContext::build_with(&[(&rx, Token::Drm)]).unwrap();
        // SAFETY: pthread_self has no preconditions.
        thread_tx.send(unsafe { libc::pthread_self() }).unwrap();
        let events = ctx.wait().unwrap();
        done_tx.send(events.len()).unwrap();
    });
    let waiter_id = thread_rx.recv().unwrap();

    // The signal may land before the waiter reaches poll, so keep sending until it returns.
    let deadline = Instant::now() + Duration::from_secs(5);
    let events = loop {
        assert!(Instant::now() < deadline, "wait was never interrupted");
        // SAFETY: the waiter has not been joined, so its id is still valid, and SIGINT is handled
        // by the stop handler installed above. A waiter that already exited yields ESRCH.
        unsafe { libc::pthread_kill(waiter_id, libc::SIGINT) };
        match done_rx.recv_timeout(Duration::from_millis(20)) {
            Ok(events) => break events,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(e) => panic!("waiter thread died: {}", e),
        }
    };
    waiter.join().unwrap();
    assert_eq!(events, 0);
    assert!(flag.load(Ordering::SeqCst));
}

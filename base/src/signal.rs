// Copyright 2017 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Turns SIGINT and SIGTERM into a flag the display loop polls between frames.

use std::mem::zeroed;
use std::ptr::null_mut;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use libc::c_int;
use libc::sigaction;
use libc::sigemptyset;
use libc::SIGINT;
use libc::SIGTERM;

use crate::errno_result;
use crate::Result;

static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_stop_signal(_signum: c_int) {
    // Only async-signal-safe work here: a single atomic store.
    STOP_REQUESTED.store(true, Ordering::SeqCst);
}

fn register_signal_handler(num: c_int, handler: extern "C" fn(c_int)) -> Result<()> {
    // SAFETY:
    // A zeroed sigaction is a valid starting point; the handler and mask are filled in below.
    let mut sigact: sigaction = unsafe { zeroed() };
    sigact.sa_sigaction = handler as usize;
    // No SA_RESTART: blocking waits must return EINTR.
    sigact.sa_flags = 0;

    // SAFETY:
    // sa_mask is a valid sigset_t owned by `sigact`.
    unsafe { sigemptyset(&mut sigact.sa_mask) };

    // SAFETY:
    // The handler only touches an atomic, and the return value is checked.
    let ret = unsafe { libc::sigaction(num, &sigact, null_mut()) };
    if ret < 0 {
        return errno_result();
    }
    Ok(())
}

/// Installs SIGINT and SIGTERM handlers that set the returned flag.
///
/// The flag is process wide; registering more than once returns the same flag.
pub fn register_stop_signals() -> Result<&'static AtomicBool> {
    register_signal_handler(SIGINT, handle_stop_signal)?;
    register_signal_handler(SIGTERM, handle_stop_signal)?;
    Ok(&STOP_REQUESTED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigterm_sets_flag() {
        let flag = register_stop_signals().unwrap();
        // SAFETY:
        // The handler for SIGTERM was just installed, so raising it does not kill the process.
        assert_eq!(unsafe { libc::raise(SIGTERM) }, 0);
        assert!(flag.load(Ordering::SeqCst));
        flag.store(false, Ordering::SeqCst);
    }
}

// Copyright 2020 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::cell::RefCell;
use std::os::unix::io::AsRawFd;
use std::time::Duration;

use libc::nfds_t;
use libc::poll;
use libc::pollfd;
use libc::EINTR;
use libc::POLLERR;
use libc::POLLHUP;
use libc::POLLIN;
use smallvec::SmallVec;

use crate::errno::Error;
use crate::RawDescriptor;
use crate::Result;

/// Marker for types that identify a descriptor registered with a `WaitContext`.
pub trait EventToken: Copy + PartialEq {}
impl<T: Copy + PartialEq> EventToken for T {}

/// Represents an event that has been signaled and waited for via a wait function.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TriggeredEvent<T: EventToken> {
    pub token: T,
    pub is_readable: bool,
    pub is_hungup: bool,
}

/// Used to wait for readability on a small set of descriptors.
///
/// Only a few descriptors are ever watched (the DRM node and stdin), so this is backed by
/// `poll(2)` over a flat list instead of an epoll instance.
///
/// # Example
///
/// ```
/// use std::io::Write;
/// use std::os::unix::net::UnixStream;
/// use std::time::Duration;
///
/// use base::WaitContext;
///
/// #[derive(Copy, Clone, Debug, PartialEq)]
/// enum Token {
///     Left,
///     Right,
/// }
///
/// let (mut left_tx, left_rx) = UnixStream::pair()?;
/// let (_right_tx, right_rx) = UnixStream::pair()?;
///
/// let ctx = WaitContext::build_with(&[(&left_rx, Token::Left), (&right_rx, Token::Right)])?;
/// left_tx.write_all(b"x")?;
///
/// let events = ctx.wait_timeout(Duration::from_secs(1))?;
/// let tokens: Vec<Token> = events.iter().filter(|e| e.is_readable).map(|e| e.token).collect();
/// assert_eq!(tokens, [Token::Left]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct WaitContext<T: EventToken> {
    entries: RefCell<Vec<(RawDescriptor, T)>>,
}

impl<T: EventToken> WaitContext<T> {
    /// Creates a new WaitContext.
    pub fn new() -> Result<WaitContext<T>> {
        Ok(WaitContext {
            entries: RefCell::new(Vec::new()),
        })
    }

    /// Creates a new WaitContext with the the associated triggers.
    pub fn build_with(triggers: &[(&dyn AsRawFd, T)]) -> Result<WaitContext<T>> {
        let ctx = WaitContext::new()?;
        for (descriptor, token) in triggers {
            ctx.add(*descriptor, *token)?;
        }
        Ok(ctx)
    }

    /// Adds a trigger to the WaitContext, watching it for readability.
    ///
    /// A descriptor can only be added once.
    pub fn add(&self, descriptor: &dyn AsRawFd, token: T) -> Result<()> {
        let fd = descriptor.as_raw_fd();
        if fd < 0 {
            return Err(Error::new(libc::EBADF));
        }
        let mut entries = self.entries.borrow_mut();
        if entries.iter().any(|(existing, _)| *existing == fd) {
            return Err(Error::new(libc::EEXIST));
        }
        entries.push((fd, token));
        Ok(())
    }

    /// Removes every descriptor registered under `token`.
    ///
    /// Returns an error if nothing was registered with that token.
    pub fn delete(&self, token: T) -> Result<()> {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(_, t)| *t != token);
        if entries.len() == before {
            return Err(Error::new(libc::ENOENT));
        }
        Ok(())
    }

    /// Returns the number of registered descriptors.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Waits for one or more of the registered triggers to become signaled.
    pub fn wait(&self) -> Result<SmallVec<[TriggeredEvent<T>; 4]>> {
        self.wait_inner(-1)
    }

    /// Waits for one or more of the registered triggers to become signaled, returning an empty
    /// list if none are signaled before `timeout` elapses.
    ///
    /// A wait interrupted by a signal also returns an empty list, so callers can check their
    /// stop conditions and decide whether to wait again.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<SmallVec<[TriggeredEvent<T>; 4]>> {
        let millis = timeout.as_millis().min(i32::MAX as u128) as i32;
        self.wait_inner(millis)
    }

    fn wait_inner(&self, timeout_ms: i32) -> Result<SmallVec<[TriggeredEvent<T>; 4]>> {
        let entries = self.entries.borrow();
        let mut fds: SmallVec<[pollfd; 4]> = entries
            .iter()
            .map(|(fd, _)| pollfd {
                fd: *fd,
                events: POLLIN,
                revents: 0,
            })
            .collect();

        // SAFETY:
        // `fds` is a valid array of pollfd structs whose length is passed alongside it, and poll
        // only writes to the revents fields. The return value is checked.
        let ret = unsafe { poll(fds.as_mut_ptr(), fds.len() as nfds_t, timeout_ms) };
        if ret < 0 {
            let err = Error::last();
            if err.errno() == EINTR {
                return Ok(SmallVec::new());
            }
            return Err(err);
        }

        Ok(fds
            .iter()
            .zip(entries.iter())
            .filter(|(pfd, _)| pfd.revents != 0)
            .map(|(pfd, (_, token))| TriggeredEvent {
                token: *token,
                is_readable: pfd.revents & POLLIN != 0,
                is_hungup: pfd.revents & (POLLHUP | POLLERR) != 0,
            })
            .collect())
    }
}

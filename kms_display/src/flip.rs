// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::io;
use std::os::raw::c_int;
use std::os::raw::c_uint;
use std::os::raw::c_void;
use std::os::unix::io::AsRawFd;
use std::time::Duration;
use std::time::Instant;

use base::info;
use base::trace;
use base::warn;
use base::WaitContext;

use crate::device::Card;
use crate::raw::drm::drmEventContext;
use crate::raw::drm::DRM_EVENT_CONTEXT_VERSION;
use crate::Error;
use crate::Result;

/// How long `drain` waits for an outstanding flip before giving up on it.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Bookkeeping for the one page flip that may be in flight.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
struct FlipState {
    pending: bool,
    /// vblank counter of the last completed flip.
    sequence: u32,
    tv_sec: u32,
    tv_usec: u32,
}

impl FlipState {
    /// Kernel timestamp of the last completed flip.
    fn timestamp(&self) -> Duration {
        Duration::from_secs(self.tv_sec.into()) + Duration::from_micros(self.tv_usec.into())
    }
}

unsafe extern "C" fn page_flip_handler(
    _fd: c_int,
    sequence: c_uint,
    tv_sec: c_uint,
    tv_usec: c_uint,
    user_data: *mut c_void,
) {
    if user_data.is_null() {
        return;
    }
    // SAFETY:
    // user_data is the FlipState boxed by the Scanout that queued this flip, which is still alive
    // because only Scanout dispatches events.
    let state = &mut *(user_data as *mut FlipState);
    state.pending = false;
    state.sequence = sequence;
    state.tv_sec = tv_sec;
    state.tv_usec = tv_usec;
}

/// How a wait for a page flip ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlipOutcome {
    /// The flip landed and the previous buffer is free again.
    Completed,
    /// The flip landed, and input arrived on the interrupt source while waiting.
    Interrupted,
}

/// The page flip side of a DRM device.
///
/// The descriptor becomes readable once a flip event is queued for dispatch.
pub trait FlipDevice: AsRawFd {
    /// Queues a flip to `fb_id` on the next vblank. `user_data` is handed back to the page flip
    /// handler run by `handle_event`.
    fn page_flip(&self, crtc_id: u32, fb_id: u32, user_data: *mut c_void) -> Result<()>;

    /// Reads pending events and dispatches them to the handlers in `ctx`.
    fn handle_event(&self, ctx: &mut drmEventContext) -> Result<()>;
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Token {
    Drm,
    Interrupt,
}

/// Drives page flips on one CRTC.
pub struct Scanout<'c, D: FlipDevice = Card> {
    device: &'c D,
    crtc_id: u32,
    // Boxed so the address handed to the kernel stays put when Scanout moves.
    state: Box<FlipState>,
    wait_ctx: WaitContext<Token>,
    watching_interrupt: bool,
}

impl<'c, D: FlipDevice> Scanout<'c, D> {
    /// With `watch_stdin`, readable stdin while waiting for a flip is reported as
    /// `FlipOutcome::Interrupted`.
    pub fn new(device: &'c D, crtc_id: u32, watch_stdin: bool) -> Result<Scanout<'c, D>> {
        let stdin = io::stdin();
        let interrupt: Option<&dyn AsRawFd> = if watch_stdin { Some(&stdin) } else { None };
        Self::with_interrupt(device, crtc_id, interrupt)
    }

    /// Like `new`, with any readable descriptor standing in for stdin.
    pub fn with_interrupt(
        device: &'c D,
        crtc_id: u32,
        interrupt: Option<&dyn AsRawFd>,
    ) -> Result<Scanout<'c, D>> {
        let wait_ctx = WaitContext::build_with(&[(device, Token::Drm)]).map_err(Error::Wait)?;
        if let Some(interrupt) = interrupt {
            wait_ctx
                .add(interrupt, Token::Interrupt)
                .map_err(Error::Wait)?;
        }
        Ok(Scanout {
            device,
            crtc_id,
            state: Box::default(),
            wait_ctx,
            watching_interrupt: interrupt.is_some(),
        })
    }

    /// Queues a flip to `fb_id` for the next vblank.
    pub fn present(&mut self, fb_id: u32) -> Result<()> {
        if self.state.pending {
            return Err(Error::PageFlipPending);
        }
        self.state.pending = true;
        let user_data = &mut *self.state as *mut FlipState as *mut c_void;
        if let Err(e) = self.device.page_flip(self.crtc_id, fb_id, user_data) {
            self.state.pending = false;
            return Err(e);
        }
        trace!("queued flip to framebuffer {}", fb_id);
        Ok(())
    }

    /// Blocks until the queued flip completes.
    ///
    /// Input on the interrupt source does not abandon the flip. The buffer it scans out must stay
    /// locked until the kernel is done with the old one, so the wait continues and the
    /// interruption is reported afterwards.
    pub fn wait_for_flip(&mut self, timeout: Duration) -> Result<FlipOutcome> {
        let deadline = Instant::now() + timeout;
        let mut interrupted = false;
        while self.state.pending {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::FlipTimeout(timeout));
            }
            let events = self
                .wait_ctx
                .wait_timeout(deadline - now)
                .map_err(Error::Wait)?;
            for event in events.iter() {
                match event.token {
                    Token::Interrupt => {
                        info!("user interrupted");
                        interrupted = true;
                        self.stop_watching_interrupt()?;
                    }
                    Token::Drm => self.dispatch()?,
                }
            }
        }
        trace!(
            "flip completed at vblank {} ({:?})",
            self.state.sequence,
            self.state.timestamp()
        );
        Ok(if interrupted {
            FlipOutcome::Interrupted
        } else {
            FlipOutcome::Completed
        })
    }

    /// Queues `buffer` for scanout as `fb_id` and waits for the flip.
    ///
    /// `buffer` is handed back once the kernel scans it out. On failure it is only dropped after
    /// any flip still in flight has been drained.
    pub fn show<B>(
        &mut self,
        fb_id: u32,
        buffer: B,
        timeout: Duration,
    ) -> Result<(B, FlipOutcome)> {
        self.present(fb_id)?;
        match self.wait_for_flip(timeout) {
            Ok(outcome) => Ok((buffer, outcome)),
            Err(e) => {
                self.drain();
                drop(buffer);
                Err(e)
            }
        }
    }

    /// Waits up to a second for an outstanding flip, ignoring the interrupt source.
    pub fn drain(&mut self) {
        if !self.state.pending {
            return;
        }
        if let Err(e) = self.stop_watching_interrupt() {
            warn!("failed to stop watching for interrupts: {}", e);
        }
        if let Err(e) = self.wait_for_flip(DRAIN_TIMEOUT) {
            warn!("abandoning pending page flip: {}", e);
        }
    }

    fn stop_watching_interrupt(&mut self) -> Result<()> {
        if self.watching_interrupt {
            self.wait_ctx.delete(Token::Interrupt).map_err(Error::Wait)?;
            self.watching_interrupt = false;
        }
        Ok(())
    }

    fn dispatch(&mut self) -> Result<()> {
        let mut ctx = drmEventContext {
            version: DRM_EVENT_CONTEXT_VERSION,
            vblank_handler: None,
            page_flip_handler: Some(page_flip_handler),
        };
        self.device.handle_event(&mut ctx)
    }
}

impl<'c, D: FlipDevice> Drop for Scanout<'c, D> {
    fn drop(&mut self) {
        self.drain();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::io::Read;
    use std::io::Write;
    use std::os::unix::io::RawFd;
    use std::os::unix::net::UnixStream;
    use std::ptr::null_mut;
    use std::thread;

    use super::*;

    /// Completes a flip for every byte written to the other end of `events`.
    struct FakeDevice {
        events: UnixStream,
        user_data: Cell<*mut c_void>,
        last_fb: Cell<u32>,
        dispatched: Cell<u32>,
    }

    impl FakeDevice {
        fn new() -> (FakeDevice, UnixStream) {
            let (kernel, events) = UnixStream::pair().unwrap();
            let device = FakeDevice {
                events,
                user_data: Cell::new(null_mut()),
                last_fb: Cell::new(0),
                dispatched: Cell::new(0),
            };
            (device, kernel)
        }
    }

    impl AsRawFd for FakeDevice {
        fn as_raw_fd(&self) -> RawFd {
            self.events.as_raw_fd()
        }
    }

    impl FlipDevice for FakeDevice {
        fn page_flip(&self, _crtc_id: u32, fb_id: u32, user_data: *mut c_void) -> Result<()> {
            self.last_fb.set(fb_id);
            self.user_data.set(user_data);
            Ok(())
        }

        fn handle_event(&self, ctx: &mut drmEventContext) -> Result<()> {
            let mut event = [0u8; 1];
            (&self.events).read_exact(&mut event).unwrap();
            self.dispatched.set(self.dispatched.get() + 1);
            if let Some(handler) = ctx.page_flip_handler {
                // SAFETY: user_data is the FlipState passed to the last page_flip call.
                unsafe {
                    handler(
                        self.as_raw_fd(),
                        self.dispatched.get(),
                        1,
                        0,
                        self.user_data.get(),
                    )
                };
            }
            Ok(())
        }
    }

    fn vblank(kernel: &UnixStream) {
        let mut kernel = kernel;
        kernel.write_all(&[1]).unwrap();
    }

    /// Records how many events had been dispatched when it was released.
    struct Buffer<'a> {
        device: &'a FakeDevice,
        released: &'a Cell<Option<u32>>,
    }

    impl Drop for Buffer<'_> {
        fn drop(&mut self) {
            self.released.set(Some(self.device.dispatched.get()));
        }
    }

    #[test]
    fn flip_completes() {
        let (device, kernel) = FakeDevice::new();
        let mut scanout = Scanout::with_interrupt(&device, 7, None).unwrap();
        scanout.present(42).unwrap();
        assert_eq!(device.last_fb.get(), 42);
        vblank(&kernel);
        assert_eq!(
            scanout.wait_for_flip(Duration::from_secs(5)).unwrap(),
            FlipOutcome::Completed
        );
        assert!(!scanout.state.pending);
        assert_eq!(scanout.state.sequence, 1);
        assert_eq!(scanout.state.timestamp(), Duration::from_secs(1));
    }

    #[test]
    fn one_flip_at_a_time() {
        let (device, kernel) = FakeDevice::new();
        let mut scanout = Scanout::with_interrupt(&device, 7, None).unwrap();
        scanout.present(1).unwrap();
        assert!(matches!(scanout.present(2), Err(Error::PageFlipPending)));
        assert_eq!(device.last_fb.get(), 1);
        vblank(&kernel);
        scanout.wait_for_flip(Duration::from_secs(5)).unwrap();
        scanout.present(2).unwrap();
        vblank(&kernel);
        scanout.wait_for_flip(Duration::from_secs(5)).unwrap();
        assert_eq!(device.dispatched.get(), 2);
    }

    #[test]
    fn interrupt_waits_for_pending_flip() {
        let (device, kernel) = FakeDevice::new();
        let (mut input_tx, input_rx) = UnixStream::pair().unwrap();
        let mut scanout = Scanout::with_interrupt(&device, 7, Some(&input_rx)).unwrap();
        assert_eq!(scanout.wait_ctx.len(), 2);

        scanout.present(42).unwrap();
        input_tx.write_all(b"\n").unwrap();
        let flipper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            vblank(&kernel);
            kernel
        });
        let outcome = scanout.wait_for_flip(Duration::from_secs(5)).unwrap();
        let kernel = flipper.join().unwrap();
        assert_eq!(outcome, FlipOutcome::Interrupted);
        assert!(!scanout.state.pending);
        assert_eq!(device.dispatched.get(), 1);

        // The input is still unread, but it is no longer watched.
        assert_eq!(scanout.wait_ctx.len(), 1);
        scanout.present(43).unwrap();
        vblank(&kernel);
        assert_eq!(
            scanout.wait_for_flip(Duration::from_secs(5)).unwrap(),
            FlipOutcome::Completed
        );
    }

    #[test]
    fn flip_timeout() {
        let (device, kernel) = FakeDevice::new();
        let mut scanout = Scanout::with_interrupt(&device, 7, None).unwrap();
        scanout.present(42).unwrap();
        let timeout = Duration::from_millis(30);
        let start = Instant::now();
        match scanout.wait_for_flip(timeout) {
            Err(Error::FlipTimeout(t)) => assert_eq!(t, timeout),
            r => panic!("expected a flip timeout, got {:?}", r),
        }
        assert!(start.elapsed() >= timeout);
        assert!(scanout.state.pending);

        // A late flip is still collected before the scanout goes away.
        vblank(&kernel);
        drop(scanout);
        assert_eq!(device.dispatched.get(), 1);
    }

    #[test]
    fn show_returns_buffer() {
        let (device, kernel) = FakeDevice::new();
        let released = Cell::new(None);
        let mut scanout = Scanout::with_interrupt(&device, 7, None).unwrap();
        vblank(&kernel);
        let buffer = Buffer {
            device: &device,
            released: &released,
        };
        let (buffer, outcome) = scanout
            .show(42, buffer, Duration::from_secs(5))
            .unwrap_or_else(|e| panic!("show failed: {}", e));
        assert_eq!(outcome, FlipOutcome::Completed);
        assert_eq!(released.get(), None);
        drop(buffer);
        assert_eq!(released.get(), Some(1));
    }

    #[test]
    fn failed_show_drains_before_release() {
        let (device, kernel) = FakeDevice::new();
        let released = Cell::new(None);
        let mut scanout = Scanout::with_interrupt(&device, 7, None).unwrap();
        let flipper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            vblank(&kernel);
            kernel
        });
        let buffer = Buffer {
            device: &device,
            released: &released,
        };
        let result = scanout.show(42, buffer, Duration::from_millis(20));
        let _kernel = flipper.join().unwrap();
        assert!(matches!(result, Err(Error::FlipTimeout(_))));
        assert_eq!(released.get(), Some(1));
        assert!(!scanout.state.pending);
    }

    #[test]
    fn handler_completes_flip() {
        let mut state = FlipState {
            pending: true,
            ..Default::default()
        };
        // SAFETY: the pointer refers to a live FlipState.
        unsafe {
            page_flip_handler(
                3,
                1234,
                10,
                500_000,
                &mut state as *mut FlipState as *mut c_void,
            )
        };
        assert!(!state.pending);
        assert_eq!(state.sequence, 1234);
        assert_eq!(state.timestamp(), Duration::from_millis(10_500));
    }

    #[test]
    fn handler_ignores_null() {
        // SAFETY: null user data is checked before use.
        unsafe { page_flip_handler(3, 1, 0, 0, null_mut()) };
    }

    #[test]
    fn event_context_layout() {
        // libdrm reads the handlers that exist for the declared version only.
        assert_eq!(DRM_EVENT_CONTEXT_VERSION, 2);
        assert_eq!(
            std::mem::size_of::<drmEventContext>(),
            std::mem::size_of::<usize>() * 3
        );
    }
}

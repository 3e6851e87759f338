// Copyright 2018 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Direct scanout through [DRM](https://en.wikipedia.org/wiki/Direct_Rendering_Manager) kernel
//! mode-setting, with [GBM](https://en.wikipedia.org/wiki/Mesa_(computer_graphics)) allocating the
//! buffers that EGL renders into.
//!
//! # Examples
//!
//! ```no_run
//! # use kms_display::*;
//! # fn main() -> kms_display::Result<()> {
//! let card = Card::open("/dev/dri/card1")?;
//! let target = card.probe(None)?;
//! let device = gbm::Device::new(&card)?;
//! let surface = gbm::Surface::new(
//!     &device,
//!     target.mode.hdisplay().into(),
//!     target.mode.vdisplay().into(),
//!     gbm::Format::XRGB8888,
//!     gbm::Flags::empty().use_scanout(true).use_rendering(true),
//! )?;
//! assert!(surface.has_free_buffers());
//! # Ok(())
//! # }
//! ```

mod device;
mod flip;
mod framebuffer;
pub mod gbm;
pub mod mode;
pub mod raw;

use std::io;
use std::path::PathBuf;
use std::result;
use std::time::Duration;

use base::dynlib::LoadError;
use remain::sorted;
use thiserror::Error as ThisError;

pub use crate::device::Card;
pub use crate::device::SavedCrtc;
pub use crate::flip::FlipDevice;
pub use crate::flip::FlipOutcome;
pub use crate::flip::Scanout;
pub use crate::framebuffer::framebuffer_id;
pub use crate::mode::DisplayTarget;
pub use crate::mode::ModeInfo;

/// An error generated while driving the display.
#[sorted]
#[derive(ThisError, Debug)]
pub enum Error {
    #[error("failed to register framebuffer: {0}")]
    AddFramebuffer(base::Error),
    #[error("connector {0} does not exist or is not connected")]
    ConnectorUnavailable(u32),
    #[error("failed to create gbm device")]
    CreateGbmDevice,
    #[error("failed to create {width}x{height} gbm surface")]
    CreateGbmSurface { width: u32, height: u32 },
    #[error("failed to duplicate drm descriptor: {0}")]
    DupDescriptor(io::Error),
    #[error("page flip did not complete within {0:?}")]
    FlipTimeout(Duration),
    #[error("failed to query connector {0}: {1}")]
    GetConnector(u32, base::Error),
    #[error("failed to query crtc {0}: {1}")]
    GetCrtc(u32, base::Error),
    #[error("failed to query encoder {0}: {1}")]
    GetEncoder(u32, base::Error),
    #[error("failed to query mode-setting resources: {0}")]
    GetResources(base::Error),
    #[error("failed to dispatch drm events: {0}")]
    HandleEvent(base::Error),
    #[error("failed to load library: {0}")]
    Load(LoadError),
    #[error("no front buffer to lock; was eglSwapBuffers called?")]
    LockFrontBuffer,
    #[error("no connected connector")]
    NoConnectedConnector,
    #[error("no crtc can drive connector {0}")]
    NoCrtc(u32),
    #[error("connector {0} reports no modes")]
    NoMode(u32),
    #[error("failed to open {path}: {source}")]
    OpenDevice { path: PathBuf, source: io::Error },
    #[error("failed to queue page flip: {0}")]
    PageFlip(base::Error),
    #[error("a page flip is already pending")]
    PageFlipPending,
    #[error("failed to set crtc mode: {0}")]
    SetCrtc(base::Error),
    #[error("failed to wait for drm events: {0}")]
    Wait(base::Error),
}

/// The result of an operation in this crate.
pub type Result<T> = result::Result<T, Error>;

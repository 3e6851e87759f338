// Copyright 2020 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Safe wrappers for the handful of system interfaces the cube renderer relies on.

pub mod dynlib;
mod errno;
pub mod signal;
pub mod syslog;
mod wait_context;

pub use errno::errno_result;
pub use errno::Error;
pub use errno::Result;
pub use libloading;
pub use log::debug;
pub use log::error;
pub use log::info;
pub use log::trace;
pub use log::warn;
pub use signal::register_stop_signals;
pub use wait_context::EventToken;
pub use wait_context::TriggeredEvent;
pub use wait_context::WaitContext;

/// Raw file descriptor type used by every wrapper in this crate.
pub type RawDescriptor = std::os::unix::io::RawFd;

// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! DRM framebuffers for GBM buffer objects.
//!
//! A GBM surface cycles through a small, fixed set of buffer objects. Each one is registered with
//! KMS the first time it is locked, and the resulting framebuffer id rides along as the buffer's
//! user data until GBM destroys the buffer.

use std::fs::File;
use std::os::raw::c_void;
use std::os::unix::io::AsRawFd;
use std::rc::Rc;

use base::debug;
use base::warn;

use crate::device::Card;
use crate::gbm::LockedBuffer;
use crate::raw::drm::Drm;
use crate::raw::gbm::gbm_bo;
use crate::Error;
use crate::Result;

const FRAMEBUFFER_DEPTH: u8 = 24;
const FRAMEBUFFER_BPP: u8 = 32;

struct FramebufferData {
    fb_id: u32,
    card: File,
    drm: Rc<Drm>,
}

unsafe extern "C" fn destroy_framebuffer(_bo: *mut gbm_bo, data: *mut c_void) {
    // SAFETY:
    // `data` was produced by Box::into_raw in `framebuffer_id` and GBM calls this exactly once.
    let fb = Box::from_raw(data as *mut FramebufferData);
    if fb.fb_id != 0 {
        // SAFETY:
        // The descriptor was duplicated for this framebuffer and is still open.
        let ret = (fb.drm.drmModeRmFB)(fb.card.as_raw_fd(), fb.fb_id);
        if ret != 0 {
            warn!(
                "failed to remove framebuffer {}: {}",
                fb.fb_id,
                base::Error::last()
            );
        }
    }
}

/// Returns the framebuffer id scanning out `buffer`, registering it with KMS on first use.
pub fn framebuffer_id(card: &Card, buffer: &LockedBuffer) -> Result<u32> {
    let lib = buffer.lib();
    // SAFETY:
    // The buffer is locked and valid; user data is either null or a FramebufferData we set.
    let existing = unsafe { (lib.gbm_bo_get_user_data)(buffer.as_raw()) };
    if !existing.is_null() {
        // SAFETY:
        // Only this module attaches user data, always as a FramebufferData.
        return Ok(unsafe { (*(existing as *const FramebufferData)).fb_id });
    }

    let (width, height, stride, handle) = (
        buffer.width(),
        buffer.height(),
        buffer.stride(),
        buffer.handle(),
    );
    let mut fb_id = 0;
    // SAFETY:
    // The card descriptor is valid, fb_id is a valid out pointer and the result is checked.
    let ret = unsafe {
        (card.drm().drmModeAddFB)(
            card.as_raw_fd(),
            width,
            height,
            FRAMEBUFFER_DEPTH,
            FRAMEBUFFER_BPP,
            stride,
            handle,
            &mut fb_id,
        )
    };
    if ret != 0 {
        return Err(Error::AddFramebuffer(base::Error::last()));
    }
    debug!(
        "registered framebuffer {} ({}x{}, stride {}, handle {})",
        fb_id, width, height, stride, handle
    );

    let card_file = match card.try_clone_file() {
        Ok(f) => f,
        Err(e) => {
            // SAFETY:
            // The framebuffer was just created on this card.
            unsafe { (card.drm().drmModeRmFB)(card.as_raw_fd(), fb_id) };
            return Err(e);
        }
    };
    let data = Box::into_raw(Box::new(FramebufferData {
        fb_id,
        card: card_file,
        drm: Rc::clone(card.drm()),
    }));
    // SAFETY:
    // Ownership of `data` passes to GBM, which hands it back to destroy_framebuffer.
    unsafe {
        (lib.gbm_bo_set_user_data)(
            buffer.as_raw(),
            data as *mut c_void,
            Some(destroy_framebuffer),
        )
    };
    Ok(fb_id)
}

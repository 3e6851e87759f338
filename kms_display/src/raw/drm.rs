// Copyright 2018 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

// Transcribed from xf86drm.h and xf86drmMode.h.

use std::mem::size_of;
use std::os::raw::c_char;
use std::os::raw::c_int;
use std::os::raw::c_uint;
use std::os::raw::c_void;

use static_assertions::const_assert_eq;

pub const DRM_DISPLAY_MODE_LEN: usize = 32;

pub const DRM_MODE_TYPE_PREFERRED: u32 = 1 << 3;
pub const DRM_MODE_TYPE_DRIVER: u32 = 1 << 6;

pub const DRM_MODE_PAGE_FLIP_EVENT: u32 = 0x01;

/// Only `vblank_handler` and `page_flip_handler` are provided.
pub const DRM_EVENT_CONTEXT_VERSION: c_int = 2;

pub type drmModeConnection = c_uint;
pub const DRM_MODE_CONNECTED: drmModeConnection = 1;
pub const DRM_MODE_DISCONNECTED: drmModeConnection = 2;
pub const DRM_MODE_UNKNOWNCONNECTION: drmModeConnection = 3;

pub type drmModeSubPixel = c_uint;

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct drmModeModeInfo {
    pub clock: u32,
    pub hdisplay: u16,
    pub hsync_start: u16,
    pub hsync_end: u16,
    pub htotal: u16,
    pub hskew: u16,
    pub vdisplay: u16,
    pub vsync_start: u16,
    pub vsync_end: u16,
    pub vtotal: u16,
    pub vscan: u16,
    pub vrefresh: u32,
    pub flags: u32,
    pub type_: u32,
    pub name: [c_char; DRM_DISPLAY_MODE_LEN],
}

const_assert_eq!(size_of::<drmModeModeInfo>(), 68);

#[repr(C)]
#[derive(Debug)]
pub struct drmModeRes {
    pub count_fbs: c_int,
    pub fbs: *mut u32,
    pub count_crtcs: c_int,
    pub crtcs: *mut u32,
    pub count_connectors: c_int,
    pub connectors: *mut u32,
    pub count_encoders: c_int,
    pub encoders: *mut u32,
    pub min_width: u32,
    pub max_width: u32,
    pub min_height: u32,
    pub max_height: u32,
}

#[repr(C)]
#[derive(Debug)]
pub struct drmModeConnector {
    pub connector_id: u32,
    pub encoder_id: u32,
    pub connector_type: u32,
    pub connector_type_id: u32,
    pub connection: drmModeConnection,
    pub mmWidth: u32,
    pub mmHeight: u32,
    pub subpixel: drmModeSubPixel,
    pub count_modes: c_int,
    pub modes: *mut drmModeModeInfo,
    pub count_props: c_int,
    pub props: *mut u32,
    pub prop_values: *mut u64,
    pub count_encoders: c_int,
    pub encoders: *mut u32,
}

#[repr(C)]
#[derive(Debug)]
pub struct drmModeEncoder {
    pub encoder_id: u32,
    pub encoder_type: u32,
    pub crtc_id: u32,
    pub possible_crtcs: u32,
    pub possible_clones: u32,
}

#[repr(C)]
#[derive(Debug)]
pub struct drmModeCrtc {
    pub crtc_id: u32,
    pub buffer_id: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub mode_valid: c_int,
    pub mode: drmModeModeInfo,
    pub gamma_size: c_int,
}

pub type drm_vblank_handler_t = Option<
    unsafe extern "C" fn(
        fd: c_int,
        sequence: c_uint,
        tv_sec: c_uint,
        tv_usec: c_uint,
        user_data: *mut c_void,
    ),
>;
pub type drm_page_flip_handler_t = drm_vblank_handler_t;

#[repr(C)]
#[derive(Copy, Clone)]
pub struct drmEventContext {
    pub version: c_int,
    pub vblank_handler: drm_vblank_handler_t,
    pub page_flip_handler: drm_page_flip_handler_t,
}

base::dynamic_library! {
    /// Entry points of libdrm.
    pub struct Drm("libdrm.so.2") {
        fn drmModeGetResources(fd: c_int) -> *mut drmModeRes;
        fn drmModeFreeResources(ptr: *mut drmModeRes);
        fn drmModeGetConnector(fd: c_int, connector_id: u32) -> *mut drmModeConnector;
        fn drmModeFreeConnector(ptr: *mut drmModeConnector);
        fn drmModeGetEncoder(fd: c_int, encoder_id: u32) -> *mut drmModeEncoder;
        fn drmModeFreeEncoder(ptr: *mut drmModeEncoder);
        fn drmModeGetCrtc(fd: c_int, crtc_id: u32) -> *mut drmModeCrtc;
        fn drmModeFreeCrtc(ptr: *mut drmModeCrtc);
        fn drmModeAddFB(
            fd: c_int,
            width: u32,
            height: u32,
            depth: u8,
            bpp: u8,
            pitch: u32,
            bo_handle: u32,
            buf_id: *mut u32,
        ) -> c_int;
        fn drmModeRmFB(fd: c_int, buffer_id: u32) -> c_int;
        fn drmModeSetCrtc(
            fd: c_int,
            crtc_id: u32,
            buffer_id: u32,
            x: u32,
            y: u32,
            connectors: *mut u32,
            count: c_int,
            mode: *mut drmModeModeInfo,
        ) -> c_int;
        fn drmModePageFlip(
            fd: c_int,
            crtc_id: u32,
            fb_id: u32,
            flags: u32,
            user_data: *mut c_void,
        ) -> c_int;
        fn drmHandleEvent(fd: c_int, evctx: *mut drmEventContext) -> c_int;
    }
}

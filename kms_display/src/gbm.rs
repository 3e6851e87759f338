// Copyright 2018 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! GBM devices and the scanout-capable surfaces EGL renders into.

use std::ffi::CStr;
use std::fmt;
use std::fs::File;
use std::os::raw::c_void;
use std::os::unix::io::AsRawFd;
use std::rc::Rc;

use crate::device::Card;
use crate::raw::gbm::*;
use crate::Error;
use crate::Result;

/// A [fourcc](https://en.wikipedia.org/wiki/FourCC) format identifier.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Format(u32);

impl Format {
    /// 32 bit RGB with 8 bits per channel and an unused byte, `XR24`.
    pub const XRGB8888: Format = Format::new(b'X', b'R', b'2', b'4');

    /// Constructs a format identifer using a fourcc byte sequence.
    #[inline(always)]
    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Format {
        Format(a as u32 | (b as u32) << 8 | (c as u32) << 16 | (d as u32) << 24)
    }

    /// Returns the fourcc code as a sequence of bytes.
    #[inline(always)]
    pub fn to_bytes(&self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

impl From<Format> for u32 {
    fn from(f: Format) -> u32 {
        f.0
    }
}

impl fmt::Debug for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = self.to_bytes();
        if b.iter().all(u8::is_ascii_graphic) {
            write!(
                f,
                "fourcc({}{}{}{})",
                b[0] as char, b[1] as char, b[2] as char, b[3] as char
            )
        } else {
            write!(
                f,
                "fourcc(0x{:02x}{:02x}{:02x}{:02x})",
                b[0], b[1], b[2], b[3]
            )
        }
    }
}

/// Usage flags for constructing a surface.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Flags(u32);

impl Flags {
    /// Returns empty set of flags.
    #[inline(always)]
    pub fn empty() -> Flags {
        Flags(0)
    }

    fn set(self, flag: u32, e: bool) -> Flags {
        if e {
            Flags(self.0 | flag)
        } else {
            Flags(self.0 & !flag)
        }
    }

    /// Sets the scanout flag's presence
    #[inline(always)]
    pub fn use_scanout(self, e: bool) -> Flags {
        self.set(GBM_BO_USE_SCANOUT, e)
    }

    /// Sets the rendering flag's presence
    #[inline(always)]
    pub fn use_rendering(self, e: bool) -> Flags {
        self.set(GBM_BO_USE_RENDERING, e)
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

struct DeviceInner {
    _fd: File,
    gbm: *mut gbm_device,
    lib: Gbm,
}

impl Drop for DeviceInner {
    fn drop(self: &mut DeviceInner) {
        // SAFETY:
        // DeviceInner is only constructed with a valid gbm_device, and every surface holds a
        // reference to it, so none outlive this call.
        unsafe {
            (self.lib.gbm_device_destroy)(self.gbm);
        }
    }
}

/// A GBM device created on a duplicate of the card descriptor.
#[derive(Clone)]
pub struct Device(Rc<DeviceInner>);

impl Device {
    pub fn new(card: &Card) -> Result<Device> {
        let lib = Gbm::load().map_err(Error::Load)?;
        let fd = card.try_clone_file()?;
        // SAFETY:
        // gbm_create_device is safe to call with a valid fd, and we check that a valid one is
        // returned.
        let gbm = unsafe { (lib.gbm_create_device)(fd.as_raw_fd()) };
        if gbm.is_null() {
            return Err(Error::CreateGbmDevice);
        }
        Ok(Device(Rc::new(DeviceInner { _fd: fd, gbm, lib })))
    }

    /// Copies and returns name of GBM backend.
    pub fn backend_name(&self) -> String {
        // SAFETY:
        // The device is valid; the returned string is static within libgbm and checked for null.
        let name = unsafe { (self.0.lib.gbm_device_get_backend_name)(self.0.gbm) };
        if name.is_null() {
            return String::new();
        }
        // SAFETY:
        // Non-null backend names are nul terminated.
        let c_str = unsafe { CStr::from_ptr(name) };
        c_str.to_string_lossy().into_owned()
    }

    pub fn is_format_supported(&self, format: Format, usage: Flags) -> bool {
        // SAFETY:
        // The device is valid and the call only reads its arguments.
        unsafe { (self.0.lib.gbm_device_is_format_supported)(self.0.gbm, format.0, usage.0) != 0 }
    }

    /// The raw device, used as the EGL native display.
    pub fn as_raw(&self) -> *mut c_void {
        self.0.gbm as *mut c_void
    }
}

/// A swapchain-like set of buffers that EGL renders into and KMS scans out from.
pub struct Surface {
    surface: *mut gbm_surface,
    device: Device,
}

impl Surface {
    pub fn new(
        device: &Device,
        width: u32,
        height: u32,
        format: Format,
        usage: Flags,
    ) -> Result<Surface> {
        // SAFETY:
        // Only a valid gbm_device is used and the return value is checked.
        let surface = unsafe {
            (device.0.lib.gbm_surface_create)(device.0.gbm, width, height, format.0, usage.0)
        };
        if surface.is_null() {
            return Err(Error::CreateGbmSurface { width, height });
        }
        Ok(Surface {
            surface,
            device: device.clone(),
        })
    }

    fn lib(&self) -> &Gbm {
        &self.device.0.lib
    }

    /// The raw surface, used as the EGL native window.
    pub fn as_raw(&self) -> *mut c_void {
        self.surface as *mut c_void
    }

    pub fn has_free_buffers(&self) -> bool {
        // SAFETY:
        // The surface is valid for the lifetime of self.
        unsafe { (self.lib().gbm_surface_has_free_buffers)(self.surface) != 0 }
    }

    /// Locks the buffer produced by the most recent `eglSwapBuffers`.
    ///
    /// The buffer goes back to the surface when the returned guard is dropped, so keep it alive
    /// while it is being scanned out.
    pub fn lock_front_buffer(&self) -> Result<LockedBuffer> {
        // SAFETY:
        // The surface is valid; a null return means no buffer was swapped in.
        let bo = unsafe { (self.lib().gbm_surface_lock_front_buffer)(self.surface) };
        if bo.is_null() {
            return Err(Error::LockFrontBuffer);
        }
        Ok(LockedBuffer { bo, surface: self })
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY:
        // Locked buffers borrow the surface, so none are outstanding here.
        unsafe { (self.lib().gbm_surface_destroy)(self.surface) }
    }
}

/// A front buffer locked out of a `Surface`.
pub struct LockedBuffer<'s> {
    bo: *mut gbm_bo,
    surface: &'s Surface,
}

impl<'s> LockedBuffer<'s> {
    pub(crate) fn lib(&self) -> &Gbm {
        self.surface.lib()
    }

    pub(crate) fn as_raw(&self) -> *mut gbm_bo {
        self.bo
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        // SAFETY:
        // This is always safe to call with a valid gbm_bo pointer.
        unsafe { (self.lib().gbm_bo_get_width)(self.bo) }
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        // SAFETY:
        // This is always safe to call with a valid gbm_bo pointer.
        unsafe { (self.lib().gbm_bo_get_height)(self.bo) }
    }

    /// Length in bytes of one row of the buffer.
    pub fn stride(&self) -> u32 {
        // SAFETY:
        // This is always safe to call with a valid gbm_bo pointer.
        unsafe { (self.lib().gbm_bo_get_stride)(self.bo) }
    }

    /// `Format` of the buffer.
    pub fn format(&self) -> Format {
        // SAFETY:
        // This is always safe to call with a valid gbm_bo pointer.
        Format(unsafe { (self.lib().gbm_bo_get_format)(self.bo) })
    }

    /// The GEM handle of the buffer on the card.
    pub fn handle(&self) -> u32 {
        // SAFETY:
        // This is always safe to call with a valid gbm_bo pointer, and the u32 member is the one
        // libdrm expects for drmModeAddFB.
        unsafe { (self.lib().gbm_bo_get_handle)(self.bo).u32 }
    }
}

impl<'s> Drop for LockedBuffer<'s> {
    fn drop(&mut self) {
        // SAFETY:
        // The buffer was locked from this surface and is released exactly once.
        unsafe { (self.lib().gbm_surface_release_buffer)(self.surface.surface, self.bo) }
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Write;

    use super::*;

    #[test]
    fn format_debug() {
        let f = Format::new(b'X', b'R', b'2', b'4');
        let mut buf = String::new();
        write!(&mut buf, "{:?}", f).unwrap();
        assert_eq!(buf, "fourcc(XR24)");

        let f = Format::new(0, 1, 2, 16);
        let mut buf = String::new();
        write!(&mut buf, "{:?}", f).unwrap();
        assert_eq!(buf, "fourcc(0x00010210)");
    }

    #[test]
    fn xrgb8888_matches_drm_fourcc() {
        // DRM_FORMAT_XRGB8888 from drm_fourcc.h.
        assert_eq!(u32::from(Format::XRGB8888), 0x3432_5258);
        assert_eq!(Format::XRGB8888.to_bytes(), *b"XR24");
    }

    #[test]
    fn flags_toggle() {
        let flags = Flags::empty().use_scanout(true).use_rendering(true);
        assert_eq!(flags.bits(), GBM_BO_USE_SCANOUT | GBM_BO_USE_RENDERING);
        assert_eq!(flags.use_scanout(false).bits(), GBM_BO_USE_RENDERING);
    }

    #[test]
    #[ignore] // no access to /dev/dri
    fn create_surface() {
        let card = Card::open("/dev/dri/card1").expect("failed to open card");
        let device = Device::new(&card).expect("failed to create device with card");
        let surface = Surface::new(
            &device,
            640,
            480,
            Format::XRGB8888,
            Flags::empty().use_scanout(true).use_rendering(true),
        )
        .expect("failed to create surface");
        assert!(surface.has_free_buffers());
        assert!(!device.backend_name().is_empty());
    }
}

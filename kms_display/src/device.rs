// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fs::File;
use std::fs::OpenOptions;
use std::os::raw::c_int;
use std::os::raw::c_void;
use std::os::unix::io::AsRawFd;
use std::os::unix::io::RawFd;
use std::path::Path;
use std::rc::Rc;
use std::slice;

use base::debug;
use base::info;
use base::warn;

use crate::flip::FlipDevice;
use crate::mode::choose_crtc;
use crate::mode::select_connector;
use crate::mode::select_mode;
use crate::mode::ConnectorInfo;
use crate::mode::DisplayTarget;
use crate::mode::EncoderInfo;
use crate::mode::ModeInfo;
use crate::mode::ResourcesInfo;
use crate::raw::drm::*;
use crate::Error;
use crate::Result;

/// Frees a libdrm allocation when dropped.
struct DrmObject<T> {
    ptr: *mut T,
    free: unsafe extern "C" fn(*mut T),
}

impl<T> DrmObject<T> {
    fn new(ptr: *mut T, free: unsafe extern "C" fn(*mut T)) -> Option<DrmObject<T>> {
        if ptr.is_null() {
            None
        } else {
            Some(DrmObject { ptr, free })
        }
    }

    fn get(&self) -> &T {
        // SAFETY:
        // The pointer is non-null and owned by this guard until drop.
        unsafe { &*self.ptr }
    }
}

impl<T> Drop for DrmObject<T> {
    fn drop(&mut self) {
        // SAFETY:
        // The pointer came from the matching drmModeGet* call and is freed exactly once.
        unsafe { (self.free)(self.ptr) }
    }
}

/// Views a libdrm array as a slice, treating null or negative counts as empty.
///
/// # Safety
///
/// When non-null, `ptr` must point to at least `count` initialised elements that outlive `'a`.
unsafe fn raw_slice<'a, T>(ptr: *const T, count: c_int) -> &'a [T] {
    if ptr.is_null() || count <= 0 {
        &[]
    } else {
        slice::from_raw_parts(ptr, count as usize)
    }
}

/// The CRTC configuration found before this process took over the output.
#[derive(Copy, Clone, Debug)]
pub struct SavedCrtc {
    crtc_id: u32,
    buffer_id: u32,
    x: u32,
    y: u32,
    mode: Option<drmModeModeInfo>,
}

impl SavedCrtc {
    pub fn crtc_id(&self) -> u32 {
        self.crtc_id
    }
}

/// An open DRM card node, e.g. `/dev/dri/card1`.
pub struct Card {
    file: File,
    drm: Rc<Drm>,
}

impl Card {
    /// Opens the card read/write and binds libdrm.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Card> {
        let path = path.as_ref().to_path_buf();
        let drm = Drm::load().map_err(Error::Load)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| Error::OpenDevice {
                path: path.clone(),
                source,
            })?;
        debug!("opened drm device {}", path.display());
        Ok(Card {
            file,
            drm: Rc::new(drm),
        })
    }

    pub(crate) fn drm(&self) -> &Rc<Drm> {
        &self.drm
    }

    /// Duplicates the card descriptor for objects that must own one, like the GBM device.
    pub fn try_clone_file(&self) -> Result<File> {
        self.file.try_clone().map_err(Error::DupDescriptor)
    }

    /// Lists the connectors, encoders and CRTCs of the card.
    pub fn resources(&self) -> Result<ResourcesInfo> {
        // SAFETY:
        // The descriptor is a valid open DRM node; the result is checked for null.
        let ptr = unsafe { (self.drm.drmModeGetResources)(self.as_raw_fd()) };
        let res = DrmObject::new(ptr, self.drm.drmModeFreeResources)
            .ok_or_else(|| Error::GetResources(base::Error::last()))?;
        let res = res.get();
        // SAFETY:
        // libdrm sizes each array with the matching count, and the guard outlives the copies.
        unsafe {
            Ok(ResourcesInfo {
                connectors: raw_slice(res.connectors, res.count_connectors).to_vec(),
                encoders: raw_slice(res.encoders, res.count_encoders).to_vec(),
                crtcs: raw_slice(res.crtcs, res.count_crtcs).to_vec(),
            })
        }
    }

    pub fn connector(&self, id: u32) -> Result<ConnectorInfo> {
        // SAFETY:
        // The descriptor is a valid open DRM node; the result is checked for null.
        let ptr = unsafe { (self.drm.drmModeGetConnector)(self.as_raw_fd(), id) };
        let conn = DrmObject::new(ptr, self.drm.drmModeFreeConnector)
            .ok_or_else(|| Error::GetConnector(id, base::Error::last()))?;
        let conn = conn.get();
        // SAFETY:
        // libdrm sizes each array with the matching count, and the guard outlives the copies.
        let (modes, encoders) = unsafe {
            (
                raw_slice(conn.modes, conn.count_modes)
                    .iter()
                    .map(|m| ModeInfo(*m))
                    .collect(),
                raw_slice(conn.encoders, conn.count_encoders).to_vec(),
            )
        };
        Ok(ConnectorInfo {
            id: conn.connector_id,
            encoder_id: conn.encoder_id,
            connected: ConnectorInfo::is_connected(conn.connection),
            modes,
            encoders,
        })
    }

    pub fn encoder(&self, id: u32) -> Result<EncoderInfo> {
        // SAFETY:
        // The descriptor is a valid open DRM node; the result is checked for null.
        let ptr = unsafe { (self.drm.drmModeGetEncoder)(self.as_raw_fd(), id) };
        let enc = DrmObject::new(ptr, self.drm.drmModeFreeEncoder)
            .ok_or_else(|| Error::GetEncoder(id, base::Error::last()))?;
        let enc = enc.get();
        Ok(EncoderInfo {
            id: enc.encoder_id,
            crtc_id: enc.crtc_id,
            possible_crtcs: enc.possible_crtcs,
        })
    }

    /// Picks a connector, its mode and a CRTC to scan out from.
    ///
    /// Objects that vanish between listing and querying (hotplug) are skipped with a warning.
    pub fn probe(&self, wanted_connector: Option<u32>) -> Result<DisplayTarget> {
        let resources = self.resources()?;
        debug!(
            "{} connectors, {} encoders, {} crtcs",
            resources.connectors.len(),
            resources.encoders.len(),
            resources.crtcs.len()
        );

        let connectors: Vec<ConnectorInfo> = resources
            .connectors
            .iter()
            .filter_map(|id| match self.connector(*id) {
                Ok(c) => Some(c),
                Err(e) => {
                    warn!("skipping connector: {}", e);
                    None
                }
            })
            .collect();
        let connector = select_connector(&connectors, wanted_connector)?;
        let mode = select_mode(connector)?;

        let encoders: Vec<EncoderInfo> = resources
            .encoders
            .iter()
            .filter_map(|id| match self.encoder(*id) {
                Ok(e) => Some(e),
                Err(e) => {
                    warn!("skipping encoder: {}", e);
                    None
                }
            })
            .collect();
        let crtc_id = choose_crtc(&resources, connector, &encoders)?;

        info!(
            "using connector {} crtc {} mode {} ({:?})",
            connector.id,
            crtc_id,
            mode.name(),
            mode
        );
        Ok(DisplayTarget {
            connector_id: connector.id,
            crtc_id,
            mode,
        })
    }

    /// Records the current configuration of `crtc_id` so it can be put back on exit.
    pub fn save_crtc(&self, crtc_id: u32) -> Result<SavedCrtc> {
        // SAFETY:
        // The descriptor is a valid open DRM node; the result is checked for null.
        let ptr = unsafe { (self.drm.drmModeGetCrtc)(self.as_raw_fd(), crtc_id) };
        let crtc = DrmObject::new(ptr, self.drm.drmModeFreeCrtc)
            .ok_or_else(|| Error::GetCrtc(crtc_id, base::Error::last()))?;
        let crtc = crtc.get();
        Ok(SavedCrtc {
            crtc_id: crtc.crtc_id,
            buffer_id: crtc.buffer_id,
            x: crtc.x,
            y: crtc.y,
            mode: if crtc.mode_valid != 0 {
                Some(crtc.mode)
            } else {
                None
            },
        })
    }

    /// Reinstates a configuration captured by `save_crtc` on `connector_id`.
    pub fn restore_crtc(&self, saved: &SavedCrtc, connector_id: u32) -> Result<()> {
        let mode = match saved.mode {
            Some(mode) => mode,
            None => {
                debug!("crtc {} had no mode to restore", saved.crtc_id);
                return Ok(());
            }
        };
        self.set_crtc_raw(
            saved.crtc_id,
            saved.buffer_id,
            saved.x,
            saved.y,
            connector_id,
            mode,
        )
    }

    /// Programs `target` to scan out `fb_id`.
    pub fn set_crtc(&self, target: &DisplayTarget, fb_id: u32) -> Result<()> {
        self.set_crtc_raw(
            target.crtc_id,
            fb_id,
            0,
            0,
            target.connector_id,
            target.mode.0,
        )
    }

    fn set_crtc_raw(
        &self,
        crtc_id: u32,
        fb_id: u32,
        x: u32,
        y: u32,
        connector_id: u32,
        mut mode: drmModeModeInfo,
    ) -> Result<()> {
        let mut connector_id = connector_id;
        // SAFETY:
        // The connector id and mode are valid for the duration of the call; libdrm copies them
        // into the ioctl payload. The return value is checked.
        let ret = unsafe {
            (self.drm.drmModeSetCrtc)(
                self.as_raw_fd(),
                crtc_id,
                fb_id,
                x,
                y,
                &mut connector_id,
                1,
                &mut mode,
            )
        };
        if ret != 0 {
            return Err(Error::SetCrtc(base::Error::last()));
        }
        Ok(())
    }
}

impl FlipDevice for Card {
    fn page_flip(&self, crtc_id: u32, fb_id: u32, user_data: *mut c_void) -> Result<()> {
        // SAFETY:
        // The descriptor is valid; user_data is only dereferenced by our own handler, whose
        // caller guarantees it stays alive until the event is dispatched.
        let ret = unsafe {
            (self.drm.drmModePageFlip)(
                self.as_raw_fd(),
                crtc_id,
                fb_id,
                DRM_MODE_PAGE_FLIP_EVENT,
                user_data,
            )
        };
        if ret != 0 {
            return Err(Error::PageFlip(base::Error::last()));
        }
        Ok(())
    }

    fn handle_event(&self, ctx: &mut drmEventContext) -> Result<()> {
        // SAFETY:
        // ctx is a valid event context whose handlers match the libdrm prototypes.
        let ret = unsafe { (self.drm.drmHandleEvent)(self.as_raw_fd(), ctx) };
        if ret != 0 {
            return Err(Error::HandleEvent(base::Error::last()));
        }
        Ok(())
    }
}

impl AsRawFd for Card {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn raw_slice_handles_empty() {
        // SAFETY: null pointers are never dereferenced.
        let empty: &[u32] = unsafe { raw_slice(std::ptr::null(), 3) };
        assert!(empty.is_empty());
        let data = [1u32, 2, 3];
        // SAFETY: data has three elements.
        assert!(unsafe { raw_slice(data.as_ptr(), -1) }.is_empty());
        // SAFETY: data has three elements.
        assert_eq!(unsafe { raw_slice(data.as_ptr(), 2) }, &[1, 2]);
    }

    #[test]
    #[ignore] // no access to /dev/dri
    fn open_and_probe() {
        let card = Card::open("/dev/dri/card1").expect("failed to open card");
        let target = card.probe(None).expect("failed to probe outputs");
        assert!(target.mode.hdisplay() > 0);
    }

    #[test]
    fn open_missing_device() {
        match Card::open("/nonexistent/dri/card9") {
            // Hosts without libdrm fail before touching the path.
            Err(Error::Load(_)) => {}
            Err(Error::OpenDevice { path, .. }) => {
                assert_eq!(path, PathBuf::from("/nonexistent/dri/card9"))
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("opening a missing device must fail"),
        }
    }
}

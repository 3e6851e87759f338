// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Output selection over plain snapshots of the DRM mode-setting objects.
//!
//! Everything here is free of FFI so the policy for picking a connector, a mode and a CRTC can be
//! exercised without a display.

use std::ffi::CStr;
use std::fmt;

use crate::raw::drm::drmModeModeInfo;
use crate::raw::drm::DRM_MODE_CONNECTED;
use crate::raw::drm::DRM_MODE_TYPE_PREFERRED;
use crate::Error;
use crate::Result;

/// A display timing, kept verbatim so it can be handed back to `drmModeSetCrtc`.
#[derive(Copy, Clone)]
pub struct ModeInfo(pub(crate) drmModeModeInfo);

impl ModeInfo {
    /// Visible width in pixels.
    pub fn hdisplay(&self) -> u16 {
        self.0.hdisplay
    }

    /// Visible height in pixels.
    pub fn vdisplay(&self) -> u16 {
        self.0.vdisplay
    }

    /// Refresh rate in Hz.
    pub fn vrefresh(&self) -> u32 {
        self.0.vrefresh
    }

    pub fn is_preferred(&self) -> bool {
        self.0.type_ & DRM_MODE_TYPE_PREFERRED != 0
    }

    /// Number of visible pixels.
    pub fn area(&self) -> u64 {
        u64::from(self.0.hdisplay) * u64::from(self.0.vdisplay)
    }

    /// The mode name reported by the kernel, e.g. `1920x1080`.
    pub fn name(&self) -> String {
        // The kernel always nul terminates the name, but do not trust it blindly.
        let bytes: Vec<u8> = self
            .0
            .name
            .iter()
            .map(|&c| c as u8)
            .chain(std::iter::once(0))
            .collect();
        CStr::from_bytes_until_nul(&bytes)
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn for_test(hdisplay: u16, vdisplay: u16, preferred: bool) -> ModeInfo {
        // SAFETY:
        // drmModeModeInfo is plain old data; all zeroes is a valid value.
        let mut raw: drmModeModeInfo = unsafe { std::mem::zeroed() };
        raw.hdisplay = hdisplay;
        raw.vdisplay = vdisplay;
        raw.vrefresh = 60;
        if preferred {
            raw.type_ = DRM_MODE_TYPE_PREFERRED;
        }
        ModeInfo(raw)
    }
}

impl fmt::Debug for ModeInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}x{}@{}{}",
            self.hdisplay(),
            self.vdisplay(),
            self.vrefresh(),
            if self.is_preferred() { " (preferred)" } else { "" }
        )
    }
}

#[derive(Clone, Debug)]
pub struct ConnectorInfo {
    pub id: u32,
    /// Encoder currently driving this connector, 0 if none.
    pub encoder_id: u32,
    pub connected: bool,
    pub modes: Vec<ModeInfo>,
    /// Encoders that can drive this connector.
    pub encoders: Vec<u32>,
}

impl ConnectorInfo {
    pub(crate) fn is_connected(connection: u32) -> bool {
        connection == DRM_MODE_CONNECTED
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EncoderInfo {
    pub id: u32,
    /// CRTC currently bound to this encoder, 0 if none.
    pub crtc_id: u32,
    /// Bitmask over the indices of `ResourcesInfo::crtcs`.
    pub possible_crtcs: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourcesInfo {
    pub connectors: Vec<u32>,
    pub encoders: Vec<u32>,
    pub crtcs: Vec<u32>,
}

/// The output picked for scanout.
#[derive(Copy, Clone, Debug)]
pub struct DisplayTarget {
    pub connector_id: u32,
    pub crtc_id: u32,
    pub mode: ModeInfo,
}

/// Picks the connector to drive.
///
/// With `wanted` set, only that connector is accepted, and it must be connected. Otherwise the
/// first connected connector wins.
pub fn select_connector(
    connectors: &[ConnectorInfo],
    wanted: Option<u32>,
) -> Result<&ConnectorInfo> {
    match wanted {
        Some(id) => connectors
            .iter()
            .find(|c| c.id == id && c.connected)
            .ok_or(Error::ConnectorUnavailable(id)),
        None => connectors
            .iter()
            .find(|c| c.connected)
            .ok_or(Error::NoConnectedConnector),
    }
}

/// Picks the scanout mode in a single pass over the connector's list.
///
/// A preferred mode replaces the current pick, and so does any mode larger than the largest seen
/// so far. The largest area only advances on size, so a preferred mode listed after a larger one
/// still wins, while a larger mode listed after the preferred one takes over.
pub fn select_mode(connector: &ConnectorInfo) -> Result<ModeInfo> {
    let mut best: Option<&ModeInfo> = None;
    let mut largest = 0;
    for mode in &connector.modes {
        if mode.is_preferred() {
            best = Some(mode);
        }
        if mode.area() > largest {
            best = Some(mode);
            largest = mode.area();
        }
    }
    best.copied().ok_or(Error::NoMode(connector.id))
}

/// Returns the first CRTC the encoder can drive.
pub fn find_crtc_for_encoder(resources: &ResourcesInfo, encoder: &EncoderInfo) -> Option<u32> {
    resources
        .crtcs
        .iter()
        .enumerate()
        .take(32)
        .find(|(index, _)| encoder.possible_crtcs & (1 << index) != 0)
        .map(|(_, crtc_id)| *crtc_id)
}

/// Walks the connector's possible encoders in order and returns the first usable CRTC.
pub fn find_crtc_for_connector(
    resources: &ResourcesInfo,
    connector: &ConnectorInfo,
    encoders: &[EncoderInfo],
) -> Option<u32> {
    connector
        .encoders
        .iter()
        .filter_map(|id| encoders.iter().find(|e| e.id == *id))
        .find_map(|encoder| find_crtc_for_encoder(resources, encoder))
}

/// Keeps the CRTC already lit for this connector when there is one, otherwise searches.
pub fn choose_crtc(
    resources: &ResourcesInfo,
    connector: &ConnectorInfo,
    encoders: &[EncoderInfo],
) -> Result<u32> {
    let current = encoders
        .iter()
        .find(|e| e.id == connector.encoder_id && connector.encoder_id != 0)
        .map(|e| e.crtc_id)
        .filter(|crtc| *crtc != 0);
    current
        .or_else(|| find_crtc_for_connector(resources, connector, encoders))
        .ok_or(Error::NoCrtc(connector.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector(id: u32, connected: bool, modes: Vec<ModeInfo>) -> ConnectorInfo {
        ConnectorInfo {
            id,
            encoder_id: 0,
            connected,
            modes,
            encoders: vec![],
        }
    }

    fn resources() -> ResourcesInfo {
        ResourcesInfo {
            connectors: vec![30, 31],
            encoders: vec![40, 41],
            crtcs: vec![50, 51, 52],
        }
    }

    #[test]
    fn first_connected_connector() {
        let connectors = vec![
            connector(30, false, vec![]),
            connector(31, true, vec![]),
            connector(32, true, vec![]),
        ];
        assert_eq!(select_connector(&connectors, None).unwrap().id, 31);
    }

    #[test]
    fn wanted_connector_must_be_connected() {
        let connectors = vec![connector(30, false, vec![]), connector(31, true, vec![])];
        assert_eq!(select_connector(&connectors, Some(31)).unwrap().id, 31);
        assert!(matches!(
            select_connector(&connectors, Some(30)),
            Err(Error::ConnectorUnavailable(30))
        ));
        assert!(matches!(
            select_connector(&connectors, Some(99)),
            Err(Error::ConnectorUnavailable(99))
        ));
    }

    #[test]
    fn no_connected_connector() {
        let connectors = vec![connector(30, false, vec![])];
        assert!(matches!(
            select_connector(&connectors, None),
            Err(Error::NoConnectedConnector)
        ));
    }

    #[test]
    fn preferred_mode_after_larger_wins() {
        let c = connector(
            31,
            true,
            vec![
                ModeInfo::for_test(3840, 2160, false),
                ModeInfo::for_test(1920, 1080, true),
                ModeInfo::for_test(1280, 720, false),
            ],
        );
        let mode = select_mode(&c).unwrap();
        assert_eq!((mode.hdisplay(), mode.vdisplay()), (1920, 1080));
    }

    #[test]
    fn larger_mode_after_preferred_wins() {
        let c = connector(
            31,
            true,
            vec![
                ModeInfo::for_test(1920, 1080, true),
                ModeInfo::for_test(3840, 2160, false),
                ModeInfo::for_test(1280, 720, false),
            ],
        );
        let mode = select_mode(&c).unwrap();
        assert_eq!((mode.hdisplay(), mode.vdisplay()), (3840, 2160));
    }

    #[test]
    fn largest_mode_without_preference() {
        let c = connector(
            31,
            true,
            vec![
                ModeInfo::for_test(800, 480, false),
                ModeInfo::for_test(1024, 768, false),
                ModeInfo::for_test(768, 1024, false),
            ],
        );
        let mode = select_mode(&c).unwrap();
        assert_eq!((mode.hdisplay(), mode.vdisplay()), (1024, 768));
    }

    #[test]
    fn no_modes() {
        let c = connector(31, true, vec![]);
        assert!(matches!(select_mode(&c), Err(Error::NoMode(31))));
    }

    #[test]
    fn crtc_from_possible_mask() {
        let encoder = EncoderInfo {
            id: 40,
            crtc_id: 0,
            possible_crtcs: 0b110,
        };
        assert_eq!(find_crtc_for_encoder(&resources(), &encoder), Some(51));

        let encoder = EncoderInfo {
            possible_crtcs: 0b1000,
            ..encoder
        };
        assert_eq!(find_crtc_for_encoder(&resources(), &encoder), None);
    }

    #[test]
    fn current_crtc_is_kept() {
        let mut c = connector(31, true, vec![]);
        c.encoder_id = 41;
        c.encoders = vec![40, 41];
        let encoders = [
            EncoderInfo {
                id: 40,
                crtc_id: 0,
                possible_crtcs: 0b001,
            },
            EncoderInfo {
                id: 41,
                crtc_id: 52,
                possible_crtcs: 0b100,
            },
        ];
        assert_eq!(choose_crtc(&resources(), &c, &encoders).unwrap(), 52);
    }

    #[test]
    fn unbound_encoder_falls_back_to_search() {
        let mut c = connector(31, true, vec![]);
        c.encoder_id = 41;
        c.encoders = vec![41, 40];
        let encoders = [
            EncoderInfo {
                id: 40,
                crtc_id: 0,
                possible_crtcs: 0b001,
            },
            EncoderInfo {
                id: 41,
                crtc_id: 0,
                possible_crtcs: 0b010,
            },
        ];
        assert_eq!(choose_crtc(&resources(), &c, &encoders).unwrap(), 51);
    }

    #[test]
    fn no_crtc() {
        let mut c = connector(31, true, vec![]);
        c.encoders = vec![40];
        let encoders = [EncoderInfo {
            id: 40,
            crtc_id: 0,
            possible_crtcs: 0,
        }];
        assert!(matches!(
            choose_crtc(&resources(), &c, &encoders),
            Err(Error::NoCrtc(31))
        ));
    }

    #[test]
    fn mode_name_and_debug() {
        let mut mode = ModeInfo::for_test(480, 272, true);
        for (dst, src) in mode.0.name.iter_mut().zip(b"480x272".iter()) {
            *dst = *src as _;
        }
        assert_eq!(mode.name(), "480x272");
        assert_eq!(format!("{:?}", mode), "480x272@60 (preferred)");
    }
}

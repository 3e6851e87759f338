// Copyright 2022 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Drives the cube animation from the first modeset to the restored console.

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use anyhow::Context;
use anyhow::Result;
use base::debug;
use base::info;
use base::warn;
use gles_cube::CubeRenderer;
use gles_cube::Egl;
use gles_cube::EglContext;
use gles_cube::EglOptions;
use gles_cube::Gles;
use gles_cube::Rotation;
use gles_cube::TextureImage;
use gles_cube::Viewport;
use kms_display::framebuffer_id;
use kms_display::gbm;
use kms_display::gbm::LockedBuffer;
use kms_display::Card;
use kms_display::DisplayTarget;
use kms_display::FlipOutcome;
use kms_display::Scanout;

use crate::config::Config;

const CLEAR_GREY: [f32; 4] = [0.5, 0.5, 0.5, 1.0];
const CLEAR_READY: [f32; 4] = [0.0, 0.6, 0.3, 1.0];
const CLEAR_BLACK: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Why the animation stopped.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// SIGINT or SIGTERM was received.
    Signal,
    /// Input arrived on stdin.
    UserInterrupt,
    /// The configured number of frames was presented.
    FrameLimit,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StopReason::Signal => write!(f, "stop signal received"),
            StopReason::UserInterrupt => write!(f, "user interrupted"),
            StopReason::FrameLimit => write!(f, "frame limit reached"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    /// Animation frames presented, not counting the setup and teardown frames.
    pub frames: u64,
    pub reason: StopReason,
}

/// Periodic progress log.
struct Reporter {
    interval: Option<Duration>,
    since: Instant,
    frames_since: u64,
}

impl Reporter {
    fn new(interval: Option<Duration>, now: Instant) -> Reporter {
        Reporter {
            interval,
            since: now,
            frames_since: 0,
        }
    }

    /// Counts one frame and returns the frame rate since the last report when one is due.
    fn frame(&mut self, now: Instant) -> Option<f64> {
        let interval = self.interval?;
        self.frames_since += 1;
        let elapsed = now.saturating_duration_since(self.since);
        if elapsed < interval {
            return None;
        }
        let fps = self.frames_since as f64 / elapsed.as_secs_f64();
        self.since = now;
        self.frames_since = 0;
        Some(fps)
    }
}

/// What the render loop needs from the display stack.
struct Output<'a> {
    card: &'a Card,
    surface: &'a gbm::Surface,
    egl: &'a EglContext<'a>,
    flip_timeout: Duration,
}

impl<'a> Output<'a> {
    /// Takes the frame just rendered, queues it for the next vblank and waits until it is shown.
    fn flip(&self, scanout: &mut Scanout) -> Result<(LockedBuffer<'a>, FlipOutcome)> {
        self.egl.swap_buffers()?;
        let buffer = self.surface.lock_front_buffer()?;
        let fb_id = framebuffer_id(self.card, &buffer)?;
        Ok(scanout.show(fb_id, buffer, self.flip_timeout)?)
    }
}

/// Checks the stop conditions in priority order before the next frame is drawn.
fn stop_reason(
    outcome: FlipOutcome,
    stop_requested: bool,
    frames: u64,
    frame_limit: Option<u64>,
) -> Option<StopReason> {
    if outcome == FlipOutcome::Interrupted {
        Some(StopReason::UserInterrupt)
    } else if stop_requested {
        Some(StopReason::Signal)
    } else if frame_limit.map_or(false, |limit| frames >= limit) {
        Some(StopReason::FrameLimit)
    } else {
        None
    }
}

/// Runs the animation until `stop` is set, the user interrupts it or the frame limit is reached.
pub fn run(cfg: &Config, stop: &AtomicBool) -> Result<RunSummary> {
    let card = Card::open(&cfg.device)?;
    let target = card
        .probe(cfg.connector)
        .with_context(|| format!("no usable display on {}", cfg.device.display()))?;
    let saved = card.save_crtc(target.crtc_id)?;

    let width = u32::from(target.mode.hdisplay());
    let height = u32::from(target.mode.vdisplay());
    let device = gbm::Device::new(&card).context("failed to create gbm device")?;
    debug!("gbm backend: {}", device.backend_name());
    let usage = gbm::Flags::empty().use_scanout(true).use_rendering(true);
    if !device.is_format_supported(gbm::Format::XRGB8888, usage) {
        warn!("gbm reports XRGB8888 scanout as unsupported, trying anyway");
    }
    let surface = gbm::Surface::new(&device, width, height, gbm::Format::XRGB8888, usage)?;

    let egl = Egl::load()?;
    let gl = Gles::load()?;
    let options = EglOptions {
        native_visual_id: Some(u32::from(gbm::Format::XRGB8888)),
        depth_bits: cfg.depth_bits,
    };
    // SAFETY:
    // `device` and `surface` are declared before the context and so outlive it.
    let egl_ctx = unsafe { EglContext::new(&egl, device.as_raw(), surface.as_raw(), &options) }
        .context("failed to set up egl")?;

    let output = Output {
        card: &card,
        surface: &surface,
        egl: &egl_ctx,
        flip_timeout: cfg.flip_timeout(),
    };
    let result = animate(&output, &target, &gl, cfg, stop);

    if cfg.restore_crtc {
        match card.restore_crtc(&saved, target.connector_id) {
            Ok(()) => debug!("restored crtc {}", saved.crtc_id()),
            Err(e) => warn!("failed to restore crtc {}: {}", saved.crtc_id(), e),
        }
    }
    result
}

fn animate(
    output: &Output,
    target: &DisplayTarget,
    gl: &Gles,
    cfg: &Config,
    stop: &AtomicBool,
) -> Result<RunSummary> {
    let viewport = Viewport::centered(
        u32::from(target.mode.hdisplay()),
        u32::from(target.mode.vdisplay()),
        cfg.width,
        cfg.height,
    );
    if (viewport.width, viewport.height) != (cfg.width, cfg.height) {
        warn!(
            "viewport {}x{} does not fit the screen, clamped to {}x{}",
            cfg.width, cfg.height, viewport.width, viewport.height
        );
    }
    let renderer = CubeRenderer::new(gl, viewport, &TextureImage::default())
        .context("failed to set up the cube renderer")?;

    renderer.clear(CLEAR_GREY);
    output.egl.swap_buffers()?;
    let mut front = output.surface.lock_front_buffer()?;
    let fb_id = framebuffer_id(output.card, &front)?;
    output
        .card
        .set_crtc(target, fb_id)
        .context("failed to set the display mode")?;

    let mut scanout = Scanout::new(output.card, target.crtc_id, cfg.stdin_interrupt)?;

    renderer.clear(CLEAR_READY);
    let (buffer, mut outcome) = output.flip(&mut scanout)?;
    drop(std::mem::replace(&mut front, buffer));
    info!("display ready");

    let mut rotation = Rotation::default();
    let mut frames = 0;
    let mut reporter = Reporter::new(cfg.report_interval(), Instant::now());
    let reason = loop {
        let stop_requested = stop.load(Ordering::SeqCst);
        if let Some(reason) = stop_reason(outcome, stop_requested, frames, cfg.frames) {
            break reason;
        }

        renderer.draw(&rotation)?;
        let (buffer, flip_outcome) = output.flip(&mut scanout)?;
        drop(std::mem::replace(&mut front, buffer));
        outcome = flip_outcome;
        frames += 1;
        rotation.advance();
        if let Some(fps) = reporter.frame(Instant::now()) {
            info!("{} frames presented, {:.1} fps", frames, fps);
        }
    };

    renderer.clear(CLEAR_BLACK);
    let (buffer, _) = output.flip(&mut scanout)?;
    drop(std::mem::replace(&mut front, buffer));

    Ok(RunSummary { frames, reason })
}

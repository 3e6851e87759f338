// Copyright 2022 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Command line and configuration file handling.

use std::fs::File;
use std::io;
use std::io::BufReader;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use argh::FromArgs;
use base::syslog::LogConfig;
use remain::sorted;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error as ThisError;

const DEFAULT_DEVICE: &str = "/dev/dri/card1";
const DEFAULT_WIDTH: u32 = 480;
const DEFAULT_HEIGHT: u32 = 272;
const DEFAULT_FLIP_TIMEOUT_MS: u64 = 1000;
const DEFAULT_REPORT_INTERVAL_SECS: u64 = 10;
const DEFAULT_DEPTH_BITS: u32 = 16;

#[sorted]
#[derive(ThisError, Debug)]
pub enum Error {
    #[error("device path is empty")]
    EmptyDevicePath,
    #[error("failed to open config file {path}: {source}")]
    OpenFile { path: PathBuf, source: io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("flip timeout must be greater than zero")]
    ZeroFlipTimeout,
    #[error("viewport {width}x{height} has a zero dimension")]
    ZeroViewport { width: u32, height: u32 },
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(FromArgs, Debug, Default, PartialEq, Eq)]
/// Draws a spinning textured cube directly on a KMS display.
pub struct Args {
    /// JSON configuration file; options given on the command line take precedence
    #[argh(option, arg_name = "PATH")]
    pub cfg: Option<PathBuf>,
    /// DRM device node. (default: /dev/dri/card1)
    #[argh(option, arg_name = "PATH")]
    pub device: Option<PathBuf>,
    /// connector id to drive. (default: the first connected one)
    #[argh(option, arg_name = "ID")]
    pub connector: Option<u32>,
    /// width of the cube viewport in pixels. (default: 480)
    #[argh(option)]
    pub width: Option<u32>,
    /// height of the cube viewport in pixels. (default: 272)
    #[argh(option)]
    pub height: Option<u32>,
    /// stop after presenting this many frames. (default: run until interrupted)
    #[argh(option, arg_name = "N")]
    pub frames: Option<u64>,
    /// give up on a page flip after this many milliseconds. (default: 1000)
    #[argh(option, arg_name = "MS")]
    pub flip_timeout_ms: Option<u64>,
    /// seconds between progress reports, 0 disables them. (default: 10)
    #[argh(option, arg_name = "SECS")]
    pub report_interval: Option<u64>,
    /// depth buffer size to request, 0 for none. (default: 16)
    #[argh(option)]
    pub depth_bits: Option<u32>,
    /// do not stop when input arrives on stdin
    #[argh(switch)]
    pub ignore_stdin: bool,
    /// leave the cube's last frame on screen instead of restoring the previous mode
    #[argh(switch)]
    pub no_restore_crtc: bool,
    /// log filter, e.g. "debug" or "info,kms_display=trace". (default: info)
    #[argh(option, arg_name = "FILTER")]
    pub log_level: Option<String>,
    /// also append log records to this file
    #[argh(option, arg_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

/// Fully resolved settings of a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Config {
    pub device: PathBuf,
    pub connector: Option<u32>,
    pub width: u32,
    pub height: u32,
    pub frames: Option<u64>,
    pub flip_timeout_ms: u64,
    pub report_interval: u64,
    pub depth_bits: u32,
    pub stdin_interrupt: bool,
    pub restore_crtc: bool,
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            device: PathBuf::from(DEFAULT_DEVICE),
            connector: None,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            frames: None,
            flip_timeout_ms: DEFAULT_FLIP_TIMEOUT_MS,
            report_interval: DEFAULT_REPORT_INTERVAL_SECS,
            depth_bits: DEFAULT_DEPTH_BITS,
            stdin_interrupt: true,
            restore_crtc: true,
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Reads a configuration file. Keys missing from the file keep their defaults.
    pub fn load(path: &Path) -> Result<Config> {
        let file = File::open(path).map_err(|source| Error::OpenFile {
            path: path.to_owned(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| Error::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Builds the configuration from the file named by `--cfg`, if any, then the other options.
    pub fn from_args(args: Args) -> Result<Config> {
        let mut cfg = match &args.cfg {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        cfg.merge(args);
        cfg.validate()?;
        Ok(cfg)
    }

    /// Overrides values with the ones given on the command line.
    pub fn merge(&mut self, args: Args) {
        if let Some(device) = args.device {
            self.device = device;
        }
        if args.connector.is_some() {
            self.connector = args.connector;
        }
        if let Some(width) = args.width {
            self.width = width;
        }
        if let Some(height) = args.height {
            self.height = height;
        }
        if args.frames.is_some() {
            self.frames = args.frames;
        }
        if let Some(ms) = args.flip_timeout_ms {
            self.flip_timeout_ms = ms;
        }
        if let Some(secs) = args.report_interval {
            self.report_interval = secs;
        }
        if let Some(bits) = args.depth_bits {
            self.depth_bits = bits;
        }
        if args.ignore_stdin {
            self.stdin_interrupt = false;
        }
        if args.no_restore_crtc {
            self.restore_crtc = false;
        }
        if let Some(filter) = args.log_level {
            self.log.filter = filter;
        }
        if args.log_file.is_some() {
            self.log.log_file = args.log_file;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.device.as_os_str().is_empty() {
            return Err(Error::EmptyDevicePath);
        }
        if self.width == 0 || self.height == 0 {
            return Err(Error::ZeroViewport {
                width: self.width,
                height: self.height,
            });
        }
        if self.flip_timeout_ms == 0 {
            return Err(Error::ZeroFlipTimeout);
        }
        Ok(())
    }

    pub fn flip_timeout(&self) -> Duration {
        Duration::from_millis(self.flip_timeout_ms)
    }

    /// Time between progress reports, `None` when reporting is disabled.
    pub fn report_interval(&self) -> Option<Duration> {
        match self.report_interval {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn config_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("failed to create temp file");
        file.write_all(contents.as_bytes())
            .expect("failed to write config");
        file
    }

    fn parse(args: &[&str]) -> Args {
        Args::from_args(&["textured_cube"], args).expect("failed to parse args")
    }

    #[test]
    fn defaults() {
        let cfg = Config::from_args(Args::default()).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.device, PathBuf::from("/dev/dri/card1"));
        assert_eq!((cfg.width, cfg.height), (480, 272));
        assert_eq!(cfg.flip_timeout(), Duration::from_secs(1));
        assert_eq!(cfg.report_interval(), Some(Duration::from_secs(10)));
        assert_eq!(cfg.depth_bits, 16);
        assert!(cfg.stdin_interrupt);
        assert!(cfg.restore_crtc);
        assert_eq!(cfg.log.filter, "info");
    }

    #[test]
    fn command_line_options() {
        let args = parse(&[
            "--device",
            "/dev/dri/card0",
            "--connector",
            "42",
            "--width",
            "320",
            "--height",
            "240",
            "--frames",
            "100",
            "--flip-timeout-ms",
            "250",
            "--report-interval",
            "0",
            "--depth-bits",
            "0",
            "--ignore-stdin",
            "--no-restore-crtc",
            "--log-level",
            "debug",
        ]);
        let cfg = Config::from_args(args).unwrap();
        assert_eq!(cfg.device, PathBuf::from("/dev/dri/card0"));
        assert_eq!(cfg.connector, Some(42));
        assert_eq!((cfg.width, cfg.height), (320, 240));
        assert_eq!(cfg.frames, Some(100));
        assert_eq!(cfg.flip_timeout(), Duration::from_millis(250));
        assert_eq!(cfg.report_interval(), None);
        assert_eq!(cfg.depth_bits, 0);
        assert!(!cfg.stdin_interrupt);
        assert!(!cfg.restore_crtc);
        assert_eq!(cfg.log.filter, "debug");
    }

    #[test]
    fn file_values_are_overridden_by_args() {
        let file = config_file(
            r#"{
                "device": "/dev/dri/card7",
                "width": 640,
                "frames": 5,
                "stdin-interrupt": false,
                "log": { "filter": "warn" }
            }"#,
        );
        let path = file.path().to_str().unwrap();
        let cfg = Config::from_args(parse(&["--cfg", path, "--width", "100"])).unwrap();
        assert_eq!(cfg.device, PathBuf::from("/dev/dri/card7"));
        assert_eq!(cfg.width, 100);
        assert_eq!(cfg.height, 272);
        assert_eq!(cfg.frames, Some(5));
        assert!(!cfg.stdin_interrupt);
        assert_eq!(cfg.log.filter, "warn");
        assert!(cfg.log.stderr);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let file = config_file(r#"{ "widht": 640 }"#);
        assert!(matches!(
            Config::load(file.path()),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn unknown_log_key_is_rejected() {
        let file = config_file(r#"{ "log": { "fliter": "debug" } }"#);
        assert!(matches!(
            Config::load(file.path()),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        assert!(matches!(
            Config::load(&path),
            Err(Error::OpenFile { .. })
        ));
    }

    #[test]
    fn validation() {
        let mut cfg = Config {
            width: 0,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(Error::ZeroViewport {
                width: 0,
                height: 272
            })
        ));
        cfg.width = 1;
        cfg.flip_timeout_ms = 0;
        assert!(matches!(cfg.validate(), Err(Error::ZeroFlipTimeout)));
        cfg.flip_timeout_ms = 1;
        cfg.device = PathBuf::new();
        assert!(matches!(cfg.validate(), Err(Error::EmptyDevicePath)));
        assert!(matches!(
            Config::from_args(parse(&["--height", "0"])),
            Err(Error::ZeroViewport { .. })
        ));
    }
}

// Copyright 2022 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Process-wide logging setup.
//!
//! The `log` macros re-exported by this crate do nothing until `syslog::init()` or
//! `syslog::init_with()` returns `Ok`.
//!
//! # Examples
//!
//! ```
//! use base::syslog;
//! use base::warn;
//!
//! if let Err(e) = syslog::init() {
//!     eprintln!("failed to initialize syslog: {}", e);
//!     return;
//! }
//! warn!("this is your {} warning", "final");
//! ```

use std::env;
use std::ffi::OsStr;
use std::ffi::OsString;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::PathBuf;

use chrono::Local;
use env_logger::fmt::Formatter;
use log::Record;
use remain::sorted;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error as ThisError;

/// Errors returned by `syslog::init()`.
#[sorted]
#[derive(ThisError, Debug)]
pub enum Error {
    /// A logger was already installed for this process.
    #[error("a logger is already installed: {0}")]
    AlreadyInitialized(log::SetLoggerError),
    /// The log file could not be opened for appending.
    #[error("failed to open log file {path}: {source}")]
    OpenFile { path: PathBuf, source: io::Error },
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Filter in `env_logger` syntax, e.g. `info` or `warn,kms_display=debug`.
    pub filter: String,
    /// Echo records to stderr.
    pub stderr: bool,
    /// Append records to this file.
    pub log_file: Option<PathBuf>,
    /// Name written in front of every record. Defaults to the file name of `argv[0]`.
    pub proc_name: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            filter: String::from("info"),
            stderr: true,
            log_file: None,
            proc_name: None,
        }
    }
}

fn get_proc_name() -> Option<String> {
    env::args_os()
        .next()
        .map(PathBuf::from)
        .and_then(|s| s.file_name().map(OsStr::to_os_string))
        .map(OsString::into_string)
        .and_then(Result::ok)
}

/// Writes every record to stderr and/or a file.
pub(crate) struct Tee {
    stderr: bool,
    file: Option<File>,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.stderr {
            io::stderr().write_all(buf)?;
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.stderr {
            io::stderr().flush()?;
        }
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

pub(crate) fn format_record(
    buf: &mut impl Write,
    proc_name: &str,
    timestamp: &str,
    record: &Record,
) -> io::Result<()> {
    write!(buf, "[{} {:5} {}", timestamp, record.level(), proc_name)?;
    if let Some(path) = record.file() {
        write!(buf, ": {}", path)?;
        if let Some(line) = record.line() {
            write!(buf, ":{}", line)?;
        }
    }
    writeln!(buf, "] {}", record.args())
}

/// Initialize logging with the default configuration: `info` and above, to stderr.
pub fn init() -> Result<(), Error> {
    init_with(LogConfig::default())
}

/// Initialize logging with the given configuration.
///
/// This should only be called once per process. Every call made after the first returns
/// `Error::AlreadyInitialized`.
pub fn init_with(cfg: LogConfig) -> Result<(), Error> {
    let file = match &cfg.log_file {
        Some(path) => Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| Error::OpenFile {
                    path: path.clone(),
                    source,
                })?,
        ),
        None => None,
    };
    let proc_name = cfg
        .proc_name
        .clone()
        .or_else(get_proc_name)
        .unwrap_or_else(|| String::from("textured_cube"));

    let mut builder = env_logger::Builder::new();
    builder.parse_filters(&cfg.filter);
    builder.target(env_logger::Target::Pipe(Box::new(Tee {
        stderr: cfg.stderr,
        file,
    })));
    builder.format(move |buf: &mut Formatter, record: &Record| {
        let timestamp = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f").to_string();
        format_record(buf, &proc_name, &timestamp, record)
    });
    builder.try_init().map_err(Error::AlreadyInitialized)
}

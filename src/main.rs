// Copyright 2022 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Spins a textured cube on a DRM/KMS display until interrupted.

mod config;
mod display_loop;

use anyhow::Context;
use anyhow::Result;
use base::error;
use base::info;
use base::syslog;

use crate::config::Args;
use crate::config::Config;
use crate::display_loop::RunSummary;

fn run_cube(cfg: &Config) -> Result<RunSummary> {
    let stop = base::register_stop_signals().context("failed to install signal handlers")?;
    display_loop::run(cfg, stop)
}

fn cube_main() -> std::result::Result<(), ()> {
    let args: Args = argh::from_env();
    let cfg = match Config::from_args(args) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("invalid configuration: {}", e);
            return Err(());
        }
    };
    if let Err(e) = syslog::init_with(cfg.log.clone()) {
        eprintln!("failed to initialize syslog: {}", e);
        return Err(());
    }

    match run_cube(&cfg) {
        Ok(summary) => {
            info!(
                "exiting after {} frames: {}",
                summary.frames, summary.reason
            );
            Ok(())
        }
        Err(e) => {
            error!("{:#}", e);
            Err(())
        }
    }
}

fn main() {
    std::process::exit(if cube_main().is_ok() { 0 } else { 1 });
}

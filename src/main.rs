// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Clinic Annotator
//!
//! A desktop viewer for annotating a single clinical image with labels and
//! calibrated distance measurements, with per-image autosave and PNG export.

mod app;
mod config;
mod interaction;
mod io;
mod models;
mod session;
mod ui;
mod util;

use anyhow::{bail, Result};
use app::{AnnotatorApp, AnnotatorOptions};
use std::path::PathBuf;

const HELP: &str = "\
clinic-annotator

USAGE:
  clinic-annotator [OPTIONS] <SOURCE>

ARGS:
  <SOURCE>            Image path, data: URI or http(s) URL

OPTIONS:
  --filename NAME     Base name for the exported PNG
  --config PATH       Settings file (default: <config dir>/clinic-annotator/settings.toml)
  --no-persist        Do not load or save annotations for this image
  -h, --help          Print help
";

struct Args {
    source: String,
    filename: Option<String>,
    config: Option<PathBuf>,
    no_persist: bool,
}

fn parse_args() -> Result<Option<Args>> {
    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        print!("{}", HELP);
        return Ok(None);
    }

    let filename = args.opt_value_from_str("--filename")?;
    let config = args.opt_value_from_str("--config")?;
    let no_persist = args.contains("--no-persist");
    let Some(source) = args.finish().into_iter().next().and_then(|s| s.into_string().ok()) else {
        bail!("Missing image source\n\n{}", HELP);
    };

    Ok(Some(Args {
        source,
        filename,
        config,
        no_persist,
    }))
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    let Some(args) = parse_args()? else {
        return Ok(());
    };

    let mut config = config::load(args.config.as_deref());
    if args.no_persist {
        config.persist = Some(false);
    }

    let filename = args
        .filename
        .unwrap_or_else(|| io::media::default_filename(&args.source));
    log::info!("Opening {} as {}", args.source, filename);

    // Configure egui options
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([640.0, 480.0])
            .with_title(format!("Annotator - {}", filename)),
        ..Default::default()
    };

    let annotator = AnnotatorOptions {
        source: args.source,
        filename,
        on_close: Some(Box::new(|| log::info!("Annotator closed"))),
    };

    // Run the application
    eframe::run_native(
        "Clinic Annotator",
        options,
        Box::new(move |cc| Ok(Box::new(AnnotatorApp::new(annotator, &config, &cc.egui_ctx)))),
    )
    .map_err(|e| anyhow::anyhow!("Application error: {}", e))?;

    Ok(())
}

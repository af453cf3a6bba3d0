// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! User settings loaded from `settings.toml`.
//!
//! Every key is optional; accessors fill in defaults. A missing file means
//! defaults, an unreadable or invalid one is logged and also means defaults.

use crate::io::export::ExportStyle;
use crate::models::store::DEFAULT_MM_PER_PX;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "settings.toml";
const APP_DIR: &str = "clinic-annotator";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Calibration used for images without saved state
    pub default_mm_per_px: Option<f64>,
    pub label_font_size: Option<f32>,
    pub measure_font_size: Option<f32>,
    /// TrueType/OpenType font for export text
    pub font_path: Option<PathBuf>,
    /// Directory holding per-image saved state
    pub state_dir: Option<PathBuf>,
    /// Save annotations per image
    pub persist: Option<bool>,
}

impl Config {
    pub fn mm_per_px(&self) -> f64 {
        self.default_mm_per_px
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(DEFAULT_MM_PER_PX)
    }

    pub fn export_style(&self) -> ExportStyle {
        let defaults = ExportStyle::default();
        ExportStyle {
            label_font_size: positive(self.label_font_size).unwrap_or(defaults.label_font_size),
            measure_font_size: positive(self.measure_font_size).unwrap_or(defaults.measure_font_size),
        }
    }

    pub fn persist(&self) -> bool {
        self.persist.unwrap_or(true)
    }
}

fn positive(value: Option<f32>) -> Option<f32> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

/// Load from `path`, or from the default location when `None`.
pub fn load(path: Option<&Path>) -> Config {
    let Some(path) = path.map(Path::to_path_buf).or_else(default_path) else {
        return Config::default();
    };
    if !path.exists() {
        return Config::default();
    }
    match load_from_path(&path) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Ignoring settings: {:#}", e);
            Config::default()
        }
    }
}

pub fn load_from_path(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Invalid settings in {}", path.display()))
}

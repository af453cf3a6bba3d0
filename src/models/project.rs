// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Saved annotator state for one image source.
//!
//! Every field except `annotations` is optional on read so that partial or
//! older entries still restore what they can.

use super::annotation::Annotation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pan offset of the image inside the viewer, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Offset {
    pub x: f32,
    pub y: f32,
}

/// Complete annotator state for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mm_per_px: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<Offset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl PersistedState {
    /// Snapshot of the current session, stamped with the current time.
    pub fn new(annotations: Vec<Annotation>, mm_per_px: f64, zoom: f32, offset: Offset) -> Self {
        Self {
            annotations,
            mm_per_px: Some(mm_per_px),
            zoom: Some(zoom),
            offset: Some(offset),
            saved_at: Some(Utc::now()),
        }
    }

    /// Calibration scale, if present and usable.
    pub fn valid_mm_per_px(&self) -> Option<f64> {
        self.mm_per_px.filter(|s| s.is_finite() && *s > 0.0)
    }

    /// Saved zoom, if present and usable. A usable zoom means the saved view
    /// replaces the initial auto-fit.
    pub fn valid_zoom(&self) -> Option<f32> {
        self.zoom.filter(|z| z.is_finite() && *z > 0.0)
    }

    pub fn valid_offset(&self) -> Option<Offset> {
        self.offset.filter(|o| o.x.is_finite() && o.y.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case_fields() {
        let state = PersistedState::new(Vec::new(), 0.1, 2.0, Offset { x: 3.0, y: 4.0 });
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["mmPerPx"], 0.1);
        assert_eq!(json["offset"]["x"], 3.0);
        assert!(json["savedAt"].is_string());
    }

    #[test]
    fn test_partial_entry_loads() {
        let state: PersistedState =
            serde_json::from_str(r#"{"annotations":[],"zoom":0}"#).unwrap();
        assert!(state.valid_zoom().is_none());
        assert!(state.valid_mm_per_px().is_none());
        assert!(state.valid_offset().is_none());
    }
}

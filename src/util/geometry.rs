// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Geometric utility functions.
//!
//! Overlay geometry in image-natural pixels, shared by the on-screen overlay
//! and the export renderer, plus hit-testing against annotations.

use crate::models::annotation::{Annotation, HandlePart, Label, Measurement, Point};
use egui::{pos2, vec2, Rect};

/// Radius of label markers and measurement handles.
pub const HANDLE_RADIUS: f32 = 8.0;

/// Size of the filled chip behind a measurement's distance text.
pub const CHIP_WIDTH: f32 = 80.0;
pub const CHIP_HEIGHT: f32 = 28.0;

/// Offset of a label's text from its anchor.
pub const LABEL_TEXT_OFFSET: (f32, f32) = (12.0, -10.0);

/// Approximate advance of one glyph relative to the font size.
const GLYPH_ASPECT: f32 = 0.55;

pub fn midpoint(a: Point, b: Point) -> Point {
    Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}

pub fn distance(a: Point, b: Point) -> f32 {
    (b.x - a.x).hypot(b.y - a.y)
}

/// Shortest distance from `p` to the segment `a`-`b`.
pub fn distance_to_segment(p: Point, a: Point, b: Point) -> f32 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return distance(p, a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    distance(p, Point::new(a.x + t * dx, a.y + t * dy))
}

/// Chip centred on the measurement's midpoint.
pub fn chip_rect(measurement: &Measurement) -> Rect {
    let mid = midpoint(measurement.start(), measurement.end());
    Rect::from_center_size(pos2(mid.x, mid.y), vec2(CHIP_WIDTH, CHIP_HEIGHT))
}

/// Estimated box of a label's text, bottom-left at the text anchor.
pub fn label_text_rect(label: &Label, font_size: f32) -> Rect {
    let width = label.text.chars().count() as f32 * font_size * GLYPH_ASPECT;
    let left = label.x + LABEL_TEXT_OFFSET.0;
    let baseline = label.y + LABEL_TEXT_OFFSET.1;
    Rect::from_min_max(pos2(left, baseline - font_size), pos2(left + width, baseline))
}

/// What a pointer position lands on.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub id: String,
    /// Draggable handle under the pointer, if any
    pub part: Option<HandlePart>,
}

/// Find the topmost annotation at `point` (image pixels).
///
/// `tolerance` widens every target and is given in image pixels, so callers
/// convert a screen tolerance with the current display scale. Handles win
/// over bodies of the same annotation; later annotations are on top.
pub fn hit_test(annotations: &[Annotation], point: Point, tolerance: f32, font_size: f32) -> Option<Hit> {
    for annotation in annotations.iter().rev() {
        for (part, at) in annotation.handles() {
            if distance(point, at) <= HANDLE_RADIUS + tolerance {
                return Some(Hit {
                    id: annotation.id().to_string(),
                    part: Some(part),
                });
            }
        }

        let on_body = match annotation {
            Annotation::Label(label) => label_text_rect(label, font_size)
                .expand(tolerance)
                .contains(pos2(point.x, point.y)),
            Annotation::Measurement(measure) => {
                distance_to_segment(point, measure.start(), measure.end()) <= tolerance + 2.0
            }
        };
        if on_body {
            return Some(Hit {
                id: annotation.id().to_string(),
                part: None,
            });
        }
    }
    None
}

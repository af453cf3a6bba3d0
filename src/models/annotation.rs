// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Annotation data structures.
//!
//! All coordinates are in image-natural pixels: the unscaled resolution of
//! the source image, independent of the on-screen zoom and pan.

use serde::{Deserialize, Serialize};

/// A 2D point in image-natural pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A point marker with adjacent text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub color: String,
}

/// A two-point distance measurement. The distance itself is derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Measurement {
    pub fn start(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn end(&self) -> Point {
        Point::new(self.x2, self.y2)
    }

    /// Euclidean length in image pixels.
    pub fn pixel_length(&self) -> f64 {
        let dx = f64::from(self.x2) - f64::from(self.x);
        let dy = f64::from(self.y2) - f64::from(self.y);
        dx.hypot(dy)
    }
}

/// A user-placed annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Annotation {
    #[serde(rename = "label")]
    Label(Label),
    #[serde(rename = "measure")]
    Measurement(Measurement),
}

/// A draggable part of an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlePart {
    /// The anchor of a label.
    Anchor,
    /// First endpoint of a measurement.
    Start,
    /// Second endpoint of a measurement.
    End,
}

impl Annotation {
    pub fn id(&self) -> &str {
        match self {
            Annotation::Label(label) => &label.id,
            Annotation::Measurement(measure) => &measure.id,
        }
    }

    pub fn set_id(&mut self, id: String) {
        match self {
            Annotation::Label(label) => label.id = id,
            Annotation::Measurement(measure) => measure.id = id,
        }
    }

    /// Numeric suffix of a generated id (`a12` -> 12).
    pub fn id_number(&self) -> Option<u64> {
        self.id().strip_prefix('a')?.parse().ok()
    }

    /// Handles that can be dragged, in hit-test priority order.
    pub fn handles(&self) -> Vec<(HandlePart, Point)> {
        match self {
            Annotation::Label(label) => vec![(HandlePart::Anchor, Point::new(label.x, label.y))],
            Annotation::Measurement(measure) => vec![
                (HandlePart::End, measure.end()),
                (HandlePart::Start, measure.start()),
            ],
        }
    }

    /// Patch that moves `part` to `point`, or `None` if the part does not
    /// belong to this variant.
    pub fn handle_patch(&self, part: HandlePart, point: Point) -> Option<AnnotationPatch> {
        match (self, part) {
            (Annotation::Label(_), HandlePart::Anchor)
            | (Annotation::Measurement(_), HandlePart::Start) => Some(AnnotationPatch {
                x: Some(point.x),
                y: Some(point.y),
                ..Default::default()
            }),
            (Annotation::Measurement(_), HandlePart::End) => Some(AnnotationPatch {
                x2: Some(point.x),
                y2: Some(point.y),
                ..Default::default()
            }),
            _ => None,
        }
    }
}

/// Partial update applied by [`AnnotationStore::update_annotation`].
///
/// Fields that do not exist on the target variant are ignored.
///
/// [`AnnotationStore::update_annotation`]: super::store::AnnotationStore::update_annotation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationPatch {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub x2: Option<f32>,
    pub y2: Option<f32>,
    pub text: Option<String>,
    pub color: Option<String>,
}

impl AnnotationPatch {
    pub fn apply(&self, annotation: &mut Annotation) {
        match annotation {
            Annotation::Label(label) => {
                if let Some(x) = self.x {
                    label.x = x;
                }
                if let Some(y) = self.y {
                    label.y = y;
                }
                if let Some(text) = &self.text {
                    label.text.clone_from(text);
                }
                if let Some(color) = &self.color {
                    label.color.clone_from(color);
                }
            }
            Annotation::Measurement(measure) => {
                if let Some(x) = self.x {
                    measure.x = x;
                }
                if let Some(y) = self.y {
                    measure.y = y;
                }
                if let Some(x2) = self.x2 {
                    measure.x2 = x2;
                }
                if let Some(y2) = self.y2 {
                    measure.y2 = y2;
                }
            }
        }
    }
}

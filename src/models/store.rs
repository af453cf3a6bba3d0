// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Annotation store.
//!
//! Owns the ordered annotation list, the id generator, the calibration
//! scale and the undo/redo history. Every user-undoable mutation goes
//! through here and pushes exactly one [`HistoryRecord`].

use super::annotation::{Annotation, AnnotationPatch, Label, Measurement, Point};
use super::history::{History, HistoryRecord};
use std::collections::HashSet;

/// Default calibration, millimetres per image pixel.
pub const DEFAULT_MM_PER_PX: f64 = 0.264;

/// Largest restored id suffix the generator continues from. Restored ids
/// beyond it are given fresh ids.
const MAX_RESTORED_SUFFIX: u64 = u32::MAX as u64;

/// Millimetres with two decimals, as shown on screen and in exports.
pub fn format_distance(mm: f64) -> String {
    format!("{:.2} mm", mm)
}

/// Ordered annotation collection with undo/redo.
#[derive(Debug)]
pub struct AnnotationStore {
    annotations: Vec<Annotation>,
    history: History,
    /// Numeric suffix of the next generated id
    next_id: u64,
    mm_per_px: f64,
}

impl Default for AnnotationStore {
    fn default() -> Self {
        Self::new(DEFAULT_MM_PER_PX)
    }
}

impl AnnotationStore {
    pub fn new(mm_per_px: f64) -> Self {
        let mut store = Self {
            annotations: Vec::new(),
            history: History::new(),
            next_id: 1,
            mm_per_px: DEFAULT_MM_PER_PX,
        };
        store.set_mm_per_px(mm_per_px);
        store
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn get(&self, id: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id() == id)
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn mm_per_px(&self) -> f64 {
        self.mm_per_px
    }

    /// Set the calibration scale. Non-positive or non-finite values are
    /// rejected and leave the scale unchanged.
    pub fn set_mm_per_px(&mut self, mm_per_px: f64) -> bool {
        if mm_per_px.is_finite() && mm_per_px > 0.0 {
            self.mm_per_px = mm_per_px;
            true
        } else {
            false
        }
    }

    fn generate_id(&mut self) -> String {
        let id = format!("a{}", self.next_id);
        self.next_id += 1;
        id
    }

    /// Append a label and record it. Returns the new id.
    pub fn add_label(&mut self, at: Point, text: &str, color: &str) -> String {
        let id = self.generate_id();
        let annotation = Annotation::Label(Label {
            id: id.clone(),
            x: at.x,
            y: at.y,
            text: text.to_string(),
            color: color.to_string(),
        });
        self.push_added(annotation);
        id
    }

    /// Append a measurement between two points and record it.
    pub fn add_measurement(&mut self, start: Point, end: Point) -> String {
        let id = self.generate_id();
        let annotation = Annotation::Measurement(Measurement {
            id: id.clone(),
            x: start.x,
            y: start.y,
            x2: end.x,
            y2: end.y,
        });
        self.push_added(annotation);
        id
    }

    fn push_added(&mut self, annotation: Annotation) {
        self.annotations.push(annotation.clone());
        self.history.push(HistoryRecord::Add { item: annotation });
        log::info!("Added annotation, total: {}", self.annotations.len());
    }

    /// Apply `patch` to the annotation with `id` without recording history.
    ///
    /// Callers batch live edits (drags) into a single record via
    /// [`record`](Self::record).
    pub fn update_annotation(&mut self, id: &str, patch: &AnnotationPatch) -> bool {
        match self.annotations.iter_mut().find(|a| a.id() == id) {
            Some(annotation) => {
                patch.apply(annotation);
                true
            }
            None => false,
        }
    }

    /// Push an externally assembled record (move/edit) onto the history.
    pub fn record(&mut self, record: HistoryRecord) {
        self.history.push(record);
    }

    /// Change a label's text and colour as one undoable edit.
    pub fn edit_label(&mut self, id: &str, text: &str, color: &str) -> bool {
        let Some(before) = self.get(id).cloned() else {
            return false;
        };
        if !matches!(before, Annotation::Label(_)) {
            return false;
        }
        let patch = AnnotationPatch {
            text: Some(text.to_string()),
            color: Some(color.to_string()),
            ..Default::default()
        };
        self.update_annotation(id, &patch);
        let after = self.get(id).cloned().unwrap_or_else(|| before.clone());
        self.history.push(HistoryRecord::Edit {
            id: id.to_string(),
            before,
            after,
        });
        true
    }

    /// Delete the annotation with `id` and record it.
    pub fn remove_annotation(&mut self, id: &str) -> Option<Annotation> {
        let index = self.annotations.iter().position(|a| a.id() == id)?;
        let removed = self.annotations.remove(index);
        self.history.push(HistoryRecord::Remove {
            item: removed.clone(),
            index,
        });
        log::info!("Deleted annotation {}, total: {}", id, self.annotations.len());
        Some(removed)
    }

    pub fn undo(&mut self) -> bool {
        let undone = self.history.undo(&mut self.annotations);
        if undone {
            log::info!("Undo");
        }
        undone
    }

    pub fn redo(&mut self) -> bool {
        let redone = self.history.redo(&mut self.annotations);
        if redone {
            log::info!("Redo");
        }
        redone
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_depth(&self) -> usize {
        self.history.undo_depth()
    }

    /// Physical length of a measurement in millimetres.
    pub fn compute_distance(&self, measurement: &Measurement) -> f64 {
        measurement.pixel_length() * self.mm_per_px
    }

    /// Distance text shown on screen.
    pub fn distance_text(&self, measurement: &Measurement) -> String {
        format_distance(self.compute_distance(measurement))
    }

    /// Replace the collection with previously saved annotations.
    ///
    /// History is cleared and the id generator is moved past every
    /// restored numeric id. Repeated ids, and ids whose suffix is too large
    /// to continue from, are replaced with freshly generated ones.
    pub fn restore(&mut self, annotations: Vec<Annotation>) {
        let max_existing = annotations
            .iter()
            .filter_map(Annotation::id_number)
            .filter(|n| *n <= MAX_RESTORED_SUFFIX)
            .max()
            .unwrap_or(0);
        self.next_id = self.next_id.max(max_existing + 1);

        let mut seen = HashSet::new();
        let mut adopted = Vec::with_capacity(annotations.len());
        for mut annotation in annotations {
            let oversized = annotation.id_number().is_some_and(|n| n > MAX_RESTORED_SUFFIX);
            if oversized || seen.contains(annotation.id()) {
                let fresh = self.generate_id();
                log::warn!("Restored annotation {} renamed to {}", annotation.id(), fresh);
                annotation.set_id(fresh);
            }
            seen.insert(annotation.id().to_string());
            adopted.push(annotation);
        }

        self.annotations = adopted;
        self.history.clear();
    }
}

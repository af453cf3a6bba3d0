// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! One annotator session: the annotation store, the viewport and the
//! interaction state for a single image source.
//!
//! A session owns all of its state exclusively. Dropping it tears down
//! every in-flight drag, pan and dialog with it.

use crate::interaction::Interaction;
use crate::models::annotation::Annotation;
use crate::models::project::{Offset, PersistedState};
use crate::models::store::AnnotationStore;
use crate::util::viewport::Viewport;
use egui::vec2;

/// What to do once the image and the viewer have been measured.
#[derive(Debug, Clone, Copy, PartialEq)]
enum InitialView {
    Fit,
    /// A saved view replaces the auto-fit.
    Restore,
    Applied,
}

/// Persisted fields, compared to detect changes worth saving.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub annotations: Vec<Annotation>,
    pub mm_per_px: f64,
    pub zoom: f32,
    pub offset: Offset,
}

impl From<Snapshot> for PersistedState {
    fn from(snapshot: Snapshot) -> Self {
        PersistedState::new(
            snapshot.annotations,
            snapshot.mm_per_px,
            snapshot.zoom,
            snapshot.offset,
        )
    }
}

pub struct Session {
    pub store: AnnotationStore,
    pub viewport: Viewport,
    pub interaction: Interaction,
    initial_view: InitialView,
}

impl Session {
    pub fn new(mm_per_px: f64) -> Self {
        Self {
            store: AnnotationStore::new(mm_per_px),
            viewport: Viewport::new(),
            interaction: Interaction::new(),
            initial_view: InitialView::Fit,
        }
    }

    /// Adopt previously saved state. A usable saved zoom suppresses the
    /// auto-fit that otherwise runs once the image is measured.
    pub fn restore(&mut self, saved: PersistedState) {
        let zoom = saved.valid_zoom();
        let offset = saved.valid_offset().unwrap_or_default();
        if let Some(mm_per_px) = saved.valid_mm_per_px() {
            self.store.set_mm_per_px(mm_per_px);
        }
        log::info!("Restored {} annotations", saved.annotations.len());
        self.store.restore(saved.annotations);

        match zoom {
            Some(zoom) => {
                self.viewport.clamp_and_apply(zoom, Some(vec2(offset.x, offset.y)));
                self.initial_view = InitialView::Restore;
            }
            None => self.initial_view = InitialView::Fit,
        }
    }

    /// Replace annotations and calibration from an imported sidecar. The
    /// current view is kept.
    pub fn import(&mut self, data: PersistedState) {
        if let Some(mm_per_px) = data.valid_mm_per_px() {
            self.store.set_mm_per_px(mm_per_px);
        }
        self.store.restore(data.annotations);
    }

    /// Run the pending initial view once everything is measured.
    pub fn apply_initial_view(&mut self) -> bool {
        if self.initial_view == InitialView::Applied || !self.viewport.is_measured() {
            return false;
        }
        match self.initial_view {
            InitialView::Fit => self.viewport.fit_to_container(),
            InitialView::Restore => {
                let view = self.viewport.view();
                self.viewport.clamp_and_apply(view.zoom, Some(view.offset));
            }
            InitialView::Applied => {}
        }
        self.initial_view = InitialView::Applied;
        true
    }

    /// Saved state was cleared: a view that has not been applied yet falls
    /// back to the auto-fit.
    pub fn rearm_fit(&mut self) {
        if self.initial_view == InitialView::Restore {
            self.initial_view = InitialView::Fit;
        }
    }

    pub fn initial_view_applied(&self) -> bool {
        self.initial_view == InitialView::Applied
    }

    pub fn snapshot(&self) -> Snapshot {
        let view = self.viewport.view();
        Snapshot {
            annotations: self.store.annotations().to_vec(),
            mm_per_px: self.store.mm_per_px(),
            zoom: view.zoom,
            offset: Offset {
                x: view.offset.x,
                y: view.offset.y,
            },
        }
    }
}

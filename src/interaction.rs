// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Interaction dispatcher.
//!
//! Routes pointer and keyboard input to the viewport and the annotation
//! store according to the selected tool. Drag bookkeeping lives here as
//! plain session fields; only the store and the viewport drive rendering.

use crate::models::annotation::{Annotation, HandlePart, Point};
use crate::models::history::HistoryRecord;
use crate::models::store::AnnotationStore;
use crate::util::palette::DEFAULT_LABEL_COLOR;
use crate::util::viewport::Viewport;
use egui::{Pos2, Vec2};

/// Current tool selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Pan,
    Measure,
    Label,
}

impl Tool {
    pub const ALL: [Tool; 3] = [Tool::Pan, Tool::Measure, Tool::Label];

    pub fn name(self) -> &'static str {
        match self {
            Tool::Pan => "pan",
            Tool::Measure => "measure",
            Tool::Label => "label",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            Tool::Pan => "Drag to pan, scroll to zoom, double-click to reset",
            Tool::Measure => "Click two points to measure a distance",
            Tool::Label => "Click to place a label",
        }
    }
}

/// Pan drag in progress.
#[derive(Debug, Clone, Copy)]
struct PanDrag {
    start: Pos2,
    start_offset: Vec2,
}

/// Annotation handle drag in progress.
#[derive(Debug, Clone)]
struct AnnotationDrag {
    id: String,
    part: HandlePart,
    before: Annotation,
}

/// State of the label modal.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelDialog {
    pub text: String,
    pub color: String,
    /// Anchor in image pixels
    pub at: Point,
    /// Label being edited, `None` when adding
    pub editing: Option<String>,
}

/// Delete menu opened on an annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextMenu {
    /// Position relative to the container's top-left corner
    pub at: Vec2,
    pub target: String,
}

/// Global keyboard shortcuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Undo,
    Redo,
    Escape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Handled,
    Ignored,
    /// The user asked to close the annotator.
    CloseRequested,
}

#[derive(Debug, Default)]
pub struct Interaction {
    tool: Tool,
    pan: Option<PanDrag>,
    drag: Option<AnnotationDrag>,
    /// First click of a measurement, shown as a ghost marker
    pending_point: Option<Point>,
    label_dialog: Option<LabelDialog>,
    context_menu: Option<ContextMenu>,
}

impl Interaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        if tool != Tool::Measure {
            self.pending_point = None;
        }
        self.pan = None;
        self.tool = tool;
    }

    pub fn pending_point(&self) -> Option<Point> {
        self.pending_point
    }

    pub fn label_dialog(&self) -> Option<&LabelDialog> {
        self.label_dialog.as_ref()
    }

    pub fn label_dialog_mut(&mut self) -> Option<&mut LabelDialog> {
        self.label_dialog.as_mut()
    }

    pub fn context_menu(&self) -> Option<&ContextMenu> {
        self.context_menu.as_ref()
    }

    pub fn is_panning(&self) -> bool {
        self.pan.is_some()
    }

    pub fn dragged_annotation(&self) -> Option<&str> {
        self.drag.as_ref().map(|d| d.id.as_str())
    }

    /// Primary button pressed on the viewer, not on an annotation handle.
    ///
    /// Returns whether the press was consumed.
    pub fn pointer_down(&mut self, pos: Pos2, store: &mut AnnotationStore, viewport: &Viewport) -> bool {
        if self.drag.is_some() || self.label_dialog.is_some() {
            return false;
        }
        self.context_menu = None;

        match self.tool {
            Tool::Pan => {
                self.pan = Some(PanDrag {
                    start: pos,
                    start_offset: viewport.offset(),
                });
                true
            }
            Tool::Measure => {
                let Some(point) = viewport.screen_to_image(pos) else {
                    return false;
                };
                match self.pending_point.take() {
                    None => self.pending_point = Some(point),
                    Some(start) => {
                        store.add_measurement(start, point);
                    }
                }
                true
            }
            Tool::Label => {
                let Some(point) = viewport.screen_to_image(pos) else {
                    return false;
                };
                self.label_dialog = Some(LabelDialog {
                    text: String::new(),
                    color: DEFAULT_LABEL_COLOR.to_string(),
                    at: point,
                    editing: None,
                });
                true
            }
        }
    }

    /// Primary button pressed on an annotation handle. Captures the pointer
    /// for the rest of the drag, whatever the tool.
    pub fn handle_pointer_down(&mut self, id: &str, part: HandlePart, store: &AnnotationStore) -> bool {
        if self.drag.is_some() || self.label_dialog.is_some() {
            return false;
        }
        let Some(before) = store.get(id).cloned() else {
            return false;
        };
        self.pan = None;
        self.context_menu = None;
        self.drag = Some(AnnotationDrag {
            id: id.to_string(),
            part,
            before,
        });
        true
    }

    /// Pointer moved anywhere, inside or outside the viewer.
    pub fn pointer_move(&mut self, pos: Pos2, store: &mut AnnotationStore, viewport: &mut Viewport) {
        if let Some(drag) = &self.drag {
            let Some(point) = viewport.screen_to_image(pos) else {
                return;
            };
            let patch = store
                .get(&drag.id)
                .and_then(|annotation| annotation.handle_patch(drag.part, point));
            if let Some(patch) = patch {
                store.update_annotation(&drag.id, &patch);
            }
        } else if let Some(pan) = self.pan {
            viewport.pan_from(pan.start_offset, pos - pan.start);
        }
    }

    /// Primary button released anywhere. Ends a pan and commits a drag as a
    /// single move record; a drag that ends where it started records nothing.
    pub fn pointer_up(&mut self, store: &mut AnnotationStore) {
        self.pan = None;
        let Some(drag) = self.drag.take() else {
            return;
        };
        let Some(after) = store.get(&drag.id).cloned() else {
            return;
        };
        if after != drag.before {
            log::info!("Moved annotation {}", drag.id);
            store.record(HistoryRecord::Move {
                id: drag.id,
                before: drag.before,
                after,
            });
        }
    }

    /// Mouse wheel over the viewer.
    pub fn wheel(&mut self, scroll_y: f32, anchor: Pos2, viewport: &mut Viewport) {
        if self.drag.is_none() {
            viewport.wheel(scroll_y, anchor);
        }
    }

    /// Secondary click on an annotation.
    pub fn open_context_menu(&mut self, id: &str, pos: Pos2, viewport: &Viewport) {
        let Some(container) = viewport.container() else {
            return;
        };
        self.context_menu = Some(ContextMenu {
            at: pos - container.min,
            target: id.to_string(),
        });
    }

    /// Primary click somewhere in the window. Dismisses the context menu
    /// when the click is outside the viewer.
    pub fn click_anywhere(&mut self, pos: Pos2, viewport: &Viewport) {
        let inside = viewport.container().is_some_and(|c| c.contains(pos));
        if !inside {
            self.context_menu = None;
        }
    }

    pub fn dismiss_context_menu(&mut self) {
        self.context_menu = None;
    }

    /// "Delete" chosen in the context menu.
    pub fn delete_context_target(&mut self, store: &mut AnnotationStore) -> bool {
        let Some(menu) = self.context_menu.take() else {
            return false;
        };
        if self.dragged_annotation() == Some(menu.target.as_str()) {
            return false;
        }
        store.remove_annotation(&menu.target).is_some()
    }

    /// Open the label dialog pre-filled with an existing label.
    pub fn open_label_editor(&mut self, id: &str, store: &AnnotationStore) -> bool {
        let Some(Annotation::Label(label)) = store.get(id) else {
            return false;
        };
        self.label_dialog = Some(LabelDialog {
            text: label.text.clone(),
            color: label.color.clone(),
            at: Point::new(label.x, label.y),
            editing: Some(label.id.clone()),
        });
        true
    }

    /// Confirm the label dialog. Blank text behaves like cancel.
    ///
    /// Returns the id of the added or edited label.
    pub fn confirm_label(&mut self, store: &mut AnnotationStore) -> Option<String> {
        let dialog = self.label_dialog.take()?;
        if dialog.text.trim().is_empty() {
            return None;
        }
        match dialog.editing {
            Some(id) => store.edit_label(&id, &dialog.text, &dialog.color).then_some(id),
            None => Some(store.add_label(dialog.at, &dialog.text, &dialog.color)),
        }
    }

    pub fn cancel_label(&mut self) {
        self.label_dialog = None;
    }

    pub fn shortcut(&mut self, shortcut: Shortcut, store: &mut AnnotationStore) -> Outcome {
        match shortcut {
            Shortcut::Undo | Shortcut::Redo if self.drag.is_some() => Outcome::Ignored,
            Shortcut::Undo => {
                self.context_menu = None;
                if store.undo() {
                    Outcome::Handled
                } else {
                    Outcome::Ignored
                }
            }
            Shortcut::Redo => {
                self.context_menu = None;
                if store.redo() {
                    Outcome::Handled
                } else {
                    Outcome::Ignored
                }
            }
            Shortcut::Escape => {
                if self.label_dialog.take().is_some() {
                    Outcome::Handled
                } else {
                    Outcome::CloseRequested
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::{pos2, vec2, Rect};

    /// Viewer at the screen origin showing a 1000x1000 image at zoom 1, so
    /// screen and image coordinates coincide.
    fn identity_viewport() -> Viewport {
        let mut viewport = Viewport::new();
        viewport.set_image_size(1000, 1000);
        viewport.set_container(Rect::from_min_size(pos2(0.0, 0.0), vec2(1000.0, 1000.0)));
        viewport.clamp_and_apply(1.0, Some(Vec2::ZERO));
        viewport
    }

    #[test]
    fn test_two_click_measurement() {
        let mut store = AnnotationStore::new(0.264);
        let viewport = identity_viewport();
        let mut interaction = Interaction::new();
        interaction.set_tool(Tool::Measure);

        assert!(interaction.pointer_down(pos2(100.0, 100.0), &mut store, &viewport));
        assert_eq!(interaction.pending_point(), Some(Point::new(100.0, 100.0)));
        assert!(store.is_empty());

        interaction.pointer_down(pos2(100.0, 200.0), &mut store, &viewport);
        assert!(interaction.pending_point().is_none());
        assert_eq!(store.len(), 1);

        let Annotation::Measurement(m) = &store.annotations()[0] else {
            panic!("expected measurement");
        };
        assert_eq!((m.x, m.y, m.x2, m.y2), (100.0, 100.0, 100.0, 200.0));
        assert!((store.compute_distance(m) - 26.4).abs() < 1e-4);
        assert_eq!(store.distance_text(m), "26.40 mm");
    }

    #[test]
    fn test_empty_label_is_discarded() {
        let mut store = AnnotationStore::default();
        let viewport = identity_viewport();
        let mut interaction = Interaction::new();
        interaction.set_tool(Tool::Label);

        interaction.pointer_down(pos2(10.0, 20.0), &mut store, &viewport);
        let dialog = interaction.label_dialog().unwrap();
        assert_eq!(dialog.at, Point::new(10.0, 20.0));

        assert!(interaction.confirm_label(&mut store).is_none());
        assert!(interaction.label_dialog().is_none());
        assert!(store.is_empty());
        assert!(!store.can_undo());
    }

    #[test]
    fn test_label_confirm_and_edit() {
        let mut store = AnnotationStore::default();
        let viewport = identity_viewport();
        let mut interaction = Interaction::new();
        interaction.set_tool(Tool::Label);

        interaction.pointer_down(pos2(10.0, 20.0), &mut store, &viewport);
        interaction.label_dialog_mut().unwrap().text = "lesion".to_string();
        let id = interaction.confirm_label(&mut store).unwrap();

        assert!(interaction.open_label_editor(&id, &store));
        let dialog = interaction.label_dialog_mut().unwrap();
        assert_eq!(dialog.text, "lesion");
        dialog.text = "scar".to_string();
        dialog.color = "#34c759".to_string();
        interaction.confirm_label(&mut store);

        match store.get(&id).unwrap() {
            Annotation::Label(l) => assert_eq!((l.text.as_str(), l.color.as_str()), ("scar", "#34c759")),
            Annotation::Measurement(_) => panic!("expected label"),
        }
        assert_eq!(store.undo_depth(), 2);
        store.undo();
        match store.get(&id).unwrap() {
            Annotation::Label(l) => assert_eq!(l.text, "lesion"),
            Annotation::Measurement(_) => panic!("expected label"),
        }
    }

    #[test]
    fn test_drag_records_one_move() {
        let mut store = AnnotationStore::default();
        let mut viewport = identity_viewport();
        let mut interaction = Interaction::new();
        let id = store.add_measurement(Point::new(10.0, 10.0), Point::new(50.0, 10.0));

        assert!(interaction.handle_pointer_down(&id, HandlePart::End, &store));
        for x in [60.0, 70.0, 80.0] {
            interaction.pointer_move(pos2(x, 40.0), &mut store, &mut viewport);
        }
        // Clicks are suppressed while the drag holds the pointer
        interaction.set_tool(Tool::Measure);
        assert!(!interaction.pointer_down(pos2(1.0, 1.0), &mut store, &viewport));
        interaction.pointer_up(&mut store);

        let Annotation::Measurement(m) = store.get(&id).unwrap() else {
            panic!("expected measurement");
        };
        assert_eq!((m.x2, m.y2), (80.0, 40.0));
        assert_eq!((m.x, m.y), (10.0, 10.0));
        assert_eq!(store.undo_depth(), 2);

        store.undo();
        let Annotation::Measurement(m) = store.get(&id).unwrap() else {
            panic!("expected measurement");
        };
        assert_eq!((m.x2, m.y2), (50.0, 10.0));
    }

    #[test]
    fn test_drag_without_displacement_records_nothing() {
        let mut store = AnnotationStore::default();
        let mut viewport = identity_viewport();
        let mut interaction = Interaction::new();
        let id = store.add_label(Point::new(5.0, 5.0), "x", "#ff3b30");

        interaction.handle_pointer_down(&id, HandlePart::Anchor, &store);
        interaction.pointer_move(pos2(5.0, 5.0), &mut store, &mut viewport);
        interaction.pointer_up(&mut store);
        assert_eq!(store.undo_depth(), 1);
        assert!(interaction.dragged_annotation().is_none());
    }

    #[test]
    fn test_pan_drag_moves_view() {
        let mut store = AnnotationStore::default();
        let mut viewport = Viewport::new();
        viewport.set_image_size(2000, 2000);
        viewport.set_container(Rect::from_min_size(pos2(0.0, 0.0), vec2(500.0, 500.0)));
        viewport.clamp_and_apply(1.0, Some(vec2(-100.0, -100.0)));
        let mut interaction = Interaction::new();

        interaction.pointer_down(pos2(200.0, 200.0), &mut store, &viewport);
        assert!(interaction.is_panning());
        interaction.pointer_move(pos2(150.0, 260.0), &mut store, &mut viewport);
        assert_eq!(viewport.offset(), vec2(-150.0, -40.0));

        interaction.pointer_up(&mut store);
        interaction.pointer_move(pos2(0.0, 0.0), &mut store, &mut viewport);
        assert_eq!(viewport.offset(), vec2(-150.0, -40.0));
        assert!(store.is_empty());
    }

    #[test]
    fn test_context_menu_delete_and_dismiss() {
        let mut store = AnnotationStore::default();
        let mut viewport = Viewport::new();
        viewport.set_image_size(100, 100);
        viewport.set_container(Rect::from_min_size(pos2(40.0, 60.0), vec2(100.0, 100.0)));
        let mut interaction = Interaction::new();
        let id = store.add_label(Point::new(5.0, 5.0), "x", "#ff3b30");

        interaction.open_context_menu(&id, pos2(50.0, 70.0), &viewport);
        assert_eq!(interaction.context_menu().unwrap().at, vec2(10.0, 10.0));

        interaction.click_anywhere(pos2(60.0, 80.0), &viewport);
        assert!(interaction.context_menu().is_some());
        interaction.click_anywhere(pos2(500.0, 500.0), &viewport);
        assert!(interaction.context_menu().is_none());

        interaction.open_context_menu(&id, pos2(50.0, 70.0), &viewport);
        assert!(interaction.delete_context_target(&mut store));
        assert!(store.is_empty());
        assert!(interaction.context_menu().is_none());
    }

    #[test]
    fn test_escape_closes_dialog_then_annotator() {
        let mut store = AnnotationStore::default();
        let viewport = identity_viewport();
        let mut interaction = Interaction::new();
        interaction.set_tool(Tool::Label);
        interaction.pointer_down(pos2(1.0, 1.0), &mut store, &viewport);

        assert_eq!(interaction.shortcut(Shortcut::Escape, &mut store), Outcome::Handled);
        assert!(interaction.label_dialog().is_none());
        assert_eq!(interaction.shortcut(Shortcut::Escape, &mut store), Outcome::CloseRequested);
    }

    #[test]
    fn test_undo_redo_shortcuts() {
        let mut store = AnnotationStore::default();
        let mut interaction = Interaction::new();
        assert_eq!(interaction.shortcut(Shortcut::Undo, &mut store), Outcome::Ignored);

        store.add_label(Point::new(1.0, 1.0), "x", "#ff3b30");
        assert_eq!(interaction.shortcut(Shortcut::Undo, &mut store), Outcome::Handled);
        assert!(store.is_empty());
        assert_eq!(interaction.shortcut(Shortcut::Redo, &mut store), Outcome::Handled);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_switching_tool_drops_pending_point() {
        let mut store = AnnotationStore::default();
        let viewport = identity_viewport();
        let mut interaction = Interaction::new();
        interaction.set_tool(Tool::Measure);
        interaction.pointer_down(pos2(3.0, 4.0), &mut store, &viewport);
        interaction.set_tool(Tool::Pan);
        assert!(interaction.pending_point().is_none());
    }
}

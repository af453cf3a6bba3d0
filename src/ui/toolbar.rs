// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Toolbar and status line.
//!
//! The toolbar only reports what was clicked; the app applies it.

use crate::interaction::Tool;
use crate::util::viewport::{MAX_ZOOM, MIN_ZOOM};

/// Result of toolbar interaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToolbarAction {
    None,
    SelectTool(Tool),
    Fit,
    ZoomIn,
    ZoomOut,
    SetZoom(f32),
    Undo,
    Redo,
    SetScale(f64),
    Export,
    ClearSaved,
    Close,
}

/// What the toolbar displays.
pub struct ToolbarState {
    pub tool: Tool,
    pub zoom: f32,
    pub mm_per_px: f64,
    pub can_undo: bool,
    pub undo_depth: usize,
    pub can_redo: bool,
    pub exporting: bool,
}

/// Display the toolbar with tool selection, view and history buttons.
pub fn show(ui: &mut egui::Ui, state: &ToolbarState) -> ToolbarAction {
    let mut action = ToolbarAction::None;

    ui.horizontal(|ui| {
        ui.spacing_mut().item_spacing.x = 8.0;

        for tool in Tool::ALL {
            let text = match tool {
                Tool::Pan => "✋ Pan",
                Tool::Measure => "📏 Measure",
                Tool::Label => "🏷 Label",
            };
            if ui
                .selectable_label(state.tool == tool, text)
                .on_hover_text(tool.hint())
                .clicked()
            {
                action = ToolbarAction::SelectTool(tool);
            }
        }

        ui.separator();

        if ui.button("Fit").on_hover_text("Fit image to view").clicked() {
            action = ToolbarAction::Fit;
        }
        if ui.button("−").clicked() {
            action = ToolbarAction::ZoomOut;
        }
        let mut zoom = state.zoom;
        let slider = egui::Slider::new(&mut zoom, MIN_ZOOM..=MAX_ZOOM)
            .logarithmic(true)
            .show_value(false);
        if ui.add(slider).changed() {
            action = ToolbarAction::SetZoom(zoom);
        }
        if ui.button("+").clicked() {
            action = ToolbarAction::ZoomIn;
        }

        ui.separator();

        if ui
            .add_enabled(state.can_undo, egui::Button::new("↶ Undo"))
            .on_hover_text(format!("{} step(s)", state.undo_depth))
            .clicked()
        {
            action = ToolbarAction::Undo;
        }
        if ui.add_enabled(state.can_redo, egui::Button::new("↷ Redo")).clicked() {
            action = ToolbarAction::Redo;
        }

        ui.separator();

        ui.label("mm/px:");
        let mut scale = state.mm_per_px;
        let drag = egui::DragValue::new(&mut scale)
            .speed(0.001)
            .range(0.0001..=100.0)
            .max_decimals(4);
        if ui.add(drag).changed() {
            action = ToolbarAction::SetScale(scale);
        }

        ui.separator();

        let export_text = if state.exporting { "Exporting..." } else { "⬇ Download PNG" };
        if ui.add_enabled(!state.exporting, egui::Button::new(export_text)).clicked() {
            action = ToolbarAction::Export;
        }
        if ui.button("Clear saved").on_hover_text("Forget saved state for this image").clicked() {
            action = ToolbarAction::ClearSaved;
        }
        if ui.button("✖ Close").clicked() {
            action = ToolbarAction::Close;
        }
    });

    action
}

/// Display the status line under the viewer.
pub fn status(ui: &mut egui::Ui, tool: Tool, zoom: f32, count: usize, message: Option<&str>) {
    ui.horizontal(|ui| {
        ui.label(format!("Tool: {}", tool.name()));
        ui.separator();
        ui.label(format!("Zoom: {:.2}", zoom));
        ui.separator();
        ui.label(format!("Annotations: {}", count));
        ui.separator();
        ui.label(egui::RichText::new(tool.hint()).italics().weak());
        if let Some(message) = message {
            ui.separator();
            ui.label(message);
        }
    });
}

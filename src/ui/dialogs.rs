// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Floating dialogs: the label modal and the annotation context menu.

use crate::session::Session;
use crate::util::palette::{label_rgba, PALETTE};

/// Show the label dialog if one is open. Enter confirms, the Cancel
/// button discards; Escape is handled with the global shortcuts.
pub fn label_dialog(ctx: &egui::Context, session: &mut Session) {
    let Some(dialog) = session.interaction.label_dialog_mut() else {
        return;
    };
    let title = if dialog.editing.is_some() { "Edit label" } else { "Add label" };

    let mut confirm = false;
    let mut cancel = false;

    egui::Window::new(title)
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
        .show(ctx, |ui| {
            let response = ui.add(
                egui::TextEdit::singleline(&mut dialog.text)
                    .hint_text("Label text")
                    .desired_width(240.0),
            );
            if !response.has_focus() && !response.lost_focus() {
                response.request_focus();
            }
            if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                confirm = true;
            }

            ui.add_space(6.0);
            ui.horizontal(|ui| {
                for hex in PALETTE {
                    let [r, g, b, _] = label_rgba(hex);
                    let selected = dialog.color.eq_ignore_ascii_case(hex);
                    let stroke = if selected {
                        egui::Stroke::new(2.0, ui.visuals().strong_text_color())
                    } else {
                        egui::Stroke::NONE
                    };
                    let swatch = egui::Button::new("")
                        .fill(egui::Color32::from_rgb(r, g, b))
                        .stroke(stroke)
                        .min_size(egui::vec2(22.0, 22.0));
                    if ui.add(swatch).on_hover_text(hex).clicked() {
                        dialog.color = hex.to_string();
                    }
                }
            });

            ui.add_space(6.0);
            ui.horizontal(|ui| {
                if ui.button("OK").clicked() {
                    confirm = true;
                }
                if ui.button("Cancel").clicked() {
                    cancel = true;
                }
            });
        });

    if confirm {
        if let Some(id) = session.interaction.confirm_label(&mut session.store) {
            log::info!("Saved label {}", id);
        }
    } else if cancel {
        session.interaction.cancel_label();
    }
}

/// Show the Delete menu next to the annotation it was opened on.
pub fn context_menu(ctx: &egui::Context, session: &mut Session) {
    let (Some(menu), Some(container)) = (session.interaction.context_menu(), session.viewport.container()) else {
        return;
    };
    let at = container.min + menu.at;

    let mut delete = false;
    egui::Area::new(egui::Id::new("annotation_context_menu"))
        .order(egui::Order::Foreground)
        .fixed_pos(at)
        .show(ctx, |ui| {
            egui::Frame::popup(ui.style()).show(ui, |ui| {
                if ui.button("🗑 Delete").clicked() {
                    delete = true;
                }
            });
        });

    if delete && session.interaction.delete_context_target(&mut session.store) {
        log::info!("Deleted annotation");
    }
}

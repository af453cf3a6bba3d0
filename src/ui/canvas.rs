// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Viewer canvas: the transformed image with its annotation overlay.
//!
//! Overlay geometry lives in image pixels and is mapped through the
//! viewport each frame, so zooming never rewrites annotation coordinates.
//! Pointer input is read from the frame and handed to the dispatcher.

use crate::interaction::Tool;
use crate::io::export::ExportStyle;
use crate::models::annotation::{Annotation, Label, Measurement, Point};
use crate::models::store::AnnotationStore;
use crate::session::Session;
use crate::util::geometry::{self, HANDLE_RADIUS, LABEL_TEXT_OFFSET};
use crate::util::palette::{label_rgba, MEASURE_RGBA};
use crate::util::viewport::Viewport;
use egui::{Align2, Color32, CursorIcon, FontId, Painter, PointerButton, Pos2, Rect, Sense, Stroke};

/// Pointer slop for hit-testing, in screen points.
const HIT_SLOP: f32 = 4.0;

/// Frame input relevant to the viewer.
struct PointerInput {
    pos: Option<Pos2>,
    primary_pressed: bool,
    primary_released: bool,
    secondary_pressed: bool,
    double_clicked: bool,
    scroll_y: f32,
}

/// Display the viewer and dispatch its pointer input.
pub fn show(
    ui: &mut egui::Ui,
    session: &mut Session,
    texture: Option<&egui::TextureHandle>,
    style: &ExportStyle,
    placeholder: Option<&str>,
) {
    let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
    session.viewport.set_container(rect);
    session.apply_initial_view();

    let painter = ui.painter_at(rect);
    painter.rect_filled(rect, 0.0, Color32::from_gray(17));

    match (texture, session.viewport.displayed_rect()) {
        (Some(texture), Some(image_rect)) => {
            painter.image(
                texture.id(),
                image_rect,
                Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                Color32::WHITE,
            );
            draw_overlay(&painter, session, style);
        }
        _ => {
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                placeholder.unwrap_or("Loading image..."),
                FontId::proportional(16.0),
                Color32::from_gray(180),
            );
            return;
        }
    }

    let input = ui.input(|i| PointerInput {
        pos: i.pointer.latest_pos(),
        primary_pressed: i.pointer.primary_pressed(),
        primary_released: i.pointer.primary_released(),
        secondary_pressed: i.pointer.secondary_pressed(),
        double_clicked: i.pointer.button_double_clicked(PointerButton::Primary),
        scroll_y: i.raw_scroll_delta.y,
    });
    // Hover is false when a window or the context menu covers the viewer.
    let over_canvas = response.hovered();
    handle_input(session, &input, over_canvas, style.label_font_size);

    if over_canvas && session.interaction.label_dialog().is_none() {
        let icon = if session.interaction.is_panning() || session.interaction.dragged_annotation().is_some() {
            CursorIcon::Grabbing
        } else {
            match session.interaction.tool() {
                Tool::Pan => CursorIcon::Grab,
                Tool::Measure | Tool::Label => CursorIcon::Crosshair,
            }
        };
        ui.ctx().set_cursor_icon(icon);
    }
}

fn handle_input(session: &mut Session, input: &PointerInput, over_canvas: bool, font_size: f32) {
    let Session {
        store,
        viewport,
        interaction,
        ..
    } = session;

    if let Some(pos) = input.pos {
        if input.primary_pressed {
            interaction.click_anywhere(pos, viewport);
        }

        if over_canvas && input.primary_pressed {
            match hit_at(store, viewport, pos, font_size) {
                Some(geometry::Hit { id, part: Some(part) }) => {
                    interaction.handle_pointer_down(&id, part, store);
                }
                _ => {
                    interaction.pointer_down(pos, store, viewport);
                }
            }
        }

        if over_canvas && input.secondary_pressed {
            if let Some(hit) = hit_at(store, viewport, pos, font_size) {
                interaction.open_context_menu(&hit.id, pos, viewport);
            }
        }

        if over_canvas && input.double_clicked {
            match hit_at(store, viewport, pos, font_size) {
                Some(hit) if matches!(store.get(&hit.id), Some(Annotation::Label(_))) => {
                    interaction.open_label_editor(&hit.id, store);
                }
                None if interaction.tool() == Tool::Pan => viewport.reset(),
                _ => {}
            }
        }

        interaction.pointer_move(pos, store, viewport);

        if over_canvas && input.scroll_y != 0.0 {
            interaction.wheel(input.scroll_y, pos, viewport);
        }
    }

    if input.primary_released {
        interaction.pointer_up(store);
    }
}

fn hit_at(store: &AnnotationStore, viewport: &Viewport, pos: Pos2, font_size: f32) -> Option<geometry::Hit> {
    let point = viewport.screen_to_image(pos)?;
    let tolerance = HIT_SLOP / viewport.display_scale();
    geometry::hit_test(store.annotations(), point, tolerance, font_size)
}

fn to_color(rgba: [u8; 4]) -> Color32 {
    Color32::from_rgba_unmultiplied(rgba[0], rgba[1], rgba[2], rgba[3])
}

fn draw_overlay(painter: &Painter, session: &Session, style: &ExportStyle) {
    let viewport = &session.viewport;
    let scale = viewport.display_scale();

    for annotation in session.store.annotations() {
        match annotation {
            Annotation::Label(label) => draw_label(painter, viewport, label, style.label_font_size, scale),
            Annotation::Measurement(measure) => draw_measurement(
                painter,
                viewport,
                measure,
                &session.store.distance_text(measure),
                style.measure_font_size,
                scale,
            ),
        }
    }

    if let Some(point) = session.interaction.pending_point() {
        let center = viewport.image_to_screen(point);
        let radius = (HANDLE_RADIUS * scale).max(3.0);
        painter.circle_filled(center, radius, Color32::from_white_alpha(60));
        painter.circle_stroke(center, radius, Stroke::new(1.5, to_color(MEASURE_RGBA)));
    }
}

fn draw_label(painter: &Painter, viewport: &Viewport, label: &Label, font_size: f32, scale: f32) {
    let color = to_color(label_rgba(&label.color));
    let center = viewport.image_to_screen(Point::new(label.x, label.y));
    let radius = (HANDLE_RADIUS * scale).max(2.0);
    painter.circle_filled(center, radius, color);
    painter.circle_stroke(center, radius, Stroke::new(1.0, Color32::WHITE));

    let anchor = viewport.image_to_screen(Point::new(
        label.x + LABEL_TEXT_OFFSET.0,
        label.y + LABEL_TEXT_OFFSET.1,
    ));
    painter.text(
        anchor,
        Align2::LEFT_BOTTOM,
        &label.text,
        FontId::proportional((font_size * scale).max(1.0)),
        color,
    );
}

fn draw_measurement(
    painter: &Painter,
    viewport: &Viewport,
    measure: &Measurement,
    text: &str,
    font_size: f32,
    scale: f32,
) {
    let color = to_color(MEASURE_RGBA);
    let start = viewport.image_to_screen(measure.start());
    let end = viewport.image_to_screen(measure.end());
    painter.line_segment([start, end], Stroke::new((4.0 * scale).max(1.0), color));

    let radius = (HANDLE_RADIUS * scale).max(2.0);
    for handle in [start, end] {
        painter.circle_filled(handle, radius, Color32::WHITE);
        painter.circle_stroke(handle, radius, Stroke::new((2.0 * scale).max(1.0), color));
    }

    let chip = geometry::chip_rect(measure);
    let chip = Rect::from_min_max(
        viewport.image_to_screen(Point::new(chip.min.x, chip.min.y)),
        viewport.image_to_screen(Point::new(chip.max.x, chip.max.y)),
    );
    painter.rect_filled(chip, 6.0 * scale, color);
    // Scaled to the chip so the text stays inside it at any length
    let text_size = (font_size * 0.6 * scale).max(1.0);
    painter.text(
        chip.center(),
        Align2::CENTER_CENTER,
        text,
        FontId::proportional(text_size),
        Color32::WHITE,
    );
}

// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Viewport transform: zoom and pan of the image inside the viewer.
//!
//! The view maps an image-natural pixel `(x, y)` to the screen position
//! `container.min + offset + (x, y) * zoom`. Every change to zoom or offset
//! goes through [`Viewport::clamp_and_apply`], which keeps the displayed
//! image intersecting the container.
//!
//! Until both the image size and the container rect are known the
//! viewport is "unmeasured": mapping falls back to the raw transform and
//! operations that need measurements do nothing.

use crate::models::annotation::Point;
use egui::{pos2, vec2, Pos2, Rect, Vec2};

pub const MIN_ZOOM: f32 = 0.05;
pub const MAX_ZOOM: f32 = 20.0;

/// Zoom factor per mouse-wheel notch.
pub const WHEEL_STEP: f32 = 1.08;

/// Scroll delta of one wheel notch, in points (egui's native line scroll speed).
pub const WHEEL_NOTCH: f32 = 40.0;

/// Zoom factor of the toolbar zoom buttons.
pub const BUTTON_STEP: f32 = 1.2;

/// Zoom and pan offset (relative to the container's top-left corner).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub zoom: f32,
    pub offset: Vec2,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            offset: Vec2::ZERO,
        }
    }
}

#[derive(Debug, Default)]
pub struct Viewport {
    view: ViewState,
    /// Natural image size in pixels
    image_size: Option<Vec2>,
    /// Viewer rect in screen coordinates
    container: Option<Rect>,
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn zoom(&self) -> f32 {
        self.view.zoom
    }

    pub fn offset(&self) -> Vec2 {
        self.view.offset
    }

    pub fn image_size(&self) -> Option<Vec2> {
        self.image_size
    }

    pub fn set_image_size(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.image_size = Some(vec2(width as f32, height as f32));
        }
    }

    pub fn container(&self) -> Option<Rect> {
        self.container
    }

    /// Record the container rect measured during layout. A resize
    /// re-clamps the current view against the new size.
    pub fn set_container(&mut self, rect: Rect) {
        if rect.width() <= 0.0 || rect.height() <= 0.0 {
            return;
        }
        let resized = self.container.map_or(true, |old| old.size() != rect.size());
        self.container = Some(rect);
        if resized && self.is_measured() {
            self.clamp_and_apply(self.view.zoom, Some(self.view.offset));
        }
    }

    pub fn is_measured(&self) -> bool {
        self.image_size.is_some() && self.container.is_some()
    }

    /// Screen rect of the displayed image.
    pub fn displayed_rect(&self) -> Option<Rect> {
        let image = self.image_size?;
        let container = self.container?;
        Some(Rect::from_min_size(
            container.min + self.view.offset,
            image * self.view.zoom,
        ))
    }

    /// The single mutation gateway for zoom and offset.
    ///
    /// Zoom is clamped to `[MIN_ZOOM, MAX_ZOOM]`. Per axis, a scaled image
    /// smaller than the container is centred; a larger one may only be
    /// panned while it still covers the container. `offset: None` centres.
    pub fn clamp_and_apply(&mut self, zoom: f32, offset: Option<Vec2>) {
        if !zoom.is_finite() {
            return;
        }
        let zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        let offset = offset.filter(|o| o.x.is_finite() && o.y.is_finite());

        let (Some(image), Some(container)) = (self.image_size, self.container) else {
            self.view = ViewState {
                zoom,
                offset: offset.unwrap_or(Vec2::ZERO),
            };
            return;
        };

        let displayed = vec2((image.x * zoom).max(1.0), (image.y * zoom).max(1.0));
        let x = clamp_axis(offset.map(|o| o.x), container.width(), displayed.x);
        let y = clamp_axis(offset.map(|o| o.y), container.height(), displayed.y);
        self.view = ViewState {
            zoom,
            offset: vec2(x, y),
        };
    }

    /// Change zoom while keeping the image point under `anchor` fixed.
    pub fn set_zoom_around_point(&mut self, new_zoom: f32, anchor: Pos2) {
        if !new_zoom.is_finite() {
            return;
        }
        let new_zoom = new_zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        let Some(container) = self.container else {
            self.clamp_and_apply(new_zoom, Some(self.view.offset));
            return;
        };

        let anchor = anchor - container.min;
        let image_point = (anchor - self.view.offset) / self.view.zoom;
        let new_offset = anchor - image_point * new_zoom;
        self.clamp_and_apply(new_zoom, Some(new_offset));
    }

    /// Wheel zoom toward the cursor. Positive `scroll_y` (scroll up) zooms
    /// in by one [`WHEEL_STEP`] per [`WHEEL_NOTCH`] points, so several
    /// notches in one frame and fractional trackpad deltas both count.
    pub fn wheel(&mut self, scroll_y: f32, anchor: Pos2) {
        if scroll_y == 0.0 || !scroll_y.is_finite() {
            return;
        }
        let factor = WHEEL_STEP.powf(scroll_y / WHEEL_NOTCH);
        self.set_zoom_around_point(self.view.zoom * factor, anchor);
    }

    /// Multiply zoom by `factor` around the container centre.
    pub fn zoom_by(&mut self, factor: f32) {
        match self.container {
            Some(container) => self.set_zoom_around_point(self.view.zoom * factor, container.center()),
            None => self.clamp_and_apply(self.view.zoom * factor, Some(self.view.offset)),
        }
    }

    /// Set an absolute zoom around the container centre.
    pub fn set_zoom(&mut self, zoom: f32) {
        match self.container {
            Some(container) => self.set_zoom_around_point(zoom, container.center()),
            None => self.clamp_and_apply(zoom, Some(self.view.offset)),
        }
    }

    /// Pan to `start_offset + delta` (a drag measured from its start).
    pub fn pan_from(&mut self, start_offset: Vec2, delta: Vec2) {
        self.clamp_and_apply(self.view.zoom, Some(start_offset + delta));
    }

    /// Scale the image to fit the container and centre it.
    pub fn fit_to_container(&mut self) {
        let (Some(image), Some(container)) = (self.image_size, self.container) else {
            return;
        };
        let zoom = (container.width() / image.x).min(container.height() / image.y);
        self.clamp_and_apply(zoom, None);
    }

    /// Zoom 1 at the top-left corner.
    pub fn reset(&mut self) {
        self.clamp_and_apply(1.0, Some(Vec2::ZERO));
    }

    /// Map a screen position to image-natural pixels, clamped to the image.
    pub fn screen_to_image(&self, pos: Pos2) -> Option<Point> {
        let image = self.image_size?;
        let rect = self.displayed_rect()?;
        let scale_x = nonzero(rect.width() / image.x);
        let scale_y = nonzero(rect.height() / image.y);

        let x = (pos.x - rect.min.x) / scale_x;
        let y = (pos.y - rect.min.y) / scale_y;
        Some(Point::new(x.clamp(0.0, image.x), y.clamp(0.0, image.y)))
    }

    /// Map image-natural pixels to a screen position.
    ///
    /// The scale is taken from the displayed rect rather than the stored
    /// zoom so overlay and image agree after layout rounding.
    pub fn image_to_screen(&self, point: Point) -> Pos2 {
        match (self.image_size, self.displayed_rect()) {
            (Some(image), Some(rect)) => {
                let scale_x = nonzero(rect.width() / image.x);
                let scale_y = nonzero(rect.height() / image.y);
                pos2(rect.min.x + point.x * scale_x, rect.min.y + point.y * scale_y)
            }
            _ => pos2(
                self.view.offset.x + point.x * self.view.zoom,
                self.view.offset.y + point.y * self.view.zoom,
            ),
        }
    }

    /// Screen pixels per image pixel.
    pub fn display_scale(&self) -> f32 {
        match (self.image_size, self.displayed_rect()) {
            (Some(image), Some(rect)) => nonzero(rect.width() / image.x),
            _ => self.view.zoom,
        }
    }
}

fn clamp_axis(proposed: Option<f32>, container: f32, displayed: f32) -> f32 {
    let centred = (container - displayed) / 2.0;
    if displayed <= container {
        centred
    } else {
        proposed.unwrap_or(centred).clamp(container - displayed, 0.0)
    }
}

fn nonzero(scale: f32) -> f32 {
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measured(iw: u32, ih: u32, cw: f32, ch: f32) -> Viewport {
        let mut viewport = Viewport::new();
        viewport.set_image_size(iw, ih);
        viewport.set_container(Rect::from_min_size(pos2(50.0, 30.0), vec2(cw, ch)));
        viewport
    }

    fn assert_overlaps(viewport: &Viewport) {
        let image = viewport.displayed_rect().unwrap();
        let container = viewport.container().unwrap();
        let overlap = image.intersect(container);
        assert!(overlap.width() >= 1.0, "no horizontal overlap: {image:?} vs {container:?}");
        assert!(overlap.height() >= 1.0, "no vertical overlap: {image:?} vs {container:?}");
    }

    #[test]
    fn test_round_trip_all_zoom_levels() {
        let mut viewport = measured(1000, 800, 640.0, 480.0);
        for zoom in [0.05, 0.1, 0.5, 1.0, 2.5, 7.0, 20.0] {
            viewport.clamp_and_apply(zoom, Some(vec2(-37.0, -11.0)));
            let rect = viewport.displayed_rect().unwrap();
            for (fx, fy) in [(0.1, 0.1), (0.5, 0.25), (0.9, 0.95)] {
                let p = pos2(rect.min.x + rect.width() * fx, rect.min.y + rect.height() * fy);
                let image = viewport.screen_to_image(p).unwrap();
                let back = viewport.image_to_screen(image);
                assert!((back - p).length() < 0.5, "zoom {zoom}: {p:?} -> {back:?}");
            }
        }
    }

    #[test]
    fn test_clamp_keeps_image_in_view() {
        let mut viewport = measured(1000, 800, 640.0, 480.0);
        let proposals = [
            vec2(-1e6, -1e6),
            vec2(1e6, 1e6),
            vec2(-5000.0, 300.0),
            vec2(0.0, 0.0),
        ];
        for zoom in [0.05, 0.3, 1.0, 4.0, 20.0] {
            for offset in proposals {
                viewport.clamp_and_apply(zoom, Some(offset));
                assert_overlaps(&viewport);
            }
        }
    }

    #[test]
    fn test_small_image_is_centred() {
        let mut viewport = measured(100, 50, 400.0, 300.0);
        viewport.clamp_and_apply(1.0, Some(vec2(-80.0, 500.0)));
        assert_eq!(viewport.offset(), vec2(150.0, 125.0));
    }

    #[test]
    fn test_zoom_bounds() {
        let mut viewport = measured(100, 100, 100.0, 100.0);
        viewport.clamp_and_apply(1000.0, None);
        assert_eq!(viewport.zoom(), MAX_ZOOM);
        viewport.clamp_and_apply(0.0001, None);
        assert_eq!(viewport.zoom(), MIN_ZOOM);
        viewport.clamp_and_apply(f32::NAN, None);
        assert_eq!(viewport.zoom(), MIN_ZOOM);
    }

    #[test]
    fn test_zoom_keeps_anchor_fixed() {
        let mut viewport = measured(2000, 2000, 500.0, 500.0);
        viewport.clamp_and_apply(1.0, Some(vec2(-600.0, -700.0)));
        let anchor = pos2(50.0 + 210.0, 30.0 + 140.0);
        let under = viewport.screen_to_image(anchor).unwrap();

        viewport.wheel(WHEEL_NOTCH, anchor);
        assert!((viewport.zoom() - WHEEL_STEP).abs() < 1e-6);
        let still = viewport.image_to_screen(under);
        assert!((still - anchor).length() < 0.01);
    }

    #[test]
    fn test_wheel_down_zooms_out() {
        let mut viewport = measured(2000, 2000, 500.0, 500.0);
        viewport.clamp_and_apply(2.0, None);
        viewport.wheel(-WHEEL_NOTCH, pos2(300.0, 300.0));
        assert!((viewport.zoom() - 2.0 / WHEEL_STEP).abs() < 1e-5);
    }

    #[test]
    fn test_wheel_steps_follow_delta() {
        let mut viewport = measured(2000, 2000, 500.0, 500.0);
        viewport.clamp_and_apply(1.0, None);
        viewport.wheel(3.0 * WHEEL_NOTCH, pos2(300.0, 300.0));
        assert!((viewport.zoom() - WHEEL_STEP.powi(3)).abs() < 1e-5);

        // A small trackpad delta is a fraction of a step
        viewport.clamp_and_apply(1.0, None);
        viewport.wheel(5.0, pos2(300.0, 300.0));
        assert!(viewport.zoom() > 1.0 && viewport.zoom() < WHEEL_STEP);
    }

    #[test]
    fn test_shrinking_container_reclamps() {
        let mut viewport = Viewport::new();
        viewport.set_image_size(100, 100);
        viewport.set_container(Rect::from_min_size(pos2(0.0, 0.0), vec2(1000.0, 1000.0)));
        viewport.clamp_and_apply(1.0, None);
        assert_eq!(viewport.offset(), vec2(450.0, 450.0));

        viewport.set_container(Rect::from_min_size(pos2(0.0, 0.0), vec2(300.0, 300.0)));
        assert_overlaps(&viewport);
        assert_eq!(viewport.offset(), vec2(100.0, 100.0));
    }

    #[test]
    fn test_moving_container_keeps_view() {
        let mut viewport = measured(1000, 1000, 200.0, 200.0);
        viewport.clamp_and_apply(1.0, Some(vec2(-300.0, -400.0)));
        viewport.set_container(Rect::from_min_size(pos2(90.0, 70.0), vec2(200.0, 200.0)));
        assert_eq!(viewport.offset(), vec2(-300.0, -400.0));
    }

    #[test]
    fn test_fit_to_container() {
        let mut viewport = measured(1000, 500, 400.0, 400.0);
        viewport.fit_to_container();
        assert!((viewport.zoom() - 0.4).abs() < 1e-6);
        assert_eq!(viewport.offset(), vec2(0.0, 100.0));
    }

    #[test]
    fn test_pan_is_clamped() {
        let mut viewport = measured(1000, 1000, 200.0, 200.0);
        viewport.clamp_and_apply(1.0, Some(vec2(0.0, 0.0)));
        viewport.pan_from(vec2(0.0, 0.0), vec2(500.0, -300.0));
        assert_eq!(viewport.offset(), vec2(0.0, -300.0));
        viewport.pan_from(vec2(0.0, -300.0), vec2(-5000.0, -5000.0));
        assert_eq!(viewport.offset(), vec2(-800.0, -800.0));
    }

    #[test]
    fn test_unmeasured_never_fails() {
        let mut viewport = Viewport::new();
        assert!(viewport.screen_to_image(pos2(10.0, 10.0)).is_none());
        viewport.fit_to_container();
        viewport.wheel(WHEEL_NOTCH, pos2(0.0, 0.0));
        assert_eq!(viewport.image_to_screen(Point::new(2.0, 3.0)), pos2(2.0 * WHEEL_STEP, 3.0 * WHEEL_STEP));
    }

    #[test]
    fn test_screen_to_image_clamps_outside_points() {
        let mut viewport = measured(100, 100, 400.0, 400.0);
        viewport.clamp_and_apply(2.0, None);
        let p = viewport.screen_to_image(pos2(0.0, 10_000.0)).unwrap();
        assert_eq!(p, Point::new(0.0, 100.0));
    }
}

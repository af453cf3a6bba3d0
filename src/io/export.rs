// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Annotated PNG export.
//!
//! Rasterizes the source image at natural resolution with every annotation
//! drawn on top, in store order. Shapes go through tiny-skia. Text is
//! rasterized by imageproc and composited onto the same pixmap, so a later
//! annotation covers an earlier one's text. The file is only written once the whole image has been
//! rendered and encoded.

use crate::models::annotation::{Annotation, Label, Measurement};
use crate::models::store::format_distance;
use crate::util::geometry::{chip_rect, midpoint};
use crate::util::palette::{label_rgba, MEASURE_RGBA};
use ab_glyph::FontArc;
use image::{imageops, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tiny_skia::{
    ColorU8, FillRule, Paint, PathBuilder, Pixmap, PixmapPaint, PremultipliedColorU8, Rect, Stroke, Transform,
};

const LABEL_MARKER_RADIUS: f32 = 6.0;
const ENDPOINT_RADIUS: f32 = 6.0;
const MEASURE_LINE_WIDTH: f32 = 3.0;
const CHIP_RGBA: [u8; 4] = [0, 120, 255, 230];

/// Font sizes used in the exported image, in image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportStyle {
    pub label_font_size: f32,
    pub measure_font_size: f32,
}

impl Default for ExportStyle {
    fn default() -> Self {
        Self {
            label_font_size: 25.0,
            measure_font_size: 25.0,
        }
    }
}

/// Why an export was aborted.
#[derive(Debug)]
pub enum ExportError {
    /// Neither the decoded bitmap nor a re-fetch of the source was usable.
    SourceUnavailable { direct: String, fallback: String },
    /// The drawing surface could not be created.
    Canvas(String),
    Encode(String),
    Write { path: PathBuf, message: String },
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::SourceUnavailable { direct, fallback } => write!(
                f,
                "Unable to read the image pixels ({direct}); fetching the source again also failed ({fallback})"
            ),
            ExportError::Canvas(message) => write!(f, "Unable to create the export canvas: {message}"),
            ExportError::Encode(message) => write!(f, "Unable to encode PNG: {message}"),
            ExportError::Write { path, message } => {
                write!(f, "Unable to write {}: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for ExportError {}

/// Everything an export needs, detached from the live session so it can
/// run on a worker thread.
pub struct ExportJob {
    pub source: String,
    pub natural_size: (u32, u32),
    pub bitmap: Option<std::sync::Arc<RgbaImage>>,
    pub annotations: Vec<Annotation>,
    pub mm_per_px: f64,
    pub style: ExportStyle,
    pub font: Option<FontArc>,
}

/// Download name for an exported image.
pub fn export_file_name(filename: &str) -> String {
    format!("{filename}-annotated.png")
}

/// Pick the base bitmap: the decoded copy when it matches the natural size,
/// otherwise whatever `fallback` fetches, scaled to the natural size.
pub fn resolve_base<F>(cached: Option<&RgbaImage>, natural_size: (u32, u32), fallback: F) -> Result<RgbaImage, ExportError>
where
    F: FnOnce() -> anyhow::Result<RgbaImage>,
{
    let direct = match cached {
        Some(image) if image.dimensions() == natural_size => return Ok(image.clone()),
        Some(image) => format!(
            "decoded bitmap is {}x{}, expected {}x{}",
            image.width(),
            image.height(),
            natural_size.0,
            natural_size.1
        ),
        None => "no decoded bitmap".to_string(),
    };

    log::warn!("Direct export unavailable ({}), fetching source again", direct);
    match fallback() {
        Ok(image) if image.dimensions() == natural_size => Ok(image),
        Ok(image) => Ok(imageops::resize(
            &image,
            natural_size.0,
            natural_size.1,
            imageops::FilterType::Triangle,
        )),
        Err(e) => Err(ExportError::SourceUnavailable {
            direct,
            fallback: format!("{e:#}"),
        }),
    }
}

/// Draw all annotations over `base`.
pub fn render(
    base: &RgbaImage,
    annotations: &[Annotation],
    mm_per_px: f64,
    style: &ExportStyle,
    font: Option<&FontArc>,
) -> Result<RgbaImage, ExportError> {
    let (width, height) = base.dimensions();
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| ExportError::Canvas(format!("cannot allocate {width}x{height} pixmap")))?;

    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(base.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }

    for annotation in annotations {
        match annotation {
            Annotation::Label(label) => {
                draw_label_marker(&mut pixmap, label);
                if let Some(font) = font {
                    draw_label_text(&mut pixmap, label, style.label_font_size, font);
                }
            }
            Annotation::Measurement(measure) => {
                draw_measurement_shapes(&mut pixmap, measure);
                if let Some(font) = font {
                    let text = format_distance(measure.pixel_length() * mm_per_px);
                    draw_measurement_text(&mut pixmap, measure, &text, style.measure_font_size, font);
                }
            }
        }
    }

    let mut output = RgbaImage::new(width, height);
    for (dst, src) in output.pixels_mut().zip(pixmap.pixels()) {
        let color = src.demultiply();
        *dst = Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
    }

    Ok(output)
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| ExportError::Encode(e.to_string()))?;
    Ok(buffer.into_inner())
}

/// Render and encode a job. `fallback` re-fetches the source when the job
/// carries no usable bitmap.
pub fn export_png<F>(job: &ExportJob, fallback: F) -> Result<Vec<u8>, ExportError>
where
    F: FnOnce() -> anyhow::Result<RgbaImage>,
{
    let base = resolve_base(job.bitmap.as_deref(), job.natural_size, fallback)?;
    let rendered = render(
        &base,
        &job.annotations,
        job.mm_per_px,
        &job.style,
        job.font.as_ref(),
    )?;
    encode_png(&rendered)
}

/// Write encoded bytes in one go.
pub fn write_export(bytes: &[u8], path: &Path) -> Result<(), ExportError> {
    std::fs::write(path, bytes).map_err(|e| ExportError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial Unicode.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Proportional font compiled into egui.
pub fn bundled_font() -> Option<FontArc> {
    let definitions = egui::FontDefinitions::default();
    let data = definitions.font_data.get("Ubuntu-Light")?;
    FontArc::try_from_vec(data.font.to_vec()).ok()
}

/// Font for export text: the configured file, else the first system font
/// that loads, else the font bundled with egui.
pub fn load_font(configured: Option<&Path>) -> Option<FontArc> {
    if let Some(path) = configured {
        match std::fs::read(path).map_err(anyhow::Error::from).and_then(|bytes| {
            FontArc::try_from_vec(bytes).map_err(anyhow::Error::from)
        }) {
            Ok(font) => return Some(font),
            Err(e) => log::warn!("Cannot use font {}: {}", path.display(), e),
        }
    }

    let font = SYSTEM_FONTS
        .iter()
        .filter_map(|path| std::fs::read(path).ok())
        .find_map(|bytes| FontArc::try_from_vec(bytes).ok())
        .or_else(|| {
            log::info!("No system font found, using the bundled font");
            bundled_font()
        });
    if font.is_none() {
        log::warn!("No usable font; exported images will have no text");
    }
    font
}

fn paint(rgba: [u8; 4]) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(rgba[0], rgba[1], rgba[2], rgba[3]);
    paint.anti_alias = true;
    paint
}

fn fill_circle(pixmap: &mut Pixmap, x: f32, y: f32, radius: f32, paint: &Paint) {
    if let Some(path) = PathBuilder::from_circle(x, y, radius) {
        pixmap.fill_path(&path, paint, FillRule::Winding, Transform::identity(), None);
    }
}

fn draw_label_marker(pixmap: &mut Pixmap, label: &Label) {
    let Some(path) = PathBuilder::from_circle(label.x, label.y, LABEL_MARKER_RADIUS) else {
        return;
    };
    pixmap.fill_path(
        &path,
        &paint(label_rgba(&label.color)),
        FillRule::Winding,
        Transform::identity(),
        None,
    );
    let outline = Stroke {
        width: 1.0,
        ..Default::default()
    };
    pixmap.stroke_path(&path, &paint([255, 255, 255, 255]), &outline, Transform::identity(), None);
}

fn draw_measurement_shapes(pixmap: &mut Pixmap, measure: &Measurement) {
    let line_paint = paint(MEASURE_RGBA);

    let mut pb = PathBuilder::new();
    pb.move_to(measure.x, measure.y);
    pb.line_to(measure.x2, measure.y2);
    if let Some(path) = pb.finish() {
        let stroke = Stroke {
            width: MEASURE_LINE_WIDTH,
            line_cap: tiny_skia::LineCap::Round,
            ..Default::default()
        };
        pixmap.stroke_path(&path, &line_paint, &stroke, Transform::identity(), None);
    }

    fill_circle(pixmap, measure.x, measure.y, ENDPOINT_RADIUS, &line_paint);
    fill_circle(pixmap, measure.x2, measure.y2, ENDPOINT_RADIUS, &line_paint);

    let chip = chip_rect(measure);
    if let Some(rect) = Rect::from_ltrb(chip.min.x, chip.min.y, chip.max.x, chip.max.y) {
        pixmap.fill_rect(rect, &paint(CHIP_RGBA), Transform::identity(), None);
    }
}

/// Composite `text` with its layout box at (`x`, `y`). Glyphs are rasterized
/// opaque onto a transparent scratch image, which leaves coverage in every
/// channel, i.e. already premultiplied.
fn stamp_text(pixmap: &mut Pixmap, rgba: [u8; 4], x: i32, y: i32, size: f32, font: &FontArc, text: &str) {
    let (w, h) = text_size(size, font, text);
    // Glyphs may overhang the advance box
    let pad = (size / 2.0).ceil() as u32 + 2;
    let mut scratch = RgbaImage::new(w + 2 * pad, h + 2 * pad);
    draw_text_mut(
        &mut scratch,
        Rgba([rgba[0], rgba[1], rgba[2], 255]),
        pad as i32,
        pad as i32,
        size,
        font,
        text,
    );

    let Some(mut glyphs) = Pixmap::new(scratch.width(), scratch.height()) else {
        return;
    };
    for (dst, src) in glyphs.pixels_mut().iter_mut().zip(scratch.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = PremultipliedColorU8::from_rgba(r.min(a), g.min(a), b.min(a), a)
            .unwrap_or(PremultipliedColorU8::TRANSPARENT);
    }

    let paint = PixmapPaint {
        opacity: rgba[3] as f32 / 255.0,
        ..Default::default()
    };
    pixmap.draw_pixmap(
        x - pad as i32,
        y - pad as i32,
        glyphs.as_ref(),
        &paint,
        Transform::identity(),
        None,
    );
}

fn draw_label_text(pixmap: &mut Pixmap, label: &Label, size: f32, font: &FontArc) {
    let text = if label.text.is_empty() { "label" } else { &label.text };
    // Baseline sits 4px above and right of the marker
    stamp_text(
        pixmap,
        label_rgba(&label.color),
        (label.x + 4.0) as i32,
        (label.y - 4.0 - size) as i32,
        size,
        font,
        text,
    );
}

fn draw_measurement_text(pixmap: &mut Pixmap, measure: &Measurement, text: &str, size: f32, font: &FontArc) {
    let (w, h) = text_size(size, font, text);
    let mid = midpoint(measure.start(), measure.end());
    stamp_text(
        pixmap,
        [255, 255, 255, 255],
        (mid.x - w as f32 / 2.0) as i32,
        (mid.y - h as f32 / 2.0) as i32,
        size,
        font,
        text,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn white(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]))
    }

    fn measurement() -> Annotation {
        Annotation::Measurement(Measurement {
            id: "a1".to_string(),
            x: 10.0,
            y: 150.0,
            x2: 190.0,
            y2: 150.0,
        })
    }

    #[test]
    fn test_file_name() {
        assert_eq!(export_file_name("scan"), "scan-annotated.png");
    }

    #[test]
    fn test_render_keeps_size_and_draws() {
        let label = Annotation::Label(Label {
            id: "a2".to_string(),
            x: 30.0,
            y: 30.0,
            text: "lesion".to_string(),
            color: "#34c759".to_string(),
        });
        let base = white(200, 200);
        let out = render(&base, &[measurement(), label], 0.264, &ExportStyle::default(), None).unwrap();

        assert_eq!(out.dimensions(), (200, 200));
        // Line away from the chip
        let on_line = out.get_pixel(20, 150);
        assert!(on_line[2] > 200 && on_line[0] < 100, "line pixel {on_line:?}");
        // Label marker centre
        let marker = out.get_pixel(30, 30);
        assert_eq!(marker.0[..3], [52, 199, 89]);
        // Untouched background
        assert_eq!(out.get_pixel(100, 10), &Rgba([255, 255, 255, 255]));
    }

    fn is_green(pixel: &Rgba<u8>) -> bool {
        let [r, g, b, _] = pixel.0;
        g as i32 > r as i32 + 20 && g as i32 > b as i32 + 20
    }

    #[test]
    fn test_later_chip_covers_earlier_label_text() {
        let font = bundled_font().unwrap();
        let label = Annotation::Label(Label {
            id: "a1".to_string(),
            x: 60.0,
            y: 118.0,
            text: "WWWW".to_string(),
            color: "#34c759".to_string(),
        });
        let measure = Annotation::Measurement(Measurement {
            id: "a2".to_string(),
            x: 20.0,
            y: 100.0,
            x2: 180.0,
            y2: 100.0,
        });
        let base = white(200, 200);
        let style = ExportStyle::default();
        // Chip interior for a midpoint of (100, 100)
        let inside = |x: u32, y: u32| (61..139).contains(&x) && (87..113).contains(&y);

        let alone = render(&base, std::slice::from_ref(&label), 0.264, &style, Some(&font)).unwrap();
        assert!(alone.enumerate_pixels().any(|(x, y, p)| inside(x, y) && is_green(p)));

        let out = render(&base, &[label, measure], 0.264, &style, Some(&font)).unwrap();
        assert!(!out.enumerate_pixels().any(|(x, y, p)| inside(x, y) && is_green(p)));
    }

    #[test]
    fn test_bundled_font_draws_distance() {
        let font = bundled_font().unwrap();
        let base = white(200, 200);
        let out = render(&base, &[measurement()], 0.264, &ExportStyle::default(), Some(&font)).unwrap();
        // Chip fill has almost no red, so bright pixels there are the text
        let chip = chip_rect(&Measurement {
            id: "a1".to_string(),
            x: 10.0,
            y: 150.0,
            x2: 190.0,
            y2: 150.0,
        });
        let text_pixels = out
            .enumerate_pixels()
            .filter(|(x, y, p)| chip.contains(egui::pos2(*x as f32 + 0.5, *y as f32 + 0.5)) && p[0] > 200)
            .count();
        assert!(text_pixels > 0);
    }

    #[test]
    fn test_resolve_prefers_cached_bitmap() {
        let cached = white(4, 4);
        let base = resolve_base(Some(&cached), (4, 4), || Err(anyhow!("must not fetch"))).unwrap();
        assert_eq!(base, cached);
    }

    #[test]
    fn test_resolve_falls_back_and_scales() {
        let base = resolve_base(None, (8, 6), || Ok(white(4, 3))).unwrap();
        assert_eq!(base.dimensions(), (8, 6));

        let stale = white(2, 2);
        let base = resolve_base(Some(&stale), (4, 4), || Ok(white(4, 4))).unwrap();
        assert_eq!(base.dimensions(), (4, 4));
    }

    #[test]
    fn test_export_aborts_when_both_paths_fail() {
        let job = ExportJob {
            source: "https://example.org/scan.png".to_string(),
            natural_size: (10, 10),
            bitmap: None,
            annotations: vec![measurement()],
            mm_per_px: 1.0,
            style: ExportStyle::default(),
            font: None,
        };
        let err = export_png(&job, || Err(anyhow!("CORS"))).unwrap_err();
        assert!(matches!(err, ExportError::SourceUnavailable { .. }));
        assert!(err.to_string().contains("CORS"));
    }

    #[test]
    fn test_export_produces_png() {
        let job = ExportJob {
            source: "scan.png".to_string(),
            natural_size: (200, 200),
            bitmap: Some(std::sync::Arc::new(white(200, 200))),
            annotations: vec![measurement()],
            mm_per_px: 1.0,
            style: ExportStyle::default(),
            font: None,
        };
        let bytes = export_png(&job, || Err(anyhow!("unused"))).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (200, 200));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(export_file_name("scan"));
        write_export(&bytes, &path).unwrap();
        assert!(path.exists());
    }
}

// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Main application state and egui App implementation.
//!
//! The app owns one [`Session`] for the image it was opened on, loads the
//! image and exports PNGs on background threads, and mirrors the session
//! to storage whenever it changes.

use crate::config::Config;
use crate::interaction::{Outcome, Shortcut};
use crate::io::export::{self, ExportError, ExportJob, ExportStyle};
use crate::io::media::{self, LoadedImage};
use crate::io::persistence::{FileStore, MemoryStore, Persistence};
use crate::io::serialization;
use crate::models::project::PersistedState;
use crate::session::{Session, Snapshot};
use crate::ui::{canvas, dialogs, toolbar};
use ab_glyph::FontArc;
use image::RgbaImage;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use toolbar::ToolbarAction;

/// What the host supplies when opening the annotator.
pub struct AnnotatorOptions {
    /// Path, `data:` URI or http(s) URL of the image
    pub source: String,
    /// Base name used for the exported PNG
    pub filename: String,
    /// Called once when the user closes the annotator
    pub on_close: Option<Box<dyn FnMut()>>,
}

pub struct AnnotatorApp {
    source: String,
    filename: String,
    on_close: Option<Box<dyn FnMut()>>,

    session: Session,

    /// `None` when persistence is disabled
    persistence: Option<Persistence>,

    /// Last state written to storage
    last_saved: Option<Snapshot>,

    /// Loaded image texture for display
    image_texture: Option<egui::TextureHandle>,

    /// Decoded pixels kept for export
    bitmap: Option<Arc<RgbaImage>>,

    /// Receiver for background image loading
    image_loader: Option<Receiver<Result<LoadedImage, String>>>,

    /// Loading state message
    loading_message: Option<String>,

    load_error: Option<String>,

    /// Receiver for the export in flight
    export_job: Option<Receiver<Result<PathBuf, ExportError>>>,

    /// Last status message shown under the viewer
    status: Option<String>,

    style: ExportStyle,
    font: Option<FontArc>,
}

impl AnnotatorApp {
    pub fn new(options: AnnotatorOptions, config: &Config, ctx: &egui::Context) -> Self {
        let persistence = config.persist().then(|| match config.state_dir.clone() {
            Some(dir) => Persistence::new(FileStore::new(dir)),
            None => match FileStore::default_location() {
                Some(store) => Persistence::new(store),
                None => {
                    log::warn!("No data directory; annotations are kept in memory only");
                    Persistence::new(MemoryStore::default())
                }
            },
        });

        let mut session = Session::new(config.mm_per_px());
        if let Some(saved) = persistence.as_ref().and_then(|p| p.load(&options.source)) {
            session.restore(saved);
        }

        let mut app = Self {
            source: options.source,
            filename: options.filename,
            on_close: options.on_close,
            session,
            persistence,
            last_saved: None,
            image_texture: None,
            bitmap: None,
            image_loader: None,
            loading_message: None,
            load_error: None,
            export_job: None,
            status: None,
            style: config.export_style(),
            font: export::load_font(config.font_path.as_deref()),
        };
        app.load_image(ctx);
        app
    }

    /// Load the source image and create a texture for display (asynchronously).
    fn load_image(&mut self, ctx: &egui::Context) {
        let (sender, receiver) = channel();
        self.image_loader = Some(receiver);
        self.loading_message = Some("Loading image...".to_string());
        self.load_error = None;

        let source = self.source.clone();
        let ctx = ctx.clone();
        std::thread::spawn(move || {
            let result = media::load_image(&source).map_err(|e| format!("{:#}", e));
            let _ = sender.send(result);
            ctx.request_repaint();
        });
    }

    fn poll_image_loader(&mut self, ctx: &egui::Context) {
        let Some(receiver) = &self.image_loader else {
            return;
        };
        let Ok(result) = receiver.try_recv() else {
            return;
        };
        self.image_loader = None;
        self.loading_message = None;

        match result {
            Ok(loaded) => {
                let size = [loaded.width as usize, loaded.height as usize];
                let color_image = egui::ColorImage::from_rgba_unmultiplied(size, loaded.pixels.as_raw());
                let texture = ctx.load_texture("annotated_image", color_image, egui::TextureOptions::LINEAR);

                self.image_texture = Some(texture);
                self.session.viewport.set_image_size(loaded.width, loaded.height);
                self.bitmap = Some(Arc::new(loaded.pixels));
                log::info!("Image loaded ({}x{})", loaded.width, loaded.height);
            }
            Err(e) => {
                log::error!("Failed to load image: {}", e);
                self.load_error = Some(format!("Failed to load image: {}", e));
            }
        }
    }

    /// Render the annotated image at natural size and write it where the
    /// user picks, on a background thread.
    fn start_export(&mut self) {
        if self.export_job.is_some() {
            return;
        }
        let Some(size) = self.session.viewport.image_size() else {
            self.status = Some("Image is not loaded yet".to_string());
            return;
        };

        let mut dialog = rfd::FileDialog::new()
            .add_filter("PNG", &["png"])
            .set_file_name(export::export_file_name(&self.filename));
        if let Some(dir) = dirs::download_dir() {
            dialog = dialog.set_directory(dir);
        }
        let Some(path) = dialog.save_file() else {
            return;
        };

        let job = ExportJob {
            source: self.source.clone(),
            natural_size: (size.x as u32, size.y as u32),
            bitmap: self.bitmap.clone(),
            annotations: self.session.store.annotations().to_vec(),
            mm_per_px: self.session.store.mm_per_px(),
            style: self.style,
            font: self.font.clone(),
        };

        let (sender, receiver) = channel();
        self.export_job = Some(receiver);
        self.status = Some("Exporting...".to_string());

        std::thread::spawn(move || {
            let result = export::export_png(&job, || media::refetch(&job.source).map(|loaded| loaded.pixels))
                .and_then(|bytes| export::write_export(&bytes, &path).map(|_| path));
            let _ = sender.send(result);
        });
    }

    fn poll_export(&mut self) {
        let Some(receiver) = &self.export_job else {
            return;
        };
        let Ok(result) = receiver.try_recv() else {
            return;
        };
        self.export_job = None;

        match result {
            Ok(path) => {
                log::info!("Exported annotated image to {}", path.display());
                self.status = Some(format!("Saved {}", path.display()));
            }
            Err(e) => {
                log::error!("Export failed: {}", e);
                self.status = Some("Export failed".to_string());
                rfd::MessageDialog::new()
                    .set_level(rfd::MessageLevel::Error)
                    .set_title("Export failed")
                    .set_description(e.to_string())
                    .set_buttons(rfd::MessageButtons::Ok)
                    .show();
            }
        }
    }

    /// Write the session to storage if anything persisted has changed.
    fn autosave(&mut self) {
        if !self.session.initial_view_applied() {
            return;
        }
        let Some(persistence) = &mut self.persistence else {
            return;
        };
        let snapshot = self.session.snapshot();
        if self.last_saved.as_ref() == Some(&snapshot) {
            return;
        }
        persistence.save(&self.source, &snapshot.clone().into());
        self.last_saved = Some(snapshot);
    }

    fn clear_saved(&mut self) {
        let Some(persistence) = &mut self.persistence else {
            return;
        };
        persistence.clear(&self.source);
        self.session.rearm_fit();
        // Unchanged state is not written back until something changes.
        self.last_saved = Some(self.session.snapshot());
        self.status = Some("Saved state cleared".to_string());
    }

    /// Export annotations to a file.
    fn export_sidecar(&mut self, path: PathBuf) {
        let data: PersistedState = self.session.snapshot().into();
        match serialization::export_sidecar(&data, &path) {
            Ok(()) => log::info!("Exported annotations to {}", path.display()),
            Err(e) => {
                log::error!("Failed to export annotations: {:#}", e);
                self.status = Some(format!("Failed to export annotations: {}", e));
            }
        }
    }

    /// Import annotations from a file, replacing the current ones.
    fn import_sidecar(&mut self, path: PathBuf) {
        match serialization::import_sidecar(&path) {
            Ok(data) => {
                log::info!("Imported {} annotations from {}", data.annotations.len(), path.display());
                self.session.interaction.cancel_label();
                self.session.interaction.dismiss_context_menu();
                self.session.import(data);
            }
            Err(e) => {
                log::error!("Failed to import annotations: {:#}", e);
                self.status = Some(format!("Failed to import annotations: {}", e));
            }
        }
    }

    fn close(&mut self, ctx: &egui::Context) {
        self.autosave();
        if let Some(mut on_close) = self.on_close.take() {
            on_close();
        }
        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }

    fn apply_toolbar(&mut self, action: ToolbarAction, ctx: &egui::Context) {
        let session = &mut self.session;
        match action {
            ToolbarAction::None => {}
            ToolbarAction::SelectTool(tool) => session.interaction.set_tool(tool),
            ToolbarAction::Fit => session.viewport.fit_to_container(),
            ToolbarAction::ZoomIn => session.viewport.zoom_by(crate::util::viewport::BUTTON_STEP),
            ToolbarAction::ZoomOut => session.viewport.zoom_by(1.0 / crate::util::viewport::BUTTON_STEP),
            ToolbarAction::SetZoom(zoom) => session.viewport.set_zoom(zoom),
            ToolbarAction::Undo => {
                session.interaction.shortcut(Shortcut::Undo, &mut session.store);
            }
            ToolbarAction::Redo => {
                session.interaction.shortcut(Shortcut::Redo, &mut session.store);
            }
            ToolbarAction::SetScale(mm_per_px) => {
                session.store.set_mm_per_px(mm_per_px);
            }
            ToolbarAction::Export => self.start_export(),
            ToolbarAction::ClearSaved => self.clear_saved(),
            ToolbarAction::Close => self.close(ctx),
        }
    }

    fn handle_keyboard(&mut self, ctx: &egui::Context) {
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            let outcome = self.session.interaction.shortcut(Shortcut::Escape, &mut self.session.store);
            if outcome == Outcome::CloseRequested {
                self.close(ctx);
                return;
            }
        }

        // Only process if no text field is focused
        if ctx.wants_keyboard_input() {
            return;
        }
        let undo = ctx.input(|i| i.modifiers.command && !i.modifiers.shift && i.key_pressed(egui::Key::Z));
        let redo = ctx.input(|i| {
            (i.modifiers.command && i.modifiers.shift && i.key_pressed(egui::Key::Z))
                || (i.modifiers.command && i.key_pressed(egui::Key::Y))
        });
        if undo {
            self.session.interaction.shortcut(Shortcut::Undo, &mut self.session.store);
        } else if redo {
            self.session.interaction.shortcut(Shortcut::Redo, &mut self.session.store);
        }
    }
}

impl eframe::App for AnnotatorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_image_loader(ctx);
        self.poll_export();

        // Request repaint while background work runs (to update spinner)
        if self.loading_message.is_some() || self.export_job.is_some() {
            ctx.request_repaint();
        }

        // Top menu bar
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Download PNG...").clicked() {
                        ui.close_menu();
                        self.start_export();
                    }
                    ui.separator();
                    if ui.button("Load Annotations...").clicked() {
                        ui.close_menu();
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("Annotations", &["yaml", "yml", "json"])
                            .pick_file()
                        {
                            self.import_sidecar(path);
                        }
                    }
                    ui.menu_button("Export Annotations", |ui| {
                        for (label, name, extensions) in [
                            ("Export as YAML...", "YAML", &["yaml", "yml"][..]),
                            ("Export as JSON...", "JSON", &["json"][..]),
                        ] {
                            if ui.button(label).clicked() {
                                ui.close_menu();
                                let default_name = format!("{}.{}", self.filename, extensions[0]);
                                if let Some(path) = rfd::FileDialog::new()
                                    .add_filter(name, extensions)
                                    .set_file_name(default_name)
                                    .save_file()
                                {
                                    self.export_sidecar(path);
                                }
                            }
                        }
                    });
                    ui.separator();
                    if ui.button("Clear Saved State").clicked() {
                        ui.close_menu();
                        self.clear_saved();
                    }
                    if ui.button("Close").clicked() {
                        ui.close_menu();
                        self.close(ctx);
                    }
                });
            });
        });

        // Toolbar
        let toolbar_state = toolbar::ToolbarState {
            tool: self.session.interaction.tool(),
            zoom: self.session.viewport.zoom(),
            mm_per_px: self.session.store.mm_per_px(),
            can_undo: self.session.store.can_undo(),
            undo_depth: self.session.store.undo_depth(),
            can_redo: self.session.store.can_redo(),
            exporting: self.export_job.is_some(),
        };
        let action = egui::TopBottomPanel::top("toolbar")
            .show(ctx, |ui| toolbar::show(ui, &toolbar_state))
            .inner;
        self.apply_toolbar(action, ctx);

        // Status line
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            toolbar::status(
                ui,
                self.session.interaction.tool(),
                self.session.viewport.zoom(),
                self.session.store.len(),
                self.status.as_deref(),
            );
        });

        self.handle_keyboard(ctx);

        // Main canvas (center)
        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                let placeholder = self.load_error.as_deref().or(self.loading_message.as_deref());
                canvas::show(
                    ui,
                    &mut self.session,
                    self.image_texture.as_ref(),
                    &self.style,
                    placeholder,
                );
            });

        dialogs::context_menu(ctx, &mut self.session);
        dialogs::label_dialog(ctx, &mut self.session);

        self.autosave();
    }
}

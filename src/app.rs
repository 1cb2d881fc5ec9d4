use crate::canvas::{fit_rect, pointer_position};
use crate::components::editor::{EditKey, EditSession, EditorEvent, PointerButton};
use crate::components::references::ReferenceTray;
use crate::components::tools;
use crate::ops::compositor::PreviewStyle;
use crate::ops::submit::{EditBackend, FileDropBackend, SubmitResult, spawn_submission};
use crate::settings::EditorSettings;
use crate::{log_err, log_info};
use eframe::egui;
use image::RgbaImage;
use std::path::PathBuf;
use std::sync::{Arc, mpsc};

/// Desktop host: a base image viewer with an Edit Mode on top.
pub struct AstraApp {
    settings: EditorSettings,
    backend: Arc<FileDropBackend>,

    base: Option<RgbaImage>,
    base_path: Option<PathBuf>,
    base_texture: Option<egui::TextureHandle>,

    /// Open Edit Mode, if any.
    session: Option<EditSession>,
    overlay_texture: Option<egui::TextureHandle>,
    preview_style: PreviewStyle,
    instruction: String,
    references: ReferenceTray,

    submit_sender: mpsc::Sender<SubmitResult>,
    submit_receiver: mpsc::Receiver<SubmitResult>,
    pending_submissions: usize,

    status: Option<String>,
}

impl AstraApp {
    pub fn new(cc: &eframe::CreationContext<'_>, startup_file: Option<PathBuf>) -> Self {
        let settings = EditorSettings::load();
        let backend = Arc::new(FileDropBackend::new(settings.output_dir.clone(), settings.credits));
        let (submit_sender, submit_receiver) = mpsc::channel();
        let mut app = Self {
            references: ReferenceTray::new(settings.max_reference_images),
            settings,
            backend,
            base: None,
            base_path: None,
            base_texture: None,
            session: None,
            overlay_texture: None,
            preview_style: PreviewStyle::default(),
            instruction: String::new(),
            submit_sender,
            submit_receiver,
            pending_submissions: 0,
            status: None,
        };
        if let Some(path) = startup_file {
            app.open_path(&cc.egui_ctx, path);
        }
        app
    }

    fn open_path(&mut self, ctx: &egui::Context, path: PathBuf) {
        match crate::io::load_image(&path) {
            Ok(img) => {
                log_info!("Opened {} ({}x{})", path.display(), img.width(), img.height());
                self.set_base(ctx, img);
                self.base_path = Some(path);
                self.status = None;
            }
            Err(e) => {
                log_err!("Failed to open image: {}", e);
                self.status = Some(format!("Could not open image: {}", e));
            }
        }
    }

    fn set_base(&mut self, ctx: &egui::Context, img: RgbaImage) {
        let color = egui::ColorImage::from_rgba_unmultiplied(
            [img.width() as usize, img.height() as usize],
            img.as_raw(),
        );
        self.base_texture = Some(ctx.load_texture("base_image", color, egui::TextureOptions::LINEAR));
        if let Some(session) = self.session.as_mut() {
            session.load_base(img.width(), img.height());
        }
        self.base = Some(img);
    }

    fn enter_edit_mode(&mut self) {
        let Some(base) = self.base.as_ref() else { return };
        match EditSession::open(self.backend.as_ref(), &self.settings) {
            Ok(mut session) => {
                session.load_base(base.width(), base.height());
                self.session = Some(session);
                self.overlay_texture = None;
                self.status = None;
            }
            Err(e) => self.status = Some(e.user_message()),
        }
    }

    fn leave_edit_mode(&mut self) {
        if let Some(session) = self.session.take() {
            session.close();
        }
        self.overlay_texture = None;
    }

    /// Files dragged onto the window while editing become references.
    fn accept_dropped_references(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        for file in dropped {
            if let Some(bytes) = file.bytes.as_deref() {
                self.references.add_bytes(bytes);
            } else if let Some(path) = file.path {
                self.references.add_files(&[path]);
            }
        }
    }

    fn submit(&mut self) {
        let (Some(session), Some(base)) = (self.session.as_ref(), self.base.as_ref()) else {
            return;
        };
        let references = self.references.images().to_vec();
        match session.prepare_submission(base.clone(), &self.instruction, references) {
            Ok(request) => {
                let backend: Arc<dyn EditBackend> = self.backend.clone();
                spawn_submission(backend, request, self.submit_sender.clone());
                self.pending_submissions += 1;
                self.references.clear();
                self.instruction.clear();
                self.leave_edit_mode();
                self.status = Some("Edit submitted…".to_string());
            }
            // Editor stays open so the user can retry.
            Err(e) => self.status = Some(e.user_message()),
        }
    }

    fn poll_submissions(&mut self, ctx: &egui::Context) {
        while let Ok(result) = self.submit_receiver.try_recv() {
            self.pending_submissions = self.pending_submissions.saturating_sub(1);
            match result {
                SubmitResult::Completed { session_id, image } => {
                    log_info!("Edit for session {} completed", session_id);
                    self.set_base(ctx, image);
                    self.status = Some("Edit complete".to_string());
                }
                SubmitResult::Failed { error, .. } => {
                    self.status = Some(error.user_message());
                }
            }
            self.settings.credits = self.backend.credits();
            self.settings.save();
        }
        if self.pending_submissions > 0 {
            ctx.request_repaint();
        }
    }

    fn refresh_overlay(&mut self, ctx: &egui::Context) {
        let Some(session) = self.session.as_mut() else { return };
        if !session.take_redraw() && self.overlay_texture.is_some() {
            return;
        }
        let Some(overlay) = session.render_preview(&self.preview_style) else { return };
        let color = egui::ColorImage::from_rgba_unmultiplied(
            [overlay.width() as usize, overlay.height() as usize],
            overlay.as_raw(),
        );
        match self.overlay_texture.as_mut() {
            Some(tex) => tex.set(color, egui::TextureOptions::LINEAR),
            None => {
                self.overlay_texture =
                    Some(ctx.load_texture("edit_overlay", color, egui::TextureOptions::LINEAR));
            }
        }
    }

    // ------------------------------------------------------------------
    // Panels
    // ------------------------------------------------------------------

    fn top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Open…").clicked() {
                    if let Some(path) = crate::io::pick_image_path() {
                        self.open_path(ctx, path);
                    }
                }
                let can_edit = self.base.is_some() && self.session.is_none();
                if ui.add_enabled(can_edit, egui::Button::new("Edit")).clicked() {
                    self.enter_edit_mode();
                }
                if let Some(path) = &self.base_path {
                    ui.label(path.display().to_string());
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(format!("Credits: {}", self.backend.credits()));
                    if self.pending_submissions > 0 {
                        ui.spinner();
                    }
                });
            });
            if let Some(session) = self.session.as_mut() {
                ui.separator();
                let brush = session.props().brush_size;
                for event in tools::tool_bar(ui, session.tool(), brush) {
                    session.handle(&event);
                }
            }
        });
    }

    fn edit_panel(&mut self, ctx: &egui::Context) {
        if self.session.is_none() {
            return;
        }
        let mut submit = false;
        let mut cancel = false;
        egui::TopBottomPanel::bottom("edit_panel").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.label("Describe the edit:");
            ui.add(
                egui::TextEdit::multiline(&mut self.instruction)
                    .desired_rows(2)
                    .desired_width(f32::INFINITY)
                    .hint_text("e.g. replace the sky with a sunset"),
            );
            ui.horizontal(|ui| {
                ui.label(format!(
                    "References {}/{}",
                    self.references.len(),
                    self.references.max()
                ));
                let room = !self.references.is_full();
                if ui.add_enabled(room, egui::Button::new("Paste")).clicked()
                    && !self.references.paste_from_clipboard()
                {
                    self.status = Some("No image on the clipboard".to_string());
                }
                if ui.add_enabled(room, egui::Button::new("Add…")).clicked() {
                    let paths = crate::io::pick_image_paths();
                    self.references.add_files(&paths);
                }
                let mut remove = None;
                for (i, img) in self.references.images().iter().enumerate() {
                    let text = format!("✕ {}×{}", img.width(), img.height());
                    if ui.small_button(text).on_hover_text("Remove").clicked() {
                        remove = Some(i);
                    }
                }
                if let Some(i) = remove {
                    self.references.remove(i);
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    submit = ui.button("Submit").clicked();
                    cancel = ui.button("Cancel").clicked();
                });
            });
            if let Some(status) = &self.status {
                ui.label(status);
            }
        });
        if submit {
            self.submit();
        } else if cancel {
            self.leave_edit_mode();
        }
    }

    fn canvas(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(base) = self.base.as_ref() else {
                ui.centered_and_justified(|ui| {
                    ui.label(self.status.as_deref().unwrap_or("Open an image to begin"));
                });
                return;
            };
            let (w, h) = base.dimensions();
            let (resp, painter) =
                ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
            let fit = fit_rect(resp.rect, w, h);
            let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));

            let display = match self.session.as_mut() {
                Some(session) => {
                    session.set_fit_rect(fit);
                    for event in collect_pointer_events(ctx, &resp) {
                        session.handle(&event);
                    }
                    if resp.hovered() || resp.dragged() {
                        ctx.set_cursor_icon(session.cursor().icon());
                    }
                    session.metrics().map(|m| m.display_rect).unwrap_or(fit)
                }
                None => fit,
            };

            if let Some(tex) = &self.base_texture {
                painter.image(tex.id(), display, uv, egui::Color32::WHITE);
            }
            if self.session.is_some() {
                self.refresh_overlay(ctx);
                if let Some(tex) = &self.overlay_texture {
                    painter.image(tex.id(), display, uv, egui::Color32::WHITE);
                }
            }
        });
    }
}

/// Translate this frame's raw pointer input into editor events.
fn collect_pointer_events(ctx: &egui::Context, resp: &egui::Response) -> Vec<EditorEvent> {
    let text_input_focused = ctx.wants_keyboard_input();
    ctx.input(|i| {
        let mut events = Vec::new();
        let touches: Vec<egui::Pos2> = i
            .events
            .iter()
            .filter_map(|e| match e {
                egui::Event::Touch { pos, .. } => Some(*pos),
                _ => None,
            })
            .collect();
        let pos = pointer_position(i.pointer.interact_pos().or(i.pointer.hover_pos()), &touches);
        let shift = i.modifiers.shift;

        if let Some(pos) = pos {
            let inside = resp.rect.contains(pos);
            if inside && i.pointer.button_pressed(egui::PointerButton::Middle) {
                events.push(EditorEvent::PointerDown { pos, button: PointerButton::Middle, shift });
            } else if inside && i.pointer.primary_pressed() {
                events.push(EditorEvent::PointerDown { pos, button: PointerButton::Primary, shift });
            }
            if i.pointer.is_moving() || i.pointer.delta() != egui::Vec2::ZERO {
                events.push(EditorEvent::PointerMove { pos, shift });
            }
            let scroll = i.scroll_delta.y;
            if inside && scroll != 0.0 {
                events.push(EditorEvent::Zoom { factor: (scroll * 0.002).exp(), anchor: pos });
            }
        }
        if i.pointer.any_released() {
            events.push(EditorEvent::PointerUp);
        }

        for (key, edit_key) in [
            (egui::Key::Delete, EditKey::Delete),
            (egui::Key::Backspace, EditKey::Backspace),
        ] {
            if i.key_pressed(key) {
                events.push(EditorEvent::Key { key: edit_key, text_input_focused });
            }
        }
        events
    })
}

impl eframe::App for AstraApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_submissions(ctx);

        if let Some(session) = self.session.as_mut() {
            for event in tools::shortcut_events(ctx) {
                session.handle(&event);
            }
            if ctx.input(|i| i.key_pressed(egui::Key::Escape)) && !ctx.wants_keyboard_input() {
                self.leave_edit_mode();
            }
        }
        if self.session.is_some() {
            self.accept_dropped_references(ctx);
        }

        self.top_bar(ctx);
        self.edit_panel(ctx);
        self.canvas(ctx);
    }
}

use eframe::egui;
use serde::{Deserialize, Serialize};

use crate::components::editor::EditorEvent;
use crate::ops::paint::PaintMode;
use crate::ops::shapes::ShapeKind;
use crate::settings::{BRUSH_SIZE_MAX, BRUSH_SIZE_MIN, EditorSettings};

/// Active tool in Edit Mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EditTool {
    /// Select, drag and resize shapes; pan when zoomed.
    Move,
    Rectangle,
    Ellipse,
    #[default]
    Brush,
    Eraser,
}

impl EditTool {
    pub fn label(&self) -> &'static str {
        match self {
            EditTool::Move => "Move",
            EditTool::Rectangle => "Rectangle",
            EditTool::Ellipse => "Ellipse",
            EditTool::Brush => "Brush",
            EditTool::Eraser => "Eraser",
        }
    }

    pub fn all() -> &'static [EditTool] {
        &[
            EditTool::Move,
            EditTool::Rectangle,
            EditTool::Ellipse,
            EditTool::Brush,
            EditTool::Eraser,
        ]
    }

    /// Shape this tool draws, if it is a shape tool.
    pub fn shape_kind(&self) -> Option<ShapeKind> {
        match self {
            EditTool::Rectangle => Some(ShapeKind::Rectangle),
            EditTool::Ellipse => Some(ShapeKind::Ellipse),
            _ => None,
        }
    }

    /// Paint mode this tool strokes with, if it is a freehand tool.
    pub fn paint_mode(&self) -> Option<PaintMode> {
        match self {
            EditTool::Brush => Some(PaintMode::Brush),
            EditTool::Eraser => Some(PaintMode::Eraser),
            _ => None,
        }
    }

    /// Keyboard shortcut shown in tooltips.
    pub fn shortcut(&self) -> char {
        match self {
            EditTool::Move => 'V',
            EditTool::Rectangle => 'R',
            EditTool::Ellipse => 'E',
            EditTool::Brush => 'B',
            EditTool::Eraser => 'X',
        }
    }
}

/// Per-session tool settings.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolProperties {
    /// Brush/eraser diameter in canvas pixels.
    pub brush_size: f32,
    /// Handle diameter in canvas pixels at zoom 1; divided by the zoom scale.
    pub handle_size: f32,
}

impl Default for ToolProperties {
    fn default() -> Self {
        Self::from_settings(&EditorSettings::default())
    }
}

impl ToolProperties {
    pub fn from_settings(settings: &EditorSettings) -> Self {
        Self {
            brush_size: settings.brush_size.clamp(BRUSH_SIZE_MIN, BRUSH_SIZE_MAX),
            handle_size: settings.handle_size,
        }
    }
}

/// Horizontal tool bar.  Returns the events the user's clicks produced; the
/// caller feeds them to the session.
pub fn tool_bar(ui: &mut egui::Ui, active: EditTool, brush_size: f32) -> Vec<EditorEvent> {
    let mut events = Vec::new();
    ui.horizontal(|ui| {
        for &tool in EditTool::all() {
            let resp = ui
                .selectable_label(active == tool, tool.label())
                .on_hover_text(format!("{} ({})", tool.label(), tool.shortcut()));
            if resp.clicked() && active != tool {
                events.push(EditorEvent::SelectTool { tool });
            }
        }

        ui.separator();

        let mut size = brush_size;
        let slider = egui::Slider::new(&mut size, BRUSH_SIZE_MIN..=BRUSH_SIZE_MAX)
            .text("Brush")
            .logarithmic(true);
        if ui.add(slider).changed() {
            events.push(EditorEvent::SetBrushSize { size });
        }

        ui.separator();

        if ui.button("Clear").on_hover_text("Remove all paint and shapes").clicked() {
            events.push(EditorEvent::ClearMask);
        }
        if ui.button("1:1").on_hover_text("Reset zoom and pan (0)").clicked() {
            events.push(EditorEvent::ResetView);
        }
    });
    events
}

/// Shortcut key → event table.  `0` resets the view.
pub fn shortcut_table() -> [(egui::Key, EditorEvent); 6] {
    [
        (egui::Key::V, EditorEvent::SelectTool { tool: EditTool::Move }),
        (egui::Key::R, EditorEvent::SelectTool { tool: EditTool::Rectangle }),
        (egui::Key::E, EditorEvent::SelectTool { tool: EditTool::Ellipse }),
        (egui::Key::B, EditorEvent::SelectTool { tool: EditTool::Brush }),
        (egui::Key::X, EditorEvent::SelectTool { tool: EditTool::Eraser }),
        (egui::Key::Num0, EditorEvent::ResetView),
    ]
}

/// Tool and view shortcuts, ignored while a text field has focus.
pub fn shortcut_events(ctx: &egui::Context) -> Vec<EditorEvent> {
    if ctx.wants_keyboard_input() {
        return Vec::new();
    }
    ctx.input(|i| {
        shortcut_table()
            .into_iter()
            .filter(|(key, _)| i.key_pressed(*key) && i.modifiers.is_none())
            .map(|(_, event)| event)
            .collect()
    })
}

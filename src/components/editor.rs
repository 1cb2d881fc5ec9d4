// ============================================================================
// Edit session: owns the shape model, paint layer and view transform for one
// open editor, and dispatches pointer/keyboard events through the interaction
// state machine.
// ============================================================================

use egui::{Pos2, Rect, Vec2};
use image::{GrayImage, RgbaImage};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::canvas::{ViewTransform, ViewportMetrics};
use crate::components::tools::{EditTool, ToolProperties};
use crate::error::EditorError;
use crate::ops::compositor::{self, PreviewStyle};
use crate::ops::hit_test::{HitKind, hit_test};
use crate::ops::paint::PaintLayer;
use crate::ops::shapes::{ShapeModel, constrain_square};
use crate::ops::submit::{EditBackend, EditRequest};
use crate::settings::EditorSettings;
use crate::{log_info, log_warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerButton {
    #[default]
    Primary,
    Middle,
    Secondary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditKey {
    Delete,
    Backspace,
}

/// Input to the session.  Pointer positions are client (screen) coordinates;
/// the session maps them to canvas pixels with live viewport metrics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditorEvent {
    PointerDown {
        pos: Pos2,
        #[serde(default)]
        button: PointerButton,
        #[serde(default)]
        shift: bool,
    },
    PointerMove {
        pos: Pos2,
        #[serde(default)]
        shift: bool,
    },
    PointerUp,
    Key {
        key: EditKey,
        #[serde(default)]
        text_input_focused: bool,
    },
    SelectTool {
        tool: EditTool,
    },
    SetBrushSize {
        size: f32,
    },
    Zoom {
        factor: f32,
        anchor: Pos2,
    },
    ResetView,
    ClearMask,
}

/// The gesture in progress, with the snapshots it needs.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    /// Drawing a new shape; `origin` is the pointer-down canvas point.
    DrawingShape { id: u64, origin: Pos2 },
    /// Moving a shape; `from` is its origin at drag start, `down` the
    /// canvas point the drag started at.
    DraggingShape { id: u64, from: Pos2, down: Pos2 },
    /// Resizing around the fixed origin corner.
    ResizingShape { id: u64, origin: Pos2 },
    Painting,
    /// Panning the view; both values are in client space.
    Panning { start_pan: Vec2, down: Pos2 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StateKind {
    Idle,
    DrawingShape,
    DraggingShape,
    ResizingShape,
    Painting,
    Panning,
}

impl InteractionState {
    pub fn kind(&self) -> StateKind {
        match self {
            InteractionState::Idle => StateKind::Idle,
            InteractionState::DrawingShape { .. } => StateKind::DrawingShape,
            InteractionState::DraggingShape { .. } => StateKind::DraggingShape,
            InteractionState::ResizingShape { .. } => StateKind::ResizingShape,
            InteractionState::Painting => StateKind::Painting,
            InteractionState::Panning { .. } => StateKind::Panning,
        }
    }

    /// The shape the gesture is editing, if any.
    pub fn shape_id(&self) -> Option<u64> {
        match self {
            InteractionState::DrawingShape { id, .. }
            | InteractionState::DraggingShape { id, .. }
            | InteractionState::ResizingShape { id, .. } => Some(*id),
            _ => None,
        }
    }
}

/// Pointer cursor the host should show.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CursorHint {
    #[default]
    Default,
    Move,
    ResizeNwSe,
    /// Over a clickable handle (delete).
    Pointer,
    Crosshair,
    Grab,
    Grabbing,
    Brush,
}

impl CursorHint {
    pub fn icon(&self) -> egui::CursorIcon {
        match self {
            CursorHint::Default => egui::CursorIcon::Default,
            CursorHint::Move => egui::CursorIcon::Move,
            CursorHint::ResizeNwSe => egui::CursorIcon::ResizeNwSe,
            CursorHint::Pointer => egui::CursorIcon::PointingHand,
            CursorHint::Crosshair => egui::CursorIcon::Crosshair,
            CursorHint::Grab => egui::CursorIcon::Grab,
            CursorHint::Grabbing => egui::CursorIcon::Grabbing,
            CursorHint::Brush => egui::CursorIcon::Cell,
        }
    }
}

/// What one event did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transition {
    pub from: StateKind,
    pub to: StateKind,
    /// Shapes, selection or paint layer changed.
    pub model_changed: bool,
    /// Zoom or pan changed.
    pub view_changed: bool,
    pub cursor: CursorHint,
}

/// One open Edit Mode instance.
pub struct EditSession {
    id: Uuid,
    shapes: ShapeModel,
    /// `None` until the base image dimensions are known.
    paint: Option<PaintLayer>,
    state: InteractionState,
    view: ViewTransform,
    /// Where the unzoomed image sits on screen; supplied by the host.
    fit_rect: Rect,
    tool: EditTool,
    props: ToolProperties,
    cursor: CursorHint,
    needs_redraw: bool,
}

impl EditSession {
    /// Create a session without an access check (tests, headless replay).
    pub fn new(settings: &EditorSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            shapes: ShapeModel::new(),
            paint: None,
            state: InteractionState::Idle,
            view: ViewTransform::new(settings.max_zoom),
            fit_rect: Rect::NOTHING,
            tool: EditTool::default(),
            props: ToolProperties::from_settings(settings),
            cursor: CursorHint::Default,
            needs_redraw: true,
        }
    }

    /// Enter Edit Mode: runs the host's access check once and refuses to
    /// open when it fails.
    pub fn open(backend: &dyn EditBackend, settings: &EditorSettings) -> Result<Self, EditorError> {
        if !backend.validate_access() {
            log_warn!("Edit mode refused: access check failed");
            return Err(EditorError::AccessDenied);
        }
        let session = Self::new(settings);
        crate::logger::session_opened(session.id);
        Ok(session)
    }

    /// Base image decoded: size the paint layer to its natural dimensions.
    /// The layer is only re-created when the dimensions change.
    pub fn load_base(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            self.paint = None;
            self.state = InteractionState::Idle;
            return;
        }
        if self.natural_size() == Some((width, height)) {
            return;
        }
        self.paint = Some(PaintLayer::new(width, height, self.props.brush_size));
        self.state = InteractionState::Idle;
        self.view.reset();
        self.fit_rect = Rect::from_min_size(Pos2::ZERO, Vec2::new(width as f32, height as f32));
        self.needs_redraw = true;
    }

    /// Screen rect of the image at zoom 1.  Re-supplied by the host whenever
    /// layout changes.
    pub fn set_fit_rect(&mut self, fit_rect: Rect) {
        if self.fit_rect != fit_rect {
            self.fit_rect = fit_rect;
            self.needs_redraw = true;
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_ready(&self) -> bool {
        self.paint.is_some()
    }

    pub fn natural_size(&self) -> Option<(u32, u32)> {
        self.paint.as_ref().map(|p| (p.width(), p.height()))
    }

    pub fn shapes(&self) -> &ShapeModel {
        &self.shapes
    }

    pub fn paint(&self) -> Option<&PaintLayer> {
        self.paint.as_ref()
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn view(&self) -> &ViewTransform {
        &self.view
    }

    pub fn tool(&self) -> EditTool {
        self.tool
    }

    pub fn props(&self) -> &ToolProperties {
        &self.props
    }

    pub fn cursor(&self) -> CursorHint {
        self.cursor
    }

    /// Current metrics, derived fresh from the view and fit rect.
    pub fn metrics(&self) -> Option<ViewportMetrics> {
        let (w, h) = self.natural_size()?;
        Some(self.view.metrics(self.fit_rect, w, h))
    }

    /// Return and reset the "something visible changed" flag.  The host
    /// re-renders at most once per frame no matter how many events arrived.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.needs_redraw)
    }

    /// Empty the paint layer and remove every shape.
    pub fn clear_mask(&mut self) {
        self.finish_gesture();
        self.shapes.remove_all();
        if let Some(paint) = self.paint.as_mut() {
            paint.clear();
        }
        self.needs_redraw = true;
    }

    /// Leave Edit Mode; the paint layer and shapes go with the session.
    pub fn close(self) {
        log_info!("Closing with {} shape(s)", self.shapes.len());
        crate::logger::session_closed(self.id);
    }

    fn to_canvas(&self, client: Pos2) -> Option<Pos2> {
        self.metrics()?.client_to_canvas(client)
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    pub fn handle(&mut self, event: &EditorEvent) -> Transition {
        let from = self.state.kind();
        let mut t = Transition {
            from,
            to: from,
            model_changed: false,
            view_changed: false,
            cursor: self.cursor,
        };

        match *event {
            EditorEvent::PointerDown { pos, button, shift: _ } => self.pointer_down(pos, button, &mut t),
            EditorEvent::PointerMove { pos, shift } => self.pointer_move(pos, shift, &mut t),
            EditorEvent::PointerUp => {
                t.model_changed = self.finish_gesture();
                self.cursor = self.idle_cursor(None);
            }
            EditorEvent::Key { key: _, text_input_focused } => {
                if !text_input_focused {
                    t.model_changed = self.delete_selected();
                }
            }
            EditorEvent::SelectTool { tool } => {
                t.model_changed = self.finish_gesture();
                self.tool = tool;
                self.cursor = self.idle_cursor(None);
            }
            EditorEvent::SetBrushSize { size } => {
                if size.is_finite() {
                    self.props.brush_size = size.clamp(
                        crate::settings::BRUSH_SIZE_MIN,
                        crate::settings::BRUSH_SIZE_MAX,
                    );
                    if let Some(paint) = self.paint.as_mut() {
                        paint.set_brush_size(size);
                    }
                }
            }
            EditorEvent::Zoom { factor, anchor } => {
                self.end_pan();
                let before = (self.view.scale, self.view.pan);
                self.view.zoom_around(factor, anchor, self.fit_rect);
                t.view_changed = before != (self.view.scale, self.view.pan);
            }
            EditorEvent::ResetView => {
                self.end_pan();
                t.view_changed = self.view.scale != 1.0 || self.view.pan != Vec2::ZERO;
                self.view.reset();
            }
            EditorEvent::ClearMask => {
                self.clear_mask();
                t.model_changed = true;
            }
        }

        if t.model_changed || t.view_changed {
            self.needs_redraw = true;
        }
        t.to = self.state.kind();
        t.cursor = self.cursor;
        t
    }

    fn pointer_down(&mut self, pos: Pos2, button: PointerButton, t: &mut Transition) {
        match button {
            PointerButton::Secondary => return,
            PointerButton::Middle => {
                if !self.is_ready() {
                    return;
                }
                t.model_changed = self.finish_gesture();
                self.state = InteractionState::Panning { start_pan: self.view.pan, down: pos };
                self.cursor = CursorHint::Grabbing;
                return;
            }
            PointerButton::Primary => {}
        }
        if self.state != InteractionState::Idle {
            return;
        }
        let Some(p) = self.to_canvas(pos) else { return };

        if let Some(mode) = self.tool.paint_mode() {
            if let Some(paint) = self.paint.as_mut() {
                paint.begin_stroke(p, mode);
                self.state = InteractionState::Painting;
                self.cursor = CursorHint::Brush;
            }
            return;
        }

        match hit_test(&self.shapes, p, self.props.handle_size, self.view.scale) {
            Some(hit) => match hit.kind {
                HitKind::DeleteHandle => {
                    self.shapes.remove(hit.shape_id);
                    t.model_changed = true;
                    self.cursor = self.idle_cursor(Some(p));
                }
                HitKind::ResizeHandle => {
                    self.shapes.select(Some(hit.shape_id));
                    if let Some(origin) = self.shapes.get(hit.shape_id).map(|s| s.origin()) {
                        self.state = InteractionState::ResizingShape { id: hit.shape_id, origin };
                        self.cursor = CursorHint::ResizeNwSe;
                    }
                    t.model_changed = true;
                }
                HitKind::Body => {
                    self.shapes.select(Some(hit.shape_id));
                    if let Some(from) = self.shapes.get(hit.shape_id).map(|s| s.origin()) {
                        self.state = InteractionState::DraggingShape { id: hit.shape_id, from, down: p };
                        self.cursor = CursorHint::Move;
                    }
                    t.model_changed = true;
                }
            },
            None => match self.tool.shape_kind() {
                Some(kind) => {
                    self.shapes.select(None);
                    let id = self.shapes.create(kind, p);
                    self.state = InteractionState::DrawingShape { id, origin: p };
                    self.cursor = CursorHint::Crosshair;
                    t.model_changed = true;
                }
                None if self.view.is_zoomed() => {
                    self.state = InteractionState::Panning { start_pan: self.view.pan, down: pos };
                    self.cursor = CursorHint::Grabbing;
                }
                None => {
                    if self.shapes.selected_id().is_some() {
                        self.shapes.select(None);
                        t.model_changed = true;
                    }
                }
            },
        }
    }

    fn pointer_move(&mut self, pos: Pos2, shift: bool, t: &mut Transition) {
        match self.state.clone() {
            InteractionState::Idle => {
                let p = self.to_canvas(pos);
                self.cursor = self.idle_cursor(p);
            }
            InteractionState::Panning { start_pan, down } => {
                let before = self.view.pan;
                self.view.set_pan(start_pan + (pos - down));
                t.view_changed = self.view.pan != before;
            }
            InteractionState::DrawingShape { id, origin }
            | InteractionState::ResizingShape { id, origin } => {
                let Some(p) = self.to_canvas(pos) else { return };
                let d = p - origin;
                let (w, h) = if shift { constrain_square(d.x, d.y) } else { (d.x, d.y) };
                self.shapes.update_extent(id, w, h);
                t.model_changed = true;
            }
            InteractionState::DraggingShape { id, from, down } => {
                let Some(p) = self.to_canvas(pos) else { return };
                self.shapes.translate(id, from, p - down);
                t.model_changed = true;
            }
            InteractionState::Painting => {
                let Some(p) = self.to_canvas(pos) else { return };
                if let Some(paint) = self.paint.as_mut() {
                    paint.extend_stroke(p);
                    t.model_changed = true;
                }
            }
        }
    }

    /// End whatever gesture is active and return to Idle.  Returns true if
    /// the model changed (a degenerate shape was dropped).
    fn finish_gesture(&mut self) -> bool {
        let mut changed = false;
        if let InteractionState::DrawingShape { id, .. } = self.state {
            if self.shapes.get(id).is_some_and(|s| s.is_degenerate()) {
                self.shapes.remove(id);
                changed = true;
            }
        }
        if let Some(paint) = self.paint.as_mut() {
            paint.end_stroke();
        }
        self.state = InteractionState::Idle;
        changed
    }

    /// A pan snapshot is stale once the scale changes under it.
    fn end_pan(&mut self) {
        if let InteractionState::Panning { .. } = self.state {
            self.state = InteractionState::Idle;
            self.cursor = self.idle_cursor(None);
        }
    }

    /// Keyboard delete.  Works in any state; a gesture on the removed shape
    /// is abandoned.
    fn delete_selected(&mut self) -> bool {
        let Some(id) = self.shapes.selected_id() else { return false };
        self.shapes.remove(id);
        if self.state.shape_id() == Some(id) {
            self.state = InteractionState::Idle;
        }
        true
    }

    fn idle_cursor(&self, p: Option<Pos2>) -> CursorHint {
        if let Some(p) = p {
            if let Some(hit) = hit_test(&self.shapes, p, self.props.handle_size, self.view.scale) {
                if self.tool.paint_mode().is_none() {
                    return match hit.kind {
                        HitKind::DeleteHandle => CursorHint::Pointer,
                        HitKind::ResizeHandle => CursorHint::ResizeNwSe,
                        HitKind::Body => CursorHint::Move,
                    };
                }
            }
        }
        match self.tool {
            EditTool::Brush | EditTool::Eraser => CursorHint::Brush,
            EditTool::Rectangle | EditTool::Ellipse => CursorHint::Crosshair,
            EditTool::Move if self.view.is_zoomed() => CursorHint::Grab,
            EditTool::Move => CursorHint::Default,
        }
    }

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    /// Live-preview overlay at natural size, or `None` before the base image
    /// is loaded.
    pub fn render_preview(&self, style: &PreviewStyle) -> Option<RgbaImage> {
        let paint = self.paint.as_ref()?;
        Some(compositor::render_preview(
            paint,
            &self.shapes,
            self.view.scale,
            self.props.handle_size,
            style,
        ))
    }

    pub fn export_mask(&self) -> Result<GrayImage, EditorError> {
        let paint = self.paint.as_ref().ok_or(EditorError::CanvasNotReady)?;
        let mask = compositor::export_mask(paint, &self.shapes)?;
        log_info!(
            "Mask exported for session {}: {}x{}, {} shape(s)",
            self.id,
            mask.width(),
            mask.height(),
            self.shapes.len()
        );
        Ok(mask)
    }

    /// Export and encode the mask and bundle it with the caller's base image,
    /// instruction and references.  On error the session stays usable.
    pub fn prepare_submission(
        &self,
        base: RgbaImage,
        instruction: &str,
        references: Vec<RgbaImage>,
    ) -> Result<EditRequest, EditorError> {
        let mask = self.export_mask()?;
        if base.dimensions() != mask.dimensions() {
            return Err(EditorError::MaskPreparation(format!(
                "base image is {}x{} but the mask is {}x{}",
                base.width(),
                base.height(),
                mask.width(),
                mask.height()
            )));
        }
        let mask_png = crate::io::encode_mask_png(&mask).map_err(EditorError::Encode)?;
        Ok(EditRequest {
            session_id: self.id,
            base,
            mask,
            mask_png,
            instruction: instruction.trim().to_string(),
            references,
        })
    }
}

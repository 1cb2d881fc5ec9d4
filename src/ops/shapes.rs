use egui::{Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Shape primitives that can be placed on the edit mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Rectangle,
    Ellipse,
}

/// A placed, editable mask region.
///
/// `(x, y)` is the corner the shape was anchored at when drawn; `width` and
/// `height` are signed, so the anchor may be any corner of the bounds.
#[derive(Clone, Debug, PartialEq)]
pub struct Shape {
    pub id: u64,
    pub kind: ShapeKind,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Shape {
    /// Axis-aligned bounds with positive extents.
    pub fn bounds(&self) -> Rect {
        let a = Pos2::new(self.x, self.y);
        let b = Pos2::new(self.x + self.width, self.y + self.height);
        Rect::from_two_pos(a, b)
    }

    /// The fixed corner resize pivots from.
    pub fn origin(&self) -> Pos2 {
        Pos2::new(self.x, self.y)
    }

    /// Where the resize handle sits: the corner opposite the origin.
    pub fn resize_anchor(&self) -> Pos2 {
        Pos2::new(self.x + self.width, self.y + self.height)
    }

    /// Where the delete handle sits.
    pub fn delete_anchor(&self) -> Pos2 {
        Pos2::new(self.x + self.width, self.y)
    }

    pub fn is_degenerate(&self) -> bool {
        self.width == 0.0 && self.height == 0.0
    }

    /// Signed distance from `p` to the shape outline (negative = inside).
    pub fn sdf(&self, p: Pos2) -> f32 {
        let b = self.bounds();
        let c = b.center();
        let hx = b.width() * 0.5;
        let hy = b.height() * 0.5;
        match self.kind {
            ShapeKind::Rectangle => sdf_box(p.x - c.x, p.y - c.y, hx, hy),
            ShapeKind::Ellipse => sdf_ellipse(p.x - c.x, p.y - c.y, hx, hy),
        }
    }
}

/// Force `|width| == |height|` (the larger magnitude wins), keeping each
/// axis's sign.  Used while Shift is held.
pub fn constrain_square(width: f32, height: f32) -> (f32, f32) {
    let side = width.abs().max(height.abs());
    (side * width.signum(), side * height.signum())
}

/// Insertion-ordered shape collection plus the single selection.
#[derive(Clone, Debug, Default)]
pub struct ShapeModel {
    shapes: Vec<Shape>,
    selected: Option<u64>,
    next_id: u64,
}

impl ShapeModel {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Insert a zero-size shape at `origin` and select it.
    pub fn create(&mut self, kind: ShapeKind, origin: Pos2) -> u64 {
        let id = self.allocate_id();
        self.shapes.push(Shape {
            id,
            kind,
            x: origin.x,
            y: origin.y,
            width: 0.0,
            height: 0.0,
        });
        self.selected = Some(id);
        id
    }

    pub fn update_extent(&mut self, id: u64, width: f32, height: f32) {
        if let Some(shape) = self.get_mut(id) {
            shape.width = width;
            shape.height = height;
        }
    }

    /// Place the shape at `from + delta`.  `from` is the shape's origin
    /// captured when the drag started, so repeated calls never accumulate.
    pub fn translate(&mut self, id: u64, from: Pos2, delta: Vec2) {
        if let Some(shape) = self.get_mut(id) {
            shape.x = from.x + delta.x;
            shape.y = from.y + delta.y;
        }
    }

    /// Delete a shape, clearing the selection if it pointed at it.
    pub fn remove(&mut self, id: u64) -> Option<Shape> {
        let idx = self.shapes.iter().position(|s| s.id == id)?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        Some(self.shapes.remove(idx))
    }

    pub fn remove_all(&mut self) {
        self.shapes.clear();
        self.selected = None;
    }

    /// Select `id` (ignored if it does not exist) or clear with `None`.
    pub fn select(&mut self, id: Option<u64>) {
        self.selected = id.filter(|id| self.get(*id).is_some());
    }

    pub fn selected_id(&self) -> Option<u64> {
        self.selected
    }

    pub fn selected(&self) -> Option<&Shape> {
        self.selected.and_then(|id| self.get(id))
    }

    pub fn get(&self, id: u64) -> Option<&Shape> {
        self.shapes.iter().find(|s| s.id == id)
    }

    fn get_mut(&mut self, id: u64) -> Option<&mut Shape> {
        self.shapes.iter_mut().find(|s| s.id == id)
    }

    /// Shapes in insertion order (bottom to top).
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Shape> {
        self.shapes.iter()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

// ============================================================================
// SDF functions: return signed distance (negative = inside)
// ============================================================================

/// SDF for a box centred at origin with half-extents (hx, hy).
#[inline]
pub fn sdf_box(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let dx = px.abs() - hx;
    let dy = py.abs() - hy;
    let outside = (dx.max(0.0) * dx.max(0.0) + dy.max(0.0) * dy.max(0.0)).sqrt();
    let inside = dx.max(dy).min(0.0);
    outside + inside
}

/// SDF for an ellipse (approximation, exact on the axes).
#[inline]
pub fn sdf_ellipse(px: f32, py: f32, rx: f32, ry: f32) -> f32 {
    if rx <= 0.0 || ry <= 0.0 {
        return sdf_box(px, py, rx.max(0.0), ry.max(0.0));
    }
    let nx = px / rx;
    let ny = py / ry;
    let len = (nx * nx + ny * ny).sqrt();
    if len < 1e-8 {
        return -rx.min(ry);
    }
    let scale = (rx * rx * ny * ny + ry * ry * nx * nx).sqrt() / (rx * ry * len);
    (len - 1.0) / scale
}

use egui::Pos2;
use image::GrayImage;

use crate::ops::raster::{CompositeMode, CoverageSurface, RasterSurface};
use crate::settings::{BRUSH_SIZE_MAX, BRUSH_SIZE_MIN};

/// Whether a stroke adds or removes coverage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PaintMode {
    #[default]
    Brush,
    Eraser,
}

/// Persistent freehand layer at the base image's natural size.
///
/// Content is pure coverage: brush strokes write full coverage, eraser strokes
/// remove it (destination-out), they never paint black.
pub struct PaintLayer {
    surface: CoverageSurface,
    last_point: Option<Pos2>,
    mode: PaintMode,
    brush_size: f32,
}

impl PaintLayer {
    pub fn new(width: u32, height: u32, brush_size: f32) -> Self {
        let mut layer = Self {
            surface: CoverageSurface::new(width, height),
            last_point: None,
            mode: PaintMode::Brush,
            brush_size: BRUSH_SIZE_MIN,
        };
        layer.set_brush_size(brush_size);
        layer
    }

    pub fn width(&self) -> u32 {
        self.surface.width()
    }

    pub fn height(&self) -> u32 {
        self.surface.height()
    }

    pub fn surface(&self) -> &CoverageSurface {
        &self.surface
    }

    pub fn coverage(&self) -> &GrayImage {
        self.surface.pixels()
    }

    pub fn brush_size(&self) -> f32 {
        self.brush_size
    }

    pub fn set_brush_size(&mut self, size: f32) {
        if size.is_finite() {
            self.brush_size = size.clamp(BRUSH_SIZE_MIN, BRUSH_SIZE_MAX);
        }
    }

    pub fn mode(&self) -> PaintMode {
        self.mode
    }

    pub fn is_stroking(&self) -> bool {
        self.last_point.is_some()
    }

    /// Start a new stroke at `p` without drawing.
    pub fn begin_stroke(&mut self, p: Pos2, mode: PaintMode) {
        self.mode = mode;
        self.surface.set_composite_mode(match mode {
            PaintMode::Brush => CompositeMode::SourceOver,
            PaintMode::Eraser => CompositeMode::DestinationOut,
        });
        self.surface.set_line_width(self.brush_size);
        self.surface.begin_path();
        self.surface.move_to(p);
        self.last_point = Some(p);
    }

    /// Draw the segment from the last point to `p` and stroke it right away.
    pub fn extend_stroke(&mut self, p: Pos2) {
        let Some(last) = self.last_point else { return };
        self.surface.begin_path();
        self.surface.move_to(last);
        self.surface.line_to(p);
        self.surface.stroke();
        self.last_point = Some(p);
    }

    /// Reset the path so the next stroke does not connect to this one.
    pub fn end_stroke(&mut self) {
        self.surface.begin_path();
        self.surface.set_composite_mode(CompositeMode::SourceOver);
        self.last_point = None;
    }

    pub fn clear(&mut self) {
        self.surface.fill_all(0);
        self.end_stroke();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stroke(layer: &mut PaintLayer, mode: PaintMode, points: &[(f32, f32)]) {
        let mut it = points.iter();
        if let Some(&(x, y)) = it.next() {
            layer.begin_stroke(Pos2::new(x, y), mode);
        }
        for &(x, y) in it {
            layer.extend_stroke(Pos2::new(x, y));
        }
        layer.end_stroke();
    }

    #[test]
    fn strokes_render_progressively() {
        let mut layer = PaintLayer::new(200, 100, 10.0);
        layer.begin_stroke(Pos2::new(10.0, 50.0), PaintMode::Brush);
        layer.extend_stroke(Pos2::new(50.0, 50.0));
        // Visible before the stroke ends.
        assert_eq!(layer.surface().coverage_at(30, 50), 255);
        layer.end_stroke();
        assert!(!layer.is_stroking());
    }

    #[test]
    fn consecutive_strokes_are_not_connected() {
        let mut layer = PaintLayer::new(200, 200, 6.0);
        stroke(&mut layer, PaintMode::Brush, &[(10.0, 10.0), (30.0, 10.0)]);
        stroke(&mut layer, PaintMode::Brush, &[(150.0, 150.0), (170.0, 150.0)]);
        assert_eq!(layer.surface().coverage_at(90, 80), 0);
    }

    #[test]
    fn eraser_fully_removes_brush_coverage() {
        let mut layer = PaintLayer::new(120, 120, 20.0);
        stroke(&mut layer, PaintMode::Brush, &[(20.0, 60.0), (100.0, 60.0)]);
        assert_eq!(layer.surface().coverage_at(60, 60), 255);
        layer.set_brush_size(40.0);
        stroke(&mut layer, PaintMode::Eraser, &[(20.0, 60.0), (100.0, 60.0)]);
        assert!(layer.surface().is_empty());
    }

    #[test]
    fn brush_size_is_bounded() {
        let mut layer = PaintLayer::new(10, 10, 1.0);
        assert_eq!(layer.brush_size(), BRUSH_SIZE_MIN);
        layer.set_brush_size(10_000.0);
        assert_eq!(layer.brush_size(), BRUSH_SIZE_MAX);
        layer.set_brush_size(f32::NAN);
        assert_eq!(layer.brush_size(), BRUSH_SIZE_MAX);
    }

    #[test]
    fn extend_without_begin_is_a_no_op() {
        let mut layer = PaintLayer::new(50, 50, 10.0);
        layer.extend_stroke(Pos2::new(25.0, 25.0));
        assert!(layer.surface().is_empty());
    }
}

// ============================================================================
// Coverage raster surface: the small immediate-mode drawing backend shared by
// the paint layer and the mask exporter.
// ============================================================================

use egui::{Pos2, Rect};
use image::{GrayImage, Luma};
use rayon::prelude::*;

/// How new coverage combines with what is already on the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CompositeMode {
    /// Paint opaque coverage over existing content.
    #[default]
    SourceOver,
    /// Remove existing coverage where the source lands (eraser).
    DestinationOut,
}

/// Immediate-mode 2D surface: path building, stroking, filling and readback.
///
/// Geometry is in surface pixels; a pixel is covered when its centre
/// `(x + 0.5, y + 0.5)` lies inside the drawn geometry.
pub trait RasterSurface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn set_composite_mode(&mut self, mode: CompositeMode);
    fn set_line_width(&mut self, width: f32);
    /// Drop the current path without drawing anything.
    fn begin_path(&mut self);
    /// Start a new sub-path at `p` (no drawing).
    fn move_to(&mut self, p: Pos2);
    fn line_to(&mut self, p: Pos2);
    /// Stroke the current path with round caps and joins.
    fn stroke(&mut self);
    fn fill_rect(&mut self, rect: Rect);
    /// Fill the ellipse inscribed in `rect`.
    fn fill_ellipse(&mut self, rect: Rect);
    /// Fill every pixel with `value` regardless of composite mode.
    fn fill_all(&mut self, value: u8);
    /// Composite another surface's coverage on top of this one.
    fn draw_surface(&mut self, other: &CoverageSurface);
    fn to_image(&self) -> GrayImage;
}

/// In-memory single-channel surface: 0 = empty/black, 255 = covered/white.
#[derive(Clone, Debug)]
pub struct CoverageSurface {
    pixels: GrayImage,
    mode: CompositeMode,
    line_width: f32,
    /// Sub-paths of the current path.
    path: Vec<Vec<Pos2>>,
}

impl CoverageSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: GrayImage::new(width, height),
            mode: CompositeMode::SourceOver,
            line_width: 1.0,
            path: Vec::new(),
        }
    }

    pub fn pixels(&self) -> &GrayImage {
        &self.pixels
    }

    pub fn coverage_at(&self, x: u32, y: u32) -> u8 {
        self.pixels.get_pixel_checked(x, y).map(|p| p.0[0]).unwrap_or(0)
    }

    /// True when no pixel carries any coverage.
    pub fn is_empty(&self) -> bool {
        self.pixels.as_raw().iter().all(|&v| v == 0)
    }

    pub fn mode(&self) -> CompositeMode {
        self.mode
    }

    pub fn line_width(&self) -> f32 {
        self.line_width
    }

    /// Number of points in the current (un-reset) path.
    pub fn path_len(&self) -> usize {
        self.path.iter().map(|s| s.len()).sum()
    }

    /// Visit every pixel whose centre satisfies `inside`, restricted to the
    /// clamped bounding box, and apply the current composite mode.
    fn paint_region<F>(&mut self, min_x: f32, min_y: f32, max_x: f32, max_y: f32, inside: F)
    where
        F: Fn(f32, f32) -> bool + Sync,
    {
        let w = self.pixels.width();
        let h = self.pixels.height();
        if w == 0 || h == 0 {
            return;
        }
        let x0 = (min_x.floor().max(0.0) as u32).min(w);
        let y0 = (min_y.floor().max(0.0) as u32).min(h);
        let x1 = (max_x.ceil().max(0.0) as u32).min(w);
        let y1 = (max_y.ceil().max(0.0) as u32).min(h);
        if x0 >= x1 || y0 >= y1 {
            return;
        }
        let value = match self.mode {
            CompositeMode::SourceOver => 255u8,
            CompositeMode::DestinationOut => 0u8,
        };
        let row_len = w as usize;
        let start = y0 as usize * row_len;
        let end = y1 as usize * row_len;
        let buf: &mut [u8] = &mut self.pixels;
        buf[start..end]
            .par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(row, row_buf)| {
                let py = (y0 as usize + row) as f32 + 0.5;
                for x in x0..x1 {
                    let px = x as f32 + 0.5;
                    if inside(px, py) {
                        row_buf[x as usize] = value;
                    }
                }
            });
    }

    fn stroke_segment(&mut self, a: Pos2, b: Pos2) {
        let r = self.line_width * 0.5;
        if r <= 0.0 {
            return;
        }
        let r_sq = r * r;
        self.paint_region(
            a.x.min(b.x) - r,
            a.y.min(b.y) - r,
            a.x.max(b.x) + r,
            a.y.max(b.y) + r,
            move |px, py| dist_sq_to_segment(px, py, a, b) <= r_sq,
        );
    }
}

impl RasterSurface for CoverageSurface {
    fn width(&self) -> u32 {
        self.pixels.width()
    }

    fn height(&self) -> u32 {
        self.pixels.height()
    }

    fn set_composite_mode(&mut self, mode: CompositeMode) {
        self.mode = mode;
    }

    fn set_line_width(&mut self, width: f32) {
        if width.is_finite() && width > 0.0 {
            self.line_width = width;
        }
    }

    fn begin_path(&mut self) {
        self.path.clear();
    }

    fn move_to(&mut self, p: Pos2) {
        self.path.push(vec![p]);
    }

    fn line_to(&mut self, p: Pos2) {
        match self.path.last_mut() {
            Some(sub) => sub.push(p),
            // line_to on an empty path behaves like move_to
            None => self.path.push(vec![p]),
        }
    }

    fn stroke(&mut self) {
        let segments: Vec<(Pos2, Pos2)> = self
            .path
            .iter()
            .flat_map(|sub| sub.windows(2).map(|w| (w[0], w[1])))
            .collect();
        for (a, b) in segments {
            self.stroke_segment(a, b);
        }
    }

    fn fill_rect(&mut self, rect: Rect) {
        let (min, max) = (rect.min, rect.max);
        self.paint_region(min.x, min.y, max.x, max.y, move |px, py| {
            px >= min.x && px < max.x && py >= min.y && py < max.y
        });
    }

    fn fill_ellipse(&mut self, rect: Rect) {
        let c = rect.center();
        let rx = rect.width() * 0.5;
        let ry = rect.height() * 0.5;
        if rx <= 0.0 || ry <= 0.0 {
            return;
        }
        self.paint_region(rect.min.x, rect.min.y, rect.max.x, rect.max.y, move |px, py| {
            let nx = (px - c.x) / rx;
            let ny = (py - c.y) / ry;
            nx * nx + ny * ny <= 1.0
        });
    }

    fn fill_all(&mut self, value: u8) {
        for p in self.pixels.pixels_mut() {
            *p = Luma([value]);
        }
    }

    fn draw_surface(&mut self, other: &CoverageSurface) {
        if other.width() != self.width() || other.height() != self.height() {
            return;
        }
        let mode = self.mode;
        let dst: &mut [u8] = &mut self.pixels;
        dst.par_iter_mut()
            .zip(other.pixels.as_raw().par_iter())
            .for_each(|(d, &s)| {
                let s = s as u32;
                let cur = *d as u32;
                *d = match mode {
                    // white over existing: s + d * (1 - s)
                    CompositeMode::SourceOver => (s + cur * (255 - s) / 255).min(255) as u8,
                    CompositeMode::DestinationOut => (cur * (255 - s) / 255) as u8,
                };
            });
    }

    fn to_image(&self) -> GrayImage {
        self.pixels.clone()
    }
}

/// Squared distance from `(px, py)` to segment `a`–`b`.
#[inline]
pub fn dist_sq_to_segment(px: f32, py: f32, a: Pos2, b: Pos2) -> f32 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq < 1e-12 {
        0.0
    } else {
        (((px - a.x) * dx + (py - a.y) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let cx = a.x + t * dx - px;
    let cy = a.y + t * dy - py;
    cx * cx + cy * cy
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::Vec2;

    #[test]
    fn fill_rect_covers_pixel_centres_inside_only() {
        let mut s = CoverageSurface::new(20, 20);
        s.fill_rect(Rect::from_min_max(Pos2::new(2.0, 3.0), Pos2::new(6.0, 5.0)));
        assert_eq!(s.coverage_at(2, 3), 255);
        assert_eq!(s.coverage_at(5, 4), 255);
        assert_eq!(s.coverage_at(6, 4), 0);
        assert_eq!(s.coverage_at(1, 3), 0);
        assert_eq!(s.coverage_at(2, 5), 0);
    }

    #[test]
    fn stroke_has_round_caps_and_line_width() {
        let mut s = CoverageSurface::new(100, 60);
        s.set_line_width(10.0);
        s.begin_path();
        s.move_to(Pos2::new(20.0, 30.0));
        s.line_to(Pos2::new(60.0, 30.0));
        s.stroke();
        assert_eq!(s.coverage_at(40, 30), 255);
        assert_eq!(s.coverage_at(40, 25), 255);
        assert_eq!(s.coverage_at(40, 35), 0);
        // Round cap extends past the endpoint by the radius.
        assert_eq!(s.coverage_at(63, 30), 255);
        assert_eq!(s.coverage_at(66, 30), 0);
        // Corner of the cap's bounding square is outside the round cap.
        assert_eq!(s.coverage_at(64, 34), 0);
    }

    #[test]
    fn separate_sub_paths_are_not_joined() {
        let mut s = CoverageSurface::new(100, 100);
        s.set_line_width(4.0);
        s.begin_path();
        s.move_to(Pos2::new(10.0, 10.0));
        s.line_to(Pos2::new(20.0, 10.0));
        s.move_to(Pos2::new(80.0, 80.0));
        s.line_to(Pos2::new(90.0, 80.0));
        s.stroke();
        // Midpoint of an imaginary connector between (20,10) and (80,80).
        assert_eq!(s.coverage_at(50, 45), 0);
        assert_eq!(s.coverage_at(85, 80), 255);
    }

    #[test]
    fn destination_out_removes_coverage() {
        let mut s = CoverageSurface::new(30, 30);
        s.fill_rect(Rect::from_min_size(Pos2::ZERO, Vec2::splat(30.0)));
        s.set_composite_mode(CompositeMode::DestinationOut);
        s.fill_ellipse(Rect::from_min_size(Pos2::new(5.0, 5.0), Vec2::splat(20.0)));
        assert_eq!(s.coverage_at(15, 15), 0);
        assert_eq!(s.coverage_at(1, 1), 255);
    }

    #[test]
    fn draw_surface_unions_coverage() {
        let mut base = CoverageSurface::new(10, 10);
        let mut top = CoverageSurface::new(10, 10);
        base.fill_rect(Rect::from_min_size(Pos2::ZERO, Vec2::new(5.0, 10.0)));
        top.fill_rect(Rect::from_min_size(Pos2::new(5.0, 0.0), Vec2::new(5.0, 10.0)));
        base.draw_surface(&top);
        assert!(base.pixels().as_raw().iter().all(|&v| v == 255));
    }
}

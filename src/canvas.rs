use egui::{Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};

use crate::settings::ZOOM_LIMIT;

// ============================================================================
// VIEWPORT METRICS: live snapshot of how the base image sits on screen
// ============================================================================

/// Everything the coordinate mapper needs, captured at event time.
///
/// `display_rect` is the on-screen rectangle the image currently occupies
/// (after fit-to-viewport, zoom and pan); `natural_size` is the image's pixel
/// size.  Never cache this across events: pan/zoom move `display_rect`
/// without resizing the canvas.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewportMetrics {
    pub display_rect: Rect,
    pub natural_size: Vec2,
    pub scale: f32,
    pub pan: Vec2,
}

impl ViewportMetrics {
    /// 1:1 metrics: the image drawn at its natural size with its top-left at
    /// the origin, so client and canvas coordinates coincide.
    pub fn identity(width: u32, height: u32) -> Self {
        let natural_size = Vec2::new(width as f32, height as f32);
        Self {
            display_rect: Rect::from_min_size(Pos2::ZERO, natural_size),
            natural_size,
            scale: 1.0,
            pan: Vec2::ZERO,
        }
    }

    /// Map a client-space pointer position into canvas-pixel space.
    ///
    /// `canvas = (client - rect.min) * (natural / rect.size)`.  Returns `None`
    /// while the display rect is degenerate (image not laid out yet).
    pub fn client_to_canvas(&self, client: Pos2) -> Option<Pos2> {
        let rect = self.display_rect;
        if rect.width() <= 0.0 || rect.height() <= 0.0 {
            return None;
        }
        if self.natural_size.x <= 0.0 || self.natural_size.y <= 0.0 {
            return None;
        }
        Some(Pos2::new(
            (client.x - rect.left()) * (self.natural_size.x / rect.width()),
            (client.y - rect.top()) * (self.natural_size.y / rect.height()),
        ))
    }

    /// Inverse of [`client_to_canvas`](Self::client_to_canvas).
    pub fn canvas_to_client(&self, canvas: Pos2) -> Pos2 {
        let rect = self.display_rect;
        let sx = if self.natural_size.x > 0.0 { rect.width() / self.natural_size.x } else { 0.0 };
        let sy = if self.natural_size.y > 0.0 { rect.height() / self.natural_size.y } else { 0.0 };
        Pos2::new(rect.left() + canvas.x * sx, rect.top() + canvas.y * sy)
    }
}

/// Pick the pointer position for an input sample: the first touch point when
/// the sample came from a touch screen, otherwise the mouse position.
pub fn pointer_position(mouse: Option<Pos2>, touches: &[Pos2]) -> Option<Pos2> {
    touches.first().copied().or(mouse)
}

// ============================================================================
// VIEW TRANSFORM: zoom + pan, display only
// ============================================================================

/// Zoom scale and pan offset.  Independent of the editing model: it only
/// changes where the image is drawn and therefore how client coordinates map.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    pub scale: f32,
    pub pan: Vec2,
    max_scale: f32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::new(ZOOM_LIMIT)
    }
}

impl ViewTransform {
    pub fn new(max_scale: f32) -> Self {
        Self {
            scale: 1.0,
            pan: Vec2::ZERO,
            max_scale: max_scale.clamp(1.0, ZOOM_LIMIT),
        }
    }

    pub fn is_zoomed(&self) -> bool {
        self.scale > 1.0
    }

    pub fn reset(&mut self) {
        self.scale = 1.0;
        self.pan = Vec2::ZERO;
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale.clamp(1.0, self.max_scale);
        if self.scale <= 1.0 {
            self.pan = Vec2::ZERO;
        }
    }

    /// Set the pan offset.  The image is pinned in place while unzoomed.
    pub fn set_pan(&mut self, pan: Vec2) {
        self.pan = if self.is_zoomed() { pan } else { Vec2::ZERO };
    }

    /// Zoom while keeping a client-space point fixed (e.g. under the cursor).
    /// `fit_rect` is the rect the image occupies at scale 1 without pan.
    pub fn zoom_around(&mut self, factor: f32, anchor: Pos2, fit_rect: Rect) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let old_scale = self.scale;
        self.scale = (self.scale * factor).clamp(1.0, self.max_scale);
        let actual = self.scale / old_scale;
        // new_center = anchor + (old_center - anchor) * factor
        let old_center = fit_rect.center() + self.pan;
        let new_center = anchor + (old_center - anchor) * actual;
        self.pan = new_center - fit_rect.center();
        if self.scale <= 1.0 {
            self.pan = Vec2::ZERO;
        }
    }

    /// Where the image is drawn on screen for the current scale and pan.
    pub fn display_rect(&self, fit_rect: Rect) -> Rect {
        Rect::from_center_size(fit_rect.center() + self.pan, fit_rect.size() * self.scale)
    }

    /// Build the metrics for one event from the live transform.
    pub fn metrics(&self, fit_rect: Rect, natural_w: u32, natural_h: u32) -> ViewportMetrics {
        ViewportMetrics {
            display_rect: self.display_rect(fit_rect),
            natural_size: Vec2::new(natural_w as f32, natural_h as f32),
            scale: self.scale,
            pan: self.pan,
        }
    }
}

/// Largest rect with the image's aspect ratio that fits centred in `viewport`.
pub fn fit_rect(viewport: Rect, natural_w: u32, natural_h: u32) -> Rect {
    if natural_w == 0 || natural_h == 0 || viewport.width() <= 0.0 || viewport.height() <= 0.0 {
        return Rect::from_center_size(viewport.center(), Vec2::ZERO);
    }
    let ratio = (viewport.width() / natural_w as f32).min(viewport.height() / natural_h as f32);
    Rect::from_center_size(
        viewport.center(),
        Vec2::new(natural_w as f32 * ratio, natural_h as f32 * ratio),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Pos2, b: Pos2) -> bool {
        (a.x - b.x).abs() < 1e-3 && (a.y - b.y).abs() < 1e-3
    }

    #[test]
    fn mapping_accounts_for_displayed_vs_natural_size() {
        // 1000x800 image drawn at half size, offset by (50, 20).
        let m = ViewportMetrics {
            display_rect: Rect::from_min_size(Pos2::new(50.0, 20.0), Vec2::new(500.0, 400.0)),
            natural_size: Vec2::new(1000.0, 800.0),
            scale: 1.0,
            pan: Vec2::ZERO,
        };
        let p = m.client_to_canvas(Pos2::new(300.0, 220.0)).unwrap();
        assert!(close(p, Pos2::new(500.0, 400.0)));
        assert!(close(m.canvas_to_client(p), Pos2::new(300.0, 220.0)));
    }

    #[test]
    fn degenerate_display_rect_maps_to_nothing() {
        let mut m = ViewportMetrics::identity(100, 100);
        m.display_rect = Rect::from_min_size(Pos2::ZERO, Vec2::ZERO);
        assert_eq!(m.client_to_canvas(Pos2::new(5.0, 5.0)), None);
    }

    #[test]
    fn zoom_and_pan_change_the_mapping_live() {
        let fit = Rect::from_min_size(Pos2::ZERO, Vec2::new(200.0, 100.0));
        let mut view = ViewTransform::new(5.0);
        let before = view.metrics(fit, 200, 100).client_to_canvas(Pos2::new(150.0, 50.0)).unwrap();
        assert!(close(before, Pos2::new(150.0, 50.0)));

        view.set_scale(2.0);
        view.set_pan(Vec2::new(-40.0, 0.0));
        let m = view.metrics(fit, 200, 100);
        // Display rect is now 400x200 centred at (60, 50).
        assert!(close(m.display_rect.min, Pos2::new(-140.0, -50.0)));
        let after = m.client_to_canvas(Pos2::new(150.0, 50.0)).unwrap();
        assert!(close(after, Pos2::new(145.0, 50.0)));
    }

    #[test]
    fn zoom_is_bounded_and_keeps_anchor_fixed() {
        let fit = Rect::from_min_size(Pos2::ZERO, Vec2::new(100.0, 100.0));
        let mut view = ViewTransform::new(5.0);
        let anchor = Pos2::new(80.0, 20.0);
        let canvas_before = view.metrics(fit, 100, 100).client_to_canvas(anchor).unwrap();
        view.zoom_around(2.0, anchor, fit);
        let canvas_after = view.metrics(fit, 100, 100).client_to_canvas(anchor).unwrap();
        assert!(close(canvas_before, canvas_after));

        view.zoom_around(100.0, anchor, fit);
        assert_eq!(view.scale, 5.0);
        view.zoom_around(0.0001, anchor, fit);
        assert_eq!(view.scale, 1.0);
        assert_eq!(view.pan, Vec2::ZERO);
    }

    #[test]
    fn pan_is_pinned_while_unzoomed() {
        let mut view = ViewTransform::new(5.0);
        view.set_pan(Vec2::new(60.0, 30.0));
        assert_eq!(view.pan, Vec2::ZERO);
        view.set_scale(2.0);
        view.set_pan(Vec2::new(60.0, 30.0));
        assert_eq!(view.pan, Vec2::new(60.0, 30.0));
    }

    #[test]
    fn first_touch_wins_over_mouse() {
        let mouse = Some(Pos2::new(1.0, 1.0));
        let touches = [Pos2::new(7.0, 8.0), Pos2::new(9.0, 9.0)];
        assert_eq!(pointer_position(mouse, &touches), Some(Pos2::new(7.0, 8.0)));
        assert_eq!(pointer_position(mouse, &[]), mouse);
    }

    #[test]
    fn fit_rect_preserves_aspect_ratio() {
        let viewport = Rect::from_min_size(Pos2::ZERO, Vec2::new(400.0, 400.0));
        let r = fit_rect(viewport, 1000, 500);
        assert!((r.width() - 400.0).abs() < 1e-3);
        assert!((r.height() - 200.0).abs() < 1e-3);
        assert!(close(r.center(), Pos2::new(200.0, 200.0)));
    }
}

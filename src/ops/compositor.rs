// ============================================================================
// Compositor: live preview overlay and final black/white mask export
// ============================================================================

use egui::{Pos2, Rect, Vec2};
use image::{GrayImage, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::error::EditorError;
use crate::ops::hit_test::handle_radius;
use crate::ops::paint::PaintLayer;
use crate::ops::raster::{CoverageSurface, RasterSurface, dist_sq_to_segment};
use crate::ops::shapes::{Shape, ShapeKind, ShapeModel, sdf_box};

/// Colours used by the preview overlay.  None of them reach the mask.
#[derive(Clone, Copy, Debug)]
pub struct PreviewStyle {
    pub paint: [u8; 4],
    pub shadow: [u8; 4],
    pub shape_fill: [u8; 4],
    pub shape_outline: [u8; 4],
    pub selection: [u8; 4],
    pub resize_handle: [u8; 4],
    pub delete_handle: [u8; 4],
    pub glyph: [u8; 4],
}

impl Default for PreviewStyle {
    fn default() -> Self {
        Self {
            paint: [255, 255, 255, 255],
            shadow: [0, 0, 0, 140],
            shape_fill: [255, 255, 255, 90],
            shape_outline: [255, 255, 255, 255],
            selection: [59, 130, 246, 255],
            resize_handle: [59, 130, 246, 255],
            delete_handle: [220, 38, 38, 255],
            glyph: [255, 255, 255, 255],
        }
    }
}

/// Source-over blend of an unpremultiplied colour into an RGBA pixel.
#[inline]
fn blend_into(dst: &mut [u8], src: [u8; 4]) {
    let sa = src[3] as f32 / 255.0;
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return;
    }
    for c in 0..3 {
        let s = src[c] as f32 * sa;
        let d = dst[c] as f32 * da * (1.0 - sa);
        dst[c] = ((s + d) / out_a).round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Run `shade` for every pixel centre in `bounds` (clamped to the image),
/// rows in parallel.  `shade` returns the colour to blend, if any.
fn shade_region<F>(out: &mut RgbaImage, bounds: Rect, shade: F)
where
    F: Fn(f32, f32) -> Option<[u8; 4]> + Sync,
{
    let (w, h) = out.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let x0 = (bounds.min.x.floor().max(0.0) as u32).min(w);
    let y0 = (bounds.min.y.floor().max(0.0) as u32).min(h);
    let x1 = (bounds.max.x.ceil().max(0.0) as u32).min(w);
    let y1 = (bounds.max.y.ceil().max(0.0) as u32).min(h);
    if x0 >= x1 || y0 >= y1 {
        return;
    }
    let row_bytes = w as usize * 4;
    let buf: &mut [u8] = out;
    buf[y0 as usize * row_bytes..y1 as usize * row_bytes]
        .par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(row, row_buf)| {
            let py = (y0 as usize + row) as f32 + 0.5;
            for x in x0..x1 {
                let px = x as f32 + 0.5;
                if let Some(color) = shade(px, py) {
                    let i = x as usize * 4;
                    blend_into(&mut row_buf[i..i + 4], color);
                }
            }
        });
}

fn draw_capsule(out: &mut RgbaImage, a: Pos2, b: Pos2, radius: f32, color: [u8; 4]) {
    let r_sq = radius * radius;
    let bounds = Rect::from_two_pos(a, b).expand(radius);
    shade_region(out, bounds, move |px, py| {
        (dist_sq_to_segment(px, py, a, b) <= r_sq).then_some(color)
    });
}

fn draw_disc(out: &mut RgbaImage, center: Pos2, radius: f32, color: [u8; 4]) {
    draw_capsule(out, center, center, radius, color);
}

/// Paint layer coverage with a cosmetic drop shadow.
fn draw_paint_layer(out: &mut RgbaImage, paint: &PaintLayer, shadow_offset: i64, style: &PreviewStyle) {
    let coverage = paint.coverage();
    let (w, h) = coverage.dimensions();
    if out.dimensions() != (w, h) {
        return;
    }
    let cov_at = |x: i64, y: i64| -> u8 {
        if x < 0 || y < 0 || x >= w as i64 || y >= h as i64 {
            0
        } else {
            coverage.get_pixel(x as u32, y as u32).0[0]
        }
    };
    let row_bytes = w as usize * 4;
    let buf: &mut [u8] = out;
    buf.par_chunks_mut(row_bytes).enumerate().for_each(|(y, row_buf)| {
        let y = y as i64;
        for x in 0..w as i64 {
            let i = x as usize * 4;
            let shadow = cov_at(x - shadow_offset, y - shadow_offset);
            if shadow > 0 {
                let mut c = style.shadow;
                c[3] = (c[3] as u32 * shadow as u32 / 255) as u8;
                blend_into(&mut row_buf[i..i + 4], c);
            }
            let cov = cov_at(x, y);
            if cov > 0 {
                let mut c = style.paint;
                c[3] = (c[3] as u32 * cov as u32 / 255) as u8;
                blend_into(&mut row_buf[i..i + 4], c);
            }
        }
    });
}

fn draw_shape(out: &mut RgbaImage, shape: &Shape, outline_width: f32, style: &PreviewStyle) {
    let half = outline_width * 0.5;
    let bounds = shape.bounds().expand(half + 1.0);
    let fill = style.shape_fill;
    let outline = style.shape_outline;
    shade_region(out, bounds, |px, py| {
        let d = shape.sdf(Pos2::new(px, py));
        if d.abs() <= half {
            Some(outline)
        } else if d < 0.0 {
            Some(fill)
        } else {
            None
        }
    });
}

fn draw_selection(out: &mut RgbaImage, shape: &Shape, scale: f32, handle_size: f32, style: &PreviewStyle) {
    let inv = 1.0 / scale.max(f32::EPSILON);
    let b = shape.bounds();
    let c = b.center();
    let (hx, hy) = (b.width() * 0.5, b.height() * 0.5);

    // Dashed bounding outline.
    let half = inv;
    let dash = 6.0 * inv;
    let selection = style.selection;
    shade_region(out, b.expand(half + 1.0), move |px, py| {
        let d = sdf_box(px - c.x, py - c.y, hx, hy);
        let on = (((px + py) / dash).floor() as i64).rem_euclid(2) == 0;
        (d.abs() <= half && on).then_some(selection)
    });

    // Centre marker.
    let arm = 5.0 * inv;
    let line = 1.0 * inv;
    draw_capsule(out, c - Vec2::new(arm, 0.0), c + Vec2::new(arm, 0.0), line, style.selection);
    draw_capsule(out, c - Vec2::new(0.0, arm), c + Vec2::new(0.0, arm), line, style.selection);

    let r = handle_radius(handle_size, scale);
    let g = r * 0.45;

    // Resize handle with a diagonal double-arrow glyph.
    let ra = shape.resize_anchor();
    draw_disc(out, ra, r, style.resize_handle);
    draw_capsule(out, ra - Vec2::splat(g), ra + Vec2::splat(g), line, style.glyph);

    // Delete handle with an X glyph.
    let da = shape.delete_anchor();
    draw_disc(out, da, r, style.delete_handle);
    draw_capsule(out, da - Vec2::splat(g), da + Vec2::splat(g), line, style.glyph);
    draw_capsule(out, da + Vec2::new(-g, g), da + Vec2::new(g, -g), line, style.glyph);
}

/// Render the live-preview overlay at the natural image size.
///
/// Paint layer (with drop shadow), then every shape in insertion order, then
/// the selected shape's adornments.  Adornment sizes scale with `1 / scale`
/// so they keep a constant on-screen size.
pub fn render_preview(
    paint: &PaintLayer,
    shapes: &ShapeModel,
    scale: f32,
    handle_size: f32,
    style: &PreviewStyle,
) -> RgbaImage {
    let mut out = RgbaImage::new(paint.width(), paint.height());
    let inv = 1.0 / scale.max(f32::EPSILON);
    let shadow_offset = (3.0 * inv).round().max(1.0) as i64;

    draw_paint_layer(&mut out, paint, shadow_offset, style);
    for shape in shapes.iter() {
        draw_shape(&mut out, shape, 2.0 * inv, style);
    }
    if let Some(sel) = shapes.selected() {
        draw_selection(&mut out, sel, scale, handle_size, style);
    }
    out
}

/// Build the submission mask: black everywhere, white exactly where the
/// paint layer has coverage or a shape's interior lies.
///
/// Only paint coverage and shape fills are drawn, never preview chrome.
pub fn export_mask(paint: &PaintLayer, shapes: &ShapeModel) -> Result<GrayImage, EditorError> {
    let (w, h) = (paint.width(), paint.height());
    if w == 0 || h == 0 {
        return Err(EditorError::MaskPreparation(format!(
            "cannot create a {}x{} export surface",
            w, h
        )));
    }
    let mut surface = CoverageSurface::new(w, h);
    surface.fill_all(0);
    surface.draw_surface(paint.surface());
    for shape in shapes.iter() {
        let bounds = shape.bounds();
        match shape.kind {
            ShapeKind::Rectangle => surface.fill_rect(bounds),
            ShapeKind::Ellipse => surface.fill_ellipse(bounds),
        }
    }
    Ok(surface.to_image())
}

/// Opaque RGBA copy of a mask (white = edit, black = keep).
pub fn mask_to_rgba(mask: &GrayImage) -> RgbaImage {
    let (w, h) = mask.dimensions();
    RgbaImage::from_fn(w, h, |x, y| {
        let v = mask.get_pixel(x, y).0[0];
        Rgba([v, v, v, 255])
    })
}

/// Flatten the preview overlay onto a copy of the base image.
pub fn flatten_preview(base: &RgbaImage, overlay: &RgbaImage) -> RgbaImage {
    let mut out = base.clone();
    image::imageops::overlay(&mut out, overlay, 0, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(model: &mut ShapeModel, kind: ShapeKind, a: (f32, f32), b: (f32, f32)) -> u64 {
        let id = model.create(kind, Pos2::new(a.0, a.1));
        model.update_extent(id, b.0 - a.0, b.1 - a.1);
        id
    }

    #[test]
    fn mask_is_binary_union_of_paint_and_shapes() {
        let mut paint = PaintLayer::new(100, 100, 10.0);
        paint.begin_stroke(Pos2::new(10.0, 90.0), crate::ops::paint::PaintMode::Brush);
        paint.extend_stroke(Pos2::new(40.0, 90.0));
        paint.end_stroke();
        let mut shapes = ShapeModel::new();
        rect(&mut shapes, ShapeKind::Rectangle, (60.0, 10.0), (90.0, 40.0));
        rect(&mut shapes, ShapeKind::Ellipse, (10.0, 10.0), (40.0, 40.0));

        let mask = export_mask(&paint, &shapes).unwrap();
        assert!(mask.as_raw().iter().all(|&v| v == 0 || v == 255));
        assert_eq!(mask.get_pixel(25, 90).0[0], 255);
        assert_eq!(mask.get_pixel(75, 25).0[0], 255);
        assert_eq!(mask.get_pixel(25, 25).0[0], 255);
        // Ellipse corner stays black even though its bounding box covers it.
        assert_eq!(mask.get_pixel(11, 11).0[0], 0);
        assert_eq!(mask.get_pixel(50, 60).0[0], 0);
    }

    #[test]
    fn export_ignores_preview_chrome() {
        let paint = PaintLayer::new(200, 200, 10.0);
        let mut shapes = ShapeModel::new();
        rect(&mut shapes, ShapeKind::Rectangle, (50.0, 50.0), (100.0, 100.0));
        // Shape stays selected, so the preview draws handles outside its box.
        let preview = render_preview(&paint, &shapes, 1.0, 14.0, &PreviewStyle::default());
        assert!(preview.get_pixel(103, 103).0[3] > 0);
        let mask = export_mask(&paint, &shapes).unwrap();
        assert_eq!(mask.get_pixel(103, 103).0[0], 0);
        assert_eq!(mask.get_pixel(100, 50).0[0], 0);
    }

    #[test]
    fn export_is_idempotent() {
        let mut paint = PaintLayer::new(64, 64, 8.0);
        paint.begin_stroke(Pos2::new(5.0, 5.0), crate::ops::paint::PaintMode::Brush);
        paint.extend_stroke(Pos2::new(60.0, 40.0));
        paint.end_stroke();
        let mut shapes = ShapeModel::new();
        rect(&mut shapes, ShapeKind::Ellipse, (40.0, 10.0), (10.0, 50.0));
        let a = export_mask(&paint, &shapes).unwrap();
        let b = export_mask(&paint, &shapes).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn preview_paint_has_shadow_that_mask_lacks() {
        let mut paint = PaintLayer::new(100, 100, 6.0);
        paint.begin_stroke(Pos2::new(20.0, 20.0), crate::ops::paint::PaintMode::Brush);
        paint.extend_stroke(Pos2::new(80.0, 20.0));
        paint.end_stroke();
        let shapes = ShapeModel::new();
        let preview = render_preview(&paint, &shapes, 1.0, 14.0, &PreviewStyle::default());
        // Just below the stroke's edge: shadow only.
        let below = preview.get_pixel(50, 25);
        assert!(below.0[3] > 0);
        assert!(below.0[0] < 50);
        let mask = export_mask(&paint, &shapes).unwrap();
        assert_eq!(mask.get_pixel(50, 25).0[0], 0);
    }

    #[test]
    fn rgba_mask_is_opaque() {
        let mut mask = GrayImage::new(2, 1);
        mask.put_pixel(1, 0, image::Luma([255]));
        let rgba = mask_to_rgba(&mask);
        assert_eq!(rgba.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(rgba.get_pixel(1, 0), &Rgba([255, 255, 255, 255]));
    }
}

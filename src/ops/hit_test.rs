use egui::Pos2;

use crate::ops::shapes::ShapeModel;

/// What a canvas point landed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitKind {
    Body,
    ResizeHandle,
    DeleteHandle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hit {
    pub kind: HitKind,
    pub shape_id: u64,
}

/// Canvas-space radius of a handle `handle_size` pixels across at zoom
/// `scale`.  The compositor draws handles with the same radius, so what is
/// visible is exactly what is clickable.  Zoom is compensated; the fit of the
/// image into the window is not.
pub fn handle_radius(handle_size: f32, scale: f32) -> f32 {
    handle_size * 0.5 / scale.max(f32::EPSILON)
}

/// Hit-test a canvas point.
///
/// 1. Handles of the selected shape first, ignoring z-order: they must stay
///    clickable even when a later shape overlaps them.  When both handles are
///    in range the closer one wins (resize on a tie).
/// 2. Shape bodies, topmost (most recently created) first.
pub fn hit_test(model: &ShapeModel, p: Pos2, handle_size: f32, scale: f32) -> Option<Hit> {
    if let Some(sel) = model.selected() {
        let r = handle_radius(handle_size, scale);
        let d_resize = p.distance(sel.resize_anchor());
        let d_delete = p.distance(sel.delete_anchor());
        let resize_hit = d_resize <= r;
        let delete_hit = d_delete <= r;
        if resize_hit && (!delete_hit || d_resize <= d_delete) {
            return Some(Hit { kind: HitKind::ResizeHandle, shape_id: sel.id });
        }
        if delete_hit {
            return Some(Hit { kind: HitKind::DeleteHandle, shape_id: sel.id });
        }
    }

    model
        .iter()
        .rev()
        .find(|s| s.bounds().contains(p))
        .map(|s| Hit { kind: HitKind::Body, shape_id: s.id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::shapes::ShapeKind;

    fn model_with(rects: &[(f32, f32, f32, f32)]) -> (ShapeModel, Vec<u64>) {
        let mut model = ShapeModel::new();
        let ids = rects
            .iter()
            .map(|&(x, y, w, h)| {
                let id = model.create(ShapeKind::Rectangle, Pos2::new(x, y));
                model.update_extent(id, w, h);
                id
            })
            .collect();
        model.select(None);
        (model, ids)
    }

    #[test]
    fn topmost_body_wins() {
        let (model, ids) = model_with(&[(0.0, 0.0, 100.0, 100.0), (50.0, 50.0, 100.0, 100.0)]);
        let hit = hit_test(&model, Pos2::new(75.0, 75.0), 10.0, 1.0).unwrap();
        assert_eq!(hit, Hit { kind: HitKind::Body, shape_id: ids[1] });
        let hit = hit_test(&model, Pos2::new(10.0, 10.0), 10.0, 1.0).unwrap();
        assert_eq!(hit.shape_id, ids[0]);
        assert_eq!(hit_test(&model, Pos2::new(400.0, 400.0), 10.0, 1.0), None);
    }

    #[test]
    fn negative_extents_are_hit_tested_normalized() {
        let (model, ids) = model_with(&[(100.0, 100.0, -50.0, -40.0)]);
        let hit = hit_test(&model, Pos2::new(70.0, 80.0), 10.0, 1.0).unwrap();
        assert_eq!(hit, Hit { kind: HitKind::Body, shape_id: ids[0] });
    }

    #[test]
    fn selected_handle_beats_overlapping_later_body() {
        // Shape A's resize handle at (100,100) sits inside shape B's body.
        let (mut model, ids) = model_with(&[(0.0, 0.0, 100.0, 100.0), (80.0, 80.0, 60.0, 60.0)]);
        model.select(Some(ids[0]));
        let hit = hit_test(&model, Pos2::new(101.0, 99.0), 10.0, 1.0).unwrap();
        assert_eq!(hit, Hit { kind: HitKind::ResizeHandle, shape_id: ids[0] });
    }

    #[test]
    fn delete_handle_is_at_top_right_of_signed_extent() {
        let (mut model, ids) = model_with(&[(10.0, 10.0, 100.0, 50.0)]);
        model.select(Some(ids[0]));
        let hit = hit_test(&model, Pos2::new(108.0, 12.0), 10.0, 1.0).unwrap();
        assert_eq!(hit.kind, HitKind::DeleteHandle);
    }

    #[test]
    fn handles_need_a_selection() {
        let (model, ids) = model_with(&[(10.0, 10.0, 100.0, 50.0)]);
        // (110, 60) is the resize anchor but also on the body's edge.
        let hit = hit_test(&model, Pos2::new(110.0, 60.0), 10.0, 1.0).unwrap();
        assert_eq!(hit, Hit { kind: HitKind::Body, shape_id: ids[0] });
        assert_eq!(hit_test(&model, Pos2::new(115.0, 65.0), 10.0, 1.0), None);
    }

    #[test]
    fn hit_radius_shrinks_in_canvas_space_when_zoomed() {
        let (mut model, ids) = model_with(&[(0.0, 0.0, 100.0, 100.0)]);
        model.select(Some(ids[0]));
        let p = Pos2::new(103.0, 103.0);
        assert_eq!(hit_test(&model, p, 10.0, 1.0).map(|h| h.kind), Some(HitKind::ResizeHandle));
        assert_eq!(hit_test(&model, p, 10.0, 4.0), None);
    }
}

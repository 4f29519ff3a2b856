//! Raw touch interpretation: pinch zoom, tap-to-focus, drag-to-tag.
//!
//! The interpreter is a pure classifier. It never touches the device; it
//! emits [`GestureAction`]s for the session controller to apply, which keeps
//! every rule here unit-testable without a camera.

use crate::detect::DetectedObject;
use crate::device::{CaptureMode, ZoomRange};
use crate::geom::{NormRect, PixelRect};

/// Minimum size per axis, in pixels, for a drag to count as a tag box.
/// Anything smaller is treated as an accidental tap and discarded silently.
pub const MIN_TAG_SIZE_PX: f32 = 20.0;

/// One active touch point in view pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub id: u64,
    pub x: f32,
    pub y: f32,
}

/// Session snapshot the interpreter classifies against.
#[derive(Debug, Clone)]
pub struct GestureContext<'a> {
    pub capture_mode: CaptureMode,
    pub zoom_range: Option<ZoomRange>,
    pub focus_point_supported: bool,
    pub recording: bool,
    pub tagging_enabled: bool,
    /// Displayed size of the video element in pixels.
    pub view_size: (f32, f32),
    /// Bounding boxes of currently visible objects in z-order, oldest first.
    pub visible_boxes: &'a [NormRect],
}

/// What a touch sequence asked the session to do.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureAction {
    /// Committed zoom level, already clamped to the supported range.
    Zoom(f64),
    /// Focus request at a view pixel position.
    FocusAt { x: f32, y: f32 },
    /// Index into the visible-box list that was hit, topmost first match.
    OpenObject(usize),
    /// In-progress tag rectangle for overlay preview.
    TagPreview(PixelRect),
    /// Finished tag rectangle in normalized coordinates.
    TagCommitted(NormRect),
}

enum ActiveGesture {
    None,
    Pinch { baseline: f64 },
    Drag { origin: (f32, f32), rect: PixelRect },
}

/// Classifies touch sequences into zoom, focus, and tagging actions.
pub struct GestureInterpreter {
    committed_zoom: f64,
    active: ActiveGesture,
}

impl GestureInterpreter {
    pub fn new() -> Self {
        Self {
            committed_zoom: 1.0,
            active: ActiveGesture::None,
        }
    }

    /// Forget all gesture state, typically on session replacement.
    pub fn reset(&mut self) {
        self.committed_zoom = 1.0;
        self.active = ActiveGesture::None;
    }

    /// Override the committed zoom, e.g. after the capability probe resets
    /// the device to its baseline.
    pub fn set_zoom(&mut self, zoom: f64) {
        self.committed_zoom = zoom;
    }

    pub fn committed_zoom(&self) -> f64 {
        self.committed_zoom
    }

    /// True while a tag drag is in progress. Used to block camera flips
    /// during an active tagging interaction.
    pub fn drag_in_progress(&self) -> bool {
        matches!(self.active, ActiveGesture::Drag { .. })
    }

    pub fn touch_start(
        &mut self,
        points: &[TouchPoint],
        ctx: &GestureContext<'_>,
    ) -> Option<GestureAction> {
        // Any new sequence invalidates a previous pinch baseline.
        self.active = ActiveGesture::None;

        match points {
            [a, b] if ctx.zoom_range.is_some() && !ctx.recording => {
                self.active = ActiveGesture::Pinch {
                    baseline: distance(a, b),
                };
                None
            }
            [p] => self.classify_single_start(p, ctx),
            _ => None,
        }
    }

    pub fn touch_move(
        &mut self,
        points: &[TouchPoint],
        ctx: &GestureContext<'_>,
    ) -> Option<GestureAction> {
        match &mut self.active {
            ActiveGesture::Pinch { baseline } => {
                let [a, b] = points else { return None };
                let range = ctx.zoom_range?;
                let current = distance(a, b);
                if *baseline <= f64::EPSILON || current <= f64::EPSILON {
                    return None;
                }
                let zoom = range.clamp(self.committed_zoom * (current / *baseline));
                // Committing the sample as the new baseline keeps discrete
                // samples from accumulating drift.
                self.committed_zoom = zoom;
                *baseline = current;
                Some(GestureAction::Zoom(zoom))
            }
            ActiveGesture::Drag { origin, rect } => {
                let [p] = points else { return None };
                let (view_w, view_h) = ctx.view_size;
                let updated = PixelRect::from_corners(origin.0, origin.1, p.x, p.y)
                    .clamped_to(view_w, view_h);
                *rect = updated;
                Some(GestureAction::TagPreview(updated))
            }
            ActiveGesture::None => None,
        }
    }

    pub fn touch_end(
        &mut self,
        _points: &[TouchPoint],
        ctx: &GestureContext<'_>,
    ) -> Option<GestureAction> {
        let finished = std::mem::replace(&mut self.active, ActiveGesture::None);
        match finished {
            ActiveGesture::Drag { rect, .. }
                if rect.w >= MIN_TAG_SIZE_PX && rect.h >= MIN_TAG_SIZE_PX =>
            {
                let (view_w, view_h) = ctx.view_size;
                rect.to_normalized(view_w, view_h)
                    .map(GestureAction::TagCommitted)
            }
            _ => None,
        }
    }

    fn classify_single_start(
        &mut self,
        p: &TouchPoint,
        ctx: &GestureContext<'_>,
    ) -> Option<GestureAction> {
        if ctx.capture_mode == CaptureMode::Vision && ctx.tagging_enabled {
            self.active = ActiveGesture::Drag {
                origin: (p.x, p.y),
                rect: PixelRect::new(p.x, p.y, 0.0, 0.0),
            };
            return None;
        }

        if ctx.capture_mode == CaptureMode::Vision {
            let (view_w, view_h) = ctx.view_size;
            if view_w > 0.0 && view_h > 0.0 {
                // Topmost object first: most recently added wins.
                for (index, rect) in ctx.visible_boxes.iter().enumerate().rev() {
                    if rect.to_pixels(view_w as u32, view_h as u32).contains(p.x, p.y) {
                        return Some(GestureAction::OpenObject(index));
                    }
                }
            }
        }

        if ctx.focus_point_supported && !ctx.recording {
            return Some(GestureAction::FocusAt { x: p.x, y: p.y });
        }

        None
    }
}

impl Default for GestureInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn distance(a: &TouchPoint, b: &TouchPoint) -> f64 {
    let dx = (a.x - b.x) as f64;
    let dy = (a.y - b.y) as f64;
    (dx * dx + dy * dy).sqrt()
}

/// Hit-test helper mirroring the interpreter's reverse z-order rule, for
/// hosts that need to resolve taps outside a gesture sequence.
pub fn hit_test(objects: &[&DetectedObject], view: (u32, u32), x: f32, y: f32) -> Option<usize> {
    objects
        .iter()
        .enumerate()
        .rev()
        .find(|(_, o)| o.rect.to_pixels(view.0, view.1).contains(x, y))
        .map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(boxes: &'a [NormRect]) -> GestureContext<'a> {
        GestureContext {
            capture_mode: CaptureMode::Vision,
            zoom_range: Some(ZoomRange {
                min: 1.0,
                max: 4.0,
                step: 0.1,
            }),
            focus_point_supported: true,
            recording: false,
            tagging_enabled: false,
            view_size: (400.0, 300.0),
            visible_boxes: boxes,
        }
    }

    fn touch(id: u64, x: f32, y: f32) -> TouchPoint {
        TouchPoint { id, x, y }
    }

    #[test]
    fn test_pinch_zoom_scales_and_clamps() {
        let mut gi = GestureInterpreter::new();
        let boxes = [];
        let c = ctx(&boxes);

        gi.touch_start(&[touch(0, 100.0, 100.0), touch(1, 200.0, 100.0)], &c);
        // Spread to double the distance.
        let action = gi.touch_move(&[touch(0, 50.0, 100.0), touch(1, 250.0, 100.0)], &c);
        assert_eq!(action, Some(GestureAction::Zoom(2.0)));

        // Another doubling would be 4.0, at the clamp boundary; a further
        // doubling stays clamped.
        gi.touch_move(&[touch(0, 0.0, 100.0), touch(1, 400.0, 100.0)], &c);
        let action = gi.touch_move(&[touch(0, -400.0, 100.0), touch(1, 800.0, 100.0)], &c);
        assert_eq!(action, Some(GestureAction::Zoom(4.0)));
        assert_eq!(gi.committed_zoom(), 4.0);
    }

    #[test]
    fn test_pinch_has_no_drift_across_samples() {
        let mut gi = GestureInterpreter::new();
        let boxes = [];
        let c = ctx(&boxes);

        gi.touch_start(&[touch(0, 0.0, 0.0), touch(1, 100.0, 0.0)], &c);
        gi.touch_move(&[touch(0, 0.0, 0.0), touch(1, 150.0, 0.0)], &c);
        // Returning to the original spread must return to the original zoom.
        let action = gi.touch_move(&[touch(0, 0.0, 0.0), touch(1, 100.0, 0.0)], &c);
        let Some(GestureAction::Zoom(z)) = action else {
            panic!("expected zoom action");
        };
        approx::assert_relative_eq!(z, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_new_touch_start_resets_pinch_baseline() {
        let mut gi = GestureInterpreter::new();
        let boxes = [];
        let c = ctx(&boxes);

        gi.touch_start(&[touch(0, 0.0, 0.0), touch(1, 100.0, 0.0)], &c);
        gi.touch_move(&[touch(0, 0.0, 0.0), touch(1, 200.0, 0.0)], &c);
        assert_eq!(gi.committed_zoom(), 2.0);

        // New sequence with a wide initial spread: no jump on first move.
        gi.touch_start(&[touch(0, 0.0, 0.0), touch(1, 300.0, 0.0)], &c);
        let action = gi.touch_move(&[touch(0, 0.0, 0.0), touch(1, 300.0, 0.0)], &c);
        assert_eq!(action, Some(GestureAction::Zoom(2.0)));
    }

    #[test]
    fn test_pinch_ignored_while_recording() {
        let mut gi = GestureInterpreter::new();
        let boxes = [];
        let mut c = ctx(&boxes);
        c.recording = true;
        gi.touch_start(&[touch(0, 0.0, 0.0), touch(1, 100.0, 0.0)], &c);
        let action = gi.touch_move(&[touch(0, 0.0, 0.0), touch(1, 200.0, 0.0)], &c);
        assert_eq!(action, None);
        assert_eq!(gi.committed_zoom(), 1.0);
    }

    #[test]
    fn test_tap_hits_topmost_object_first() {
        let boxes = [
            NormRect::new(0.0, 0.0, 0.5, 0.5).unwrap(),
            NormRect::new(0.25, 0.25, 0.75, 0.75).unwrap(),
        ];
        let mut gi = GestureInterpreter::new();
        let c = ctx(&boxes);

        // (140, 105) in a 400x300 view is normalized (0.35, 0.35): inside both.
        let action = gi.touch_start(&[touch(0, 140.0, 105.0)], &c);
        assert_eq!(action, Some(GestureAction::OpenObject(1)));

        // (40, 30) is only inside the first box.
        let action = gi.touch_start(&[touch(0, 40.0, 30.0)], &c);
        assert_eq!(action, Some(GestureAction::OpenObject(0)));
    }

    #[test]
    fn test_tap_miss_falls_back_to_focus() {
        let boxes = [NormRect::new(0.0, 0.0, 0.25, 0.25).unwrap()];
        let mut gi = GestureInterpreter::new();
        let c = ctx(&boxes);
        let action = gi.touch_start(&[touch(0, 350.0, 250.0)], &c);
        assert_eq!(action, Some(GestureAction::FocusAt { x: 350.0, y: 250.0 }));
    }

    #[test]
    fn test_focus_not_offered_without_support() {
        let boxes = [];
        let mut gi = GestureInterpreter::new();
        let mut c = ctx(&boxes);
        c.focus_point_supported = false;
        assert_eq!(gi.touch_start(&[touch(0, 10.0, 10.0)], &c), None);
    }

    #[test]
    fn test_drag_commits_normalized_rect() {
        let boxes = [];
        let mut gi = GestureInterpreter::new();
        let mut c = ctx(&boxes);
        c.tagging_enabled = true;

        gi.touch_start(&[touch(0, 100.0, 75.0)], &c);
        assert!(gi.drag_in_progress());
        let preview = gi.touch_move(&[touch(0, 200.0, 150.0)], &c);
        assert_eq!(
            preview,
            Some(GestureAction::TagPreview(PixelRect::new(
                100.0, 75.0, 100.0, 75.0
            )))
        );

        let action = gi.touch_end(&[], &c);
        let Some(GestureAction::TagCommitted(rect)) = action else {
            panic!("expected committed tag");
        };
        approx::assert_relative_eq!(rect.x1, 0.25, epsilon = 1e-5);
        approx::assert_relative_eq!(rect.y1, 0.25, epsilon = 1e-5);
        approx::assert_relative_eq!(rect.x2, 0.5, epsilon = 1e-5);
        approx::assert_relative_eq!(rect.y2, 0.5, epsilon = 1e-5);
        assert!(!gi.drag_in_progress());
    }

    #[test]
    fn test_tiny_drag_is_discarded() {
        let boxes = [];
        let mut gi = GestureInterpreter::new();
        let mut c = ctx(&boxes);
        c.tagging_enabled = true;

        gi.touch_start(&[touch(0, 100.0, 100.0)], &c);
        gi.touch_move(&[touch(0, 110.0, 130.0)], &c);
        // 10px wide is under the threshold even though it is 30px tall.
        assert_eq!(gi.touch_end(&[], &c), None);
    }

    #[test]
    fn test_drag_clamped_to_view_bounds() {
        let boxes = [];
        let mut gi = GestureInterpreter::new();
        let mut c = ctx(&boxes);
        c.tagging_enabled = true;

        gi.touch_start(&[touch(0, 350.0, 250.0)], &c);
        let action = gi.touch_move(&[touch(0, 500.0, 400.0)], &c);
        let Some(GestureAction::TagPreview(rect)) = action else {
            panic!("expected preview");
        };
        assert_eq!(rect.x + rect.w, 400.0);
        assert_eq!(rect.y + rect.h, 300.0);
    }

    #[test]
    fn test_hit_test_reverse_z_order() {
        let a = DetectedObject {
            label: "under".into(),
            rect: NormRect::new(0.0, 0.0, 0.6, 0.6).unwrap(),
            score: Some(0.9),
            category: None,
            description: None,
            manual: false,
        };
        let b = DetectedObject {
            label: "over".into(),
            rect: NormRect::new(0.4, 0.4, 1.0, 1.0).unwrap(),
            score: Some(0.9),
            category: None,
            description: None,
            manual: false,
        };
        let objects = vec![&a, &b];
        assert_eq!(hit_test(&objects, (100, 100), 50.0, 50.0), Some(1));
        assert_eq!(hit_test(&objects, (100, 100), 10.0, 10.0), Some(0));
        assert_eq!(hit_test(&objects, (100, 100), 5.0, 95.0), None);
    }
}

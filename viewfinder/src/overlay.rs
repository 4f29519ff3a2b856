//! Bounding-box overlay composition and rasterization.
//!
//! The overlay canvas tracks the *displayed* size of the video element,
//! which the host reports through resize notifications; it is never assumed
//! constant. Composition converts normalized boxes into a pixel-space scene
//! every refresh, and a small rasterizer paints the scene for hosts without
//! their own drawing surface.

use image::{Rgba, RgbaImage};

use crate::detect::DetectedObject;
use crate::focus::{FocusIndicator, FocusState};
use crate::geom::PixelRect;

/// AI detection box color (amber).
pub const AI_COLOR: Rgba<u8> = Rgba([250, 204, 21, 255]);
/// Manual tag box color (cyan). Manual objects stay visually distinct from
/// AI detections.
pub const MANUAL_COLOR: Rgba<u8> = Rgba([34, 211, 238, 255]);
/// Focus ring and tag-preview color.
pub const CHROME_COLOR: Rgba<u8> = Rgba([255, 255, 255, 230]);

const BOX_STROKE: u32 = 2;
const CHIP_HEIGHT: f32 = 18.0;
const CHIP_CHAR_WIDTH: f32 = 7.0;
const FOCUS_RING_SIZE: f32 = 64.0;

/// One labeled box ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayBox {
    pub rect: PixelRect,
    pub label: String,
    pub score: Option<f32>,
    pub manual: bool,
}

/// Pixel-space draw list for one refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayScene {
    pub width: u32,
    pub height: u32,
    pub boxes: Vec<OverlayBox>,
    pub tag_preview: Option<PixelRect>,
    pub focus_ring: Option<PixelRect>,
}

/// Converts visible objects into pixel-space scenes sized to the displayed
/// video element.
pub struct OverlayRenderer {
    width: u32,
    height: u32,
}

impl OverlayRenderer {
    pub fn new() -> Self {
        Self {
            width: 0,
            height: 0,
        }
    }

    /// Track the observed displayed size of the video element.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Build the draw list for the current refresh.
    pub fn compose(
        &self,
        visible: &[&DetectedObject],
        tag_preview: Option<PixelRect>,
        focus: &FocusIndicator,
    ) -> OverlayScene {
        let boxes = if self.width == 0 || self.height == 0 {
            Vec::new()
        } else {
            visible
                .iter()
                .map(|object| OverlayBox {
                    rect: object.rect.to_pixels(self.width, self.height),
                    label: object.label.clone(),
                    score: object.score,
                    manual: object.manual,
                })
                .collect()
        };

        let focus_ring = (focus.visible && focus.state != FocusState::Idle).then(|| {
            let half = FOCUS_RING_SIZE / 2.0;
            PixelRect::new(focus.x - half, focus.y - half, FOCUS_RING_SIZE, FOCUS_RING_SIZE)
        });

        OverlayScene {
            width: self.width,
            height: self.height,
            boxes,
            tag_preview,
            focus_ring,
        }
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Paint a scene onto a transparent canvas.
///
/// Boxes are stroked with a label chip above the top-left corner; the chip
/// is a filled block sized to the label, text rendering being left to hosts
/// with a font stack.
pub fn rasterize(scene: &OverlayScene) -> RgbaImage {
    let mut canvas = RgbaImage::new(scene.width, scene.height);
    if scene.width == 0 || scene.height == 0 {
        return canvas;
    }

    for item in &scene.boxes {
        let color = if item.manual { MANUAL_COLOR } else { AI_COLOR };
        stroke_rect(&mut canvas, &item.rect, color, BOX_STROKE);

        let chip_w = (item.label.len() as f32 * CHIP_CHAR_WIDTH + 10.0).min(item.rect.w.max(40.0));
        let chip = PixelRect::new(
            item.rect.x,
            (item.rect.y - CHIP_HEIGHT).max(0.0),
            chip_w,
            CHIP_HEIGHT,
        );
        fill_rect(&mut canvas, &chip, color);
    }

    if let Some(rect) = &scene.tag_preview {
        stroke_rect(&mut canvas, rect, CHROME_COLOR, BOX_STROKE);
    }
    if let Some(ring) = &scene.focus_ring {
        stroke_rect(&mut canvas, ring, CHROME_COLOR, BOX_STROKE);
    }

    canvas
}

fn fill_rect(canvas: &mut RgbaImage, rect: &PixelRect, color: Rgba<u8>) {
    let (w, h) = canvas.dimensions();
    let x0 = rect.x.max(0.0) as u32;
    let y0 = rect.y.max(0.0) as u32;
    let x1 = ((rect.x + rect.w).max(0.0) as u32).min(w);
    let y1 = ((rect.y + rect.h).max(0.0) as u32).min(h);
    for y in y0..y1 {
        for x in x0..x1 {
            canvas.put_pixel(x, y, color);
        }
    }
}

fn stroke_rect(canvas: &mut RgbaImage, rect: &PixelRect, color: Rgba<u8>, stroke: u32) {
    let s = stroke as f32;
    // Top, bottom, left, right bands.
    fill_rect(canvas, &PixelRect::new(rect.x, rect.y, rect.w, s), color);
    fill_rect(
        canvas,
        &PixelRect::new(rect.x, rect.y + rect.h - s, rect.w, s),
        color,
    );
    fill_rect(canvas, &PixelRect::new(rect.x, rect.y, s, rect.h), color);
    fill_rect(
        canvas,
        &PixelRect::new(rect.x + rect.w - s, rect.y, s, rect.h),
        color,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::NormRect;

    fn object(label: &str, manual: bool) -> DetectedObject {
        DetectedObject {
            label: label.to_string(),
            rect: NormRect::new(0.25, 0.25, 0.75, 0.75).unwrap(),
            score: Some(0.9),
            category: None,
            description: None,
            manual,
        }
    }

    fn hidden_focus() -> FocusIndicator {
        FocusIndicator {
            x: 0.0,
            y: 0.0,
            visible: false,
            state: FocusState::Idle,
        }
    }

    #[test]
    fn test_compose_converts_to_pixels() {
        let mut renderer = OverlayRenderer::new();
        renderer.resize(400, 200);
        let obj = object("cat", false);
        let scene = renderer.compose(&[&obj], None, &hidden_focus());
        assert_eq!(scene.boxes.len(), 1);
        let rect = scene.boxes[0].rect;
        assert_eq!(rect.x, 100.0);
        assert_eq!(rect.y, 50.0);
        assert_eq!(rect.w, 200.0);
        assert_eq!(rect.h, 100.0);
    }

    #[test]
    fn test_compose_with_zero_size_emits_nothing() {
        let renderer = OverlayRenderer::new();
        let obj = object("cat", false);
        let scene = renderer.compose(&[&obj], None, &hidden_focus());
        assert!(scene.boxes.is_empty());
    }

    #[test]
    fn test_manual_flag_flows_into_scene() {
        let mut renderer = OverlayRenderer::new();
        renderer.resize(100, 100);
        let ai = object("cat", false);
        let tagged = object("mug", true);
        let scene = renderer.compose(&[&ai, &tagged], None, &hidden_focus());
        assert!(!scene.boxes[0].manual);
        assert!(scene.boxes[1].manual);
    }

    #[test]
    fn test_focus_ring_only_when_visible() {
        let mut renderer = OverlayRenderer::new();
        renderer.resize(100, 100);
        let focus = FocusIndicator {
            x: 50.0,
            y: 50.0,
            visible: true,
            state: FocusState::Focusing,
        };
        let scene = renderer.compose(&[], None, &focus);
        assert!(scene.focus_ring.is_some());

        let scene = renderer.compose(&[], None, &hidden_focus());
        assert!(scene.focus_ring.is_none());
    }

    #[test]
    fn test_rasterize_draws_box_pixels() {
        let mut renderer = OverlayRenderer::new();
        renderer.resize(100, 100);
        let obj = object("cat", false);
        let scene = renderer.compose(&[&obj], None, &hidden_focus());
        let canvas = rasterize(&scene);
        // Top-left corner of the stroked box.
        assert_eq!(*canvas.get_pixel(25, 25), AI_COLOR);
        // Center stays transparent.
        assert_eq!(canvas.get_pixel(50, 50)[3], 0);
    }

    #[test]
    fn test_rasterize_tolerates_out_of_bounds_shapes() {
        let scene = OverlayScene {
            width: 50,
            height: 50,
            boxes: vec![OverlayBox {
                rect: PixelRect::new(-20.0, -20.0, 100.0, 100.0),
                label: "big".to_string(),
                score: None,
                manual: false,
            }],
            tag_preview: Some(PixelRect::new(40.0, 40.0, 30.0, 30.0)),
            focus_ring: None,
        };
        let canvas = rasterize(&scene);
        assert_eq!(canvas.dimensions(), (50, 50));
    }
}

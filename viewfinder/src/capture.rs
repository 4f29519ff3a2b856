//! Still-photo and video capture.
//!
//! Photos are cropped from the native frame to the selected aspect ratio
//! (longer axis cropped, centered) and mirrored for the selfie camera so the
//! saved image matches the preview. Video accumulates recorder chunks and is
//! assembled into a single payload on stop, sharing the photo's encoded
//! representation for uniform storage.

use std::io::Cursor;
use std::time::Instant;

use anyhow::Context;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::RgbaImage;

use crate::device::{FacingMode, MediaRecorder};
use crate::gallery::{GalleryItem, MediaKind};

const PHOTO_JPEG_QUALITY: u8 = 92;

/// Centered source rectangle `(x, y, width, height)` cropping the longer
/// axis of a native frame down to the target aspect ratio.
pub fn centered_crop(native_w: u32, native_h: u32, target_aspect: f64) -> (u32, u32, u32, u32) {
    if native_w == 0 || native_h == 0 || target_aspect <= 0.0 {
        return (0, 0, native_w, native_h);
    }
    let native_aspect = native_w as f64 / native_h as f64;
    if native_aspect > target_aspect {
        // Wider than target: full height, crop width.
        let crop_w = ((native_h as f64 * target_aspect).round() as u32).min(native_w);
        let x = (native_w - crop_w) / 2;
        (x, 0, crop_w, native_h)
    } else {
        // Taller than target: full width, crop height.
        let crop_h = ((native_w as f64 / target_aspect).round() as u32).min(native_h);
        let y = (native_h - crop_h) / 2;
        (0, y, native_w, crop_h)
    }
}

/// Mirror (selfie only) and crop a frame to the target aspect ratio.
pub(crate) fn compose_photo(frame: &RgbaImage, target_aspect: f64, facing: FacingMode) -> RgbaImage {
    let mirrored;
    let source = if facing == FacingMode::User {
        mirrored = image::imageops::flip_horizontal(frame);
        &mirrored
    } else {
        frame
    };
    let (x, y, w, h) = centered_crop(source.width(), source.height(), target_aspect);
    image::imageops::crop_imm(source, x, y, w, h).to_image()
}

/// Capture a still photo from the current frame.
pub fn capture_photo(
    frame: &RgbaImage,
    target_aspect: f64,
    facing: FacingMode,
) -> anyhow::Result<GalleryItem> {
    let composed = compose_photo(frame, target_aspect, facing);
    let encoded = encode_jpeg(&composed, PHOTO_JPEG_QUALITY).context("photo encoding failed")?;
    Ok(GalleryItem {
        kind: MediaKind::Photo,
        src: base64::engine::general_purpose::STANDARD.encode(encoded),
    })
}

/// Encode RGBA pixels as JPEG. The alpha channel is discarded.
pub(crate) fn encode_jpeg(image: &RgbaImage, quality: u8) -> anyhow::Result<Vec<u8>> {
    let rgb = image::DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode_image(&rgb)
        .context("jpeg encoding failed")?;
    Ok(buffer.into_inner())
}

/// An in-progress video recording.
///
/// Exists only between start and stop; chunks are released when the
/// finished artifact is handed off.
pub struct RecordingSession {
    recorder: Box<dyn MediaRecorder>,
    chunks: Vec<Vec<u8>>,
    started_at: Instant,
    elapsed_secs: u64,
}

impl RecordingSession {
    pub fn start(recorder: Box<dyn MediaRecorder>, now: Instant) -> Self {
        Self {
            recorder,
            chunks: Vec::new(),
            started_at: now,
            elapsed_secs: 0,
        }
    }

    /// Accumulate pending chunks and advance the elapsed counter. Called
    /// once per tick; the counter only moves on whole seconds.
    pub fn poll(&mut self, now: Instant) {
        self.chunks.extend(self.recorder.poll_chunks());
        self.elapsed_secs = now.duration_since(self.started_at).as_secs();
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    /// Stop the recorder and assemble all chunks into one gallery payload.
    pub fn finish(mut self) -> GalleryItem {
        self.recorder.stop();
        self.chunks.extend(self.recorder.poll_chunks());

        let total: usize = self.chunks.iter().map(Vec::len).sum();
        let mut assembled = Vec::with_capacity(total);
        for chunk in &self.chunks {
            assembled.extend_from_slice(chunk);
        }
        GalleryItem {
            kind: MediaKind::Video,
            src: base64::engine::general_purpose::STANDARD.encode(assembled),
        }
    }
}

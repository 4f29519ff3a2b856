//! Capture device abstraction consumed by the session controller.
//!
//! The engine never talks to platform media APIs directly; it drives a
//! [`CameraDevice`] that produces [`CameraStream`]s. Platform backends and
//! the offline mock in the harness crate both implement these traits.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::CameraResult;

/// Which physical camera a stream is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front camera, the selfie side.
    User,
    /// Rear camera.
    Environment,
}

impl FacingMode {
    pub fn flipped(self) -> Self {
        match self {
            FacingMode::User => FacingMode::Environment,
            FacingMode::Environment => FacingMode::User,
        }
    }
}

/// What the shutter button does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    Photo,
    Video,
    /// Live object detection with the overlay active.
    Vision,
}

/// Three-state flash selector.
///
/// The underlying torch control is boolean, so `Auto` is applied as
/// torch-off at the device. The UI cycle keeps all three states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashMode {
    Off,
    On,
    Auto,
}

impl FlashMode {
    pub fn cycle(self) -> Self {
        match self {
            FlashMode::Off => FlashMode::On,
            FlashMode::On => FlashMode::Auto,
            FlashMode::Auto => FlashMode::Off,
        }
    }

    /// Torch state to apply for this mode. `Auto` degrades to off because
    /// the torch constraint is boolean.
    pub fn torch_on(self) -> bool {
        matches!(self, FlashMode::On)
    }
}

/// User-selectable capture resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionPreset {
    Hd720,
    FullHd1080,
    UltraHd2160,
}

impl ResolutionPreset {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            ResolutionPreset::Hd720 => (1280, 720),
            ResolutionPreset::FullHd1080 => (1920, 1080),
            ResolutionPreset::UltraHd2160 => (3840, 2160),
        }
    }

    pub fn cycle(self) -> Self {
        match self {
            ResolutionPreset::Hd720 => ResolutionPreset::FullHd1080,
            ResolutionPreset::FullHd1080 => ResolutionPreset::UltraHd2160,
            ResolutionPreset::UltraHd2160 => ResolutionPreset::Hd720,
        }
    }
}

/// Target aspect ratios for capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatioPreset {
    Wide16x9,
    Classic4x3,
    Square,
}

impl AspectRatioPreset {
    pub fn ratio(self) -> f64 {
        match self {
            AspectRatioPreset::Wide16x9 => 16.0 / 9.0,
            AspectRatioPreset::Classic4x3 => 4.0 / 3.0,
            AspectRatioPreset::Square => 1.0,
        }
    }

    pub fn cycle(self) -> Self {
        match self {
            AspectRatioPreset::Wide16x9 => AspectRatioPreset::Classic4x3,
            AspectRatioPreset::Classic4x3 => AspectRatioPreset::Square,
            AspectRatioPreset::Square => AspectRatioPreset::Wide16x9,
        }
    }
}

/// Recording quality selector; maps to the ideal resolution requested while
/// in video mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoQuality {
    Low,
    Standard,
    High,
}

impl VideoQuality {
    pub fn resolution(self) -> ResolutionPreset {
        match self {
            VideoQuality::Low => ResolutionPreset::Hd720,
            VideoQuality::Standard => ResolutionPreset::FullHd1080,
            VideoQuality::High => ResolutionPreset::UltraHd2160,
        }
    }

    pub fn cycle(self) -> Self {
        match self {
            VideoQuality::Low => VideoQuality::Standard,
            VideoQuality::Standard => VideoQuality::High,
            VideoQuality::High => VideoQuality::Low,
        }
    }
}

/// Supported zoom interval reported by a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl ZoomRange {
    pub fn clamp(&self, zoom: f64) -> f64 {
        zoom.clamp(self.min, self.max)
    }
}

/// What the active track actually supports, discovered after acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackCapabilities {
    pub zoom: Option<ZoomRange>,
    pub torch: bool,
    pub focus_point: bool,
}

/// One candidate constraint set in the acquisition fallback ladder.
///
/// Immutable once constructed for an attempt. `None` fields mean "no
/// preference", letting the device pick.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintProfile {
    pub facing: Option<FacingMode>,
    pub ideal_size: Option<(u32, u32)>,
    pub ideal_aspect: Option<f64>,
    pub audio: bool,
}

impl ConstraintProfile {
    /// Full preference set, optionally with audio for recording.
    pub fn ideal(facing: FacingMode, size: (u32, u32), aspect: f64, audio: bool) -> Self {
        Self {
            facing: Some(facing),
            ideal_size: Some(size),
            ideal_aspect: Some(aspect),
            audio,
        }
    }

    /// Video bound to a facing mode, everything else left to the device.
    pub fn facing_only(facing: FacingMode) -> Self {
        Self {
            facing: Some(facing),
            ideal_size: None,
            ideal_aspect: None,
            audio: false,
        }
    }

    /// Any video stream at all.
    pub fn any_video() -> Self {
        Self {
            facing: None,
            ideal_size: None,
            ideal_aspect: None,
            audio: false,
        }
    }
}

/// Chunked media recorder attached to a live stream.
pub trait MediaRecorder {
    /// Drain the encoded chunks produced since the last poll.
    fn poll_chunks(&mut self) -> Vec<Vec<u8>>;

    /// Stop producing chunks. Idempotent.
    fn stop(&mut self);
}

/// A live capture stream with exactly one video track.
pub trait CameraStream {
    /// Native frame size of the video track in pixels.
    fn native_size(&self) -> (u32, u32);

    /// Capability metadata for the video track. Backends that cannot report
    /// capabilities return an error; callers treat that as all-unsupported.
    fn capabilities(&self) -> CameraResult<TrackCapabilities>;

    /// Current zoom setting, if the track exposes one.
    fn current_zoom(&self) -> Option<f64>;

    /// Grab the current frame as RGBA pixels.
    fn frame(&mut self) -> CameraResult<RgbaImage>;

    fn apply_zoom(&mut self, zoom: f64) -> CameraResult<()>;

    fn apply_torch(&mut self, on: bool) -> CameraResult<()>;

    /// Point-of-interest focus hint in normalized coordinates.
    fn apply_focus_point(&mut self, x: f64, y: f64) -> CameraResult<()>;

    /// Start a chunked recorder against this stream.
    fn start_recorder(&mut self, audio: bool) -> CameraResult<Box<dyn MediaRecorder>>;

    /// Stop all tracks. Idempotent; the stream is unusable afterwards.
    fn stop(&mut self);
}

/// A capture device that can be asked for streams matching a constraint
/// profile.
pub trait CameraDevice {
    fn open(&mut self, profile: &ConstraintProfile) -> CameraResult<Box<dyn CameraStream>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flash_cycle_covers_all_states() {
        let mut mode = FlashMode::Off;
        mode = mode.cycle();
        assert_eq!(mode, FlashMode::On);
        mode = mode.cycle();
        assert_eq!(mode, FlashMode::Auto);
        mode = mode.cycle();
        assert_eq!(mode, FlashMode::Off);
    }

    #[test]
    fn test_auto_flash_degrades_to_torch_off() {
        assert!(!FlashMode::Auto.torch_on());
        assert!(FlashMode::On.torch_on());
        assert!(!FlashMode::Off.torch_on());
    }

    #[test]
    fn test_facing_flip_is_involutive() {
        assert_eq!(FacingMode::User.flipped().flipped(), FacingMode::User);
    }

    #[test]
    fn test_zoom_range_clamp() {
        let range = ZoomRange {
            min: 1.0,
            max: 8.0,
            step: 0.1,
        };
        assert_eq!(range.clamp(0.2), 1.0);
        assert_eq!(range.clamp(3.5), 3.5);
        assert_eq!(range.clamp(11.0), 8.0);
    }

    #[test]
    fn test_video_quality_maps_to_resolution() {
        assert_eq!(
            VideoQuality::High.resolution().dimensions(),
            (3840, 2160)
        );
    }
}

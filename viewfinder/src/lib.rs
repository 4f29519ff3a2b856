//! Camera session, detection, and gesture engine for an interactive AI
//! viewfinder.
//!
//! The engine owns the hard parts of a live-camera application: acquiring a
//! stream under uncertain device capabilities, probing what the track can
//! actually do, sampling frames for an asynchronous detection service
//! without ever stacking requests, fusing AI results with user-drawn tags,
//! interpreting raw multi-touch input, and producing aspect-correct capture
//! artifacts. Platform backends implement [`device::CameraDevice`]; the
//! host drives a [`session::CameraSessionController`] with user actions and
//! one `tick` per display refresh.

pub mod capability;
pub mod capture;
pub mod constraint;
pub mod detect;
pub mod device;
pub mod error;
pub mod focus;
pub mod gallery;
pub mod gesture;
pub mod geom;
pub mod overlay;
pub mod session;

pub use detect::{DetectedObject, Detection, DetectionLoop, DetectionRequest, ObjectDetector};
pub use device::{
    AspectRatioPreset, CameraDevice, CameraStream, CaptureMode, ConstraintProfile, FacingMode,
    FlashMode, MediaRecorder, ResolutionPreset, TrackCapabilities, VideoQuality, ZoomRange,
};
pub use error::{CameraError, CameraResult};
pub use gallery::{GalleryItem, GalleryStore, JsonGalleryStore, MediaKind};
pub use session::{CameraSessionController, SessionConfig, SessionState};

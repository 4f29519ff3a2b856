//! Progressive camera-constraint negotiation.
//!
//! Devices lie about what they support, so acquisition walks an ordered
//! ladder of constraint profiles from most specific to "give me anything".
//! Permission denial short-circuits the ladder: no relaxed profile will
//! succeed once the user has said no.

use tracing::{debug, warn};

use crate::device::{
    AspectRatioPreset, CameraDevice, CameraStream, CaptureMode, ConstraintProfile, FacingMode,
    ResolutionPreset, VideoQuality,
};
use crate::error::{CameraError, CameraResult};

/// Build the fallback ladder for the current selection, most specific first:
/// ideal video plus audio (video mode only), ideal video, bare facing-mode
/// video, then any video.
pub fn build_ladder(
    facing: FacingMode,
    mode: CaptureMode,
    resolution: ResolutionPreset,
    aspect: AspectRatioPreset,
    quality: VideoQuality,
) -> Vec<ConstraintProfile> {
    let ideal_size = match mode {
        CaptureMode::Video => quality.resolution().dimensions(),
        _ => resolution.dimensions(),
    };
    let ratio = aspect.ratio();

    let mut ladder = Vec::with_capacity(4);
    if mode == CaptureMode::Video {
        ladder.push(ConstraintProfile::ideal(facing, ideal_size, ratio, true));
    }
    ladder.push(ConstraintProfile::ideal(facing, ideal_size, ratio, false));
    ladder.push(ConstraintProfile::facing_only(facing));
    ladder.push(ConstraintProfile::any_video());
    ladder
}

/// Try each profile in order, returning the first stream that opens.
///
/// Stops immediately on permission denial. If every profile fails, the last
/// error encountered is returned. The caller is responsible for stopping any
/// previously held stream before invoking this.
pub fn acquire(
    device: &mut dyn CameraDevice,
    profiles: &[ConstraintProfile],
) -> CameraResult<Box<dyn CameraStream>> {
    let mut last_err = CameraError::Unknown("no constraint profiles to try".to_string());

    for (index, profile) in profiles.iter().enumerate() {
        match device.open(profile) {
            Ok(stream) => {
                debug!(attempt = index + 1, "camera stream acquired");
                return Ok(stream);
            }
            Err(err) if err.is_permission_denied() => {
                warn!("camera permission denied, abandoning fallback ladder");
                return Err(err);
            }
            Err(err) => {
                warn!(attempt = index + 1, error = %err, "constraint profile failed, falling back");
                last_err = err;
            }
        }
    }

    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct ScriptedDevice {
        outcomes: VecDeque<CameraResult<()>>,
        attempts: Vec<ConstraintProfile>,
    }

    impl ScriptedDevice {
        fn new(outcomes: Vec<CameraResult<()>>) -> Self {
            Self {
                outcomes: outcomes.into(),
                attempts: Vec::new(),
            }
        }
    }

    struct NullStream;

    impl CameraStream for NullStream {
        fn native_size(&self) -> (u32, u32) {
            (640, 480)
        }
        fn capabilities(&self) -> CameraResult<crate::device::TrackCapabilities> {
            Ok(Default::default())
        }
        fn current_zoom(&self) -> Option<f64> {
            None
        }
        fn frame(&mut self) -> CameraResult<image::RgbaImage> {
            Ok(image::RgbaImage::new(640, 480))
        }
        fn apply_zoom(&mut self, _zoom: f64) -> CameraResult<()> {
            Ok(())
        }
        fn apply_torch(&mut self, _on: bool) -> CameraResult<()> {
            Ok(())
        }
        fn apply_focus_point(&mut self, _x: f64, _y: f64) -> CameraResult<()> {
            Ok(())
        }
        fn start_recorder(
            &mut self,
            _audio: bool,
        ) -> CameraResult<Box<dyn crate::device::MediaRecorder>> {
            Err(CameraError::Unknown("no recorder".into()))
        }
        fn stop(&mut self) {}
    }

    impl CameraDevice for ScriptedDevice {
        fn open(&mut self, profile: &ConstraintProfile) -> CameraResult<Box<dyn CameraStream>> {
            self.attempts.push(profile.clone());
            match self.outcomes.pop_front() {
                Some(Ok(())) | None => Ok(Box::new(NullStream)),
                Some(Err(e)) => Err(e),
            }
        }
    }

    fn ladder() -> Vec<ConstraintProfile> {
        build_ladder(
            FacingMode::Environment,
            CaptureMode::Video,
            ResolutionPreset::FullHd1080,
            AspectRatioPreset::Wide16x9,
            VideoQuality::Standard,
        )
    }

    #[test]
    fn test_video_ladder_has_four_rungs_audio_first() {
        let ladder = ladder();
        assert_eq!(ladder.len(), 4);
        assert!(ladder[0].audio);
        assert!(!ladder[1].audio);
        assert_eq!(ladder[2], ConstraintProfile::facing_only(FacingMode::Environment));
        assert_eq!(ladder[3], ConstraintProfile::any_video());
    }

    #[test]
    fn test_photo_ladder_skips_audio_rung() {
        let ladder = build_ladder(
            FacingMode::User,
            CaptureMode::Photo,
            ResolutionPreset::Hd720,
            AspectRatioPreset::Classic4x3,
            VideoQuality::Standard,
        );
        assert_eq!(ladder.len(), 3);
        assert!(ladder.iter().all(|p| !p.audio));
        assert_eq!(ladder[0].ideal_size, Some((1280, 720)));
    }

    #[test]
    fn test_stops_at_first_success() {
        let mut device = ScriptedDevice::new(vec![
            Err(CameraError::UnsupportedConstraints("too big".into())),
            Ok(()),
        ]);
        let result = acquire(&mut device, &ladder());
        assert!(result.is_ok());
        assert_eq!(device.attempts.len(), 2);
    }

    #[test]
    fn test_permission_denied_aborts_ladder() {
        let mut device = ScriptedDevice::new(vec![Err(CameraError::PermissionDenied)]);
        let result = acquire(&mut device, &ladder());
        assert_eq!(result.err(), Some(CameraError::PermissionDenied));
        assert_eq!(device.attempts.len(), 1);
    }

    #[test]
    fn test_reports_last_error_when_all_fail() {
        let mut device = ScriptedDevice::new(vec![
            Err(CameraError::UnsupportedConstraints("a".into())),
            Err(CameraError::UnsupportedConstraints("b".into())),
            Err(CameraError::DeviceUnavailable("busy".into())),
            Err(CameraError::NoDevice),
        ]);
        let result = acquire(&mut device, &ladder());
        assert_eq!(result.err(), Some(CameraError::NoDevice));
        assert_eq!(device.attempts.len(), 4);
    }
}

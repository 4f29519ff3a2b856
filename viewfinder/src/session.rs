//! Camera session orchestration.
//!
//! `CameraSessionController` owns the live stream, the detection loop, the
//! focus and gesture machines, and the recording state, and is the only
//! thing that mutates them. The host drives it with user actions plus a
//! `tick(now)` call once per display refresh; everything asynchronous
//! (capability probing, detection results) is folded in on ticks, guarded
//! by a session generation so stale completions are discarded.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::capability::{self, ProbeTicket};
use crate::capture::{self, RecordingSession};
use crate::constraint;
use crate::detect::{filter_visible, DetectedObject, DetectionLoop, ObjectDetector};
use crate::device::{
    AspectRatioPreset, CameraDevice, CameraStream, CaptureMode, FacingMode, FlashMode,
    ResolutionPreset, TrackCapabilities, VideoQuality,
};
use crate::focus::{FocusIndicator, FocusStateMachine, Haptics};
use crate::gallery::GalleryItem;
use crate::gesture::{GestureAction, GestureContext, GestureInterpreter, TouchPoint};
use crate::geom::{NormRect, PixelRect};
use crate::overlay::{OverlayRenderer, OverlayScene};

/// Window during which a second flip request is ignored, covering the flip
/// transition still in flight.
pub const FLIP_DEBOUNCE: Duration = Duration::from_millis(500);

const MIN_SENSITIVITY: f32 = 0.1;
const MAX_SENSITIVITY: f32 = 1.0;

/// Session lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Acquiring,
    Live,
    Error { message: String },
}

/// Initial selections for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub facing: FacingMode,
    pub resolution: ResolutionPreset,
    pub aspect: AspectRatioPreset,
    pub video_quality: VideoQuality,
    pub capture_mode: CaptureMode,
    pub sensitivity: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            facing: FacingMode::Environment,
            resolution: ResolutionPreset::FullHd1080,
            aspect: AspectRatioPreset::Wide16x9,
            video_quality: VideoQuality::Standard,
            capture_mode: CaptureMode::Photo,
            sensitivity: 0.5,
        }
    }
}

/// Owns the camera session and exposes the engine's public contract.
pub struct CameraSessionController {
    device: Box<dyn CameraDevice>,
    stream: Option<Box<dyn CameraStream>>,
    state: SessionState,
    generation: u64,
    probe: Option<ProbeTicket>,
    capabilities: TrackCapabilities,

    facing: FacingMode,
    resolution: ResolutionPreset,
    aspect: AspectRatioPreset,
    video_quality: VideoQuality,
    capture_mode: CaptureMode,
    flash: FlashMode,
    flip_blocked_until: Option<Instant>,

    detect: DetectionLoop,
    sensitivity: f32,
    label_filters: BTreeSet<String>,
    tagging_enabled: bool,
    tag_preview: Option<PixelRect>,
    pending_tag: Option<NormRect>,
    selected: Option<DetectedObject>,

    focus: FocusStateMachine,
    gestures: GestureInterpreter,
    overlay: OverlayRenderer,
    recording: Option<RecordingSession>,
    last_capture: Option<GalleryItem>,
    closed: bool,
}

impl CameraSessionController {
    pub fn new(
        device: Box<dyn CameraDevice>,
        detector: Arc<dyn ObjectDetector>,
        config: SessionConfig,
    ) -> Self {
        Self {
            device,
            stream: None,
            state: SessionState::Idle,
            generation: 0,
            probe: None,
            capabilities: TrackCapabilities::default(),
            facing: config.facing,
            resolution: config.resolution,
            aspect: config.aspect,
            video_quality: config.video_quality,
            capture_mode: config.capture_mode,
            flash: FlashMode::Off,
            flip_blocked_until: None,
            detect: DetectionLoop::new(detector),
            sensitivity: config.sensitivity.clamp(MIN_SENSITIVITY, MAX_SENSITIVITY),
            label_filters: BTreeSet::new(),
            tagging_enabled: false,
            tag_preview: None,
            pending_tag: None,
            selected: None,
            focus: FocusStateMachine::new(),
            gestures: GestureInterpreter::new(),
            overlay: OverlayRenderer::new(),
            recording: None,
            last_capture: None,
            closed: false,
        }
    }

    /// Replace the default no-op haptics hook.
    pub fn set_haptics(&mut self, haptics: Box<dyn Haptics>) {
        self.focus = FocusStateMachine::with_haptics(haptics);
    }

    /// Acquire the first stream. Equivalent to a retry from idle.
    pub fn start(&mut self, now: Instant) {
        self.reacquire(now);
    }

    /// Re-enter acquisition without changing any selection. The error
    /// surface's retry affordance lands here.
    pub fn retry(&mut self, now: Instant) {
        self.reacquire(now);
    }

    fn reacquire(&mut self, now: Instant) {
        if self.closed {
            return;
        }
        self.state = SessionState::Acquiring;
        self.generation += 1;
        self.probe = None;

        // The previous stream's tracks stop before any new attempt so two
        // camera handles are never held at once.
        if let Some(mut old) = self.stream.take() {
            old.stop();
        }
        if self.recording.take().is_some() {
            warn!("session replaced while recording; discarding partial recording");
        }
        self.capabilities = TrackCapabilities::default();
        self.detect.clear_objects();
        self.gestures.reset();
        self.focus.cancel();
        self.tag_preview = None;
        self.pending_tag = None;
        self.selected = None;

        let ladder = constraint::build_ladder(
            self.facing,
            self.capture_mode,
            self.resolution,
            self.aspect,
            self.video_quality,
        );
        match constraint::acquire(self.device.as_mut(), &ladder) {
            Ok(stream) => {
                info!(facing = ?self.facing, mode = ?self.capture_mode, "camera session live");
                self.stream = Some(stream);
                self.state = SessionState::Live;
                self.probe = Some(ProbeTicket::new(self.generation, now));
            }
            Err(err) => {
                warn!(error = %err, "camera acquisition failed");
                self.state = SessionState::Error {
                    message: err.user_message(),
                };
            }
        }
    }

    /// Advance the session one display refresh.
    pub fn tick(&mut self, now: Instant) {
        if self.closed {
            return;
        }

        self.run_due_probe(now);
        self.focus.tick(now);

        if let Some(recording) = &mut self.recording {
            recording.poll(now);
        }

        if self.capture_mode == CaptureMode::Vision && self.state == SessionState::Live {
            self.detect.pump();
            if let Some(stream) = self.stream.as_mut() {
                match stream.frame() {
                    Ok(frame) => self.detect.sample(&frame),
                    Err(err) => debug!(error = %err, "frame grab failed, skipping sample"),
                }
            }
        }

        if self.flip_blocked_until.is_some_and(|until| now >= until) {
            self.flip_blocked_until = None;
        }
    }

    fn run_due_probe(&mut self, now: Instant) {
        let Some(ticket) = self.probe.take() else {
            return;
        };
        if !ticket.is_due(now) {
            self.probe = Some(ticket);
            return;
        }
        // A ticket from a replaced session must never overwrite the current
        // session's capability state.
        if ticket.generation != self.generation {
            debug!("discarding stale capability probe");
            return;
        }
        if let Some(stream) = self.stream.as_mut() {
            self.capabilities = capability::probe(stream.as_mut());
            debug!(capabilities = ?self.capabilities, "track capabilities probed");
            self.gestures.set_zoom(1.0);
            self.apply_flash();
        }
    }

    // ------------------------------------------------------------------
    // Selection changes
    // ------------------------------------------------------------------

    pub fn set_capture_mode(&mut self, mode: CaptureMode, now: Instant) {
        if self.closed {
            return;
        }
        if self.recording.is_some() {
            debug!("ignoring mode switch while recording");
            return;
        }
        if mode == self.capture_mode {
            return;
        }
        self.capture_mode = mode;
        self.tagging_enabled = false;
        self.reacquire(now);
    }

    pub fn set_facing(&mut self, facing: FacingMode, now: Instant) {
        if self.closed || self.recording.is_some() || facing == self.facing {
            return;
        }
        self.facing = facing;
        self.reacquire(now);
    }

    pub fn flip_facing(&mut self, now: Instant) {
        if self.closed {
            return;
        }
        if self.recording.is_some() {
            debug!("ignoring flip while recording");
            return;
        }
        if self.gestures.drag_in_progress() {
            debug!("ignoring flip during tagging interaction");
            return;
        }
        if self.flip_blocked_until.is_some_and(|until| now < until) {
            debug!("ignoring flip, previous flip still in flight");
            return;
        }
        self.flip_blocked_until = Some(now + FLIP_DEBOUNCE);
        self.facing = self.facing.flipped();
        self.reacquire(now);
    }

    pub fn cycle_resolution(&mut self, now: Instant) {
        if self.closed || self.recording.is_some() {
            return;
        }
        self.resolution = self.resolution.cycle();
        self.reacquire(now);
    }

    pub fn cycle_aspect_ratio(&mut self, now: Instant) {
        if self.closed {
            return;
        }
        if self.recording.is_some() {
            debug!("ignoring aspect change while recording");
            return;
        }
        self.aspect = self.aspect.cycle();
        self.reacquire(now);
    }

    pub fn cycle_video_quality(&mut self, now: Instant) {
        if self.closed || self.recording.is_some() {
            return;
        }
        self.video_quality = self.video_quality.cycle();
        if self.capture_mode == CaptureMode::Video {
            self.reacquire(now);
        }
    }

    pub fn cycle_flash(&mut self) {
        self.flash = self.flash.cycle();
        self.apply_flash();
    }

    fn apply_flash(&mut self) {
        if !self.capabilities.torch {
            return;
        }
        let on = self.flash.torch_on();
        if let Some(stream) = self.stream.as_mut() {
            if let Err(err) = stream.apply_torch(on) {
                // The feature silently has no effect rather than failing
                // the session.
                warn!(error = %err, "torch apply failed");
            }
        }
    }

    // ------------------------------------------------------------------
    // Shutter
    // ------------------------------------------------------------------

    /// Shutter press. Captures a photo in photo and vision modes; toggles
    /// recording in video mode. Returns the finished artifact, if any.
    pub fn shutter(&mut self, now: Instant) -> Option<GalleryItem> {
        if self.closed || self.state != SessionState::Live {
            return None;
        }
        match self.capture_mode {
            CaptureMode::Photo | CaptureMode::Vision => self.capture_photo(),
            CaptureMode::Video => self.toggle_recording(now),
        }
    }

    fn capture_photo(&mut self) -> Option<GalleryItem> {
        let stream = self.stream.as_mut()?;
        let frame = match stream.frame() {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "photo capture failed to grab frame");
                return None;
            }
        };
        match capture::capture_photo(&frame, self.aspect.ratio(), self.facing) {
            Ok(item) => {
                self.last_capture = Some(item.clone());
                Some(item)
            }
            Err(err) => {
                warn!(error = %err, "photo encoding failed");
                None
            }
        }
    }

    fn toggle_recording(&mut self, now: Instant) -> Option<GalleryItem> {
        if let Some(recording) = self.recording.take() {
            let item = recording.finish();
            info!("recording finished");
            self.last_capture = Some(item.clone());
            return Some(item);
        }
        let stream = self.stream.as_mut()?;
        match stream.start_recorder(true) {
            Ok(recorder) => {
                info!("recording started");
                self.recording = Some(RecordingSession::start(recorder, now));
            }
            Err(err) => {
                // No artifact; the session stays in the not-recording state.
                warn!(error = %err, "recorder construction failed");
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // Touch input
    // ------------------------------------------------------------------

    pub fn touch_start(&mut self, points: &[TouchPoint], now: Instant) {
        let action = {
            let boxes = self.visible_boxes();
            let ctx = self.gesture_context(&boxes);
            self.gestures.touch_start(points, &ctx)
        };
        self.apply_gesture(action, now);
    }

    pub fn touch_move(&mut self, points: &[TouchPoint], now: Instant) {
        let action = {
            let boxes = self.visible_boxes();
            let ctx = self.gesture_context(&boxes);
            self.gestures.touch_move(points, &ctx)
        };
        self.apply_gesture(action, now);
    }

    pub fn touch_end(&mut self, points: &[TouchPoint], now: Instant) {
        let action = {
            let boxes = self.visible_boxes();
            let ctx = self.gesture_context(&boxes);
            self.gestures.touch_end(points, &ctx)
        };
        self.apply_gesture(action, now);
    }

    fn visible_boxes(&self) -> Vec<NormRect> {
        self.visible_objects().iter().map(|o| o.rect).collect()
    }

    fn gesture_context<'a>(&self, boxes: &'a [NormRect]) -> GestureContext<'a> {
        let (w, h) = self.overlay.size();
        GestureContext {
            capture_mode: self.capture_mode,
            zoom_range: self.capabilities.zoom,
            focus_point_supported: self.capabilities.focus_point,
            recording: self.recording.is_some(),
            tagging_enabled: self.tagging_enabled,
            view_size: (w as f32, h as f32),
            visible_boxes: boxes,
        }
    }

    fn apply_gesture(&mut self, action: Option<GestureAction>, now: Instant) {
        let Some(action) = action else {
            return;
        };
        match action {
            GestureAction::Zoom(zoom) => {
                if let Some(stream) = self.stream.as_mut() {
                    if let Err(err) = stream.apply_zoom(zoom) {
                        warn!(error = %err, "zoom apply failed");
                    }
                }
            }
            GestureAction::FocusAt { x, y } => {
                let (w, h) = self.overlay.size();
                if w > 0 && h > 0 {
                    if let Some(stream) = self.stream.as_mut() {
                        let nx = (x / w as f32) as f64;
                        let ny = (y / h as f32) as f64;
                        if let Err(err) = stream.apply_focus_point(nx, ny) {
                            warn!(error = %err, "focus point apply failed");
                        }
                    }
                }
                self.focus.touch(x, y, now);
            }
            GestureAction::OpenObject(index) => {
                self.selected = self.visible_objects().get(index).map(|o| (*o).clone());
            }
            GestureAction::TagPreview(rect) => {
                self.tag_preview = Some(rect);
            }
            GestureAction::TagCommitted(rect) => {
                self.tag_preview = None;
                self.pending_tag = Some(rect);
            }
        }
    }

    // ------------------------------------------------------------------
    // Manual tagging
    // ------------------------------------------------------------------

    pub fn set_tagging_enabled(&mut self, enabled: bool) {
        self.tagging_enabled = enabled;
        if !enabled {
            self.tag_preview = None;
        }
    }

    pub fn tagging_enabled(&self) -> bool {
        self.tagging_enabled
    }

    /// Rectangle awaiting a label from the tagging sub-flow.
    pub fn pending_tag(&self) -> Option<NormRect> {
        self.pending_tag
    }

    /// Finalize the pending tag into a manual object.
    pub fn confirm_manual_tag(&mut self, label: impl Into<String>) {
        let Some(rect) = self.pending_tag.take() else {
            return;
        };
        self.detect.add_manual(DetectedObject {
            label: label.into(),
            rect,
            score: None,
            category: None,
            description: None,
            manual: true,
        });
    }

    pub fn cancel_manual_tag(&mut self) {
        self.pending_tag = None;
    }

    // ------------------------------------------------------------------
    // Vision controls
    // ------------------------------------------------------------------

    pub fn set_sensitivity(&mut self, sensitivity: f32) {
        self.sensitivity = sensitivity.clamp(MIN_SENSITIVITY, MAX_SENSITIVITY);
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    pub fn toggle_label_filter(&mut self, label: &str) {
        if !self.label_filters.remove(label) {
            self.label_filters.insert(label.to_string());
        }
    }

    pub fn clear_label_filters(&mut self) {
        self.label_filters.clear();
    }

    pub fn active_label_filters(&self) -> &BTreeSet<String> {
        &self.label_filters
    }

    pub fn known_labels(&self) -> &BTreeSet<String> {
        self.detect.known_labels()
    }

    // ------------------------------------------------------------------
    // Observable state
    // ------------------------------------------------------------------

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            SessionState::Error { message } => Some(message),
            _ => None,
        }
    }

    pub fn capabilities(&self) -> &TrackCapabilities {
        &self.capabilities
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    pub fn capture_mode(&self) -> CaptureMode {
        self.capture_mode
    }

    pub fn flash_mode(&self) -> FlashMode {
        self.flash
    }

    pub fn resolution(&self) -> ResolutionPreset {
        self.resolution
    }

    pub fn aspect_ratio(&self) -> AspectRatioPreset {
        self.aspect
    }

    pub fn video_quality(&self) -> VideoQuality {
        self.video_quality
    }

    pub fn zoom(&self) -> f64 {
        self.gestures.committed_zoom()
    }

    pub fn objects(&self) -> &[DetectedObject] {
        self.detect.objects()
    }

    /// Objects passing the sensitivity and label filters, in z-order.
    pub fn visible_objects(&self) -> Vec<&DetectedObject> {
        filter_visible(self.detect.objects(), self.sensitivity, &self.label_filters)
    }

    pub fn detection_in_flight(&self) -> bool {
        self.detect.in_flight()
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    pub fn recording_elapsed_secs(&self) -> Option<u64> {
        self.recording.as_ref().map(RecordingSession::elapsed_secs)
    }

    pub fn focus_indicator(&self) -> &FocusIndicator {
        self.focus.indicator()
    }

    pub fn selected_object(&self) -> Option<&DetectedObject> {
        self.selected.as_ref()
    }

    pub fn clear_selected_object(&mut self) {
        self.selected = None;
    }

    pub fn last_capture(&self) -> Option<&GalleryItem> {
        self.last_capture.as_ref()
    }

    /// The host reports the displayed size of the video element here
    /// whenever it changes.
    pub fn set_view_size(&mut self, width: u32, height: u32) {
        self.overlay.resize(width, height);
    }

    /// Draw list for the current refresh.
    pub fn overlay_scene(&self) -> OverlayScene {
        let visible = self.visible_objects();
        self.overlay
            .compose(&visible, self.tag_preview, self.focus.indicator())
    }

    /// Tear the session down. Safe to call more than once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
        if self.recording.take().is_some() {
            debug!("discarding recording on close");
        }
        self.probe = None;
        self.focus.cancel();
        self.detect.clear_objects();
        self.tag_preview = None;
        self.pending_tag = None;
        self.state = SessionState::Idle;
    }
}

impl Drop for CameraSessionController {
    fn drop(&mut self) {
        self.close();
    }
}

//! Scriptable in-memory camera device.
//!
//! Every opened stream shares its state through an `Arc` so tests can
//! inspect applied zoom, torch, and focus constraints, and verify that
//! replaced streams actually had their tracks stopped.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use image::{Rgba, RgbaImage};
use viewfinder::device::{
    CameraDevice, CameraStream, ConstraintProfile, MediaRecorder, TrackCapabilities, ZoomRange,
};
use viewfinder::error::{CameraError, CameraResult};

/// Observable state of one opened mock stream.
#[derive(Debug, Default)]
pub struct MockStreamState {
    pub stopped: AtomicBool,
    pub zoom: Mutex<Option<f64>>,
    pub torch: Mutex<Option<bool>>,
    pub focus_points: Mutex<Vec<(f64, f64)>>,
}

impl MockStreamState {
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn applied_zoom(&self) -> Option<f64> {
        *self.zoom.lock().unwrap()
    }

    pub fn applied_torch(&self) -> Option<bool> {
        *self.torch.lock().unwrap()
    }

    pub fn focus_points(&self) -> Vec<(f64, f64)> {
        self.focus_points.lock().unwrap().clone()
    }
}

/// Inspection handle shared between a [`MockCamera`] and the test that
/// handed it to the controller.
#[derive(Debug, Default)]
pub struct MockCameraHandle {
    attempts: Mutex<Vec<ConstraintProfile>>,
    streams: Mutex<Vec<Arc<MockStreamState>>>,
}

impl MockCameraHandle {
    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn attempts(&self) -> Vec<ConstraintProfile> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn streams(&self) -> Vec<Arc<MockStreamState>> {
        self.streams.lock().unwrap().clone()
    }

    /// Streams whose tracks have not been stopped.
    pub fn open_stream_count(&self) -> usize {
        self.streams
            .lock()
            .unwrap()
            .iter()
            .filter(|s| !s.is_stopped())
            .count()
    }
}

/// Scriptable camera device. By default every open succeeds with a fully
/// capable 1920x1080 stream; failures are queued per attempt.
pub struct MockCamera {
    handle: Arc<MockCameraHandle>,
    failures: VecDeque<CameraError>,
    native_size: (u32, u32),
    capabilities: CameraResult<TrackCapabilities>,
    initial_zoom: f64,
    recorder_fails: bool,
}

impl MockCamera {
    pub fn new() -> Self {
        Self {
            handle: Arc::new(MockCameraHandle::default()),
            failures: VecDeque::new(),
            native_size: (1920, 1080),
            capabilities: Ok(TrackCapabilities {
                zoom: Some(ZoomRange {
                    min: 1.0,
                    max: 8.0,
                    step: 0.1,
                }),
                torch: true,
                focus_point: true,
            }),
            initial_zoom: 1.0,
            recorder_fails: false,
        }
    }

    /// Queue errors for the next open attempts, consumed in order. Once the
    /// queue drains, opens succeed again.
    pub fn fail_attempts(mut self, errors: Vec<CameraError>) -> Self {
        self.failures = errors.into();
        self
    }

    pub fn with_native_size(mut self, width: u32, height: u32) -> Self {
        self.native_size = (width, height);
        self
    }

    /// Capability metadata streams will report, or an error for tracks that
    /// cannot report capabilities at all.
    pub fn with_capabilities(mut self, capabilities: CameraResult<TrackCapabilities>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Zoom setting streams start at, for exercising baseline
    /// normalization.
    pub fn with_initial_zoom(mut self, zoom: f64) -> Self {
        self.initial_zoom = zoom;
        self
    }

    pub fn with_recorder_failure(mut self) -> Self {
        self.recorder_fails = true;
        self
    }

    pub fn handle(&self) -> Arc<MockCameraHandle> {
        self.handle.clone()
    }
}

impl Default for MockCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraDevice for MockCamera {
    fn open(&mut self, profile: &ConstraintProfile) -> CameraResult<Box<dyn CameraStream>> {
        self.handle.attempts.lock().unwrap().push(profile.clone());

        if let Some(err) = self.failures.pop_front() {
            return Err(err);
        }

        let state = Arc::new(MockStreamState {
            stopped: AtomicBool::new(false),
            zoom: Mutex::new(Some(self.initial_zoom)),
            torch: Mutex::new(None),
            focus_points: Mutex::new(Vec::new()),
        });
        self.handle.streams.lock().unwrap().push(state.clone());

        Ok(Box::new(MockStream {
            state,
            native_size: self.native_size,
            capabilities: self.capabilities.clone(),
            recorder_fails: self.recorder_fails,
        }))
    }
}

struct MockStream {
    state: Arc<MockStreamState>,
    native_size: (u32, u32),
    capabilities: CameraResult<TrackCapabilities>,
    recorder_fails: bool,
}

impl MockStream {
    fn ensure_running(&self) -> CameraResult<()> {
        if self.state.is_stopped() {
            Err(CameraError::DeviceUnavailable("stream stopped".into()))
        } else {
            Ok(())
        }
    }
}

impl CameraStream for MockStream {
    fn native_size(&self) -> (u32, u32) {
        self.native_size
    }

    fn capabilities(&self) -> CameraResult<TrackCapabilities> {
        self.capabilities.clone()
    }

    fn current_zoom(&self) -> Option<f64> {
        self.state.applied_zoom()
    }

    fn frame(&mut self) -> CameraResult<RgbaImage> {
        self.ensure_running()?;
        let (w, h) = self.native_size;
        // Left half red, right half blue, so mirroring is observable.
        Ok(RgbaImage::from_fn(w, h, |x, _| {
            if x < w / 2 {
                Rgba([220, 30, 30, 255])
            } else {
                Rgba([30, 30, 220, 255])
            }
        }))
    }

    fn apply_zoom(&mut self, zoom: f64) -> CameraResult<()> {
        self.ensure_running()?;
        *self.state.zoom.lock().unwrap() = Some(zoom);
        Ok(())
    }

    fn apply_torch(&mut self, on: bool) -> CameraResult<()> {
        self.ensure_running()?;
        *self.state.torch.lock().unwrap() = Some(on);
        Ok(())
    }

    fn apply_focus_point(&mut self, x: f64, y: f64) -> CameraResult<()> {
        self.ensure_running()?;
        self.state.focus_points.lock().unwrap().push((x, y));
        Ok(())
    }

    fn start_recorder(&mut self, _audio: bool) -> CameraResult<Box<dyn MediaRecorder>> {
        self.ensure_running()?;
        if self.recorder_fails {
            return Err(CameraError::Unknown("recorder unavailable".into()));
        }
        Ok(Box::new(MockRecorder {
            sequence: 0,
            stopped: false,
        }))
    }

    fn stop(&mut self) {
        self.state.stopped.store(true, Ordering::SeqCst);
    }
}

struct MockRecorder {
    sequence: u8,
    stopped: bool,
}

impl MediaRecorder for MockRecorder {
    fn poll_chunks(&mut self) -> Vec<Vec<u8>> {
        if self.stopped {
            return Vec::new();
        }
        self.sequence = self.sequence.wrapping_add(1);
        vec![vec![self.sequence; 4]]
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}

//! Continuous object detection with single-flight discipline.
//!
//! The loop samples frames on the display-refresh cadence but never issues
//! overlapping detection requests: a guard bounds in-flight calls to one,
//! and ticks that arrive while a request is outstanding simply skip
//! sampling. Results are folded in asymmetrically: AI-sourced objects are
//! replaced wholesale each successful cycle while manually tagged objects
//! persist until the session or mode changes.

pub mod http;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use image::RgbaImage;
use tracing::{debug, warn};

use crate::capture::encode_jpeg;
use crate::geom::NormRect;

/// Width frames are downsampled to before being sent for detection. Height
/// follows the frame's aspect ratio.
pub const SAMPLE_WIDTH: u32 = 320;

const SAMPLE_JPEG_QUALITY: u8 = 80;

/// One object in the fused result set.
///
/// `manual` distinguishes user-tagged objects from AI detections; the two
/// populations have different lifetimes and filtering rules.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DetectedObject {
    pub label: String,
    pub rect: NormRect,
    pub score: Option<f32>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub manual: bool,
}

/// A single detection as returned by the external service.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    pub rect: NormRect,
    pub score: f32,
    pub category: Option<String>,
    pub description: Option<String>,
}

impl Detection {
    fn into_object(self) -> DetectedObject {
        DetectedObject {
            label: self.label,
            rect: self.rect,
            score: Some(self.score),
            category: self.category,
            description: self.description,
            manual: false,
        }
    }
}

/// Frame payload handed to the detection service.
#[derive(Debug, Clone)]
pub struct DetectionRequest {
    pub image: Vec<u8>,
    pub mime: &'static str,
}

/// External object-detection service boundary.
///
/// Implementations run on a background thread; they may block.
pub trait ObjectDetector: Send + Sync {
    fn detect(&self, request: &DetectionRequest) -> anyhow::Result<Vec<Detection>>;
}

/// Guard ensuring at most one in-progress request of a kind at a time.
///
/// `try_begin` hands out a token only when no other token is alive; dropping
/// the token releases the slot.
pub struct SingleFlight {
    busy: Arc<AtomicBool>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self {
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn try_begin(&self) -> Option<FlightToken> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Some(FlightToken {
                busy: self.busy.clone(),
            })
        } else {
            None
        }
    }

    pub fn in_flight(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Default for SingleFlight {
    fn default() -> Self {
        Self::new()
    }
}

/// Token held for the lifetime of one request.
pub struct FlightToken {
    busy: Arc<AtomicBool>,
}

impl Drop for FlightToken {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Continuous sampling loop fusing AI detections with manual tags.
pub struct DetectionLoop {
    detector: Arc<dyn ObjectDetector>,
    inflight: SingleFlight,
    results_tx: Sender<anyhow::Result<Vec<Detection>>>,
    results_rx: Receiver<anyhow::Result<Vec<Detection>>>,
    objects: Vec<DetectedObject>,
    known_labels: BTreeSet<String>,
}

impl DetectionLoop {
    pub fn new(detector: Arc<dyn ObjectDetector>) -> Self {
        let (results_tx, results_rx) = unbounded();
        Self {
            detector,
            inflight: SingleFlight::new(),
            results_tx,
            results_rx,
            objects: Vec::new(),
            known_labels: BTreeSet::new(),
        }
    }

    /// Offer the current frame for sampling. Skips silently when a request
    /// is already outstanding or the frame cannot be encoded.
    pub fn sample(&mut self, frame: &RgbaImage) {
        let Some(token) = self.inflight.try_begin() else {
            return;
        };
        if frame.width() == 0 || frame.height() == 0 {
            return;
        }

        let request = match encode_sample(frame) {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "failed to encode detection sample");
                return;
            }
        };

        let detector = self.detector.clone();
        let tx = self.results_tx.clone();
        thread::spawn(move || {
            let result = detector.detect(&request);
            // Send before the token drops so a released slot always has its
            // result queued.
            let _ = tx.send(result);
            drop(token);
        });
    }

    /// Fold in any completed detection results. Called once per tick.
    pub fn pump(&mut self) {
        while let Ok(result) = self.results_rx.try_recv() {
            match result {
                Ok(detections) => self.fold(detections),
                Err(err) => {
                    // Keep the previous AI objects; clearing them on a
                    // transient failure makes the overlay flicker.
                    warn!(error = %err, "detection request failed, keeping previous results");
                }
            }
        }
    }

    fn fold(&mut self, detections: Vec<Detection>) {
        debug!(count = detections.len(), "detection cycle complete");
        self.objects.retain(|o| o.manual);
        for detection in detections {
            self.known_labels.insert(detection.label.clone());
            self.objects.push(detection.into_object());
        }
    }

    /// Add a user-tagged object. Manual objects survive detection cycles.
    pub fn add_manual(&mut self, mut object: DetectedObject) {
        object.manual = true;
        self.known_labels.insert(object.label.clone());
        self.objects.push(object);
    }

    /// Drop every object, AI and manual alike. Used when the capture mode
    /// or session changes.
    pub fn clear_objects(&mut self) {
        self.objects.clear();
    }

    pub fn objects(&self) -> &[DetectedObject] {
        &self.objects
    }

    /// Labels ever seen this session. Monotonic: labels are never removed,
    /// since they drive the filter pills.
    pub fn known_labels(&self) -> &BTreeSet<String> {
        &self.known_labels
    }

    pub fn in_flight(&self) -> bool {
        self.inflight.in_flight()
    }
}

/// Pure visibility filter: manual objects always pass the sensitivity gate;
/// the label filter applies to everything when non-empty.
pub fn filter_visible<'a>(
    objects: &'a [DetectedObject],
    sensitivity: f32,
    label_filters: &BTreeSet<String>,
) -> Vec<&'a DetectedObject> {
    objects
        .iter()
        .filter(|o| o.manual || o.score.unwrap_or(0.0) >= sensitivity)
        .filter(|o| label_filters.is_empty() || label_filters.contains(&o.label))
        .collect()
}

fn encode_sample(frame: &RgbaImage) -> anyhow::Result<DetectionRequest> {
    let (width, height) = frame.dimensions();
    let image = if width > SAMPLE_WIDTH {
        let scaled_height = ((height as u64 * SAMPLE_WIDTH as u64) / width as u64).max(1) as u32;
        let small = image::imageops::resize(
            frame,
            SAMPLE_WIDTH,
            scaled_height,
            image::imageops::FilterType::Triangle,
        );
        encode_jpeg(&small, SAMPLE_JPEG_QUALITY)?
    } else {
        encode_jpeg(frame, SAMPLE_JPEG_QUALITY)?
    };
    Ok(DetectionRequest {
        image,
        mime: "image/jpeg",
    })
}

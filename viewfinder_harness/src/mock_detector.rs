//! Scriptable detection service.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::anyhow;
use viewfinder::detect::{Detection, DetectionRequest, ObjectDetector};
use viewfinder::geom::NormRect;

/// One scripted response from the fake detection service.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    Detections(Vec<Detection>),
    Fail(String),
}

/// Detector that replays a fixed script of outcomes.
///
/// A non-repeating script fails with "script exhausted" once drained, which
/// exercises the keep-stale-results path. A repeating script cycles
/// forever, which suits the demo binary.
pub struct ScriptedDetector {
    script: Mutex<VecDeque<ScriptedOutcome>>,
    repeat: bool,
    requests: AtomicUsize,
}

impl ScriptedDetector {
    pub fn new(outcomes: Vec<ScriptedOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            repeat: false,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn repeating(outcomes: Vec<ScriptedOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            repeat: true,
            requests: AtomicUsize::new(0),
        }
    }

    /// Append an outcome to the script.
    pub fn push(&self, outcome: ScriptedOutcome) {
        self.script.lock().unwrap().push_back(outcome);
    }

    /// Total detect calls served so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl ObjectDetector for ScriptedDetector {
    fn detect(&self, _request: &DetectionRequest) -> anyhow::Result<Vec<Detection>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        let outcome = script.pop_front();
        if self.repeat {
            if let Some(outcome) = &outcome {
                script.push_back(outcome.clone());
            }
        }
        match outcome {
            Some(ScriptedOutcome::Detections(detections)) => Ok(detections),
            Some(ScriptedOutcome::Fail(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("script exhausted")),
        }
    }
}

/// Convenience constructor for a scripted detection.
pub fn detection(label: &str, bounds: (f32, f32, f32, f32), score: f32) -> Detection {
    let (x1, y1, x2, y2) = bounds;
    Detection {
        label: label.to_string(),
        rect: NormRect::new(x1, y1, x2, y2).expect("scripted detection box must be valid"),
        score,
        category: None,
        description: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> DetectionRequest {
        DetectionRequest {
            image: vec![0xff],
            mime: "image/jpeg",
        }
    }

    #[test]
    fn test_script_plays_in_order_then_fails() {
        let detector = ScriptedDetector::new(vec![
            ScriptedOutcome::Detections(vec![detection("cat", (0.1, 0.1, 0.5, 0.5), 0.9)]),
            ScriptedOutcome::Fail("overloaded".into()),
        ]);

        let first = detector.detect(&request()).unwrap();
        assert_eq!(first[0].label, "cat");
        assert!(detector.detect(&request()).is_err());
        assert!(detector.detect(&request()).is_err());
        assert_eq!(detector.request_count(), 3);
    }

    #[test]
    fn test_repeating_script_cycles() {
        let detector = ScriptedDetector::repeating(vec![ScriptedOutcome::Detections(vec![
            detection("dog", (0.2, 0.2, 0.6, 0.6), 0.8),
        ])]);
        for _ in 0..5 {
            assert_eq!(detector.detect(&request()).unwrap().len(), 1);
        }
    }
}

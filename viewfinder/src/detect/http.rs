//! HTTP client for the external detection service.
//!
//! The wire contract is small: we POST the encoded frame and expect a JSON
//! array of objects carrying a label, a normalized bounding box, a score,
//! and optional category/description fields. Anything malformed is treated
//! as an empty detection result rather than an error, so a misbehaving
//! service degrades to "nothing detected" instead of tearing down the loop.

use anyhow::Context;
use base64::Engine as _;
use serde_json::Value;
use tracing::debug;

use crate::detect::{Detection, DetectionRequest, ObjectDetector};
use crate::geom::NormRect;

/// Detection service client speaking JSON over HTTP.
pub struct HttpDetector {
    endpoint: String,
}

impl HttpDetector {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ObjectDetector for HttpDetector {
    fn detect(&self, request: &DetectionRequest) -> anyhow::Result<Vec<Detection>> {
        let payload = serde_json::json!({
            "image": base64::engine::general_purpose::STANDARD.encode(&request.image),
            "mime": request.mime,
        });

        let mut response = ureq::post(&self.endpoint)
            .send_json(&payload)
            .with_context(|| format!("detection request to {} failed", self.endpoint))?;
        let body: Value = response
            .body_mut()
            .read_json()
            .context("detection response was not JSON")?;

        let detections = parse_detections(&body);
        debug!(count = detections.len(), "detection response parsed");
        Ok(detections)
    }
}

/// Parse the service response, dropping anything that does not carry the
/// required fields. A non-array response yields an empty result.
pub fn parse_detections(body: &Value) -> Vec<Detection> {
    let Some(items) = body.as_array() else {
        return Vec::new();
    };
    items.iter().filter_map(parse_detection).collect()
}

fn parse_detection(value: &Value) -> Option<Detection> {
    let label = value.get("label")?.as_str()?;
    if label.is_empty() {
        return None;
    }

    let coords = value.get("box")?.as_array()?;
    if coords.len() != 4 {
        return None;
    }
    let mut parsed = [0.0f32; 4];
    for (slot, coord) in parsed.iter_mut().zip(coords) {
        *slot = coord.as_f64()? as f32;
    }
    let rect = NormRect::new(parsed[0], parsed[1], parsed[2], parsed[3])?;

    let score = value.get("score")?.as_f64()? as f32;

    Some(Detection {
        label: label.to_string(),
        rect,
        score: score.clamp(0.0, 1.0),
        category: value
            .get("category")
            .and_then(Value::as_str)
            .map(str::to_string),
        description: value
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_valid_response() {
        let body = json!([
            {
                "label": "cat",
                "box": [0.1, 0.2, 0.5, 0.6],
                "score": 0.92,
                "category": "animal",
                "description": "a tabby cat"
            },
            {
                "label": "mug",
                "box": [0.6, 0.6, 0.8, 0.9],
                "score": 0.4
            }
        ]);
        let detections = parse_detections(&body);
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].label, "cat");
        assert_eq!(detections[0].category.as_deref(), Some("animal"));
        assert!(detections[1].category.is_none());
        assert!((detections[1].rect.x1 - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_non_array_response_is_empty_not_error() {
        assert!(parse_detections(&json!({"error": "quota"})).is_empty());
        assert!(parse_detections(&json!("nope")).is_empty());
        assert!(parse_detections(&json!(null)).is_empty());
    }

    #[test]
    fn test_malformed_entries_are_dropped() {
        let body = json!([
            {"label": "ok", "box": [0.0, 0.0, 0.5, 0.5], "score": 0.9},
            {"label": "no-box", "score": 0.9},
            {"label": "short-box", "box": [0.1, 0.2], "score": 0.9},
            {"label": "inverted", "box": [0.9, 0.9, 0.1, 0.1], "score": 0.9},
            {"box": [0.0, 0.0, 0.5, 0.5], "score": 0.9},
            {"label": "no-score", "box": [0.0, 0.0, 0.5, 0.5]}
        ]);
        let detections = parse_detections(&body);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, "ok");
    }

    #[test]
    fn test_score_clamped_to_unit_interval() {
        let body = json!([
            {"label": "hot", "box": [0.0, 0.0, 0.5, 0.5], "score": 1.7}
        ]);
        let detections = parse_detections(&body);
        assert_eq!(detections[0].score, 1.0);
    }
}

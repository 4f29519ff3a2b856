//! Post-acquisition capability probing.
//!
//! Some platforms report track capabilities before they have stabilized, so
//! probing is deferred by a short settle delay after stream start. A probe
//! ticket carries the session generation it was scheduled for; a ticket from
//! a replaced session is discarded instead of overwriting newer state.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::device::{CameraStream, TrackCapabilities};

/// How long to wait after stream start before trusting reported
/// capabilities.
pub const PROBE_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// A scheduled capability probe tied to one acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTicket {
    pub generation: u64,
    pub due: Instant,
}

impl ProbeTicket {
    pub fn new(generation: u64, now: Instant) -> Self {
        Self {
            generation,
            due: now + PROBE_SETTLE_DELAY,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.due
    }
}

/// Inspect a live stream's track for zoom, torch, and focus-point support.
///
/// A track that fails to report capabilities is treated as supporting
/// nothing rather than as a session failure. When zoom is supported but the
/// device did not start at the 1.0 baseline, the zoom is reset best-effort.
pub fn probe(stream: &mut dyn CameraStream) -> TrackCapabilities {
    let caps = match stream.capabilities() {
        Ok(caps) => caps,
        Err(err) => {
            warn!(error = %err, "capability probe failed, treating track as unsupported");
            return TrackCapabilities::default();
        }
    };

    if let Some(range) = caps.zoom {
        let baseline = range.clamp(1.0);
        let off_baseline = stream
            .current_zoom()
            .is_some_and(|z| (z - baseline).abs() > 1e-9);
        if off_baseline {
            if let Err(err) = stream.apply_zoom(baseline) {
                debug!(error = %err, "zoom baseline reset failed");
            }
        }
    }

    caps
}

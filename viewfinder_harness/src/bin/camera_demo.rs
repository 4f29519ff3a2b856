//! Offline engine demo: drives a vision session against the mock camera
//! and writes the overlay and captured artifacts to disk.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use tracing::info;
use viewfinder::gallery::GalleryStore;
use viewfinder::overlay;
use viewfinder::{CameraSessionController, CaptureMode, JsonGalleryStore, SessionConfig};
use viewfinder_harness::{detection, MockCamera, ScriptedDetector, ScriptedOutcome};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run the camera engine against mock hardware")]
struct Args {
    /// Number of display ticks to simulate
    #[arg(long, default_value_t = 90)]
    ticks: u32,

    /// Output directory for overlay and gallery artifacts
    #[arg(long, default_value = "demo-out")]
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let camera = MockCamera::new();
    let detector = Arc::new(ScriptedDetector::repeating(vec![
        ScriptedOutcome::Detections(vec![
            detection("mug", (0.12, 0.55, 0.30, 0.80), 0.91),
            detection("keyboard", (0.35, 0.60, 0.85, 0.95), 0.84),
        ]),
        ScriptedOutcome::Detections(vec![detection("mug", (0.13, 0.54, 0.31, 0.81), 0.88)]),
        ScriptedOutcome::Fail("detector hiccup".into()),
    ]));

    let mut session = CameraSessionController::new(
        Box::new(camera),
        detector,
        SessionConfig {
            capture_mode: CaptureMode::Vision,
            ..Default::default()
        },
    );
    session.set_view_size(960, 540);

    let start = Instant::now();
    session.start(start);
    info!(state = ?session.state(), "session started");

    let mut now = start;
    for _ in 0..args.ticks {
        now += Duration::from_millis(16);
        session.tick(now);
        // Give the detection worker a moment, as a real refresh loop would.
        std::thread::sleep(Duration::from_millis(4));
    }

    info!(labels = ?session.known_labels(), "labels seen this session");
    for object in session.visible_objects() {
        info!(label = %object.label, score = ?object.score, manual = object.manual, "visible object");
    }

    std::fs::create_dir_all(&args.output)?;

    let canvas = overlay::rasterize(&session.overlay_scene());
    let overlay_path = args.output.join("overlay.png");
    canvas.save(&overlay_path)?;
    info!(path = %overlay_path.display(), "overlay written");

    let mut gallery = Vec::new();
    if let Some(item) = session.shutter(now) {
        gallery.insert(0, item);
    }
    let store = JsonGalleryStore::new(args.output.join("gallery.json"));
    store.save(&gallery)?;
    info!(path = %store.path().display(), items = gallery.len(), "gallery written");

    session.close();
    Ok(())
}

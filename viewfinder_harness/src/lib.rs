//! Offline harness for the viewfinder engine.
//!
//! Provides a scriptable mock camera device and detection service so the
//! session controller can be exercised end to end without hardware or
//! network access. Used by the integration tests and the demo binary.

pub mod mock_camera;
pub mod mock_detector;

pub use mock_camera::{MockCamera, MockCameraHandle, MockStreamState};
pub use mock_detector::{detection, ScriptedDetector, ScriptedOutcome};

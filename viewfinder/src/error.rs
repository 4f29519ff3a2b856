//! Camera acquisition error taxonomy.
//!
//! Acquisition failures are classified so the session controller can decide
//! whether a fallback attempt is worthwhile: permission denial is final for
//! the attempt, everything else may be retried with relaxed constraints or
//! by user action.

use thiserror::Error;

/// Classified camera acquisition and control errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// The user (or platform policy) denied camera access. Relaxing
    /// constraints cannot fix this, so fallback must stop immediately.
    #[error("camera permission denied")]
    PermissionDenied,

    /// No capture device matched the request.
    #[error("no camera device found")]
    NoDevice,

    /// A device exists but could not be started, typically because another
    /// application holds it or the hardware faulted.
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),

    /// The requested constraint set cannot be satisfied by any device.
    #[error("unsupported camera constraints: {0}")]
    UnsupportedConstraints(String),

    /// The acquisition was aborted before completing.
    #[error("camera acquisition aborted")]
    Aborted,

    /// Camera access requires a secure context on this platform.
    #[error("camera requires a secure context")]
    InsecureContext,

    /// Anything the platform reported that fits no other class.
    #[error("camera error: {0}")]
    Unknown(String),
}

impl CameraError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, CameraError::PermissionDenied)
    }

    /// Human-readable message for the error surface, with a hint at the
    /// action that might resolve it.
    pub fn user_message(&self) -> String {
        match self {
            CameraError::PermissionDenied => {
                "Camera access was denied. Grant camera permission and try again.".to_string()
            }
            CameraError::NoDevice => "No camera was found on this device.".to_string(),
            CameraError::DeviceUnavailable(_) => {
                "The camera is in use by another application or unavailable.".to_string()
            }
            CameraError::UnsupportedConstraints(_) => {
                "The selected camera settings are not supported by this device.".to_string()
            }
            CameraError::Aborted => "Starting the camera was interrupted. Try again.".to_string(),
            CameraError::InsecureContext => {
                "Camera access requires a secure connection.".to_string()
            }
            CameraError::Unknown(_) => "The camera could not be started.".to_string(),
        }
    }
}

/// Standard result type for camera device operations.
pub type CameraResult<T> = std::result::Result<T, CameraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_classification() {
        assert!(CameraError::PermissionDenied.is_permission_denied());
        assert!(!CameraError::NoDevice.is_permission_denied());
        assert!(!CameraError::DeviceUnavailable("busy".into()).is_permission_denied());
    }

    #[test]
    fn test_user_messages_are_nonempty() {
        let errors = [
            CameraError::PermissionDenied,
            CameraError::NoDevice,
            CameraError::DeviceUnavailable("busy".into()),
            CameraError::UnsupportedConstraints("4k".into()),
            CameraError::Aborted,
            CameraError::InsecureContext,
            CameraError::Unknown("?".into()),
        ];
        for e in errors {
            assert!(!e.user_message().is_empty());
        }
    }
}

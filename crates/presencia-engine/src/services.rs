//! Boundary traits for the external collaborators the engine consumes
//! and the success callback it exposes. Implementations live outside
//! this crate (application shell, test fakes).

use async_trait::async_trait;
use presencia_core::{AttendanceEvent, Descriptor, Frame, GeoPoint};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DescriptorError {
    /// Recoverable per attempt: the user retries with a better capture.
    #[error("no face detected")]
    NoFaceDetected,
    /// Fatal for readiness.
    #[error("model load failed: {0}")]
    ModelLoad(String),
    #[error("descriptor extraction failed: {0}")]
    Extraction(String),
}

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("no frame available: {0}")]
    Unavailable(String),
    #[error("capture failed: {0}")]
    Capture(String),
}

#[derive(Error, Debug)]
pub enum GeolocationError {
    #[error("position unavailable: {0}")]
    Unavailable(String),
}

/// External face detection and embedding extraction service.
///
/// Detect-single-face, landmarks, and embedding all happen behind this
/// boundary; the engine only sees the resulting descriptor.
#[async_trait]
pub trait FaceDescriptorService: Send + Sync {
    /// One-shot model warmup, awaited before any extraction.
    async fn load_models(&self) -> Result<(), DescriptorError>;

    /// Extract a descriptor from an enrollment reference image.
    async fn descriptor_from_image(&self, reference: &str) -> Result<Descriptor, DescriptorError>;

    /// Extract a descriptor from a live captured frame.
    async fn descriptor_from_frame(&self, frame: &Frame) -> Result<Descriptor, DescriptorError>;
}

/// External still-frame source.
#[async_trait]
pub trait CameraSource: Send + Sync {
    async fn capture_frame(&self) -> Result<Frame, CameraError>;
}

/// External one-shot position source. Failure is logged, never
/// propagated into verification outcomes.
#[async_trait]
pub trait GeolocationSource: Send + Sync {
    async fn current_position(&self) -> Result<GeoPoint, GeolocationError>;
}

/// Success callback exposed to the surrounding application. Invoked
/// exactly once per accepted attempt; the engine retains nothing about
/// the event afterward.
#[async_trait]
pub trait AttendanceSink: Send + Sync {
    async fn record(&self, event: AttendanceEvent);
}

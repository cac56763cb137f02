//! File-backed collaborator adapters for the CLI shell.
//!
//! The neural detector and extractor live outside this repository; the
//! shell feeds the engine their precomputed outputs instead. A
//! descriptor file is a JSON array of floats, or JSON `null` when the
//! extractor found no face in the source image.

use async_trait::async_trait;
use presencia_core::{AttendanceEvent, Descriptor, Frame, GeoPoint};
use presencia_engine::{
    AttendanceSink, CameraError, CameraSource, DescriptorError, FaceDescriptorService,
    GeolocationError, GeolocationSource,
};
use std::path::PathBuf;

/// Parse descriptor-file bytes: `[f32, ...]` or `null` (no face).
pub fn parse_descriptor(bytes: &[u8]) -> Result<Descriptor, DescriptorError> {
    let parsed: Option<Vec<f32>> = serde_json::from_slice(bytes)
        .map_err(|e| DescriptorError::Extraction(format!("bad descriptor JSON: {e}")))?;
    match parsed {
        Some(values) => Ok(Descriptor::new(values)),
        None => Err(DescriptorError::NoFaceDetected),
    }
}

/// Descriptor service over precomputed descriptor files. Enrollment
/// references are paths to descriptor JSON; live frames carry the same
/// JSON as their payload.
pub struct JsonDescriptorService;

#[async_trait]
impl FaceDescriptorService for JsonDescriptorService {
    async fn load_models(&self) -> Result<(), DescriptorError> {
        // Precomputed descriptors need no model warmup.
        tracing::debug!("descriptor service running in precomputed mode");
        Ok(())
    }

    async fn descriptor_from_image(&self, reference: &str) -> Result<Descriptor, DescriptorError> {
        let bytes = tokio::fs::read(reference)
            .await
            .map_err(|e| DescriptorError::Extraction(format!("read {reference}: {e}")))?;
        parse_descriptor(&bytes)
    }

    async fn descriptor_from_frame(&self, frame: &Frame) -> Result<Descriptor, DescriptorError> {
        parse_descriptor(&frame.data)
    }
}

/// Camera stand-in that "captures" the configured live descriptor file.
pub struct FileCameraSource {
    path: PathBuf,
}

impl FileCameraSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl CameraSource for FileCameraSource {
    async fn capture_frame(&self) -> Result<Frame, CameraError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| CameraError::Unavailable(format!("{}: {e}", self.path.display())))?;
        // File-backed captures carry no pixel dimensions.
        Ok(Frame {
            data: bytes,
            width: 0,
            height: 0,
        })
    }
}

/// Position source with a fixed answer, from `--lat`/`--lon`.
pub struct FixedGeolocation {
    position: Option<GeoPoint>,
}

impl FixedGeolocation {
    pub fn at(position: GeoPoint) -> Self {
        Self {
            position: Some(position),
        }
    }

    pub fn unavailable() -> Self {
        Self { position: None }
    }
}

#[async_trait]
impl GeolocationSource for FixedGeolocation {
    async fn current_position(&self) -> Result<GeoPoint, GeolocationError> {
        self.position
            .ok_or_else(|| GeolocationError::Unavailable("no position configured".into()))
    }
}

/// Prints accepted attendance events to stdout as JSON lines.
pub struct JsonStdoutSink;

#[async_trait]
impl AttendanceSink for JsonStdoutSink {
    async fn record(&self, event: AttendanceEvent) {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::error!(error = %e, "failed to serialize attendance event"),
        }
    }
}

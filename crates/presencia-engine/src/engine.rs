//! Verification orchestrator: ties readiness, capture, extraction, and
//! matching together and emits attendance events on acceptance.

use crate::config::EngineConfig;
use crate::loader;
use crate::readiness::{FailureReason, Readiness, ReadinessCell};
use crate::registry::EnrollmentRecord;
use crate::services::{
    AttendanceSink, CameraSource, DescriptorError, FaceDescriptorService, GeolocationSource,
};
use chrono::Local;
use presencia_core::matcher::{EuclideanMatcher, MatchError, Matcher};
use presencia_core::{
    AttendanceEvent, Descriptor, Frame, Gallery, GeoPoint, Outcome, VerificationAttempt,
};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tokio::sync::watch;
use uuid::Uuid;

/// The verification engine.
///
/// Owns the collaborator boundaries, the readiness cell, the gallery
/// slot, and the last-known-location cell. Attempts never mutate the
/// gallery or readiness; both are written only by `start` and `reload`.
pub struct Engine {
    descriptors: Arc<dyn FaceDescriptorService>,
    camera: Arc<dyn CameraSource>,
    geolocation: Arc<dyn GeolocationSource>,
    sink: Arc<dyn AttendanceSink>,
    config: EngineConfig,
    readiness: ReadinessCell,
    /// Swapped wholesale when a load completes, before readiness flips,
    /// so no attempt can observe a partially populated gallery.
    gallery: RwLock<Arc<Gallery>>,
    /// Written at most once per successful position fix.
    last_location: Arc<OnceLock<GeoPoint>>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        descriptors: Arc<dyn FaceDescriptorService>,
        camera: Arc<dyn CameraSource>,
        geolocation: Arc<dyn GeolocationSource>,
        sink: Arc<dyn AttendanceSink>,
    ) -> Self {
        Self {
            descriptors,
            camera,
            geolocation,
            sink,
            config,
            readiness: ReadinessCell::new(),
            gallery: RwLock::new(Arc::new(Gallery::new())),
            last_location: Arc::new(OnceLock::new()),
        }
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness.current()
    }

    pub fn subscribe_readiness(&self) -> watch::Receiver<Readiness> {
        self.readiness.subscribe()
    }

    /// Wait until readiness leaves `Loading` and return the settled state.
    pub async fn wait_until_settled(&self) -> Readiness {
        let mut rx = self.readiness.subscribe();
        let settled = match rx.wait_for(|s| s.is_settled()).await {
            Ok(state) => *state,
            // The engine owns the sender for its whole lifetime, so the
            // channel cannot close while `self` is borrowed.
            Err(_) => self.readiness.current(),
        };
        settled
    }

    /// Snapshot of the current gallery.
    pub fn gallery(&self) -> Arc<Gallery> {
        self.gallery
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Last successfully acquired position, if any.
    pub fn last_location(&self) -> Option<GeoPoint> {
        self.last_location.get().copied()
    }

    /// Bring the engine up: kick off the one-shot geolocation fix, load
    /// the descriptor models, build the gallery, and settle readiness.
    pub async fn start(&self, records: &[EnrollmentRecord]) -> Readiness {
        self.spawn_geolocation();
        self.load(records).await
    }

    /// Rebuild the gallery from a fresh set of enrollment records.
    ///
    /// The only path out of a terminal readiness state. Attempts issued
    /// while the reload is in flight are rejected as not ready.
    pub async fn reload(&self, records: &[EnrollmentRecord]) -> Readiness {
        tracing::info!(records = records.len(), "gallery reload requested");
        self.readiness.reset();
        self.load(records).await
    }

    async fn load(&self, records: &[EnrollmentRecord]) -> Readiness {
        if let Err(error) = self.descriptors.load_models().await {
            tracing::error!(%error, "descriptor model load failed");
            self.readiness.set_failed(FailureReason::ModelLoadFailure);
            return self.readiness.current();
        }
        tracing::info!("descriptor models loaded");

        let report = loader::load_gallery(self.descriptors.as_ref(), records).await;
        let usable = report.is_usable();
        // The slot always reflects the last completed load, empty or not.
        self.publish_gallery(report.gallery);

        if usable {
            self.readiness.set_ready();
        } else {
            tracing::error!(records = records.len(), "no usable gallery entries");
            self.readiness.set_failed(FailureReason::NoUsableGallery);
        }
        self.readiness.current()
    }

    /// Fire-and-forget position fix. Success writes the single-slot
    /// cell; failure is logged and events carry no location.
    fn spawn_geolocation(&self) {
        let source = Arc::clone(&self.geolocation);
        let cell = Arc::clone(&self.last_location);
        tokio::spawn(async move {
            match source.current_position().await {
                Ok(point) => {
                    tracing::info!(lat = point.lat, lon = point.lon, "geolocation acquired");
                    let _ = cell.set(point);
                }
                Err(error) => {
                    tracing::warn!(%error, "geolocation unavailable, events will carry no location");
                }
            }
        });
    }

    fn publish_gallery(&self, gallery: Gallery) {
        let mut slot = self.gallery.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Arc::new(gallery);
    }

    /// Run one verification attempt: gate on readiness, capture a still
    /// frame, extract the live descriptor, match it against the gallery,
    /// and emit an attendance event on acceptance.
    ///
    /// Attempts are independent and idempotent to re-invoke; every
    /// failure mode surfaces as a typed [`Outcome`], never a panic.
    pub async fn verify(&self) -> VerificationAttempt {
        let attempt_id = Uuid::new_v4();

        let readiness = self.readiness.current();
        if !readiness.is_ready() {
            tracing::debug!(attempt = %attempt_id, state = ?readiness, "verification refused, system not ready");
            return VerificationAttempt::new(attempt_id, Outcome::SystemNotReady);
        }

        let frame = match self.camera.capture_frame().await {
            Ok(frame) => frame,
            Err(error) => {
                tracing::error!(attempt = %attempt_id, %error, "frame capture failed");
                return VerificationAttempt::new(
                    attempt_id,
                    Outcome::SystemError(format!("capture failed: {error}")),
                );
            }
        };

        let live = match self.extract_live(&frame).await {
            Ok(live) => live,
            Err(DescriptorError::NoFaceDetected) => {
                tracing::info!(attempt = %attempt_id, "no face detected in captured frame");
                return VerificationAttempt::new(attempt_id, Outcome::NoFaceDetected);
            }
            Err(error) => {
                tracing::error!(attempt = %attempt_id, %error, "live descriptor extraction failed");
                return VerificationAttempt::new(
                    attempt_id,
                    Outcome::SystemError(format!("extraction failed: {error}")),
                );
            }
        };

        let gallery = self.gallery();
        let threshold = self.config.match_threshold;
        let result = match EuclideanMatcher.compare(&live, &gallery, threshold) {
            Ok(result) => result,
            Err(MatchError::EmptyGallery) => {
                // Readiness gating makes this unreachable; reject rather
                // than crash if it happens anyway.
                tracing::warn!(attempt = %attempt_id, "gallery empty despite Ready, rejecting");
                let mut attempt = VerificationAttempt::new(attempt_id, Outcome::Rejected);
                attempt.live = Some(live);
                return attempt;
            }
            Err(error @ MatchError::DimensionMismatch { .. }) => {
                tracing::error!(attempt = %attempt_id, %error, "descriptor dimension mismatch");
                return VerificationAttempt::new(attempt_id, Outcome::SystemError(error.to_string()));
            }
        };

        match result.entry {
            Some(entry) if result.matched => {
                tracing::info!(
                    attempt = %attempt_id,
                    identity = %entry.identity,
                    distance = result.distance,
                    threshold,
                    "verification accepted"
                );
                let event = AttendanceEvent {
                    identity: entry.identity.clone(),
                    distance: result.distance,
                    timestamp_local: Local::now().format("%H:%M:%S").to_string(),
                    geolocation: self.last_location(),
                };
                self.sink.record(event).await;

                VerificationAttempt {
                    id: attempt_id,
                    live: Some(live),
                    candidate: Some(entry),
                    distance: Some(result.distance),
                    outcome: Outcome::Accepted,
                }
            }
            _ => {
                tracing::info!(
                    attempt = %attempt_id,
                    distance = result.distance,
                    threshold,
                    "verification rejected"
                );
                VerificationAttempt {
                    id: attempt_id,
                    live: Some(live),
                    candidate: None,
                    distance: Some(result.distance),
                    outcome: Outcome::Rejected,
                }
            }
        }
    }

    /// Extract the live descriptor, bounded by the configured timeout.
    async fn extract_live(&self, frame: &Frame) -> Result<Descriptor, DescriptorError> {
        let extraction = self.descriptors.descriptor_from_frame(frame);
        match self.config.extract_timeout() {
            Some(limit) => tokio::time::timeout(limit, extraction)
                .await
                .map_err(|_| {
                    DescriptorError::Extraction(format!(
                        "timed out after {}s",
                        limit.as_secs()
                    ))
                })?,
            None => extraction.await,
        }
    }
}

//! End-to-end verification flow tests with scripted collaborator fakes.

use async_trait::async_trait;
use presencia_core::{AttendanceEvent, Descriptor, Frame, GeoPoint, Outcome, DESCRIPTOR_DIM};
use presencia_engine::{
    AttendanceSink, CameraError, CameraSource, DescriptorError, Engine, EngineConfig,
    EnrollmentRecord, FaceDescriptorService, FailureReason, GeolocationError, GeolocationSource,
    Readiness,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Full-dimension embedding with only the first component set, so the
/// Euclidean distance between two of them is the component difference.
fn embedding(first: f32) -> Vec<f32> {
    let mut values = vec![0.0; DESCRIPTOR_DIM];
    values[0] = first;
    values
}

fn record(identity: &str, image: &str) -> EnrollmentRecord {
    EnrollmentRecord {
        identity: identity.into(),
        image: image.into(),
    }
}

#[derive(Clone)]
enum LiveScript {
    Descriptor(Vec<f32>),
    NoFace,
    Fail,
    Hang,
}

struct FakeDescriptorService {
    fail_model_load: bool,
    /// Reference image path -> enrolled embedding. Missing entries
    /// behave as reference images with no detectable face.
    references: HashMap<String, Vec<f32>>,
    live: Mutex<LiveScript>,
    reference_extractions: AtomicUsize,
}

impl FakeDescriptorService {
    fn new(references: Vec<(&str, Vec<f32>)>, live: LiveScript) -> Self {
        Self {
            fail_model_load: false,
            references: references
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            live: Mutex::new(live),
            reference_extractions: AtomicUsize::new(0),
        }
    }

    fn set_live(&self, script: LiveScript) {
        *self.live.lock().unwrap() = script;
    }
}

#[async_trait]
impl FaceDescriptorService for FakeDescriptorService {
    async fn load_models(&self) -> Result<(), DescriptorError> {
        if self.fail_model_load {
            Err(DescriptorError::ModelLoad("scripted model failure".into()))
        } else {
            Ok(())
        }
    }

    async fn descriptor_from_image(&self, reference: &str) -> Result<Descriptor, DescriptorError> {
        self.reference_extractions.fetch_add(1, Ordering::SeqCst);
        match self.references.get(reference) {
            Some(values) => Ok(Descriptor::new(values.clone())),
            None => Err(DescriptorError::NoFaceDetected),
        }
    }

    async fn descriptor_from_frame(&self, _frame: &Frame) -> Result<Descriptor, DescriptorError> {
        let script = self.live.lock().unwrap().clone();
        match script {
            LiveScript::Descriptor(values) => Ok(Descriptor::new(values)),
            LiveScript::NoFace => Err(DescriptorError::NoFaceDetected),
            LiveScript::Fail => Err(DescriptorError::Extraction("scripted failure".into())),
            LiveScript::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(DescriptorError::Extraction("unreachable".into()))
            }
        }
    }
}

#[derive(Default)]
struct FakeCamera {
    fail: AtomicBool,
    captures: AtomicUsize,
}

#[async_trait]
impl CameraSource for FakeCamera {
    async fn capture_frame(&self) -> Result<Frame, CameraError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            Err(CameraError::Unavailable("scripted outage".into()))
        } else {
            Ok(Frame {
                data: Vec::new(),
                width: 320,
                height: 240,
            })
        }
    }
}

struct FakeGeolocation {
    position: Option<GeoPoint>,
}

#[async_trait]
impl GeolocationSource for FakeGeolocation {
    async fn current_position(&self) -> Result<GeoPoint, GeolocationError> {
        self.position
            .ok_or_else(|| GeolocationError::Unavailable("scripted denial".into()))
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<AttendanceEvent>>,
}

impl RecordingSink {
    fn events(&self) -> Vec<AttendanceEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl AttendanceSink for RecordingSink {
    async fn record(&self, event: AttendanceEvent) {
        self.events.lock().unwrap().push(event);
    }
}

struct Harness {
    engine: Engine,
    service: Arc<FakeDescriptorService>,
    camera: Arc<FakeCamera>,
    sink: Arc<RecordingSink>,
}

fn harness(service: FakeDescriptorService, position: Option<GeoPoint>) -> Harness {
    harness_with_config(service, position, EngineConfig::default())
}

fn harness_with_config(
    service: FakeDescriptorService,
    position: Option<GeoPoint>,
    config: EngineConfig,
) -> Harness {
    let service = Arc::new(service);
    let camera = Arc::new(FakeCamera::default());
    let sink = Arc::new(RecordingSink::default());
    let engine = Engine::new(
        config,
        service.clone(),
        camera.clone(),
        Arc::new(FakeGeolocation { position }),
        sink.clone(),
    );
    Harness {
        engine,
        service,
        camera,
        sink,
    }
}

/// Let the fire-and-forget geolocation task run to completion.
async fn settle_background_tasks() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test]
async fn test_verify_before_start_is_not_ready_and_captures_nothing() {
    let h = harness(
        FakeDescriptorService::new(vec![], LiveScript::NoFace),
        None,
    );

    let attempt = h.engine.verify().await;
    assert_eq!(attempt.outcome, Outcome::SystemNotReady);
    assert!(attempt.live.is_none());
    assert_eq!(h.camera.captures.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_accepted_attempt_emits_one_event_with_location() {
    let position = GeoPoint { lat: -34.6, lon: -58.4 };
    let h = harness(
        FakeDescriptorService::new(
            vec![("alice.jpeg", embedding(0.0))],
            LiveScript::Descriptor(embedding(0.35)),
        ),
        Some(position),
    );

    let readiness = h.engine.start(&[record("alice", "alice.jpeg")]).await;
    assert_eq!(readiness, Readiness::Ready);
    assert_eq!(h.engine.gallery().len(), 1);
    settle_background_tasks().await;

    let attempt = h.engine.verify().await;
    assert_eq!(attempt.outcome, Outcome::Accepted);
    assert_eq!(attempt.accepted_identity(), Some("alice"));
    let distance = attempt.distance.unwrap();
    assert!((distance - 0.35).abs() < 1e-6);

    let events = h.sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].identity, "alice");
    assert_eq!(events[0].geolocation, Some(position));
    assert!(!events[0].timestamp_local.is_empty());
}

#[tokio::test]
async fn test_rejected_attempt_emits_nothing() {
    let h = harness(
        FakeDescriptorService::new(
            vec![("alice.jpeg", embedding(0.0))],
            LiveScript::Descriptor(embedding(0.45)),
        ),
        None,
    );

    h.engine.start(&[record("alice", "alice.jpeg")]).await;
    let attempt = h.engine.verify().await;

    assert_eq!(attempt.outcome, Outcome::Rejected);
    assert!(attempt.candidate.is_none());
    assert!((attempt.distance.unwrap() - 0.45).abs() < 1e-6);
    assert!(h.sink.events().is_empty());
}

#[tokio::test]
async fn test_nearest_identity_wins_across_gallery() {
    // live is closer to bob (0.2) than alice (0.6)
    let h = harness(
        FakeDescriptorService::new(
            vec![
                ("alice.jpeg", embedding(1.0)),
                ("bob.jpeg", embedding(0.2)),
            ],
            LiveScript::Descriptor(embedding(0.4)),
        ),
        None,
    );

    h.engine
        .start(&[record("alice", "alice.jpeg"), record("bob", "bob.jpeg")])
        .await;
    let attempt = h.engine.verify().await;

    assert_eq!(attempt.outcome, Outcome::Accepted);
    assert_eq!(attempt.accepted_identity(), Some("bob"));
    assert_eq!(h.sink.events()[0].identity, "bob");
}

#[tokio::test]
async fn test_no_face_in_live_frame() {
    let h = harness(
        FakeDescriptorService::new(vec![("alice.jpeg", embedding(0.0))], LiveScript::NoFace),
        None,
    );

    h.engine.start(&[record("alice", "alice.jpeg")]).await;
    let attempt = h.engine.verify().await;

    assert_eq!(attempt.outcome, Outcome::NoFaceDetected);
    assert!(h.sink.events().is_empty());
}

#[tokio::test]
async fn test_camera_outage_is_system_error_and_readiness_holds() {
    let h = harness(
        FakeDescriptorService::new(
            vec![("alice.jpeg", embedding(0.0))],
            LiveScript::Descriptor(embedding(0.1)),
        ),
        None,
    );

    h.engine.start(&[record("alice", "alice.jpeg")]).await;
    h.camera.fail.store(true, Ordering::SeqCst);

    let attempt = h.engine.verify().await;
    match &attempt.outcome {
        Outcome::SystemError(reason) => assert!(reason.contains("capture failed")),
        other => panic!("expected SystemError, got {other:?}"),
    }
    assert_eq!(h.engine.readiness(), Readiness::Ready);
    assert!(h.sink.events().is_empty());
}

#[tokio::test]
async fn test_repeat_verification_is_idempotent() {
    let h = harness(
        FakeDescriptorService::new(
            vec![("alice.jpeg", embedding(0.0))],
            LiveScript::Descriptor(embedding(0.35)),
        ),
        None,
    );

    h.engine.start(&[record("alice", "alice.jpeg")]).await;

    let first = h.engine.verify().await;
    let second = h.engine.verify().await;

    assert_eq!(first.outcome, second.outcome);
    assert_eq!(first.accepted_identity(), second.accepted_identity());
    assert_eq!(first.distance, second.distance);
    // one event per accepted attempt
    assert_eq!(h.sink.events().len(), 2);
}

#[tokio::test]
async fn test_no_usable_gallery_fails_readiness() {
    // every reference image lacks a detectable face
    let h = harness(
        FakeDescriptorService::new(vec![], LiveScript::NoFace),
        None,
    );

    let readiness = h
        .engine
        .start(&[record("alice", "alice.jpeg"), record("bob", "bob.jpeg")])
        .await;
    assert_eq!(readiness, Readiness::Failed(FailureReason::NoUsableGallery));
    assert!(h.engine.gallery().is_empty());

    let attempt = h.engine.verify().await;
    assert_eq!(attempt.outcome, Outcome::SystemNotReady);
    assert_eq!(h.camera.captures.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_partial_gallery_still_becomes_ready() {
    // one of two reference images fails; the survivor is enough
    let h = harness(
        FakeDescriptorService::new(
            vec![("alice.jpeg", embedding(0.0))],
            LiveScript::Descriptor(embedding(0.1)),
        ),
        None,
    );

    let readiness = h
        .engine
        .start(&[record("alice", "alice.jpeg"), record("bob", "missing.jpeg")])
        .await;
    assert_eq!(readiness, Readiness::Ready);
    assert_eq!(h.engine.gallery().len(), 1);
}

#[tokio::test]
async fn test_model_load_failure_skips_gallery_load() {
    let mut service = FakeDescriptorService::new(
        vec![("alice.jpeg", embedding(0.0))],
        LiveScript::NoFace,
    );
    service.fail_model_load = true;
    let h = harness(service, None);

    let readiness = h.engine.start(&[record("alice", "alice.jpeg")]).await;
    assert_eq!(readiness, Readiness::Failed(FailureReason::ModelLoadFailure));
    assert_eq!(h.service.reference_extractions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_readiness_latches_through_extraction_failures() {
    let h = harness(
        FakeDescriptorService::new(
            vec![("alice.jpeg", embedding(0.0))],
            LiveScript::Fail,
        ),
        None,
    );

    h.engine.start(&[record("alice", "alice.jpeg")]).await;

    let attempt = h.engine.verify().await;
    assert!(matches!(attempt.outcome, Outcome::SystemError(_)));
    assert_eq!(h.engine.readiness(), Readiness::Ready);

    // a later attempt with a good capture still succeeds
    h.service.set_live(LiveScript::Descriptor(embedding(0.2)));
    let attempt = h.engine.verify().await;
    assert_eq!(attempt.outcome, Outcome::Accepted);
}

#[tokio::test]
async fn test_reload_replaces_gallery_wholesale() {
    let h = harness(
        FakeDescriptorService::new(
            vec![
                ("alice.jpeg", embedding(0.0)),
                ("bob.jpeg", embedding(5.0)),
            ],
            LiveScript::Descriptor(embedding(0.35)),
        ),
        None,
    );

    h.engine.start(&[record("alice", "alice.jpeg")]).await;
    assert_eq!(h.engine.verify().await.outcome, Outcome::Accepted);

    let readiness = h.engine.reload(&[record("bob", "bob.jpeg")]).await;
    assert_eq!(readiness, Readiness::Ready);
    let gallery = h.engine.gallery();
    assert_eq!(gallery.len(), 1);
    assert_eq!(gallery.entries()[0].identity, "bob");

    // the same live descriptor is now far from every enrolled entry
    let attempt = h.engine.verify().await;
    assert_eq!(attempt.outcome, Outcome::Rejected);
}

#[tokio::test]
async fn test_event_carries_no_location_when_fix_failed() {
    let h = harness(
        FakeDescriptorService::new(
            vec![("alice.jpeg", embedding(0.0))],
            LiveScript::Descriptor(embedding(0.1)),
        ),
        None,
    );

    h.engine.start(&[record("alice", "alice.jpeg")]).await;
    settle_background_tasks().await;

    let attempt = h.engine.verify().await;
    assert_eq!(attempt.outcome, Outcome::Accepted);
    assert_eq!(h.sink.events()[0].geolocation, None);
}

#[tokio::test(start_paused = true)]
async fn test_hung_extraction_times_out_as_system_error() {
    let config = EngineConfig {
        extract_timeout_secs: 5,
        ..EngineConfig::default()
    };
    let h = harness_with_config(
        FakeDescriptorService::new(
            vec![("alice.jpeg", embedding(0.0))],
            LiveScript::Hang,
        ),
        None,
        config,
    );

    h.engine.start(&[record("alice", "alice.jpeg")]).await;

    let attempt = h.engine.verify().await;
    match &attempt.outcome {
        Outcome::SystemError(reason) => assert!(reason.contains("timed out")),
        other => panic!("expected SystemError, got {other:?}"),
    }
    assert_eq!(h.engine.readiness(), Readiness::Ready);
}

#[tokio::test]
async fn test_wait_until_settled_observes_start() {
    let h = harness(
        FakeDescriptorService::new(
            vec![("alice.jpeg", embedding(0.0))],
            LiveScript::NoFace,
        ),
        None,
    );

    let records = [record("alice", "alice.jpeg")];
    let (readiness, settled) =
        tokio::join!(h.engine.start(&records), h.engine.wait_until_settled());
    assert_eq!(readiness, Readiness::Ready);
    assert_eq!(settled, Readiness::Ready);
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed embedding dimension produced by the external descriptor extractor.
pub const DESCRIPTOR_DIM: usize = 128;

/// Face descriptor vector (typically [`DESCRIPTOR_DIM`]-dimensional).
///
/// Values are stored exactly as the extractor produced them; no
/// renormalization happens on this side of the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub values: Vec<f32>,
}

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Compute Euclidean distance between two descriptors.
    pub fn euclidean_distance(&self, other: &Descriptor) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// One enrolled person: identity, descriptor, and the reference image
/// the descriptor was extracted from. Never mutated after loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryEntry {
    pub identity: String,
    pub descriptor: Descriptor,
    /// Enrollment image reference (e.g., a file path or URI).
    pub source: String,
}

/// Ordered set of enrolled entries, unique by identity.
///
/// Built once by the gallery loader and read-only afterward; a reload
/// replaces it wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Gallery {
    entries: Vec<GalleryEntry>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_identity(&self, identity: &str) -> bool {
        self.entries.iter().any(|e| e.identity == identity)
    }

    /// Append an entry. The loader is responsible for identity uniqueness.
    pub fn push(&mut self, entry: GalleryEntry) {
        debug_assert!(
            !self.contains_identity(&entry.identity),
            "duplicate identity pushed into gallery: {}",
            entry.identity
        );
        self.entries.push(entry);
    }
}

/// A captured camera image. Opaque to the engine: only the external
/// descriptor service interprets the pixel payload.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Last-known geographic position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Output record of a successful verification. Ownership passes to the
/// attendance sink; the engine keeps nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub identity: String,
    /// Euclidean distance of the accepted match.
    pub distance: f32,
    /// Local time of day, formatted `HH:MM:SS`.
    pub timestamp_local: String,
    /// `None` when no position fix was acquired; non-fatal.
    pub geolocation: Option<GeoPoint>,
}

/// Caller-visible result of a verification attempt. Every variant maps
/// to a distinct user-facing message.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Accepted,
    Rejected,
    NoFaceDetected,
    SystemNotReady,
    SystemError(String),
}

/// One verification attempt, created per capture and discarded after
/// its result is consumed. Never persisted.
#[derive(Debug, Clone)]
pub struct VerificationAttempt {
    /// Correlation id for log lines belonging to this attempt.
    pub id: Uuid,
    /// Live descriptor, once extraction succeeded.
    pub live: Option<Descriptor>,
    /// Matched gallery entry on acceptance.
    pub candidate: Option<GalleryEntry>,
    /// Nearest-neighbor distance, once matching ran.
    pub distance: Option<f32>,
    pub outcome: Outcome,
}

impl VerificationAttempt {
    pub fn new(id: Uuid, outcome: Outcome) -> Self {
        Self {
            id,
            live: None,
            candidate: None,
            distance: None,
            outcome,
        }
    }

    pub fn accepted(&self) -> bool {
        self.outcome == Outcome::Accepted
    }

    /// Identity of the accepted match, if any.
    pub fn accepted_identity(&self) -> Option<&str> {
        match self.outcome {
            Outcome::Accepted => self.candidate.as_ref().map(|c| c.identity.as_str()),
            _ => None,
        }
    }
}

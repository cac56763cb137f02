//! presencia-core: face descriptor data model and nearest-neighbor matching.
//!
//! Descriptors are fixed-length embeddings produced by an external
//! extraction service; this crate only stores and compares them.

pub mod matcher;
pub mod types;

pub use matcher::{EuclideanMatcher, MatchError, MatchResult, Matcher};
pub use types::{
    AttendanceEvent, Descriptor, Frame, Gallery, GalleryEntry, GeoPoint, Outcome,
    VerificationAttempt, DESCRIPTOR_DIM,
};

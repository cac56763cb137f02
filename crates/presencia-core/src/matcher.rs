use crate::types::{Descriptor, Gallery, GalleryEntry};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatchError {
    /// Unreachable when readiness gating is honored upstream.
    #[error("gallery is empty")]
    EmptyGallery,
    /// Extractor/gallery version skew; attempt-fatal, process survives.
    #[error("descriptor dimension mismatch: probe is {probe}-dim, entry \"{identity}\" is {entry}-dim")]
    DimensionMismatch {
        probe: usize,
        entry: usize,
        identity: String,
    },
}

/// Nearest-neighbor outcome over one gallery scan.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub matched: bool,
    /// Distance to the nearest gallery entry.
    pub distance: f32,
    /// Nearest entry when the match was accepted.
    pub entry: Option<GalleryEntry>,
}

/// Strategy for comparing a live descriptor against the enrolled gallery.
pub trait Matcher {
    fn compare(
        &self,
        probe: &Descriptor,
        gallery: &Gallery,
        threshold: f32,
    ) -> Result<MatchResult, MatchError>;
}

/// Euclidean-distance matcher.
///
/// Scans every entry; the minimum is tracked with strict less-than, so
/// the first entry in gallery order wins ties. Accepts iff the best
/// distance is strictly below the threshold.
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn compare(
        &self,
        probe: &Descriptor,
        gallery: &Gallery,
        threshold: f32,
    ) -> Result<MatchResult, MatchError> {
        if gallery.is_empty() {
            return Err(MatchError::EmptyGallery);
        }

        let mut best_distance = f32::INFINITY;
        let mut best_entry: Option<&GalleryEntry> = None;

        for entry in gallery.entries() {
            if entry.descriptor.dim() != probe.dim() {
                return Err(MatchError::DimensionMismatch {
                    probe: probe.dim(),
                    entry: entry.descriptor.dim(),
                    identity: entry.identity.clone(),
                });
            }

            let distance = probe.euclidean_distance(&entry.descriptor);
            if distance < best_distance {
                best_distance = distance;
                best_entry = Some(entry);
            }
        }

        match best_entry {
            Some(entry) if best_distance < threshold => Ok(MatchResult {
                matched: true,
                distance: best_distance,
                entry: Some(entry.clone()),
            }),
            _ => Ok(MatchResult {
                matched: false,
                distance: best_distance,
                entry: None,
            }),
        }
    }
}

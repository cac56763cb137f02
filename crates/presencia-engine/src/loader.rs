//! Gallery loader: builds the enrolled gallery from the registry, one
//! descriptor extraction per record, tolerating per-record failures.

use crate::registry::EnrollmentRecord;
use crate::services::{DescriptorError, FaceDescriptorService};
use presencia_core::{Gallery, GalleryEntry, DESCRIPTOR_DIM};
use std::fmt;

/// Why an enrollment record was skipped. Recoverable: the rest of the
/// batch still loads.
#[derive(Debug)]
pub enum LoadWarning {
    NoFaceDetected {
        identity: String,
        source: String,
    },
    ExtractionFailed {
        identity: String,
        source: String,
        error: DescriptorError,
    },
    /// Extractor/gallery version skew: descriptor came back with an
    /// unexpected dimension.
    DimensionSkew {
        identity: String,
        source: String,
        got: usize,
    },
    /// Later record with an already-enrolled identity; first wins.
    DuplicateIdentity {
        identity: String,
        source: String,
    },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadWarning::NoFaceDetected { identity, source } => {
                write!(f, "{identity}: no face detected in {source}")
            }
            LoadWarning::ExtractionFailed { identity, source, error } => {
                write!(f, "{identity}: extraction failed for {source}: {error}")
            }
            LoadWarning::DimensionSkew { identity, source, got } => {
                write!(
                    f,
                    "{identity}: descriptor from {source} is {got}-dim, expected {DESCRIPTOR_DIM}"
                )
            }
            LoadWarning::DuplicateIdentity { identity, source } => {
                write!(f, "{identity}: duplicate identity, skipping {source}")
            }
        }
    }
}

/// Result of a full gallery load: 0..N entries plus the skip reasons.
#[derive(Debug)]
pub struct LoadReport {
    pub gallery: Gallery,
    pub warnings: Vec<LoadWarning>,
}

impl LoadReport {
    /// A load is usable when at least one entry was produced.
    pub fn is_usable(&self) -> bool {
        !self.gallery.is_empty()
    }
}

/// Build the gallery from enrollment records, in input order.
///
/// Records are independent: a skipped record never aborts the batch,
/// and the final gallery preserves registry order regardless of how
/// long each extraction took.
pub async fn load_gallery(
    service: &dyn FaceDescriptorService,
    records: &[EnrollmentRecord],
) -> LoadReport {
    let mut gallery = Gallery::new();
    let mut warnings = Vec::new();

    for record in records {
        if gallery.contains_identity(&record.identity) {
            tracing::warn!(
                identity = %record.identity,
                source = %record.image,
                "duplicate identity in registry, keeping first enrollment"
            );
            warnings.push(LoadWarning::DuplicateIdentity {
                identity: record.identity.clone(),
                source: record.image.clone(),
            });
            continue;
        }

        match service.descriptor_from_image(&record.image).await {
            Ok(descriptor) if descriptor.dim() != DESCRIPTOR_DIM => {
                tracing::warn!(
                    identity = %record.identity,
                    source = %record.image,
                    got = descriptor.dim(),
                    expected = DESCRIPTOR_DIM,
                    "descriptor dimension skew, skipping record"
                );
                warnings.push(LoadWarning::DimensionSkew {
                    identity: record.identity.clone(),
                    source: record.image.clone(),
                    got: descriptor.dim(),
                });
            }
            Ok(descriptor) => {
                tracing::debug!(identity = %record.identity, "enrolled");
                gallery.push(GalleryEntry {
                    identity: record.identity.clone(),
                    descriptor,
                    source: record.image.clone(),
                });
            }
            Err(DescriptorError::NoFaceDetected) => {
                tracing::warn!(
                    identity = %record.identity,
                    source = %record.image,
                    "no face detected in reference image, skipping record"
                );
                warnings.push(LoadWarning::NoFaceDetected {
                    identity: record.identity.clone(),
                    source: record.image.clone(),
                });
            }
            Err(error) => {
                tracing::warn!(
                    identity = %record.identity,
                    source = %record.image,
                    %error,
                    "descriptor extraction failed, skipping record"
                );
                warnings.push(LoadWarning::ExtractionFailed {
                    identity: record.identity.clone(),
                    source: record.image.clone(),
                    error,
                });
            }
        }
    }

    tracing::info!(
        enrolled = gallery.len(),
        skipped = warnings.len(),
        "gallery load complete"
    );

    LoadReport { gallery, warnings }
}

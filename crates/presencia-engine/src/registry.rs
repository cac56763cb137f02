//! Enrollment registry: the ordered list of people to enroll and the
//! reference image for each, parsed from a TOML file.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("failed to read registry file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse registry file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("record {index} ({identity:?}): {reason}")]
    InvalidRecord {
        index: usize,
        identity: String,
        reason: String,
    },
}

/// One enrollment record: who, and which reference image to enroll from.
#[derive(Debug, Clone, Deserialize)]
pub struct EnrollmentRecord {
    pub identity: String,
    pub image: String,
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default, rename = "person")]
    persons: Vec<EnrollmentRecord>,
}

/// Parse the enrollment registry from TOML text.
///
/// File order is gallery order. Duplicate identities are tolerated here;
/// the gallery loader resolves them (first occurrence wins).
pub fn parse_registry(raw: &str) -> Result<Vec<EnrollmentRecord>, RegistryError> {
    let file: RegistryFile = toml::from_str(raw)?;

    for (index, record) in file.persons.iter().enumerate() {
        if record.identity.trim().is_empty() {
            return Err(RegistryError::InvalidRecord {
                index,
                identity: record.identity.clone(),
                reason: "identity must be non-empty".into(),
            });
        }
        if record.image.trim().is_empty() {
            return Err(RegistryError::InvalidRecord {
                index,
                identity: record.identity.clone(),
                reason: "image reference must be non-empty".into(),
            });
        }
    }

    Ok(file.persons)
}

/// Load the enrollment registry from a TOML file.
pub fn load_registry(path: &Path) -> Result<Vec<EnrollmentRecord>, RegistryError> {
    let raw = std::fs::read_to_string(path)?;
    let records = parse_registry(&raw)?;
    tracing::info!(path = %path.display(), records = records.len(), "enrollment registry loaded");
    Ok(records)
}

use std::path::PathBuf;
use std::time::Duration;

/// Default acceptance threshold. Tightened from 0.5 in earlier
/// deployments; override via `PRESENCIA_MATCH_THRESHOLD`.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.4;

/// Engine configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Euclidean distance below which a match is accepted.
    pub match_threshold: f32,
    /// Timeout in seconds for a live descriptor extraction; 0 disables.
    pub extract_timeout_secs: u64,
    /// Path to the enrollment registry TOML file.
    pub registry_path: PathBuf,
}

impl EngineConfig {
    /// Load configuration from `PRESENCIA_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            match_threshold: env_f32("PRESENCIA_MATCH_THRESHOLD", DEFAULT_MATCH_THRESHOLD),
            extract_timeout_secs: env_u64("PRESENCIA_EXTRACT_TIMEOUT_SECS", 10),
            registry_path: std::env::var("PRESENCIA_REGISTRY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("enrollment.toml")),
        }
    }

    /// Live extraction timeout as a duration; `None` when disabled.
    pub fn extract_timeout(&self) -> Option<Duration> {
        (self.extract_timeout_secs > 0).then(|| Duration::from_secs(self.extract_timeout_secs))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            extract_timeout_secs: 10,
            registry_path: PathBuf::from("enrollment.toml"),
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

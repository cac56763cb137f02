//! presencia-engine: enrollment, readiness, and verification orchestration.
//!
//! The engine builds a gallery of enrolled face descriptors through the
//! external descriptor service, tracks readiness across asynchronous
//! model and gallery loading, and runs verification attempts that match
//! a live capture against the gallery and report attendance events.

pub mod config;
pub mod engine;
pub mod loader;
pub mod readiness;
pub mod registry;
pub mod services;

pub use config::EngineConfig;
pub use engine::Engine;
pub use loader::{load_gallery, LoadReport, LoadWarning};
pub use readiness::{FailureReason, Readiness};
pub use registry::{load_registry, EnrollmentRecord, RegistryError};
pub use services::{
    AttendanceSink, CameraError, CameraSource, DescriptorError, FaceDescriptorService,
    GeolocationError, GeolocationSource,
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use presencia_core::{GeoPoint, Outcome};
use presencia_engine::{load_gallery, load_registry, Engine, EngineConfig, Readiness};
use std::path::PathBuf;
use std::sync::Arc;

mod adapters;

use adapters::{FileCameraSource, FixedGeolocation, JsonDescriptorService, JsonStdoutSink};

#[derive(Parser)]
#[command(
    name = "presencia",
    about = "Facial attendance verification over precomputed descriptors"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a live descriptor against the enrolled gallery
    Verify {
        /// Enrollment registry TOML (defaults to PRESENCIA_REGISTRY_PATH)
        #[arg(short, long)]
        registry: Option<PathBuf>,
        /// Live descriptor JSON file, standing in for the camera capture
        #[arg(short, long)]
        live: PathBuf,
        /// Override the acceptance threshold
        #[arg(short, long)]
        threshold: Option<f32>,
        /// Fixed latitude for the attendance event
        #[arg(long, requires = "lon")]
        lat: Option<f64>,
        /// Fixed longitude for the attendance event
        #[arg(long, requires = "lat")]
        lon: Option<f64>,
    },
    /// Load the gallery and list enrolled identities
    Gallery {
        /// Enrollment registry TOML (defaults to PRESENCIA_REGISTRY_PATH)
        #[arg(short, long)]
        registry: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Verify {
            registry,
            live,
            threshold,
            lat,
            lon,
        } => run_verify(registry, live, threshold, lat, lon).await,
        Commands::Gallery { registry } => run_gallery(registry).await,
    }
}

async fn run_verify(
    registry: Option<PathBuf>,
    live: PathBuf,
    threshold: Option<f32>,
    lat: Option<f64>,
    lon: Option<f64>,
) -> Result<()> {
    let mut config = EngineConfig::from_env();
    if let Some(threshold) = threshold {
        config.match_threshold = threshold;
    }
    let registry_path = registry.unwrap_or_else(|| config.registry_path.clone());
    let records = load_registry(&registry_path)?;

    let geolocation = match (lat, lon) {
        (Some(lat), Some(lon)) => FixedGeolocation::at(GeoPoint { lat, lon }),
        _ => FixedGeolocation::unavailable(),
    };

    let engine = Engine::new(
        config,
        Arc::new(JsonDescriptorService),
        Arc::new(FileCameraSource::new(live)),
        Arc::new(geolocation),
        Arc::new(JsonStdoutSink),
    );

    match engine.start(&records).await {
        Readiness::Ready => {}
        Readiness::Failed(reason) => anyhow::bail!("engine failed to become ready: {reason:?}"),
        Readiness::Loading => unreachable!("start always settles readiness"),
    }

    let attempt = engine.verify().await;
    match &attempt.outcome {
        Outcome::Accepted => {
            let identity = attempt.accepted_identity().unwrap_or("?");
            let distance = attempt.distance.unwrap_or(f32::NAN);
            println!("accepted: {identity} (distance {distance:.4})");
            Ok(())
        }
        Outcome::Rejected => {
            let distance = attempt.distance.unwrap_or(f32::NAN);
            anyhow::bail!("rejected: no enrolled identity within threshold (distance {distance:.4})")
        }
        Outcome::NoFaceDetected => anyhow::bail!("no face detected in the live capture"),
        Outcome::SystemNotReady => anyhow::bail!("system not ready"),
        Outcome::SystemError(reason) => anyhow::bail!("system error: {reason}"),
    }
}

async fn run_gallery(registry: Option<PathBuf>) -> Result<()> {
    let config = EngineConfig::from_env();
    let registry_path = registry.unwrap_or(config.registry_path);
    let records = load_registry(&registry_path)?;

    let service = JsonDescriptorService;
    let report = load_gallery(&service, &records).await;

    for entry in report.gallery.entries() {
        println!("{}  ({})", entry.identity, entry.source);
    }
    for warning in &report.warnings {
        println!("warning: {warning}");
    }

    if !report.is_usable() {
        anyhow::bail!("no usable gallery entries");
    }
    Ok(())
}

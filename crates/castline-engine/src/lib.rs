//! Publish session orchestrator for castline.
//!
//! This crate turns publish/unpublish notifications into running sessions:
//! it probes the source, plans the rendition ladder, supervises the encoder,
//! writes the master manifest, schedules thumbnails and tracks viewers.

mod config;
mod engine;
mod error;
mod metrics;
mod orchestrator;
mod registry;
mod schedule;
mod state;
mod thumbnails;
mod viewers;

pub use config::{OrchestratorConfig, DEFAULT_INGEST_URL};
pub use engine::Engine;
pub use error::{ConfigError, StartupError};
pub use metrics::{MetricsCollector, OrchestratorStats};
pub use orchestrator::Orchestrator;
pub use registry::{PublishSession, SessionInfo, SessionRegistry};
pub use schedule::ScheduledTask;
pub use state::{SessionResources, SessionStartup};
pub use thumbnails::{latest_segment, thumbnail_name, ThumbnailJob};
pub use viewers::ViewerTracker;

use std::sync::Arc;

use castline_encoder::Toolchain;
use castline_ipc::{EngineCommand, EngineEvent};
use crossbeam_channel::{Receiver, Sender};
use tokio::runtime::Handle;

/// Result type for session startup.
pub type StartupResult<T> = Result<T, StartupError>;

/// Create an engine and the orchestrator it drives.
///
/// The orchestrator is returned separately so read-side consumers (the HTTP
/// surface) can query it while the engine owns the command loop.
pub fn create_engine(
    config: OrchestratorConfig,
    toolchain: Toolchain,
    command_rx: Receiver<EngineCommand>,
    event_tx: Sender<EngineEvent>,
    runtime: Handle,
) -> Result<(Engine, Arc<Orchestrator>), ConfigError> {
    config.validate()?;
    let orchestrator = Arc::new(Orchestrator::new(config, toolchain, event_tx.clone()));
    let engine = Engine::new(command_rx, event_tx, orchestrator.clone(), runtime);
    Ok((engine, orchestrator))
}

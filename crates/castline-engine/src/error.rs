//! Error types for the engine module.

use std::path::PathBuf;

use castline_encoder::EncoderError;
use castline_ipc::{IpcError, StartupPhase};
use thiserror::Error;

/// Reasons a publish session failed to start.
///
/// A failed start leaves nothing behind: no process, no registry entry.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Source could not be probed.
    #[error("Probe failed: {0}")]
    Probe(#[source] EncoderError),

    /// Output directory could not be created.
    #[error("Failed to create output directory {path}: {source}")]
    PrepareOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Encoder process could not be started.
    #[error("Encoder spawn failed: {0}")]
    Spawn(#[source] EncoderError),

    /// Master manifest could not be written.
    #[error("Manifest write failed: {0}")]
    Manifest(#[source] EncoderError),

    /// A later publish of the same stream path registered first.
    #[error("Superseded by a newer session on the same path")]
    Superseded,

    /// Engine is shutting down and refuses new sessions.
    #[error("Engine is shutting down")]
    ShuttingDown,
}

impl StartupError {
    /// Phase in which the start was aborted.
    pub fn phase(&self) -> StartupPhase {
        match self {
            Self::Probe(_) => StartupPhase::Probe,
            Self::PrepareOutput { .. } => StartupPhase::PrepareOutput,
            Self::Spawn(_) => StartupPhase::SpawnEncoder,
            Self::Manifest(_) => StartupPhase::WriteManifest,
            Self::Superseded | Self::ShuttingDown => StartupPhase::Register,
        }
    }
}

/// Errors raised while building the orchestrator configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Encoder settings are out of range.
    #[error(transparent)]
    Encoder(#[from] IpcError),

    /// Ingest URL is not usable as a source prefix.
    #[error("Invalid ingest URL {0}: must not carry a query or fragment")]
    IngestUrl(String),

    /// A periodic interval is zero.
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
}

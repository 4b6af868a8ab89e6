//! Error types for the encoder module.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while probing, encoding or grabbing frames.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// External binary could not be started.
    #[error("Failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// Probe did not finish in time.
    #[error("Probe timed out after {0:?}")]
    ProbeTimeout(Duration),

    /// Probe exited unsuccessfully.
    #[error("Probe exited with {0}")]
    ProbeFailed(String),

    /// Probe output was not the expected JSON.
    #[error("Malformed probe output: {0}")]
    MalformedProbe(#[from] serde_json::Error),

    /// Source has no video track with usable dimensions.
    #[error("No decodable video track")]
    NoVideoTrack,

    /// Frame grab did not finish in time.
    #[error("Frame grab timed out after {0:?}")]
    GrabTimeout(Duration),

    /// Frame grab exited unsuccessfully.
    #[error("Frame grab exited with {0}")]
    GrabFailed(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

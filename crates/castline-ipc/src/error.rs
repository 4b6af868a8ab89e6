//! Error types for the IPC module.

use thiserror::Error;

/// Errors raised while parsing shared values or forwarding commands.
#[derive(Debug, Error)]
pub enum IpcError {
    /// Stream path is not of the form `/app/stream`.
    #[error("Invalid stream path: {0}")]
    InvalidStreamPath(String),

    /// Transcoding preset is not one of the supported values.
    #[error("Invalid preset: {0}")]
    InvalidPreset(String),

    /// Latency tune is not one of the supported values.
    #[error("Invalid tune: {0}")]
    InvalidTune(String),

    /// Acceleration backend is not recognized.
    #[error("Invalid acceleration: {0}")]
    InvalidAcceleration(String),

    /// Command channel is full.
    #[error("Command channel full")]
    ChannelFull,

    /// Engine is gone.
    #[error("Command channel disconnected")]
    ChannelDisconnected,
}

//! Typed lifecycle commands, events and shared stream types for castline.
//!
//! This crate defines the messages exchanged between the ingest listener,
//! the orchestrator engine and the HTTP surface, plus the value types that
//! every other crate agrees on (stream paths, renditions, directory entries).

mod commands;
mod error;
mod events;
mod path;
mod state;
mod types;

pub use commands::{EngineCommand, LifecycleHooks};
pub use error::IpcError;
pub use events::EngineEvent;
pub use path::{is_tracked_media, stream_identity_from_file, SessionId, StreamPath};
pub use state::{StartupPhase, StopReason};
pub use types::{
    Acceleration, ActiveStream, EncoderSettings, Rendition, VideoCodec, AUDIO_BITRATE_KBPS,
    VALID_PRESETS, VALID_TUNES,
};

use crossbeam_channel::{Receiver, Sender};

/// Channel capacity for commands (listener → engine).
pub const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Channel capacity for events (engine → observers).
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Result type for IPC value parsing.
pub type IpcResult<T> = Result<T, IpcError>;

/// Creates a bounded command channel.
pub fn command_channel() -> (Sender<EngineCommand>, Receiver<EngineCommand>) {
    crossbeam_channel::bounded(COMMAND_CHANNEL_CAPACITY)
}

/// Creates a bounded event channel.
pub fn event_channel() -> (Sender<EngineEvent>, Receiver<EngineEvent>) {
    crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY)
}

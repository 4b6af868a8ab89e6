//! Events sent from the engine to observers.

use serde::{Deserialize, Serialize};

use crate::path::{SessionId, StreamPath};
use crate::state::{StartupPhase, StopReason};
use crate::types::Rendition;

/// Events that the engine emits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    /// Engine is ready to accept commands.
    Ready,

    /// A session went live.
    SessionStarted {
        session_id: SessionId,
        stream_path: StreamPath,
        input_codec: String,
        renditions: Vec<Rendition>,
    },

    /// A session was torn down.
    SessionStopped {
        session_id: SessionId,
        stream_path: StreamPath,
        reason: StopReason,
    },

    /// A start was aborted; the session was never registered.
    StartupFailed {
        session_id: SessionId,
        stream_path: StreamPath,
        phase: StartupPhase,
        message: String,
    },

    /// Engine has shut down.
    Shutdown,
}

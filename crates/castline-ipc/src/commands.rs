//! Commands sent from the ingest listener to the engine.

use crossbeam_channel::{Sender, TrySendError};
use serde::{Deserialize, Serialize};

use crate::error::IpcError;
use crate::path::{SessionId, StreamPath};
use crate::IpcResult;

/// Commands that drive the engine.
///
/// For one session-id a `Start` always logically precedes its `Stop`; the
/// engine still treats a `Stop` for an unknown session as a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineCommand {
    /// A publisher has started sending a stream.
    Start {
        session_id: SessionId,
        stream_path: StreamPath,
    },

    /// A publisher has stopped sending a stream.
    Stop {
        session_id: SessionId,
        stream_path: StreamPath,
    },

    /// Tear down every live session and stop the engine.
    Shutdown,
}

impl EngineCommand {
    /// Session this command is addressed to, if any.
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::Start { session_id, .. } | Self::Stop { session_id, .. } => Some(session_id),
            Self::Shutdown => None,
        }
    }
}

/// Subscription interface for publish lifecycle notifications.
pub trait LifecycleHooks: Send + Sync {
    /// Called when a publisher starts sending `stream_path`.
    fn on_start(&self, session_id: SessionId, stream_path: StreamPath) -> IpcResult<()>;

    /// Called when a publisher stops sending `stream_path`.
    fn on_stop(&self, session_id: SessionId, stream_path: StreamPath) -> IpcResult<()>;
}

impl LifecycleHooks for Sender<EngineCommand> {
    fn on_start(&self, session_id: SessionId, stream_path: StreamPath) -> IpcResult<()> {
        forward(
            self,
            EngineCommand::Start {
                session_id,
                stream_path,
            },
        )
    }

    fn on_stop(&self, session_id: SessionId, stream_path: StreamPath) -> IpcResult<()> {
        forward(
            self,
            EngineCommand::Stop {
                session_id,
                stream_path,
            },
        )
    }
}

fn forward(tx: &Sender<EngineCommand>, command: EngineCommand) -> IpcResult<()> {
    tx.try_send(command).map_err(|e| match e {
        TrySendError::Full(_) => IpcError::ChannelFull,
        TrySendError::Disconnected(_) => IpcError::ChannelDisconnected,
    })
}

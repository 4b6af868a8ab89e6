//! Session lifecycle phase types.

use serde::{Deserialize, Serialize};

/// Startup phases of a publish session, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartupPhase {
    /// Probing the live source for codec and resolution.
    Probe,

    /// Creating the output directory.
    PrepareOutput,

    /// Spawning the encoder process.
    SpawnEncoder,

    /// Writing the master manifest.
    WriteManifest,

    /// Starting the thumbnail task and registering the session.
    Register,
}

impl StartupPhase {
    /// Returns the display name for this phase.
    pub fn name(self) -> &'static str {
        match self {
            Self::Probe => "probe",
            Self::PrepareOutput => "prepare_output",
            Self::SpawnEncoder => "spawn_encoder",
            Self::WriteManifest => "write_manifest",
            Self::Register => "register",
        }
    }
}

/// Reason a session was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The publisher unpublished.
    Unpublished,

    /// A new session claimed the same stream path.
    Replaced,

    /// The engine is shutting down.
    Shutdown,
}

impl StopReason {
    /// Returns a display message for this reason.
    pub fn message(self) -> &'static str {
        match self {
            Self::Unpublished => "Publisher stopped",
            Self::Replaced => "Replaced by a newer session for the same stream",
            Self::Shutdown => "Engine shutting down",
        }
    }
}

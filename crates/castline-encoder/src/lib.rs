//! ffprobe/ffmpeg supervision for live HLS ladders.
//!
//! This crate probes a live source, plans the codec ladder, builds the single
//! ffmpeg invocation that produces every rendition, owns the resulting
//! process, writes master manifests and extracts preview frames.

mod error;
mod ffmpeg;
mod ladder;
mod manifest;
mod probe;
mod process;

pub use error::EncoderError;
pub use ffmpeg::{build_encode_args, build_grab_args, EncodeJob, Ffmpeg, HlsSettings, ThumbnailSource};
pub use ladder::{copy_through_name, ladder_for, materialize, plan, scaled_width, RenditionSpec};
pub use manifest::{copy_through_bandwidth, generate_master, master_manifest_name, write_master};
pub use probe::{parse_probe_output, Ffprobe};
pub use process::ProcessHandle;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Default bound on a source probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on a single thumbnail frame grab.
pub const GRAB_TIMEOUT: Duration = Duration::from_secs(15);

/// Result type for encoder operations.
pub type EncoderResult<T> = Result<T, EncoderError>;

/// Encoding characteristics of a live source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMetadata {
    /// Codec name as reported by the prober (`h264`, `hevc`, `av1`, ...).
    pub codec: String,

    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,
}

/// Trait for source probers.
#[async_trait]
pub trait MediaProber: Send + Sync {
    /// Probe `locator` for its first video track.
    async fn probe(&self, locator: &str) -> EncoderResult<SourceMetadata>;
}

/// Trait for encoder process launchers.
pub trait EncodeLauncher: Send + Sync {
    /// Start the encoder for `job`. The returned handle owns the process.
    fn launch(&self, job: &EncodeJob) -> EncoderResult<ProcessHandle>;
}

/// Trait for single-frame extraction.
#[async_trait]
pub trait FrameGrabber: Send + Sync {
    /// Extract one downscaled frame from `source` and write it to `output`.
    async fn grab_frame(&self, source: &ThumbnailSource, output: &Path) -> EncoderResult<()>;
}

/// The external tools used by the orchestrator.
#[derive(Clone)]
pub struct Toolchain {
    pub prober: Arc<dyn MediaProber>,
    pub launcher: Arc<dyn EncodeLauncher>,
    pub grabber: Arc<dyn FrameGrabber>,
}

/// Create a toolchain backed by the `ffprobe` and `ffmpeg` binaries.
pub fn create_toolchain(
    ffmpeg_path: impl Into<PathBuf>,
    ffprobe_path: impl Into<PathBuf>,
    probe_timeout: Duration,
) -> Toolchain {
    let ffmpeg = Arc::new(Ffmpeg::new(ffmpeg_path));
    let ffprobe = Arc::new(Ffprobe::new(ffprobe_path, probe_timeout));
    tracing::info!(
        ffmpeg = %ffmpeg.binary().display(),
        ffprobe = %ffprobe.binary().display(),
        "Using ffmpeg toolchain"
    );
    Toolchain {
        prober: ffprobe,
        launcher: ffmpeg.clone(),
        grabber: ffmpeg,
    }
}

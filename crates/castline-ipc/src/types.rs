//! Common types shared across crates.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IpcError;
use crate::path::SessionId;
use crate::IpcResult;

/// Audio bitrate for transcoded renditions in kbps (default: 128).
pub const AUDIO_BITRATE_KBPS: u32 = 128;

/// NVENC presets accepted for `-preset`.
pub const VALID_PRESETS: [&str; 7] = ["p1", "p2", "p3", "p4", "p5", "p6", "p7"];

/// NVENC tunes accepted for `-tune`.
pub const VALID_TUNES: [&str; 4] = ["ll", "ull", "hq", "lossless"];

/// Video codecs with a transcoding ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    H264,
    Hevc,
    Av1,
}

impl VideoCodec {
    /// Map a prober codec name (`h264`, `hevc`, `av1`) to a ladder codec.
    pub fn from_probe_name(name: &str) -> Option<Self> {
        match name {
            "h264" => Some(Self::H264),
            "hevc" => Some(Self::Hevc),
            "av1" => Some(Self::Av1),
            _ => None,
        }
    }

    /// Name used in rendition file names.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::Hevc => "hevc",
            Self::Av1 => "av1",
        }
    }

    /// Whether HLS output for this codec needs fragmented MP4 segments.
    pub fn needs_fmp4(self) -> bool {
        matches!(self, Self::Av1)
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transcoded output of a session. Immutable once planned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rendition {
    /// Output name, also the sub-manifest stem (e.g. `ryuu_h264_720p`).
    pub name: String,

    /// Target codec (always the input codec).
    pub codec: VideoCodec,

    /// Target height in pixels.
    pub height: u32,

    /// Width derived from the source aspect ratio.
    pub width: u32,

    /// Target video bitrate in kbps.
    pub bitrate_kbps: u32,
}

impl Rendition {
    /// Declared bandwidth in bits per second.
    pub fn bandwidth(&self) -> u64 {
        u64::from(self.bitrate_kbps) * 1000
    }
}

/// Directory entry for one live stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveStream {
    pub id: SessionId,
    pub app_name: String,
    pub stream_identity: String,
    pub input_codec: String,
    pub renditions: Vec<Rendition>,
    pub viewer_count: usize,
    pub start_time: DateTime<Utc>,
}

/// Hardware path used for decoding, scaling and encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Acceleration {
    /// CUDA decode, `scale_cuda`, NVENC encoders.
    #[default]
    Cuda,

    /// CPU decode, `scale`, libx264/libx265/libsvtav1.
    Software,
}

impl FromStr for Acceleration {
    type Err = IpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cuda" | "nvenc" => Ok(Self::Cuda),
            "software" | "cpu" => Ok(Self::Software),
            _ => Err(IpcError::InvalidAcceleration(s.to_string())),
        }
    }
}

/// Encoder tuning applied to every transcoded rendition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderSettings {
    /// Acceleration backend.
    pub acceleration: Acceleration,

    /// Encoder preset (`p1`..`p7`, NVENC only).
    pub preset: String,

    /// Latency tune (NVENC only; None to leave the encoder default).
    pub tune: Option<String>,

    /// Audio bitrate for transcoded renditions in kbps.
    pub audio_bitrate_kbps: u32,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            acceleration: Acceleration::Cuda,
            preset: "p4".to_string(),
            tune: Some("ll".to_string()),
            audio_bitrate_kbps: AUDIO_BITRATE_KBPS,
        }
    }
}

impl EncoderSettings {
    /// Check preset and tune against the supported values.
    pub fn validate(&self) -> IpcResult<()> {
        if !VALID_PRESETS.contains(&self.preset.as_str()) {
            return Err(IpcError::InvalidPreset(self.preset.clone()));
        }
        if let Some(ref tune) = self.tune {
            if !VALID_TUNES.contains(&tune.as_str()) {
                return Err(IpcError::InvalidTune(tune.clone()));
            }
        }
        Ok(())
    }
}

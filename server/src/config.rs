//! Command-line and environment configuration.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use castline_encoder::HlsSettings;
use castline_engine::{ConfigError, OrchestratorConfig, DEFAULT_INGEST_URL};
use castline_ipc::{Acceleration, EncoderSettings};
use clap::Parser;
use url::Url;

/// castline server options. Every flag can also be set through its
/// `CASTLINE_*` environment variable.
#[derive(Debug, Clone, Parser)]
#[command(name = "castline", version, about = "RTMP publish to multi-rendition HLS")]
pub struct Args {
    /// Address of the HTTP server (publish hooks, HLS, API).
    #[arg(long, env = "CASTLINE_HTTP_ADDR", default_value = "0.0.0.0:8080")]
    pub http_addr: SocketAddr,

    /// Ingest server the encoder pulls published streams from.
    #[arg(long, env = "CASTLINE_INGEST_URL", default_value = DEFAULT_INGEST_URL)]
    pub ingest_url: Url,

    /// Directory receiving HLS output.
    #[arg(long, env = "CASTLINE_MEDIA_ROOT", default_value = "public/hls")]
    pub media_root: PathBuf,

    #[arg(long, env = "CASTLINE_FFMPEG", default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    #[arg(long, env = "CASTLINE_FFPROBE", default_value = "ffprobe")]
    pub ffprobe: PathBuf,

    /// `cuda` (NVENC) or `software`.
    #[arg(long, env = "CASTLINE_ACCELERATION", default_value = "cuda")]
    pub acceleration: Acceleration,

    /// NVENC preset, `p1` (fastest) to `p7` (best quality).
    #[arg(long, env = "CASTLINE_PRESET", default_value = "p4")]
    pub preset: String,

    /// NVENC tune (`ll`, `ull`, `hq`, `lossless`) or `none`.
    #[arg(long, env = "CASTLINE_TUNE", default_value = "ll")]
    pub tune: String,

    /// Audio bitrate of transcoded renditions in kbps.
    #[arg(long, env = "CASTLINE_AUDIO_BITRATE", default_value_t = castline_ipc::AUDIO_BITRATE_KBPS)]
    pub audio_bitrate: u32,

    #[arg(long, env = "CASTLINE_PROBE_TIMEOUT_SECS", default_value_t = 10)]
    pub probe_timeout_secs: u64,

    #[arg(long, env = "CASTLINE_THUMBNAIL_INTERVAL_SECS", default_value_t = 60)]
    pub thumbnail_interval_secs: u64,

    /// Seconds a viewer counts as present after its last fetch.
    #[arg(long, env = "CASTLINE_VIEWER_TTL_SECS", default_value_t = 30)]
    pub viewer_ttl_secs: u64,

    #[arg(long, env = "CASTLINE_SWEEP_INTERVAL_SECS", default_value_t = 10)]
    pub sweep_interval_secs: u64,

    /// Reverse proxies allowed to name the client in `X-Forwarded-For`.
    /// Repeat the flag or give a comma-separated list.
    #[arg(long = "trusted-proxy", env = "CASTLINE_TRUSTED_PROXIES", value_delimiter = ',')]
    pub trusted_proxies: Vec<IpAddr>,

    /// Emit logs as JSON lines.
    #[arg(long, env = "CASTLINE_LOG_JSON")]
    pub log_json: bool,
}

impl Args {
    /// Build and validate the orchestrator configuration.
    pub fn orchestrator_config(&self) -> Result<OrchestratorConfig, ConfigError> {
        let tune = match self.tune.as_str() {
            "" | "none" => None,
            tune => Some(tune.to_string()),
        };
        let config = OrchestratorConfig {
            media_root: self.media_root.clone(),
            ingest_url: self.ingest_url.clone(),
            encoder: EncoderSettings {
                acceleration: self.acceleration,
                preset: self.preset.clone(),
                tune,
                audio_bitrate_kbps: self.audio_bitrate,
            },
            hls: HlsSettings::default(),
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
            thumbnail_interval: Duration::from_secs(self.thumbnail_interval_secs),
            viewer_ttl: Duration::from_secs(self.viewer_ttl_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
        };
        config.validate()?;
        Ok(config)
    }
}

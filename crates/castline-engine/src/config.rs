//! Orchestrator configuration.

use std::path::PathBuf;
use std::time::Duration;

use castline_encoder::{HlsSettings, PROBE_TIMEOUT};
use castline_ipc::{EncoderSettings, StreamPath};
use url::Url;

use crate::error::ConfigError;

/// Default ingest server the encoder pulls sources from.
pub const DEFAULT_INGEST_URL: &str = "rtmp://127.0.0.1:1935";

/// Runtime settings for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Root directory for HLS output; each app gets a sub-directory.
    pub media_root: PathBuf,

    /// Ingest server base URL.
    pub ingest_url: Url,

    pub encoder: EncoderSettings,
    pub hls: HlsSettings,

    /// Upper bound on a source probe.
    pub probe_timeout: Duration,

    /// Period of the per-session thumbnail task.
    pub thumbnail_interval: Duration,

    /// How long a viewer counts as present after its last fetch.
    pub viewer_ttl: Duration,

    /// Period of the viewer sweep.
    pub sweep_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("public/hls"),
            ingest_url: Url::parse(DEFAULT_INGEST_URL).expect("default ingest URL is valid"),
            encoder: EncoderSettings::default(),
            hls: HlsSettings::default(),
            probe_timeout: PROBE_TIMEOUT,
            thumbnail_interval: Duration::from_secs(60),
            viewer_ttl: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(10),
        }
    }
}

impl OrchestratorConfig {
    /// Check the configuration before the engine starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.encoder.validate()?;

        if self.ingest_url.query().is_some() || self.ingest_url.fragment().is_some() {
            return Err(ConfigError::IngestUrl(self.ingest_url.to_string()));
        }

        for (name, value) in [
            ("probe timeout", self.probe_timeout),
            ("thumbnail interval", self.thumbnail_interval),
            ("viewer TTL", self.viewer_ttl),
            ("sweep interval", self.sweep_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroInterval(name));
            }
        }
        Ok(())
    }

    /// URL the encoder and prober read a published stream from.
    pub fn source_locator(&self, path: &StreamPath) -> String {
        format!(
            "{}/{}/{}",
            self.ingest_url.as_str().trim_end_matches('/'),
            path.app(),
            path.stream()
        )
    }

    /// Directory receiving every output of an app.
    pub fn output_dir(&self, path: &StreamPath) -> PathBuf {
        self.media_root.join(path.app())
    }
}

//! Source probing via ffprobe.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::error::EncoderError;
use crate::{EncoderResult, MediaProber, SourceMetadata};

/// ffprobe-backed prober with a bounded run time.
pub struct Ffprobe {
    binary: PathBuf,
    timeout: Duration,
}

impl Ffprobe {
    /// Create a prober for the given binary.
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// Path of the ffprobe binary.
    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

#[async_trait]
impl MediaProber for Ffprobe {
    #[instrument(name = "probe", skip(self))]
    async fn probe(&self, locator: &str) -> EncoderResult<SourceMetadata> {
        let child = Command::new(&self.binary)
            .args(["-v", "quiet", "-print_format", "json", "-show_streams"])
            .arg(locator)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EncoderError::Spawn {
                binary: self.binary.display().to_string(),
                source,
            })?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| EncoderError::ProbeTimeout(self.timeout))??;

        if !output.status.success() {
            return Err(EncoderError::ProbeFailed(output.status.to_string()));
        }

        let metadata = parse_probe_output(&output.stdout)?;
        debug!(
            codec = %metadata.codec,
            width = metadata.width,
            height = metadata.height,
            "Probe succeeded"
        );
        Ok(metadata)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Parse `ffprobe -print_format json -show_streams` output.
///
/// Picks the first video stream that has a codec name and non-zero
/// dimensions.
pub fn parse_probe_output(stdout: &[u8]) -> EncoderResult<SourceMetadata> {
    let output: ProbeOutput = serde_json::from_slice(stdout)?;

    output
        .streams
        .into_iter()
        .filter(|s| s.codec_type.as_deref() == Some("video"))
        .find_map(|s| match (s.codec_name, s.width, s.height) {
            (Some(codec), Some(width), Some(height)) if width > 0 && height > 0 => {
                Some(SourceMetadata {
                    codec,
                    width,
                    height,
                })
            }
            _ => None,
        })
        .ok_or(EncoderError::NoVideoTrack)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_picks_first_video_stream() {
        let json = br#"{
            "streams": [
                {"index": 0, "codec_type": "audio", "codec_name": "aac", "sample_rate": "48000"},
                {"index": 1, "codec_type": "video", "codec_name": "hevc", "width": 2560, "height": 1440},
                {"index": 2, "codec_type": "video", "codec_name": "h264", "width": 640, "height": 360}
            ]
        }"#;

        let metadata = parse_probe_output(json).unwrap();
        assert_eq!(
            metadata,
            SourceMetadata {
                codec: "hevc".into(),
                width: 2560,
                height: 1440,
            }
        );
    }

    #[test]
    fn test_parse_rejects_audio_only_source() {
        let json = br#"{"streams": [{"codec_type": "audio", "codec_name": "aac"}]}"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(EncoderError::NoVideoTrack)
        ));
    }

    #[test]
    fn test_parse_rejects_video_without_dimensions() {
        let json = br#"{"streams": [{"codec_type": "video", "codec_name": "h264", "width": 0, "height": 0}]}"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(EncoderError::NoVideoTrack)
        ));
    }

    #[test]
    fn test_parse_rejects_malformed_output() {
        assert!(matches!(
            parse_probe_output(b"not json"),
            Err(EncoderError::MalformedProbe(_))
        ));
    }

    #[tokio::test]
    async fn test_probe_reports_missing_binary() {
        let prober = Ffprobe::new("/nonexistent/ffprobe", Duration::from_secs(1));
        let err = prober.probe("rtmp://127.0.0.1/live/x").await.unwrap_err();
        assert!(matches!(err, EncoderError::Spawn { .. }));
    }
}

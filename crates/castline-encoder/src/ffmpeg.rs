//! ffmpeg invocations: the per-session HLS encode and thumbnail grabs.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use castline_ipc::{Acceleration, EncoderSettings, Rendition, VideoCodec};
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::error::EncoderError;
use crate::ladder::copy_through_name;
use crate::process::ProcessHandle;
use crate::{EncodeLauncher, EncoderResult, FrameGrabber, SourceMetadata, GRAB_TIMEOUT};

/// Width of extracted thumbnails in pixels.
pub const THUMBNAIL_WIDTH: u32 = 320;

/// HLS muxer settings shared by every output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HlsSettings {
    /// Target segment duration in seconds.
    pub segment_secs: u32,

    /// Number of segments kept in each playlist.
    pub list_size: u32,
}

impl Default for HlsSettings {
    fn default() -> Self {
        Self {
            segment_secs: 4,
            list_size: 10,
        }
    }
}

/// Everything needed to start the encoder for one session.
#[derive(Debug, Clone)]
pub struct EncodeJob {
    /// Source URL the encoder pulls from.
    pub locator: String,

    /// Directory receiving playlists and segments.
    pub output_dir: PathBuf,

    /// Stream identity; prefix of every output name.
    pub stream: String,

    /// Probed source characteristics.
    pub source: SourceMetadata,

    /// Transcoded renditions. Copy-through is always added.
    pub renditions: Vec<Rendition>,

    pub settings: EncoderSettings,
    pub hls: HlsSettings,
}

/// Input of a thumbnail grab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailSource {
    /// Self-contained MPEG-TS segment.
    Segment(PathBuf),

    /// fMP4 fragment that needs its init section.
    Fragment { init: PathBuf, segment: PathBuf },
}

impl ThumbnailSource {
    /// Value passed to ffmpeg's `-i`.
    pub fn input_arg(&self) -> String {
        match self {
            Self::Segment(path) => path.display().to_string(),
            Self::Fragment { init, segment } => {
                format!("concat:{}|{}", init.display(), segment.display())
            }
        }
    }
}

fn encoder_name(codec: VideoCodec, acceleration: Acceleration) -> &'static str {
    match (acceleration, codec) {
        (Acceleration::Cuda, VideoCodec::H264) => "h264_nvenc",
        (Acceleration::Cuda, VideoCodec::Hevc) => "hevc_nvenc",
        (Acceleration::Cuda, VideoCodec::Av1) => "av1_nvenc",
        (Acceleration::Software, VideoCodec::H264) => "libx264",
        (Acceleration::Software, VideoCodec::Hevc) => "libx265",
        (Acceleration::Software, VideoCodec::Av1) => "libsvtav1",
    }
}

fn push_hls_output(
    args: &mut Vec<String>,
    job: &EncodeJob,
    name: &str,
    fmp4: bool,
) {
    let dir = &job.output_dir;
    args.extend([
        "-f".to_string(),
        "hls".to_string(),
        "-hls_time".to_string(),
        job.hls.segment_secs.to_string(),
        "-hls_list_size".to_string(),
        job.hls.list_size.to_string(),
        "-hls_flags".to_string(),
        "delete_segments".to_string(),
    ]);

    let extension = if fmp4 {
        args.extend([
            "-hls_segment_type".to_string(),
            "fmp4".to_string(),
            "-hls_fmp4_init_filename".to_string(),
            format!("{name}_init.mp4"),
        ]);
        "m4s"
    } else {
        "ts"
    };

    args.push("-hls_segment_filename".to_string());
    args.push(dir.join(format!("{name}_%03d.{extension}")).display().to_string());
    args.push(dir.join(format!("{name}.m3u8")).display().to_string());
}

/// Build the ffmpeg argument list for a session.
///
/// One input, one copy-through output and one output per rendition, all HLS.
pub fn build_encode_args(job: &EncodeJob) -> Vec<String> {
    let settings = &job.settings;
    let cuda = settings.acceleration == Acceleration::Cuda;

    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "warning", "-nostats"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    if cuda {
        args.extend(
            ["-hwaccel", "cuda", "-hwaccel_output_format", "cuda"]
                .iter()
                .map(|s| s.to_string()),
        );
    }
    args.push("-i".to_string());
    args.push(job.locator.clone());

    // Copy-through keeps the source codec, so its container follows it.
    let source_fmp4 = VideoCodec::from_probe_name(&job.source.codec)
        .is_some_and(VideoCodec::needs_fmp4);
    args.extend(
        ["-map", "0:v:0", "-map", "0:a?", "-c:v", "copy", "-c:a", "copy"]
            .iter()
            .map(|s| s.to_string()),
    );
    push_hls_output(&mut args, job, &copy_through_name(&job.stream), source_fmp4);

    for rendition in &job.renditions {
        args.extend(
            ["-map", "0:v:0", "-map", "0:a?", "-c:v"]
                .iter()
                .map(|s| s.to_string()),
        );
        args.push(encoder_name(rendition.codec, settings.acceleration).to_string());

        if cuda {
            args.push("-preset".to_string());
            args.push(settings.preset.clone());
            if let Some(ref tune) = settings.tune {
                args.push("-tune".to_string());
                args.push(tune.clone());
            }
        } else {
            args.push("-preset".to_string());
            args.push(match rendition.codec {
                VideoCodec::Av1 => "8".to_string(),
                _ => "veryfast".to_string(),
            });
        }

        let scale = if cuda { "scale_cuda" } else { "scale" };
        args.extend([
            "-b:v".to_string(),
            format!("{}k", rendition.bitrate_kbps),
            "-force_key_frames".to_string(),
            format!("expr:gte(t,n_forced*{})", job.hls.segment_secs),
            "-vf".to_string(),
            format!("{scale}={}:{}", rendition.width, rendition.height),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            format!("{}k", settings.audio_bitrate_kbps),
        ]);
        push_hls_output(&mut args, job, &rendition.name, rendition.codec.needs_fmp4());
    }

    args
}

/// Build the ffmpeg argument list for a single-frame grab.
pub fn build_grab_args(source: &ThumbnailSource, output: &Path) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-y".to_string(),
        "-i".to_string(),
        source.input_arg(),
        "-frames:v".to_string(),
        "1".to_string(),
        "-vf".to_string(),
        format!("scale={THUMBNAIL_WIDTH}:-2"),
        "-f".to_string(),
        "mjpeg".to_string(),
        output.display().to_string(),
    ]
}

/// The ffmpeg binary.
pub struct Ffmpeg {
    binary: PathBuf,
}

impl Ffmpeg {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl EncodeLauncher for Ffmpeg {
    #[instrument(name = "ffmpeg_launch", skip_all, fields(stream = %job.stream))]
    fn launch(&self, job: &EncodeJob) -> EncoderResult<ProcessHandle> {
        let args = build_encode_args(job);
        debug!(renditions = job.renditions.len(), args = ?args, "Launching encoder");

        let mut command = Command::new(&self.binary);
        command.args(&args);
        ProcessHandle::spawn(command, format!("ffmpeg:{}", job.stream))
    }
}

#[async_trait]
impl FrameGrabber for Ffmpeg {
    async fn grab_frame(&self, source: &ThumbnailSource, output: &Path) -> EncoderResult<()> {
        let staging = output.with_extension("jpg.tmp");

        let mut child = Command::new(&self.binary)
            .args(build_grab_args(source, &staging))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EncoderError::Spawn {
                binary: self.binary.display().to_string(),
                source,
            })?;

        let status = match tokio::time::timeout(GRAB_TIMEOUT, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                let _ = child.kill().await;
                let _ = tokio::fs::remove_file(&staging).await;
                return Err(EncoderError::GrabTimeout(GRAB_TIMEOUT));
            }
        };

        if !status.success() {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(EncoderError::GrabFailed(status.to_string()));
        }

        tokio::fs::rename(&staging, output).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(codec: &str, acceleration: Acceleration) -> EncodeJob {
        let source = SourceMetadata {
            codec: codec.into(),
            width: 1920,
            height: 1080,
        };
        let specs = crate::plan(codec, source.height);
        EncodeJob {
            locator: "rtmp://127.0.0.1:1935/live/ryuu".into(),
            output_dir: PathBuf::from("/srv/hls/live"),
            stream: "ryuu".into(),
            renditions: crate::materialize("ryuu", &source, &specs),
            source,
            settings: EncoderSettings {
                acceleration,
                ..Default::default()
            },
            hls: HlsSettings::default(),
        }
    }

    fn count(args: &[String], needle: &str) -> usize {
        args.iter().filter(|a| a.as_str() == needle).count()
    }

    #[test]
    fn test_single_input_with_one_output_per_rendition() {
        let args = build_encode_args(&job("h264", Acceleration::Cuda));

        assert_eq!(count(&args, "-i"), 1);
        assert_eq!(count(&args, "hls"), 3);
        assert!(args.contains(&"/srv/hls/live/ryuu_src.m3u8".to_string()));
        assert!(args.contains(&"/srv/hls/live/ryuu_h264_1080p.m3u8".to_string()));
        assert!(args.contains(&"/srv/hls/live/ryuu_h264_720p.m3u8".to_string()));
        assert!(args.contains(&"/srv/hls/live/ryuu_h264_720p_%03d.ts".to_string()));
    }

    #[test]
    fn test_cuda_uses_nvenc_and_scale_cuda() {
        let args = build_encode_args(&job("hevc", Acceleration::Cuda));

        assert!(args.windows(2).any(|w| w[0] == "-hwaccel" && w[1] == "cuda"));
        assert_eq!(count(&args, "hevc_nvenc"), 2);
        assert!(args.contains(&"scale_cuda=1280:720".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "-preset" && w[1] == "p4"));
        assert!(args.windows(2).any(|w| w[0] == "-tune" && w[1] == "ll"));
        assert!(args.contains(&"3000k".to_string()));
    }

    #[test]
    fn test_software_uses_cpu_encoders() {
        let args = build_encode_args(&job("h264", Acceleration::Software));

        assert_eq!(count(&args, "-hwaccel"), 0);
        assert_eq!(count(&args, "libx264"), 2);
        assert!(args.contains(&"scale=1920:1080".to_string()));
        assert_eq!(count(&args, "-tune"), 0);
    }

    #[test]
    fn test_av1_outputs_use_fmp4() {
        let args = build_encode_args(&job("av1", Acceleration::Cuda));

        // Copy-through plus two AV1 tiers.
        assert_eq!(count(&args, "fmp4"), 3);
        assert!(args.contains(&"ryuu_src_init.mp4".to_string()));
        assert!(args.contains(&"ryuu_av1_720p_init.mp4".to_string()));
        assert!(args.contains(&"/srv/hls/live/ryuu_av1_1080p_%03d.m4s".to_string()));
    }

    #[test]
    fn test_unknown_codec_is_copy_through_only() {
        let args = build_encode_args(&job("vp9", Acceleration::Cuda));
        assert_eq!(count(&args, "hls"), 1);
        assert_eq!(count(&args, "copy"), 2);
    }

    #[test]
    fn test_grab_args_read_fragment_with_init() {
        let source = ThumbnailSource::Fragment {
            init: PathBuf::from("/hls/live/ryuu_src_init.mp4"),
            segment: PathBuf::from("/hls/live/ryuu_src_004.m4s"),
        };
        let args = build_grab_args(&source, Path::new("/hls/live/ryuu_thumb.jpg.tmp"));

        assert!(args.contains(
            &"concat:/hls/live/ryuu_src_init.mp4|/hls/live/ryuu_src_004.m4s".to_string()
        ));
        assert!(args.contains(&"scale=320:-2".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("/hls/live/ryuu_thumb.jpg.tmp"));
    }
}

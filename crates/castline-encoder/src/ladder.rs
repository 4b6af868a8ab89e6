//! Codec ladder planning.

use castline_ipc::{Rendition, VideoCodec};

use crate::SourceMetadata;

/// One planned tier before names and widths are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenditionSpec {
    pub codec: VideoCodec,
    pub height: u32,
    pub bitrate_kbps: u32,
}

const H264_LADDER: [(u32, u32); 3] = [(2160, 12000), (1080, 4500), (720, 2048)];
const HEVC_LADDER: [(u32, u32); 3] = [(2160, 8000), (1080, 3000), (720, 1500)];
const AV1_LADDER: [(u32, u32); 3] = [(2160, 6000), (1080, 2500), (720, 1200)];

/// Ladder tiers for a codec as `(height, kbps)`, highest first.
pub fn ladder_for(codec: VideoCodec) -> &'static [(u32, u32)] {
    match codec {
        VideoCodec::H264 => &H264_LADDER,
        VideoCodec::Hevc => &HEVC_LADDER,
        VideoCodec::Av1 => &AV1_LADDER,
    }
}

/// Plan the transcoded tiers for a source.
///
/// Tiers taller than the source are skipped. An unrecognized codec yields an
/// empty plan and the session runs copy-through only.
pub fn plan(input_codec: &str, source_height: u32) -> Vec<RenditionSpec> {
    let Some(codec) = VideoCodec::from_probe_name(input_codec) else {
        return Vec::new();
    };

    ladder_for(codec)
        .iter()
        .filter(|(height, _)| *height <= source_height)
        .map(|&(height, bitrate_kbps)| RenditionSpec {
            codec,
            height,
            bitrate_kbps,
        })
        .collect()
}

/// Name of the copy-through output for a stream.
pub fn copy_through_name(stream: &str) -> String {
    format!("{stream}_src")
}

/// Width for `height` keeping the source aspect ratio, rounded to even.
pub fn scaled_width(source: &SourceMetadata, height: u32) -> u32 {
    if source.height == 0 {
        return 0;
    }
    let exact = f64::from(source.width) * f64::from(height) / f64::from(source.height);
    let width = (exact / 2.0).round() as u32 * 2;
    width.max(2)
}

/// Turn planned tiers into named renditions for `stream`.
pub fn materialize(
    stream: &str,
    source: &SourceMetadata,
    specs: &[RenditionSpec],
) -> Vec<Rendition> {
    specs
        .iter()
        .map(|spec| Rendition {
            name: format!("{stream}_{}_{}p", spec.codec, spec.height),
            codec: spec.codec,
            height: spec.height,
            width: scaled_width(source, spec.height),
            bitrate_kbps: spec.bitrate_kbps,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(width: u32, height: u32) -> SourceMetadata {
        SourceMetadata {
            codec: "h264".into(),
            width,
            height,
        }
    }

    #[test]
    fn test_1080p_h264_gets_two_tiers() {
        let specs = plan("h264", 1080);
        let heights: Vec<u32> = specs.iter().map(|s| s.height).collect();
        assert_eq!(heights, vec![1080, 720]);
        assert_eq!(specs[0].bitrate_kbps, 4500);
        assert_eq!(specs[1].bitrate_kbps, 2048);
        assert!(specs.iter().all(|s| s.codec == VideoCodec::H264));
    }

    #[test]
    fn test_never_upscales() {
        for codec in ["h264", "hevc", "av1"] {
            for height in [360, 720, 900, 1080, 1440, 2160, 4320] {
                assert!(plan(codec, height).iter().all(|s| s.height <= height));
            }
        }
        assert!(plan("h264", 480).is_empty());
    }

    #[test]
    fn test_unknown_codec_plans_nothing() {
        assert!(plan("vp9", 2160).is_empty());
        assert!(plan("", 1080).is_empty());
    }

    #[test]
    fn test_4k_av1_keeps_every_tier() {
        let specs = plan("av1", 2160);
        let bitrates: Vec<u32> = specs.iter().map(|s| s.bitrate_kbps).collect();
        assert_eq!(bitrates, vec![6000, 2500, 1200]);
    }

    #[test]
    fn test_materialize_names_and_widths() {
        let renditions = materialize("ryuu", &source(1920, 1080), &plan("h264", 1080));
        assert_eq!(renditions[0].name, "ryuu_h264_1080p");
        assert_eq!(renditions[0].width, 1920);
        assert_eq!(renditions[1].name, "ryuu_h264_720p");
        assert_eq!(renditions[1].width, 1280);
    }

    #[test]
    fn test_scaled_width_rounds_to_even() {
        // 1366x768 at 720p is 1280.625 wide.
        assert_eq!(scaled_width(&source(1366, 768), 720), 1280);
        // Ultra-wide 2560x1080 at 720p.
        assert_eq!(scaled_width(&source(2560, 1080), 720), 1706);
        assert_eq!(scaled_width(&source(1440, 1080), 720) % 2, 0);
    }

    #[test]
    fn test_copy_through_name() {
        assert_eq!(copy_through_name("ryuu"), "ryuu_src");
    }
}

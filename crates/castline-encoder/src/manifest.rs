//! HLS master manifest generation.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use castline_ipc::Rendition;

use crate::ladder::copy_through_name;
use crate::{EncoderResult, SourceMetadata};

/// File name of a stream's master manifest.
pub fn master_manifest_name(stream: &str) -> String {
    format!("{stream}_master.m3u8")
}

/// Declared bandwidth of the copy-through output, bucketed by source height.
pub fn copy_through_bandwidth(source_height: u32) -> u64 {
    match source_height {
        h if h >= 2160 => 16_000_000,
        h if h >= 1440 => 9_000_000,
        h if h >= 1080 => 6_000_000,
        h if h >= 720 => 3_000_000,
        _ => 1_500_000,
    }
}

fn push_variant(out: &mut String, bandwidth: u64, width: u32, height: u32, name: &str) {
    let _ = writeln!(
        out,
        "#EXT-X-STREAM-INF:BANDWIDTH={bandwidth},RESOLUTION={width}x{height},NAME=\"{name}\""
    );
    let _ = writeln!(out, "{name}.m3u8");
}

/// Render the master manifest: copy-through first, then each rendition.
pub fn generate_master(stream: &str, source: &SourceMetadata, renditions: &[Rendition]) -> String {
    let mut out = String::from("#EXTM3U\n#EXT-X-VERSION:7\n#EXT-X-INDEPENDENT-SEGMENTS\n");

    push_variant(
        &mut out,
        copy_through_bandwidth(source.height),
        source.width,
        source.height,
        &copy_through_name(stream),
    );
    for rendition in renditions {
        push_variant(
            &mut out,
            rendition.bandwidth(),
            rendition.width,
            rendition.height,
            &rendition.name,
        );
    }

    out
}

/// Write the master manifest into `dir`, replacing any previous one atomically.
pub async fn write_master(dir: &Path, stream: &str, text: &str) -> EncoderResult<PathBuf> {
    let path = dir.join(master_manifest_name(stream));
    let staging = path.with_extension("m3u8.tmp");

    tokio::fs::write(&staging, text).await?;
    if let Err(e) = tokio::fs::rename(&staging, &path).await {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(e.into());
    }
    Ok(path)
}

//! Session and stream identifiers.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::IpcError;
use crate::IpcResult;

/// Opaque session identifier assigned by the ingest listener.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Publish path of a stream: `/app/stream`.
///
/// Both segments end up in file names on disk, so they are restricted to
/// ASCII alphanumerics, `-` and `_`. Serialized as the `/app/stream`
/// string and validated again when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StreamPath {
    app: String,
    stream: String,
}

impl StreamPath {
    /// Build a path from its two segments.
    pub fn new(app: &str, stream: &str) -> IpcResult<Self> {
        if !is_valid_segment(app) || !is_valid_segment(stream) {
            return Err(IpcError::InvalidStreamPath(format!("/{app}/{stream}")));
        }
        Ok(Self {
            app: app.to_string(),
            stream: stream.to_string(),
        })
    }

    /// Application segment (e.g. `live`).
    pub fn app(&self) -> &str {
        &self.app
    }

    /// Stream identity segment (e.g. the stream key).
    pub fn stream(&self) -> &str {
        &self.stream
    }
}

impl FromStr for StreamPath {
    type Err = IpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_prefix('/').unwrap_or(s);
        let mut parts = trimmed.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(app), Some(stream), None) => Self::new(app, stream),
            _ => Err(IpcError::InvalidStreamPath(s.to_string())),
        }
    }
}

impl TryFrom<String> for StreamPath {
    type Error = IpcError;

    fn try_from(s: String) -> IpcResult<Self> {
        s.parse()
    }
}

impl From<StreamPath> for String {
    fn from(path: StreamPath) -> Self {
        path.to_string()
    }
}

impl fmt::Display for StreamPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.app, self.stream)
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// File-name suffixes produced for one stream: copy-through and ladder
/// renditions (optionally followed by a segment number or `init`), the
/// master manifest and the thumbnail.
static OUTPUT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<stream>.+?)_(?:(?:src|[a-z0-9]+_\d+p)(?:_(?:\d+|init))?|master|thumb)$")
        .expect("output name pattern is valid")
});

/// Extract the stream identity from an output file name.
///
/// `ryuu_h264_720p_003.ts`, `ryuu_src.m3u8` and `ryuu_master.m3u8` all map
/// to `ryuu`. Returns `None` for names castline never writes.
pub fn stream_identity_from_file(file_name: &str) -> Option<&str> {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _ext)) => stem,
        None => file_name,
    };
    OUTPUT_NAME
        .captures(stem)
        .and_then(|caps| caps.name("stream"))
        .map(|m| m.as_str())
}

/// Whether a fetched file is a playlist or media segment (counts as viewing).
pub fn is_tracked_media(file_name: &str) -> bool {
    matches!(
        file_name.rsplit_once('.').map(|(_, ext)| ext),
        Some("m3u8" | "ts" | "m4s" | "mp4")
    )
}

//! Periodic preview frames for live sessions.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use castline_encoder::{FrameGrabber, ThumbnailSource};
use castline_ipc::stream_identity_from_file;
use tracing::{debug, trace, warn};

use crate::metrics::MetricsCollector;
use crate::schedule::ScheduledTask;

/// File name of a stream's thumbnail.
pub fn thumbnail_name(stream: &str) -> String {
    format!("{stream}_thumb.jpg")
}

/// Find the most recently modified segment of `stream` in `dir`.
///
/// fMP4 fragments are paired with their rendition's init file.
pub async fn latest_segment(dir: &Path, stream: &str) -> io::Result<Option<ThumbnailSource>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !(name.ends_with(".ts") || name.ends_with(".m4s")) {
            continue;
        }
        if stream_identity_from_file(name) != Some(stream) {
            continue;
        }
        // Segments are deleted as the window rolls; skip ones that vanished.
        let Ok(modified) = entry.metadata().await.and_then(|m| m.modified()) else {
            continue;
        };
        if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
            newest = Some((modified, entry.path()));
        }
    }

    Ok(newest.map(|(_, path)| thumbnail_source(path)))
}

fn thumbnail_source(segment: PathBuf) -> ThumbnailSource {
    if segment.extension().is_some_and(|ext| ext == "m4s") {
        let init = segment
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.rsplit_once('_'))
            .map(|(rendition, _number)| segment.with_file_name(format!("{rendition}_init.mp4")));
        if let Some(init) = init {
            return ThumbnailSource::Fragment { init, segment };
        }
    }
    ThumbnailSource::Segment(segment)
}

/// One session's thumbnail job.
pub struct ThumbnailJob {
    dir: PathBuf,
    stream: String,
    grabber: Arc<dyn FrameGrabber>,
    metrics: Arc<MetricsCollector>,
}

impl ThumbnailJob {
    pub fn new(
        dir: PathBuf,
        stream: impl Into<String>,
        grabber: Arc<dyn FrameGrabber>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            dir,
            stream: stream.into(),
            grabber,
            metrics,
        }
    }

    /// Grab one frame from the newest segment. Never fails the session.
    pub async fn run_once(&self) {
        let source = match latest_segment(&self.dir, &self.stream).await {
            Ok(Some(source)) => source,
            Ok(None) => {
                trace!(stream = %self.stream, "No segment yet, skipping thumbnail");
                self.metrics.record_thumbnail_skipped();
                return;
            }
            Err(e) => {
                warn!(stream = %self.stream, error = %e, "Failed to scan output directory");
                self.metrics.record_thumbnail_failed();
                return;
            }
        };

        let output = self.dir.join(thumbnail_name(&self.stream));
        match self.grabber.grab_frame(&source, &output).await {
            Ok(()) => {
                debug!(stream = %self.stream, "Thumbnail updated");
                self.metrics.record_thumbnail_written();
            }
            Err(e) => {
                warn!(stream = %self.stream, error = %e, "Thumbnail grab failed");
                self.metrics.record_thumbnail_failed();
            }
        }
    }

    /// Run this job every `period` until the returned task is cancelled.
    pub fn schedule(self, period: Duration) -> ScheduledTask {
        let name = format!("thumbnails:{}", self.stream);
        let job = Arc::new(self);
        ScheduledTask::every(name, period, move || {
            let job = job.clone();
            async move { job.run_once().await }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use castline_encoder::EncoderResult;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingGrabber {
        sources: Mutex<Vec<ThumbnailSource>>,
    }

    #[async_trait]
    impl FrameGrabber for RecordingGrabber {
        async fn grab_frame(&self, source: &ThumbnailSource, output: &Path) -> EncoderResult<()> {
            self.sources.lock().push(source.clone());
            tokio::fs::write(output, b"jpeg").await?;
            Ok(())
        }
    }

    fn touch(dir: &Path, name: &str, age_secs: u64) {
        let path = dir.join(name);
        std::fs::write(&path, b"x").unwrap();
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
    }

    #[tokio::test]
    async fn test_latest_segment_picks_newest_of_stream() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "ryuu_src_001.ts", 20);
        touch(dir.path(), "ryuu_h264_720p_002.ts", 5);
        touch(dir.path(), "ryuu_src.m3u8", 0);
        touch(dir.path(), "other_src_009.ts", 0);

        let source = latest_segment(dir.path(), "ryuu").await.unwrap();
        assert_eq!(
            source,
            Some(ThumbnailSource::Segment(dir.path().join("ryuu_h264_720p_002.ts")))
        );
    }

    #[tokio::test]
    async fn test_fragment_is_paired_with_init() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "cam_av1_1080p_init.mp4", 0);
        touch(dir.path(), "cam_av1_1080p_004.m4s", 1);

        let source = latest_segment(dir.path(), "cam").await.unwrap();
        assert_eq!(
            source,
            Some(ThumbnailSource::Fragment {
                init: dir.path().join("cam_av1_1080p_init.mp4"),
                segment: dir.path().join("cam_av1_1080p_004.m4s"),
            })
        );
    }

    #[tokio::test]
    async fn test_run_once_skips_without_segments() {
        let dir = tempfile::tempdir().unwrap();
        let grabber = Arc::new(RecordingGrabber::default());
        let metrics = Arc::new(MetricsCollector::new());
        let job = ThumbnailJob::new(dir.path().to_path_buf(), "ryuu", grabber.clone(), metrics.clone());

        job.run_once().await;
        assert!(grabber.sources.lock().is_empty());
        assert_eq!(metrics.snapshot(0).thumbnails_skipped, 1);
        assert!(!dir.path().join("ryuu_thumb.jpg").exists());
    }

    #[tokio::test]
    async fn test_run_once_writes_thumbnail() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "ryuu_src_003.ts", 0);
        let grabber = Arc::new(RecordingGrabber::default());
        let metrics = Arc::new(MetricsCollector::new());
        let job = ThumbnailJob::new(dir.path().to_path_buf(), "ryuu", grabber.clone(), metrics.clone());

        job.run_once().await;
        assert_eq!(grabber.sources.lock().len(), 1);
        assert_eq!(metrics.snapshot(0).thumbnails_written, 1);
        assert!(dir.path().join("ryuu_thumb.jpg").exists());
    }
}

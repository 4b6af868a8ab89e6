//! Test fixtures: an orchestrator with fake tools and a captured command
//! channel.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::connect_info::MockConnectInfo;
use axum::Router;
use castline_encoder::{
    EncodeJob, EncodeLauncher, EncoderResult, FrameGrabber, MediaProber, ProcessHandle,
    SourceMetadata, ThumbnailSource, Toolchain,
};
use castline_engine::{Orchestrator, OrchestratorConfig};
use castline_ipc::{EngineCommand, EngineEvent};
use crossbeam_channel::Receiver;
use tokio::process::Command;

use crate::{create_router, HttpState};

struct FixedProber;

#[async_trait]
impl MediaProber for FixedProber {
    async fn probe(&self, _locator: &str) -> EncoderResult<SourceMetadata> {
        Ok(SourceMetadata {
            codec: "h264".into(),
            width: 1920,
            height: 1080,
        })
    }
}

struct SleepLauncher;

impl EncodeLauncher for SleepLauncher {
    fn launch(&self, _job: &EncodeJob) -> EncoderResult<ProcessHandle> {
        let mut command = Command::new("sleep");
        command.arg("30");
        ProcessHandle::spawn(command, "fake-ffmpeg")
    }
}

struct NoopGrabber;

#[async_trait]
impl FrameGrabber for NoopGrabber {
    async fn grab_frame(&self, _source: &ThumbnailSource, _output: &Path) -> EncoderResult<()> {
        Ok(())
    }
}

const PEER: SocketAddr = SocketAddr::new(IpAddr::V4(std::net::Ipv4Addr::LOCALHOST), 40000);

pub(crate) struct TestServer {
    pub orchestrator: Arc<Orchestrator>,
    pub commands: Receiver<EngineCommand>,
    pub _events: Receiver<EngineEvent>,
    state: HttpState,
    media_root: tempfile::TempDir,
}

impl TestServer {
    pub fn new() -> Self {
        Self::with_trusted_proxies(&[])
    }

    /// Server whose test peer is a trusted reverse proxy.
    pub fn behind_proxy() -> Self {
        Self::with_trusted_proxies(&[PEER.ip()])
    }

    fn with_trusted_proxies(trusted: &[IpAddr]) -> Self {
        let media_root = tempfile::tempdir().unwrap();
        let config = OrchestratorConfig {
            media_root: media_root.path().to_path_buf(),
            ..Default::default()
        };
        let toolchain = Toolchain {
            prober: Arc::new(FixedProber),
            launcher: Arc::new(SleepLauncher),
            grabber: Arc::new(NoopGrabber),
        };
        let (event_tx, events) = castline_ipc::event_channel();
        let (command_tx, commands) = castline_ipc::command_channel();
        let orchestrator = Arc::new(Orchestrator::new(config, toolchain, event_tx));

        let state = HttpState {
            orchestrator: orchestrator.clone(),
            hooks: Arc::new(command_tx),
            media_root: media_root.path().to_path_buf(),
            trusted_proxies: trusted.into(),
        };
        Self {
            orchestrator,
            commands,
            _events: events,
            state,
            media_root,
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
            .layer(MockConnectInfo(PEER))
    }

    pub fn write_media(&self, app: &str, file: &str, contents: &[u8]) {
        let dir = self.media_root.path().join(app);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(file), contents).unwrap();
    }
}

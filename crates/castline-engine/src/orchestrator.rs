//! Publish session orchestrator.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use castline_encoder::{generate_master, materialize, plan, write_master, EncodeJob, Toolchain};
use castline_ipc::{
    ActiveStream, EngineEvent, SessionId, StartupPhase, StopReason, StreamPath, VideoCodec,
};
use chrono::Utc;
use crossbeam_channel::Sender;
use tracing::{debug, error, info, instrument, warn};

use crate::config::OrchestratorConfig;
use crate::error::StartupError;
use crate::StartupResult;
use crate::metrics::{MetricsCollector, OrchestratorStats};
use crate::registry::{PublishSession, SessionInfo, SessionRegistry};
use crate::schedule::ScheduledTask;
use crate::state::SessionStartup;
use crate::thumbnails::ThumbnailJob;
use crate::viewers::ViewerTracker;

/// Owns every live session: starts them, stops them and answers directory
/// queries.
pub struct Orchestrator {
    config: OrchestratorConfig,
    toolchain: Toolchain,
    registry: SessionRegistry,
    viewers: Arc<ViewerTracker>,
    metrics: Arc<MetricsCollector>,
    event_tx: Sender<EngineEvent>,
    accepting: AtomicBool,
    next_generation: AtomicU64,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, toolchain: Toolchain, event_tx: Sender<EngineEvent>) -> Self {
        let viewers = Arc::new(ViewerTracker::new(config.viewer_ttl));
        Self {
            config,
            toolchain,
            registry: SessionRegistry::new(),
            viewers,
            metrics: Arc::new(MetricsCollector::new()),
            event_tx,
            accepting: AtomicBool::new(true),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Start a session for a newly published stream.
    ///
    /// A repeated start for a live session id is ignored. A live session on
    /// the same path is replaced, unless it was published after this one.
    /// On failure nothing is registered and a `StartupFailed` event is
    /// emitted.
    #[instrument(name = "session_start", skip(self), fields(session_id = %session_id, stream = %path))]
    pub async fn start(&self, session_id: SessionId, path: StreamPath) -> StartupResult<()> {
        if self.registry.contains(&session_id) {
            debug!("Session already live, ignoring start");
            return Ok(());
        }
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);

        if let Some(stale) = self.registry.session_for_path(&path) {
            if stale.generation < generation {
                info!(stale_session = %stale.id, "Replacing stale session on the same path");
                self.teardown(&stale.id, StopReason::Replaced).await;
            }
        }

        match self.launch(&session_id, &path, generation).await {
            Ok(info) => {
                info!(
                    codec = %info.source.codec,
                    width = info.source.width,
                    height = info.source.height,
                    renditions = info.renditions.len(),
                    "Session started"
                );
                self.metrics.record_session_started();
                self.send_event(EngineEvent::SessionStarted {
                    session_id,
                    stream_path: path,
                    input_codec: info.source.codec,
                    renditions: info.renditions,
                });
                Ok(())
            }
            Err(e) => {
                error!(phase = e.phase().name(), error = %e, "Session start failed");
                self.metrics.record_startup_failure();
                self.send_event(EngineEvent::StartupFailed {
                    session_id,
                    stream_path: path,
                    phase: e.phase(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn launch(
        &self,
        session_id: &SessionId,
        path: &StreamPath,
        generation: u64,
    ) -> StartupResult<SessionInfo> {
        if !self.is_accepting() {
            return Err(StartupError::ShuttingDown);
        }

        let mut startup = SessionStartup::new();

        let locator = self.config.source_locator(path);
        let source = self
            .toolchain
            .prober
            .probe(&locator)
            .await
            .map_err(StartupError::Probe)?;
        if self.is_superseded(path, generation) {
            return Err(StartupError::Superseded);
        }

        if VideoCodec::from_probe_name(&source.codec).is_none() {
            warn!(codec = %source.codec, "Unrecognized input codec, serving copy-through only");
        }
        let renditions = materialize(path.stream(), &source, &plan(&source.codec, source.height));

        startup.enter(StartupPhase::PrepareOutput);
        let output_dir = self.config.output_dir(path);
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|source| StartupError::PrepareOutput {
                path: output_dir.clone(),
                source,
            })?;

        startup.enter(StartupPhase::SpawnEncoder);
        let job = EncodeJob {
            locator,
            output_dir: output_dir.clone(),
            stream: path.stream().to_string(),
            source: source.clone(),
            renditions: renditions.clone(),
            settings: self.config.encoder.clone(),
            hls: self.config.hls,
        };
        let process = self
            .toolchain
            .launcher
            .launch(&job)
            .map_err(StartupError::Spawn)?;
        debug!(pid = ?process.pid(), "Encoder spawned");
        startup.set_process(process);

        startup.enter(StartupPhase::WriteManifest);
        let manifest = generate_master(path.stream(), &source, &renditions);
        write_master(&output_dir, path.stream(), &manifest)
            .await
            .map_err(StartupError::Manifest)?;

        startup.enter(StartupPhase::Register);
        let thumbnails = ThumbnailJob::new(
            output_dir,
            path.stream(),
            self.toolchain.grabber.clone(),
            self.metrics.clone(),
        )
        .schedule(self.config.thumbnail_interval);
        startup.set_thumbnails(thumbnails);

        // Shutdown may have begun while probing.
        if !self.is_accepting() {
            return Err(StartupError::ShuttingDown);
        }
        let Some(resources) = startup.finish() else {
            return Err(StartupError::ShuttingDown);
        };

        let info = SessionInfo {
            id: session_id.clone(),
            path: path.clone(),
            source,
            renditions,
            started_at: Utc::now(),
            generation,
        };
        match self.registry.register(PublishSession::new(info.clone(), resources)) {
            Ok(Some(displaced)) => self.retire(displaced, StopReason::Replaced).await,
            Ok(None) => {}
            Err(refused) => {
                if let (_, Some(resources)) = refused.into_parts() {
                    resources.release().await;
                }
                return Err(StartupError::Superseded);
            }
        }

        // Shutdown may have listed the registry before this session joined it.
        if !self.is_accepting() {
            if let Some(resources) = self.registry.detach_resources(session_id) {
                resources.release().await;
                self.registry.remove(session_id);
            }
            return Err(StartupError::ShuttingDown);
        }
        Ok(info)
    }

    /// Whether a session published after `generation` already owns `path`.
    fn is_superseded(&self, path: &StreamPath, generation: u64) -> bool {
        self.registry
            .session_for_path(path)
            .is_some_and(|holder| holder.generation > generation)
    }

    /// Stop a session after its publisher went away.
    ///
    /// Unknown ids and repeated stops are no-ops. Returns whether this call
    /// tore the session down.
    #[instrument(name = "session_stop", skip(self), fields(session_id = %session_id))]
    pub async fn stop(&self, session_id: &SessionId) -> bool {
        self.teardown(session_id, StopReason::Unpublished).await
    }

    async fn teardown(&self, session_id: &SessionId, reason: StopReason) -> bool {
        let Some(resources) = self.registry.detach_resources(session_id) else {
            debug!(session_id = %session_id, "Stop for unknown or stopping session ignored");
            self.metrics.record_ignored_stop();
            return false;
        };

        if resources.encoder_exited() {
            warn!(session_id = %session_id, "Encoder had already exited before stop");
        }
        resources.release().await;

        if let Some(info) = self.registry.remove(session_id) {
            self.finish_stop(info, reason);
        }
        true
    }

    async fn retire(&self, session: PublishSession, reason: StopReason) {
        let (info, resources) = session.into_parts();
        if let Some(resources) = resources {
            resources.release().await;
        }
        self.finish_stop(info, reason);
    }

    fn finish_stop(&self, info: SessionInfo, reason: StopReason) {
        info!(session_id = %info.id, stream = %info.path, reason = reason.message(), "Session stopped");
        self.metrics.record_session_stopped();
        self.send_event(EngineEvent::SessionStopped {
            session_id: info.id,
            stream_path: info.path,
            reason,
        });
    }

    /// Refuse new sessions and tear down every live one.
    #[instrument(name = "orchestrator_shutdown", skip(self))]
    pub async fn shutdown(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        let ids = self.registry.ids();
        info!(sessions = ids.len(), "Tearing down live sessions");
        for id in ids {
            self.teardown(&id, StopReason::Shutdown).await;
        }
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Live streams with their current viewer counts, oldest first.
    pub fn list_active(&self) -> Vec<ActiveStream> {
        let mut sessions = self.registry.snapshot();
        sessions.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));

        sessions
            .into_iter()
            .map(|info| ActiveStream {
                viewer_count: self.viewers.count_for(info.path.stream()),
                app_name: info.path.app().to_string(),
                stream_identity: info.path.stream().to_string(),
                input_codec: info.source.codec,
                renditions: info.renditions,
                start_time: info.started_at,
                id: info.id,
            })
            .collect()
    }

    /// Description of one live session.
    pub fn session(&self, session_id: &SessionId) -> Option<SessionInfo> {
        self.registry.lookup(session_id)
    }

    /// Record a playlist or segment fetch for viewer counting.
    pub fn record_fetch(&self, stream: &str, client: &str) {
        self.viewers.record_fetch(stream, client);
        self.metrics.record_fetch();
    }

    pub fn viewers(&self) -> &Arc<ViewerTracker> {
        &self.viewers
    }

    pub fn stats(&self) -> OrchestratorStats {
        self.metrics.snapshot(self.registry.len())
    }

    /// Spawn the periodic viewer sweep on the current runtime.
    pub fn start_viewer_sweep(&self) -> ScheduledTask {
        let viewers = self.viewers.clone();
        ScheduledTask::every("viewer-sweep", self.config.sweep_interval, move || {
            let viewers = viewers.clone();
            async move {
                viewers.sweep();
            }
        })
    }

    fn send_event(&self, event: EngineEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("Failed to send event: {}", e);
        }
    }
}

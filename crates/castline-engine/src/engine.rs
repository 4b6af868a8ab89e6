//! Command loop driving the orchestrator.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use castline_ipc::{EngineCommand, EngineEvent, SessionId};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::orchestrator::Orchestrator;
use crate::schedule::ScheduledTask;

type WorkerTx = mpsc::UnboundedSender<EngineCommand>;

/// Receives lifecycle commands and hands them to per-session workers.
///
/// Commands for one session id run in arrival order on that session's
/// worker; different sessions proceed concurrently on the runtime.
pub struct Engine {
    command_rx: Receiver<EngineCommand>,
    event_tx: Sender<EngineEvent>,
    orchestrator: Arc<Orchestrator>,
    runtime: Handle,
    workers: HashMap<SessionId, WorkerTx>,
    sweeper: Option<ScheduledTask>,
}

impl Engine {
    pub fn new(
        command_rx: Receiver<EngineCommand>,
        event_tx: Sender<EngineEvent>,
        orchestrator: Arc<Orchestrator>,
        runtime: Handle,
    ) -> Self {
        Self {
            command_rx,
            event_tx,
            orchestrator,
            runtime,
            workers: HashMap::new(),
            sweeper: None,
        }
    }

    /// Run the engine (blocking). Must not be called from a runtime thread.
    #[instrument(name = "engine_run", skip(self))]
    pub fn run(&mut self) {
        info!("Engine starting");
        {
            let _guard = self.runtime.enter();
            self.sweeper = Some(self.orchestrator.start_viewer_sweep());
        }
        self.send_event(EngineEvent::Ready);

        loop {
            match self.command_rx.recv_timeout(Duration::from_millis(100)) {
                Ok(command) => {
                    if !self.handle_command(command) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => self.prune_workers(),
                Err(RecvTimeoutError::Disconnected) => {
                    info!("Command channel disconnected, shutting down");
                    self.shutdown();
                    break;
                }
            }
        }

        info!("Engine stopped");
    }

    /// Handle a command. Returns false if engine should stop.
    fn handle_command(&mut self, command: EngineCommand) -> bool {
        debug!(?command, "Handling command");

        let Some(session_id) = command.session_id().cloned() else {
            self.shutdown();
            return false;
        };

        match command {
            EngineCommand::Stop { .. } if !self.workers.contains_key(&session_id) => {
                let orchestrator = self.orchestrator.clone();
                self.runtime.spawn(async move {
                    orchestrator.stop(&session_id).await;
                });
            }
            EngineCommand::Stop { .. } => {
                self.dispatch(session_id.clone(), command);
                // Later commands for this id get a new worker; the current
                // one drains and exits.
                self.workers.remove(&session_id);
            }
            _ => self.dispatch(session_id, command),
        }

        true
    }

    fn dispatch(&mut self, session_id: SessionId, command: EngineCommand) {
        let worker = match self.workers.get(&session_id) {
            Some(tx) if !tx.is_closed() => tx.clone(),
            _ => {
                let tx = self.spawn_worker();
                self.workers.insert(session_id, tx.clone());
                tx
            }
        };

        if let Err(e) = worker.send(command) {
            warn!(command = ?e.0, "Session worker is gone, command dropped");
        }
    }

    fn spawn_worker(&self) -> WorkerTx {
        let (tx, mut rx) = mpsc::unbounded_channel::<EngineCommand>();
        let orchestrator = self.orchestrator.clone();

        self.runtime.spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    EngineCommand::Start {
                        session_id,
                        stream_path,
                    } => {
                        // Failures are logged and reported as events.
                        let _ = orchestrator.start(session_id, stream_path).await;
                    }
                    EngineCommand::Stop { session_id, .. } => {
                        orchestrator.stop(&session_id).await;
                    }
                    EngineCommand::Shutdown => break,
                }
            }
        });

        tx
    }

    fn prune_workers(&mut self) {
        self.workers.retain(|_, tx| !tx.is_closed());
    }

    #[instrument(name = "engine_shutdown", skip(self))]
    fn shutdown(&mut self) {
        info!("Shutting down engine");
        self.workers.clear();

        let orchestrator = self.orchestrator.clone();
        let sweeper = self.sweeper.take();
        self.runtime.block_on(async move {
            orchestrator.shutdown().await;
            if let Some(sweeper) = sweeper {
                sweeper.cancel().await;
            }
        });

        self.send_event(EngineEvent::Shutdown);
    }

    fn send_event(&self, event: EngineEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("Failed to send event: {}", e);
        }
    }
}

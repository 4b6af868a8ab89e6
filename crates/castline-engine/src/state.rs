//! Per-session resources and startup rollback.

use castline_encoder::ProcessHandle;
use castline_ipc::StartupPhase;
use tracing::{debug, info};

use crate::schedule::ScheduledTask;

/// Resources owned by a live session.
#[derive(Debug)]
pub struct SessionResources {
    process: ProcessHandle,
    thumbnails: ScheduledTask,
}

impl SessionResources {
    /// Release in order: stop the thumbnail task (awaited), then kill the
    /// encoder.
    pub async fn release(self) {
        let Self {
            process,
            thumbnails,
        } = self;
        thumbnails.cancel().await;
        process.terminate();
    }

    /// Whether the encoder process has exited.
    pub fn encoder_exited(&self) -> bool {
        self.process.has_exited()
    }
}

/// Tracks what a starting session has acquired so a failed start can be
/// rolled back. Dropping an unfinished startup releases everything.
pub struct SessionStartup {
    phase: StartupPhase,
    process: Option<ProcessHandle>,
    thumbnails: Option<ScheduledTask>,
}

impl SessionStartup {
    pub fn new() -> Self {
        Self {
            phase: StartupPhase::Probe,
            process: None,
            thumbnails: None,
        }
    }

    /// Move to `phase`.
    pub fn enter(&mut self, phase: StartupPhase) {
        debug!(phase = phase.name(), "Entering startup phase");
        self.phase = phase;
    }

    pub fn set_process(&mut self, process: ProcessHandle) {
        self.process = Some(process);
    }

    pub fn set_thumbnails(&mut self, task: ScheduledTask) {
        self.thumbnails = Some(task);
    }

    /// Hand the acquired resources over to a live session.
    ///
    /// Returns `None`, after rolling back, if either resource is missing.
    pub fn finish(mut self) -> Option<SessionResources> {
        match (self.process.take(), self.thumbnails.take()) {
            (Some(process), Some(thumbnails)) => Some(SessionResources {
                process,
                thumbnails,
            }),
            (process, thumbnails) => {
                self.process = process;
                self.thumbnails = thumbnails;
                None
            }
        }
    }

    fn rollback(&mut self) {
        if self.process.is_none() && self.thumbnails.is_none() {
            return;
        }
        info!(phase = self.phase.name(), "Rolling back partial session");

        // Dropping the task cancels it; it is not awaited here.
        drop(self.thumbnails.take());
        if let Some(process) = self.process.take() {
            process.terminate();
        }
    }
}

impl Default for SessionStartup {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SessionStartup {
    fn drop(&mut self) {
        self.rollback();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;
    use tokio::process::Command;

    use crate::orchestrator::tests::{process_running, wait_until_stopped};

    fn sleeper() -> ProcessHandle {
        let mut command = Command::new("sleep");
        command.arg("30");
        ProcessHandle::spawn(command, "sleep").unwrap()
    }

    #[tokio::test]
    async fn test_finish_requires_both_resources() {
        let mut startup = SessionStartup::new();
        startup.set_process(sleeper());
        assert!(startup.finish().is_none());
    }

    /// Records, when dropped, whether the encoder was still running.
    struct ObserveOnCancel {
        pid: u32,
        seen: Arc<Mutex<Option<bool>>>,
    }

    impl Drop for ObserveOnCancel {
        fn drop(&mut self) {
            *self.seen.lock() = Some(process_running(self.pid));
        }
    }

    #[tokio::test]
    async fn test_release_cancels_thumbnails_before_killing_encoder() {
        let process = sleeper();
        let pid = process.pid().unwrap();
        let seen = Arc::new(Mutex::new(None));

        let observed = seen.clone();
        let thumbnails = ScheduledTask::every("observe", Duration::from_millis(10), move || {
            let guard = ObserveOnCancel {
                pid,
                seen: observed.clone(),
            };
            async move {
                let _guard = guard;
                std::future::pending::<()>().await;
            }
        });

        let mut startup = SessionStartup::new();
        startup.set_process(process);
        startup.set_thumbnails(thumbnails);
        let resources = startup.finish().unwrap();
        assert!(!resources.encoder_exited());

        // Let the first tick start and park.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*seen.lock(), None);

        resources.release().await;
        assert_eq!(*seen.lock(), Some(true), "encoder was killed before the task stopped");
        assert!(wait_until_stopped(pid).await);
    }

    #[tokio::test]
    async fn test_dropped_startup_kills_encoder() {
        let process = sleeper();
        let pid = process.pid().unwrap();

        let mut startup = SessionStartup::new();
        startup.enter(StartupPhase::WriteManifest);
        startup.set_process(process);
        drop(startup);

        assert!(wait_until_stopped(pid).await);
    }
}

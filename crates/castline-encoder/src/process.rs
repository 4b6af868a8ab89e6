//! Ownership of a running encoder process.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::error::EncoderError;
use crate::EncoderResult;

/// Kill capability for one external process.
///
/// The process is killed when [`terminate`](Self::terminate) is called or when
/// the handle is dropped.
pub struct ProcessHandle {
    label: String,
    pid: Option<u32>,
    child: Mutex<Child>,
    terminated: AtomicBool,
}

impl ProcessHandle {
    /// Spawn `command` and take ownership of the child.
    ///
    /// stderr is forwarded to the log at debug level under `label`. Must be
    /// called from within a tokio runtime.
    pub fn spawn(mut command: Command, label: impl Into<String>) -> EncoderResult<Self> {
        let label = label.into();
        let binary = command.as_std().get_program().to_string_lossy().into_owned();

        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EncoderError::Spawn { binary, source })?;

        let pid = child.id();
        if let Some(stderr) = child.stderr.take() {
            let label = label.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(process = %label, "{}", line);
                }
            });
        }

        info!(process = %label, pid = ?pid, "Process started");

        Ok(Self {
            label,
            pid,
            child: Mutex::new(child),
            terminated: AtomicBool::new(false),
        })
    }

    /// Forcefully kill the process.
    ///
    /// Only the first call sends the kill; later calls and calls after the
    /// process already exited do nothing. Never fails.
    pub fn terminate(&self) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut child = self.child.lock();
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(process = %self.label, %status, "Process already exited");
            }
            _ => match child.start_kill() {
                Ok(()) => info!(process = %self.label, pid = ?self.pid, "Process terminated"),
                Err(e) => debug!(process = %self.label, error = %e, "Kill failed"),
            },
        }
    }

    /// OS process id, if the child was still running when spawned.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Whether the process is no longer running.
    pub fn has_exited(&self) -> bool {
        let mut child = self.child.lock();
        !matches!(child.try_wait(), Ok(None))
    }
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("label", &self.label)
            .field("pid", &self.pid)
            .field("terminated", &self.terminated.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn wait_for_exit(handle: &ProcessHandle) -> bool {
        for _ in 0..50 {
            if handle.has_exited() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_terminate_kills_running_process() {
        let mut command = Command::new("sleep");
        command.arg("30");
        let handle = ProcessHandle::spawn(command, "sleep").unwrap();
        assert!(handle.pid().is_some());
        assert!(!handle.has_exited());

        handle.terminate();
        assert!(wait_for_exit(&handle).await);
    }

    #[tokio::test]
    async fn test_terminate_is_idempotent() {
        let mut command = Command::new("sleep");
        command.arg("30");
        let handle = ProcessHandle::spawn(command, "sleep").unwrap();

        handle.terminate();
        handle.terminate();
        assert!(wait_for_exit(&handle).await);
        handle.terminate();
    }

    #[tokio::test]
    async fn test_terminate_after_exit_is_harmless() {
        let handle = ProcessHandle::spawn(Command::new("true"), "true").unwrap();
        assert!(wait_for_exit(&handle).await);
        handle.terminate();
        assert!(handle.has_exited());
    }

    #[tokio::test]
    async fn test_spawn_missing_binary_fails() {
        let err = ProcessHandle::spawn(Command::new("/nonexistent/ffmpeg"), "ffmpeg").unwrap_err();
        assert!(matches!(err, EncoderError::Spawn { .. }));
    }
}

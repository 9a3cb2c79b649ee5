//! Backend process supervision.
//!
//! # Responsibilities
//! - Spawn the FDO server as a child process on a fixed port
//! - Gate readiness on its health endpoint
//! - Stop it with SIGTERM, a grace period, then SIGKILL
//!
//! The state word is read lock-free by every relay; the child handle sits
//! behind a mutex only taken during lifecycle transitions.

use std::process::Stdio;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::backend::state::BackendState;
use crate::config::BackendConfig;
use crate::health::ReadinessProbe;
use crate::observability::metrics;

/// Errors from backend lifecycle transitions.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The child process could not be spawned.
    #[error("failed to launch '{program}': {reason}")]
    Launch { program: String, reason: String },

    #[error("backend working directory {0:?} does not exist")]
    InvalidWorkingDir(std::path::PathBuf),

    #[error("backend already started")]
    AlreadyStarted,

    #[error("backend is {actual}, expected {expected}")]
    InvalidState {
        expected: BackendState,
        actual: BackendState,
    },

    #[error("backend not ready after {0:?}")]
    ReadinessTimeout(Duration),

    /// The child exited before it became ready.
    #[error("backend exited before becoming ready: {0}")]
    Exited(String),
}

pub struct BackendSupervisor {
    config: BackendConfig,
    state: AtomicU8,
    child: Mutex<Option<Child>>,
}

impl BackendSupervisor {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            config: config.clone(),
            state: AtomicU8::new(BackendState::Unstarted as u8),
            child: Mutex::new(None),
        }
    }

    pub fn state(&self) -> BackendState {
        BackendState::from(self.state.load(Ordering::Acquire))
    }

    pub fn is_ready(&self) -> bool {
        self.state() == BackendState::Ready
    }

    /// `host:port` the relay forwards to.
    pub fn endpoint(&self) -> String {
        self.config.authority()
    }

    /// Pid of the running child, if any.
    pub async fn pid(&self) -> Option<u32> {
        self.child.lock().await.as_ref().and_then(|c| c.id())
    }

    /// Move `from` -> `to` only if nothing else changed the state meanwhile.
    fn transition(&self, from: BackendState, to: BackendState) -> Result<(), BackendError> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|actual| BackendError::InvalidState {
                expected: from,
                actual: BackendState::from(actual),
            })?;
        tracing::debug!(from = %from, to = %to, "Backend state changed");
        metrics::set_backend_state(to);
        Ok(())
    }

    fn set_state(&self, state: BackendState) -> BackendState {
        let prev = BackendState::from(self.state.swap(state as u8, Ordering::AcqRel));
        if prev != state {
            tracing::debug!(from = %prev, to = %state, "Backend state changed");
            metrics::set_backend_state(state);
        }
        prev
    }

    /// Spawn the backend. Only valid from Unstarted.
    pub async fn start(&self) -> Result<(), BackendError> {
        let mut slot = self.child.lock().await;

        if self.state() != BackendState::Unstarted {
            return Err(BackendError::AlreadyStarted);
        }

        if !self.config.working_dir.is_dir() {
            return Err(BackendError::InvalidWorkingDir(
                self.config.working_dir.clone(),
            ));
        }

        let args = self.config.resolved_args();
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&args)
            .current_dir(&self.config.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        // Own process group so SIGTERM also reaches grandchildren (`go run`).
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|e| BackendError::Launch {
            program: self.config.program.clone(),
            reason: e.to_string(),
        })?;

        tracing::info!(
            pid = child.id(),
            program = %self.config.program,
            args = ?args,
            port = self.config.port,
            "Backend process spawned"
        );

        *slot = Some(child);
        self.set_state(BackendState::Starting);
        Ok(())
    }

    /// Poll the health endpoint until it answers 2xx. Only valid from Starting.
    pub async fn wait_ready(&self) -> Result<(), BackendError> {
        let actual = self.state();
        if actual != BackendState::Starting {
            return Err(BackendError::InvalidState {
                expected: BackendState::Starting,
                actual,
            });
        }

        let probe = ReadinessProbe::new(
            &self.config.authority(),
            &self.config.health_path,
            self.config.probe_timeout(),
        );
        let ready_timeout = self.config.ready_timeout();
        let deadline = Instant::now() + ready_timeout;

        tracing::info!(
            url = %probe.url(),
            timeout = ?ready_timeout,
            "Waiting for backend readiness"
        );

        let mut ticker = time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let actual = self.state();
            if actual != BackendState::Starting {
                // stopped while waiting
                return Err(BackendError::InvalidState {
                    expected: BackendState::Starting,
                    actual,
                });
            }

            if let Some(status) = self.reap_exited().await {
                self.set_state(BackendState::Stopped);
                return Err(BackendError::Exited(status));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(BackendError::ReadinessTimeout(ready_timeout));
            }

            match time::timeout(remaining, probe.check()).await {
                Ok(true) => break,
                Ok(false) => {}
                Err(_) => return Err(BackendError::ReadinessTimeout(ready_timeout)),
            }
        }

        self.transition(BackendState::Starting, BackendState::Ready)?;
        tracing::info!(endpoint = %self.endpoint(), "Backend ready");
        Ok(())
    }

    /// Exit status of a child that has already terminated, taking it out of the slot.
    async fn reap_exited(&self) -> Option<String> {
        let mut slot = self.child.lock().await;
        let child = slot.as_mut()?;

        match child.try_wait() {
            Ok(Some(status)) => {
                tracing::error!(%status, "Backend exited during startup");
                slot.take();
                Some(status.to_string())
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to poll backend process status");
                None
            }
        }
    }

    /// Stop the backend. Best effort: failures are logged, never returned.
    pub async fn stop(&self) {
        let child = self.child.lock().await.take();
        let prev = self.set_state(BackendState::Stopped);

        let Some(mut child) = child else {
            tracing::debug!(state = %prev, "No backend process to stop");
            return;
        };

        terminate(&mut child, self.config.stop_grace()).await;
    }
}

impl std::fmt::Debug for BackendSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSupervisor")
            .field("endpoint", &self.endpoint())
            .field("state", &self.state())
            .finish()
    }
}

/// SIGTERM the process group, wait `grace`, then SIGKILL and reap.
async fn terminate(child: &mut Child, grace: Duration) {
    let pid = child.id();

    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;
        if let Some(pid) = pid {
            tracing::info!(pid, "Sending SIGTERM to backend");
            if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                tracing::warn!(pid, error = ?e, "killpg SIGTERM failed");
            }
        }
    }

    match time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            tracing::info!(pid, %status, "Backend exited");
            return;
        }
        Ok(Err(e)) => {
            tracing::error!(pid, error = %e, "Wait failed after SIGTERM");
        }
        Err(_) => {
            tracing::warn!(pid, grace = ?grace, "Backend did not exit within grace period");
        }
    }

    tracing::warn!(pid, "Sending SIGKILL to backend");

    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;
        if let Some(pid) = pid {
            if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                tracing::warn!(pid, error = ?e, "killpg SIGKILL failed");
            }
        }
    }

    // Kills the leader if the group signal missed it, then reaps.
    if let Err(e) = child.kill().await {
        tracing::error!(pid, error = %e, "SIGKILL failed");
    }
}

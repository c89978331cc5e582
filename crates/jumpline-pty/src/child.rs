//! Handle for a child process running inside a PTY.

use std::process::ExitStatus as StdExitStatus;
use std::time::Duration;

use tokio::process::Child;

use crate::error::{PtyError, Result};

/// How a PTY child terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Exited normally with a code.
    Exited(i32),
    /// Terminated by a signal.
    Signaled(i32),
}

impl ExitStatus {
    /// Whether the child exited with code 0.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }

    /// The exit code, if the child exited normally.
    #[must_use]
    pub const fn code(&self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(*code),
            Self::Signaled(_) => None,
        }
    }
}

impl From<StdExitStatus> for ExitStatus {
    fn from(status: StdExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;

        match (status.code(), status.signal()) {
            (Some(code), _) => Self::Exited(code),
            (None, Some(signal)) => Self::Signaled(signal),
            (None, None) => Self::Exited(-1),
        }
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with code {code}"),
            Self::Signaled(sig) => write!(f, "terminated by signal {sig}"),
        }
    }
}

/// A spawned PTY child.
#[derive(Debug)]
pub struct PtyChild {
    inner: Child,
    pid: u32,
    status: Option<ExitStatus>,
}

impl PtyChild {
    pub(crate) fn new(inner: Child) -> Result<Self> {
        let pid = inner.id().ok_or(PtyError::Exited)?;
        Ok(Self {
            inner,
            pid,
            status: None,
        })
    }

    /// Process id of the child.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Wait for the child to exit.
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        let status = ExitStatus::from(self.inner.wait().await.map_err(PtyError::Wait)?);
        self.status = Some(status);
        Ok(status)
    }

    /// Send SIGKILL and reap the child.
    pub async fn kill(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        self.inner.start_kill().map_err(PtyError::Signal)?;
        self.wait().await
    }

    /// Give the child `grace` to exit on its own, then kill it.
    pub async fn wait_or_kill(&mut self, grace: Duration) -> Result<ExitStatus> {
        let waited = tokio::time::timeout(grace, self.wait()).await;
        match waited {
            Ok(status) => status,
            Err(_) => {
                tracing::debug!(pid = self.pid, ?grace, "child outlived grace period, killing");
                self.kill().await
            }
        }
    }
}

//! Scripted sessions for driving the login sequencer without a PTY.
//!
//! Each spawn consumes the next [`Script`]. Its output chunks are returned
//! one per read, then the session reports end of output. Everything the
//! sequencer does is recorded in a shared [`SessionLog`].
//!
//! ```
//! use jumpline::login::{LoginOptions, LoginSequencer};
//! use jumpline::mock::{Script, ScriptedSpawner};
//! use jumpline::resolve::Candidate;
//!
//! # tokio_test_block_on(async {
//! let spawner = ScriptedSpawner::new([
//!     Script::output(["Permission denied (publickey).\r\n"]),
//!     Script::output(["Last login: today\r\n[root@web ~]# "]),
//! ]);
//! let log = spawner.log();
//! let candidates = vec![
//!     Candidate::new("prod.pem", "ec2-user", "10.0.0.5"),
//!     Candidate::new("prod.pem", "root", "10.0.0.5"),
//! ];
//! let report = LoginSequencer::new(spawner, candidates, LoginOptions::default())
//!     .run()
//!     .await
//!     .unwrap();
//! assert_eq!(report.index, 1);
//! assert_eq!(log.snapshot().spawned.len(), 2);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use jumpline_pty::ExitStatus;

use crate::error::{LoginError, SpawnError};
use crate::resolve::Candidate;
use crate::session::{LoginSession, SessionSpawner};

/// Canned behavior for one spawned session.
#[derive(Debug, Clone)]
pub struct Script {
    chunks: Vec<Vec<u8>>,
    exit_status: ExitStatus,
    fail_spawn: bool,
    refuse_input: bool,
}

impl Script {
    /// A session that prints `chunks` and then closes.
    pub fn output<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        Self {
            chunks: chunks.into_iter().map(|c| c.as_ref().to_vec()).collect(),
            exit_status: ExitStatus::Exited(0),
            fail_spawn: false,
            refuse_input: false,
        }
    }

    /// A session that closes without printing anything.
    #[must_use]
    pub fn silent() -> Self {
        Self::output(Vec::<Vec<u8>>::new())
    }

    /// A session that cannot be started.
    #[must_use]
    pub fn spawn_failure() -> Self {
        Self {
            fail_spawn: true,
            ..Self::silent()
        }
    }

    /// Writes to the session fail, as they do once the client has exited.
    #[must_use]
    pub const fn refuse_input(mut self) -> Self {
        self.refuse_input = true;
        self
    }

    /// Exit status reported when the session is handed to the user.
    #[must_use]
    pub const fn exit_status(mut self, status: ExitStatus) -> Self {
        self.exit_status = status;
        self
    }
}

/// Everything the sequencer did with the scripted sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionLog {
    /// `user@host` of each spawned session, in order.
    pub spawned: Vec<String>,
    /// Bytes written, tagged with the spawn number they went to.
    pub writes: Vec<(usize, Vec<u8>)>,
    /// Chunks handed out across all sessions.
    pub chunks_read: usize,
    /// Spawn numbers of retired sessions.
    pub retired: Vec<usize>,
    /// Spawn number of the session handed to the user.
    pub interacted: Option<usize>,
    /// Output replayed at hand-over.
    pub replayed: Vec<u8>,
}

impl SessionLog {
    /// Bytes written to spawn number `attempt`.
    #[must_use]
    pub fn written_to(&self, attempt: usize) -> Vec<u8> {
        self.writes
            .iter()
            .filter(|(n, _)| *n == attempt)
            .flat_map(|(_, data)| data.iter().copied())
            .collect()
    }
}

/// Shared view of a [`SessionLog`].
#[derive(Debug, Clone, Default)]
pub struct LogHandle(Arc<Mutex<SessionLog>>);

impl LogHandle {
    /// Copy of the log as it is now.
    #[must_use]
    pub fn snapshot(&self) -> SessionLog {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn update(&self, f: impl FnOnce(&mut SessionLog)) {
        f(&mut self.0.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

/// A [`SessionSpawner`] that plays back scripts in order.
///
/// Spawning past the last script yields a silent session.
#[derive(Debug)]
pub struct ScriptedSpawner {
    scripts: VecDeque<Script>,
    log: LogHandle,
}

impl ScriptedSpawner {
    /// Create a spawner from scripts, one per spawn.
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self {
            scripts: scripts.into_iter().collect(),
            log: LogHandle::default(),
        }
    }

    /// Handle to the shared log.
    #[must_use]
    pub fn log(&self) -> LogHandle {
        self.log.clone()
    }
}

impl SessionSpawner for ScriptedSpawner {
    type Session = ScriptedSession;

    async fn spawn(&mut self, candidate: &Candidate) -> Result<ScriptedSession, LoginError> {
        let script = self.scripts.pop_front().unwrap_or_else(Script::silent);
        if script.fail_spawn {
            return Err(SpawnError::InvalidArgument {
                kind: "program",
                value: "scripted".to_string(),
                reason: "scripted spawn failure",
            }
            .into());
        }

        let mut attempt = 0;
        self.log.update(|log| {
            attempt = log.spawned.len();
            log.spawned.push(candidate.target());
        });

        Ok(ScriptedSession {
            attempt,
            chunks: script.chunks.into(),
            exit_status: script.exit_status,
            refuse_input: script.refuse_input,
            log: self.log.clone(),
        })
    }
}

/// A session produced by [`ScriptedSpawner`].
#[derive(Debug)]
pub struct ScriptedSession {
    attempt: usize,
    chunks: VecDeque<Vec<u8>>,
    exit_status: ExitStatus,
    refuse_input: bool,
    log: LogHandle,
}

impl LoginSession for ScriptedSession {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, LoginError> {
        let chunk = self.chunks.pop_front();
        if chunk.is_some() {
            self.log.update(|log| log.chunks_read += 1);
        }
        Ok(chunk)
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), LoginError> {
        if self.refuse_input {
            return Err(LoginError::io(
                "writing to session",
                std::io::Error::from(std::io::ErrorKind::BrokenPipe),
            ));
        }
        let attempt = self.attempt;
        self.log
            .update(|log| log.writes.push((attempt, data.to_vec())));
        Ok(())
    }

    async fn retire(self, _grace: Duration) -> Result<(), LoginError> {
        self.log.update(|log| log.retired.push(self.attempt));
        Ok(())
    }

    async fn interact(self, replay: Vec<u8>) -> Result<ExitStatus, LoginError> {
        self.log.update(|log| {
            log.interacted = Some(self.attempt);
            log.replayed = replay;
        });
        Ok(self.exit_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_session_replays_chunks_then_closes() {
        let mut spawner = ScriptedSpawner::new([Script::output(["a", "b"])]);
        let log = spawner.log();
        let mut session = spawner
            .spawn(&Candidate::new("k.pem", "root", "10.0.0.1"))
            .await
            .unwrap();

        assert_eq!(session.next_chunk().await.unwrap(), Some(b"a".to_vec()));
        assert_eq!(session.next_chunk().await.unwrap(), Some(b"b".to_vec()));
        assert_eq!(session.next_chunk().await.unwrap(), None);
        session.send(b"~.").await.unwrap();
        session.retire(Duration::ZERO).await.unwrap();

        let log = log.snapshot();
        assert_eq!(log.spawned, vec!["root@10.0.0.1".to_string()]);
        assert_eq!(log.chunks_read, 2);
        assert_eq!(log.written_to(0), b"~.");
        assert_eq!(log.retired, vec![0]);
    }

    #[tokio::test]
    async fn spawn_failure_is_reported() {
        let mut spawner = ScriptedSpawner::new([Script::spawn_failure()]);
        let result = spawner
            .spawn(&Candidate::new("k.pem", "root", "10.0.0.1"))
            .await;
        assert!(matches!(result, Err(LoginError::Spawn(_))));
        assert!(spawner.log().snapshot().spawned.is_empty());
    }
}

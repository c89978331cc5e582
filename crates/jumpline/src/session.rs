//! Automated sessions: the seam between the login sequencer and a child
//! process.
//!
//! [`SessionSpawner`] starts one session per login candidate and
//! [`LoginSession`] is the byte-stream the sequencer reads, writes, retires
//! or hands over to the user. [`PtySpawner`] runs the bastion command in a
//! real PTY; [`crate::mock::ScriptedSpawner`] replays canned output.

use std::future::Future;
use std::time::Duration;

use jumpline_pty::{ExitStatus, PtyChild, PtyConfig, PtyMaster, WindowSize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{LoginError, SpawnError};
use crate::interact;
use crate::resolve::Candidate;

/// Read size for one chunk of session output.
const CHUNK_SIZE: usize = 4096;

/// One live automated session.
pub trait LoginSession: Send {
    /// Wait for the next chunk of output. `None` means the child closed its
    /// side of the terminal.
    fn next_chunk(&mut self) -> impl Future<Output = Result<Option<Vec<u8>>, LoginError>> + Send;

    /// Write bytes to the child.
    fn send(&mut self, data: &[u8]) -> impl Future<Output = Result<(), LoginError>> + Send;

    /// End the session: give the child `grace` to exit, then kill it.
    fn retire(self, grace: Duration) -> impl Future<Output = Result<(), LoginError>> + Send;

    /// Hand the session to the user. `replay` is written to the terminal
    /// first. Returns once the child exits.
    fn interact(self, replay: Vec<u8>)
    -> impl Future<Output = Result<ExitStatus, LoginError>> + Send;
}

/// Starts a session for a login candidate.
pub trait SessionSpawner {
    /// The session type produced.
    type Session: LoginSession;

    /// Start a fresh session for `candidate`.
    fn spawn(
        &mut self,
        candidate: &Candidate,
    ) -> impl Future<Output = Result<Self::Session, LoginError>> + Send;
}

/// The command that reaches a target through the bastion.
///
/// Runs `<program> -t <jump_host> 'ssh -i "<key>" <user>@<host>'`; the
/// remote command is a single argument that the bastion's shell splits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BastionCommand {
    program: String,
    jump_host: String,
}

impl BastionCommand {
    /// Create a bastion command.
    pub fn new(program: impl Into<String>, jump_host: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            jump_host: jump_host.into(),
        }
    }

    /// The local program (normally `ssh`).
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The bastion host.
    #[must_use]
    pub fn jump_host(&self) -> &str {
        &self.jump_host
    }

    /// Arguments for reaching `candidate`.
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError::InvalidArgument`] if any part cannot be passed
    /// to a process or would be read as an option.
    pub fn args(&self, candidate: &Candidate) -> Result<Vec<String>, SpawnError> {
        validate("program", &self.program)?;
        validate("jump host", &self.jump_host)?;
        if self.jump_host.starts_with('-') {
            return Err(SpawnError::InvalidArgument {
                kind: "jump host",
                value: self.jump_host.clone(),
                reason: "must not start with '-'",
            });
        }
        if candidate.key().contains('"') {
            return Err(SpawnError::InvalidArgument {
                kind: "key path",
                value: candidate.key().to_string(),
                reason: "contains a double quote",
            });
        }

        let remote = candidate.remote_command();
        validate("argument", &remote)?;

        Ok(vec!["-t".to_string(), self.jump_host.clone(), remote])
    }
}

fn validate(kind: &'static str, value: &str) -> Result<(), SpawnError> {
    if value.is_empty() {
        return Err(SpawnError::InvalidArgument {
            kind,
            value: value.to_string(),
            reason: "is empty",
        });
    }
    if value.contains('\0') {
        return Err(SpawnError::InvalidArgument {
            kind,
            value: value.replace('\0', "\\0"),
            reason: "contains a NUL byte",
        });
    }
    Ok(())
}

/// Spawns the bastion command in a real PTY.
#[derive(Debug, Clone)]
pub struct PtySpawner {
    command: BastionCommand,
    window_size: Option<WindowSize>,
}

impl PtySpawner {
    /// Create a spawner. The PTY takes the controlling terminal's size when
    /// there is one.
    #[must_use]
    pub fn new(command: BastionCommand) -> Self {
        Self {
            command,
            window_size: interact::terminal::current_size(),
        }
    }

    /// Use a fixed window size.
    #[must_use]
    pub const fn with_window_size(mut self, size: WindowSize) -> Self {
        self.window_size = Some(size);
        self
    }
}

impl SessionSpawner for PtySpawner {
    type Session = PtySession;

    async fn spawn(&mut self, candidate: &Candidate) -> Result<PtySession, LoginError> {
        let args = self.command.args(candidate)?;
        let mut config = PtyConfig::default();
        if let Some(size) = self.window_size {
            config = config.window_size(size);
        }

        tracing::debug!(
            program = self.command.program(),
            ?args,
            "starting bastion session"
        );
        let (master, child) = jumpline_pty::spawn(self.command.program(), &args, &config)?;
        Ok(PtySession::new(master, child))
    }
}

/// A session running in a PTY.
#[derive(Debug)]
pub struct PtySession {
    master: PtyMaster,
    child: PtyChild,
    buf: Box<[u8]>,
}

impl PtySession {
    /// Wrap an already spawned PTY child.
    #[must_use]
    pub fn new(master: PtyMaster, child: PtyChild) -> Self {
        Self {
            master,
            child,
            buf: vec![0u8; CHUNK_SIZE].into_boxed_slice(),
        }
    }

    /// Process id of the child.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.child.pid()
    }
}

impl LoginSession for PtySession {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, LoginError> {
        let n = self
            .master
            .read(&mut self.buf)
            .await
            .map_err(|e| LoginError::io("reading session output", e))?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(self.buf[..n].to_vec()))
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), LoginError> {
        self.master
            .write_all(data)
            .await
            .map_err(|e| LoginError::io("writing to session", e))?;
        self.master
            .flush()
            .await
            .map_err(|e| LoginError::io("writing to session", e))
    }

    async fn retire(mut self, grace: Duration) -> Result<(), LoginError> {
        // Keep reading so the child never blocks on a full terminal while it
        // shuts down.
        let Self { master, buf, .. } = &mut self;
        let drained = tokio::time::timeout(grace, async {
            loop {
                match master.read(buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;
        if drained.is_err() {
            tracing::debug!(pid = self.child.pid(), "session still producing output at retirement");
        }

        let status = self.child.wait_or_kill(grace).await?;
        tracing::debug!(pid = self.child.pid(), %status, "session retired");
        Ok(())
    }

    async fn interact(self, replay: Vec<u8>) -> Result<ExitStatus, LoginError> {
        interact::run(self.master, self.child, replay).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> Candidate {
        Candidate::new("/keys/prod.pem", "ec2-user", "10.0.0.5")
    }

    #[test]
    fn bastion_args_keep_remote_command_whole() {
        let cmd = BastionCommand::new("ssh", "bastion.example.com");
        let args = cmd.args(&candidate()).unwrap();
        assert_eq!(
            args,
            vec![
                "-t".to_string(),
                "bastion.example.com".to_string(),
                "ssh -i \"/keys/prod.pem\" ec2-user@10.0.0.5".to_string(),
            ]
        );
    }

    #[test]
    fn bastion_args_reject_bad_input() {
        assert!(BastionCommand::new("ssh", "").args(&candidate()).is_err());
        assert!(BastionCommand::new("ssh", "-oProxyCommand=x").args(&candidate()).is_err());
        assert!(BastionCommand::new("ss\0h", "bastion").args(&candidate()).is_err());

        let quoted = Candidate::new("a\"b.pem", "root", "10.0.0.5");
        let err = BastionCommand::new("ssh", "bastion").args(&quoted).unwrap_err();
        assert!(err.to_string().contains("double quote"));
    }

    #[tokio::test]
    async fn pty_session_reads_until_eof() {
        let (master, child) =
            jumpline_pty::spawn("/bin/echo", ["Permission denied"], &PtyConfig::default())
                .unwrap();
        let mut session = PtySession::new(master, child);

        let mut seen = Vec::new();
        while let Some(chunk) = session.next_chunk().await.unwrap() {
            seen.extend_from_slice(&chunk);
        }
        assert!(String::from_utf8_lossy(&seen).contains("Permission denied"));
        session.retire(Duration::from_millis(200)).await.unwrap();
    }

    #[tokio::test]
    async fn retire_kills_a_silent_child() {
        let (master, child) =
            jumpline_pty::spawn("/bin/sleep", ["30"], &PtyConfig::default()).unwrap();
        let session = PtySession::new(master, child);

        let started = std::time::Instant::now();
        session.retire(Duration::from_millis(50)).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}

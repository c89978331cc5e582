//! jumpline-pty: async pseudo-terminal spawning for Unix.
//!
//! The login sequencer drives `ssh` through a PTY so that the remote side
//! behaves exactly as it would for a human at a terminal (password prompts,
//! host key questions, shell prompts). This crate allocates the PTY pair,
//! starts the child with the slave side as its controlling terminal, and
//! exposes the master side as a tokio `AsyncRead + AsyncWrite`.
//!
//! # Example
//!
//! ```ignore
//! use jumpline_pty::{PtyConfig, spawn};
//! use tokio::io::{AsyncReadExt, AsyncWriteExt};
//!
//! let (mut master, mut child) = spawn("ssh", ["-t", "bastion"], &PtyConfig::default())?;
//! master.write_all(b"exit\n").await?;
//! let status = child.wait().await?;
//! ```

#![cfg(unix)]

pub mod child;
pub mod config;
pub mod error;
pub mod master;

use std::ffi::OsStr;
use std::os::fd::{AsFd, OwnedFd};
use std::process::Stdio;

use tokio::process::Command;

pub use child::{ExitStatus, PtyChild};
pub use config::{PtyConfig, WindowSize};
pub use error::{PtyError, Result};
pub use master::PtyMaster;

/// Spawn `program` with `args` inside a freshly allocated PTY.
///
/// The child gets a new session with the PTY slave as its controlling
/// terminal and as stdin/stdout/stderr. No slave descriptor survives in the
/// parent once this returns, so the master sees EOF when the child exits.
///
/// Must be called from within a tokio runtime.
pub fn spawn<S, I>(program: S, args: I, config: &PtyConfig) -> Result<(PtyMaster, PtyChild)>
where
    S: AsRef<OsStr>,
    I: IntoIterator,
    I::Item: AsRef<OsStr>,
{
    let (master, slave_path) = PtyMaster::open()?;
    master.resize(config.window_size)?;

    let slave = master::open_slave(&slave_path)?;

    let mut cmd = Command::new(program.as_ref());
    cmd.args(args);

    cmd.stdin(stdio_from(&slave)?);
    cmd.stdout(stdio_from(&slave)?);
    cmd.stderr(stdio_from(&slave)?);

    // SAFETY: setsid and ioctl are async-signal-safe. stdin is already the
    // slave by the time pre_exec closures run.
    #[allow(unsafe_code)]
    unsafe {
        cmd.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            if libc::ioctl(0, libc::TIOCSCTTY as _, 0) == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let child = cmd.spawn().map_err(PtyError::Spawn)?;
    // cmd still holds the slave duplicates; drop them with it.
    drop(cmd);
    drop(slave);

    let child = PtyChild::new(child)?;
    tracing::debug!(pid = child.pid(), program = ?program.as_ref(), "spawned child in pty");
    Ok((master, child))
}

fn stdio_from(fd: &OwnedFd) -> Result<Stdio> {
    let dup = fd.as_fd().try_clone_to_owned().map_err(PtyError::Create)?;
    Ok(Stdio::from(dup))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn spawn_echo_reads_output_then_eof() {
        let (mut master, mut child) =
            spawn("/bin/echo", ["hello pty"], &PtyConfig::default()).unwrap();

        let mut out = Vec::new();
        master.read_to_end(&mut out).await.unwrap();
        assert!(String::from_utf8_lossy(&out).contains("hello pty"));

        let status = child.wait().await.unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn spawn_missing_program_fails() {
        let result = spawn(
            "/nonexistent/jumpline-test-binary",
            std::iter::empty::<&str>(),
            &PtyConfig::default(),
        );
        assert!(matches!(result, Err(PtyError::Spawn(_))));
    }
}

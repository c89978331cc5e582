//! Error types for PTY operations.

use std::io;

/// The error type for PTY operations.
#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    /// Failed to allocate or open the PTY pair.
    #[error("failed to create PTY: {0}")]
    Create(#[source] io::Error),

    /// Failed to start the child process.
    #[error("failed to spawn process: {0}")]
    Spawn(#[source] io::Error),

    /// An I/O error on the master side.
    #[error("PTY I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failed to change the window size.
    #[error("failed to resize PTY: {0}")]
    Resize(#[source] io::Error),

    /// Failed to wait for the child.
    #[error("failed to wait for child: {0}")]
    Wait(#[source] io::Error),

    /// Failed to signal the child.
    #[error("failed to signal child: {0}")]
    Signal(#[source] io::Error),

    /// The child has already been reaped and has no pid.
    #[error("child process has already exited")]
    Exited,
}

/// A specialized Result type for PTY operations.
pub type Result<T> = std::result::Result<T, PtyError>;

pub(crate) fn errno(e: rustix::io::Errno) -> io::Error {
    io::Error::from_raw_os_error(e.raw_os_error())
}

//! Master side of a Unix PTY pair.

use std::io;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use rustix::fs::{Mode, OFlags, fcntl_setfl, open};
use rustix::io::{FdFlags, fcntl_setfd};
use rustix::pty::{OpenptFlags, grantpt, openpt, ptsname, unlockpt};
use rustix::termios::{Winsize, tcgetwinsize, tcsetwinsize};
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::config::WindowSize;
use crate::error::{PtyError, Result, errno};

/// The controller end of a PTY, readable and writable from tokio.
///
/// Reads return EOF once every slave descriptor is closed. Linux reports
/// that condition as `EIO`, which is folded into EOF here.
pub struct PtyMaster {
    fd: AsyncFd<OwnedFd>,
}

impl std::fmt::Debug for PtyMaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyMaster")
            .field("fd", &self.fd.as_raw_fd())
            .finish()
    }
}

impl PtyMaster {
    /// Allocate a new PTY pair, returning the master and the slave path.
    pub fn open() -> Result<(Self, PathBuf)> {
        let fd = openpt(OpenptFlags::RDWR | OpenptFlags::NOCTTY)
            .map_err(|e| PtyError::Create(errno(e)))?;
        fcntl_setfd(&fd, FdFlags::CLOEXEC).map_err(|e| PtyError::Create(errno(e)))?;
        grantpt(&fd).map_err(|e| PtyError::Create(errno(e)))?;
        unlockpt(&fd).map_err(|e| PtyError::Create(errno(e)))?;

        let name = ptsname(&fd, Vec::new()).map_err(|e| PtyError::Create(errno(e)))?;
        let slave_path = PathBuf::from(
            name.into_string()
                .map_err(|_| PtyError::Create(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "slave path is not valid UTF-8",
                )))?,
        );

        fcntl_setfl(&fd, OFlags::NONBLOCK).map_err(|e| PtyError::Create(errno(e)))?;
        let fd = AsyncFd::new(fd).map_err(PtyError::Create)?;

        Ok((Self { fd }, slave_path))
    }

    /// Set the window size; the child receives SIGWINCH.
    pub fn resize(&self, size: WindowSize) -> Result<()> {
        let winsize = Winsize {
            ws_col: size.cols,
            ws_row: size.rows,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        tcsetwinsize(self.fd.get_ref(), winsize).map_err(|e| PtyError::Resize(errno(e)))
    }

    /// Current window size.
    pub fn window_size(&self) -> Result<WindowSize> {
        let ws = tcgetwinsize(self.fd.get_ref()).map_err(|e| PtyError::Io(errno(e)))?;
        Ok(WindowSize::new(ws.ws_col, ws.ws_row))
    }
}

impl AsRawFd for PtyMaster {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl AsyncRead for PtyMaster {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            let mut guard = match self.fd.poll_read_ready(cx) {
                Poll::Ready(Ok(guard)) => guard,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            };

            let unfilled = buf.initialize_unfilled();
            match rustix::io::read(self.fd.get_ref(), unfilled) {
                Ok(n) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                Err(rustix::io::Errno::AGAIN) => {
                    guard.clear_ready();
                }
                // Slave side fully closed.
                Err(rustix::io::Errno::IO) => return Poll::Ready(Ok(())),
                Err(e) => return Poll::Ready(Err(errno(e))),
            }
        }
    }
}

impl AsyncWrite for PtyMaster {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        loop {
            let mut guard = match self.fd.poll_write_ready(cx) {
                Poll::Ready(Ok(guard)) => guard,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            };

            match rustix::io::write(self.fd.get_ref(), buf) {
                Ok(n) => return Poll::Ready(Ok(n)),
                Err(rustix::io::Errno::AGAIN) => {
                    guard.clear_ready();
                }
                Err(e) => return Poll::Ready(Err(errno(e))),
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Open the slave side of a PTY for handing to a child.
pub fn open_slave(path: &Path) -> Result<OwnedFd> {
    open(path, OFlags::RDWR | OFlags::NOCTTY | OFlags::CLOEXEC, Mode::empty())
        .map_err(|e| PtyError::Create(errno(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_pty_pair() {
        let (master, slave_path) = PtyMaster::open().unwrap();
        assert!(slave_path.starts_with("/dev/pts") || slave_path.starts_with("/dev/pty"));
        assert!(master.as_raw_fd() >= 0);
    }

    #[tokio::test]
    async fn resize_round_trips() {
        let (master, _) = PtyMaster::open().unwrap();
        master.resize(WindowSize::new(120, 40)).unwrap();
        assert_eq!(master.window_size().unwrap(), WindowSize::new(120, 40));
    }
}

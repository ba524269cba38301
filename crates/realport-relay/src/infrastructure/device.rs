//! The local virtual-serial device.
//!
//! Opened once at startup and kept for the whole process lifetime; every
//! relay session borrows it.  The descriptor is non-blocking and registered
//! with the runtime, so reads and writes are driven by readiness like the
//! socket.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use realport_core::LinkConfig;
use thiserror::Error;
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::oneshot;
use tracing::{debug, info};

use super::sys;

/// Errors raised while preparing the device.  All of them are fatal.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("cannot open device {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("opening device {path} did not complete within {}s", timeout.as_secs())]
    OpenTimedOut { path: PathBuf, timeout: Duration },

    #[error("cannot register device {path} with the runtime: {source}")]
    Register {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot apply link configuration {link} to {path}: {source}")]
    Link {
        path: PathBuf,
        link: LinkConfig,
        #[source]
        source: io::Error,
    },
}

/// Process-lifetime handle to the device.
#[derive(Debug)]
pub struct DeviceHandle {
    fd: AsyncFd<File>,
    path: PathBuf,
}

impl DeviceHandle {
    /// Opens `path` for reading and writing.
    ///
    /// Some drivers block in `open` until their daemon side is ready.  The
    /// open therefore runs on its own thread and is abandoned after
    /// `watchdog`; a stuck thread does not keep the process alive.
    pub async fn open(path: &Path, watchdog: Duration) -> Result<Self, DeviceError> {
        let (tx, rx) = oneshot::channel();
        let target = path.to_path_buf();
        std::thread::spawn(move || {
            let result = OpenOptions::new()
                .read(true)
                .write(true)
                .custom_flags(libc::O_NONBLOCK | libc::O_NOCTTY)
                .open(&target);
            let _ = tx.send(result);
        });

        let file = match tokio::time::timeout(watchdog, rx).await {
            Ok(Ok(Ok(file))) => file,
            Ok(Ok(Err(source))) => {
                return Err(DeviceError::Open {
                    path: path.to_path_buf(),
                    source,
                })
            }
            Ok(Err(_closed)) => {
                return Err(DeviceError::Open {
                    path: path.to_path_buf(),
                    source: io::Error::new(io::ErrorKind::Other, "open thread exited"),
                })
            }
            Err(_elapsed) => {
                return Err(DeviceError::OpenTimedOut {
                    path: path.to_path_buf(),
                    timeout: watchdog,
                })
            }
        };

        let handle = Self::register(file, path)?;
        debug!(device = %path.display(), "device opened");
        Ok(handle)
    }

    /// Wraps an already open, non-blocking descriptor.
    fn register(file: File, path: &Path) -> Result<Self, DeviceError> {
        let fd = AsyncFd::new(file).map_err(|source| DeviceError::Register {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            fd,
            path: path.to_path_buf(),
        })
    }

    /// Pushes the link configuration to the driver.
    pub fn apply_link(&self, link: &LinkConfig) -> Result<(), DeviceError> {
        sys::set_link(self.fd.get_ref().as_raw_fd(), link).map_err(|source| {
            DeviceError::Link {
                path: self.path.clone(),
                link: *link,
                source,
            }
        })?;
        info!(device = %self.path.display(), %link, "link configuration applied");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AsyncRead for DeviceHandle {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            let mut guard = ready!(self.fd.poll_read_ready(cx))?;
            let unfilled = buf.initialize_unfilled();
            match guard.try_io(|inner| inner.get_ref().read(unfilled)) {
                // Nothing arrived; wait for the next readiness edge instead
                // of reporting the descriptor ready again straight away.
                Ok(Ok(0)) => {
                    guard.clear_ready();
                    return Poll::Ready(Ok(()));
                }
                Ok(Ok(len)) => {
                    buf.advance(len);
                    return Poll::Ready(Ok(()));
                }
                Ok(Err(err)) => return Poll::Ready(Err(err)),
                Err(_would_block) => continue,
            }
        }
    }
}

impl AsyncWrite for DeviceHandle {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        loop {
            let mut guard = ready!(self.fd.poll_write_ready(cx))?;
            match guard.try_io(|inner| inner.get_ref().write(buf)) {
                Ok(result) => return Poll::Ready(result),
                Err(_would_block) => continue,
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

// ── Tests ─────────────────────────────────────────────────────────────────────

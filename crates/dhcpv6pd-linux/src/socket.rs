// # Unix Socket Notification Transport
//
// Notifications travel as newline-delimited JSON over a Unix stream
// socket. The daemon listens; DHCPv6 client hooks connect, write one or
// more lines and disconnect.
//
// ```json
// {"notification": "prefix-removed", "interface": "eth0", "prefix": "2001:db8:1::/56"}
// ```

use async_trait::async_trait;
use dhcpv6pd_core::traits::{Emitter, Notification, NotificationSource};
use dhcpv6pd_core::{Error, Result};
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

/// Default notification socket path
pub const DEFAULT_SOCKET_PATH: &str = "/run/dhcpv6pd/notify.sock";

/// Notification source listening on a Unix socket
pub struct UnixSocketNotificationSource {
    path: PathBuf,
    listener: Mutex<Option<UnixListener>>,
}

impl UnixSocketNotificationSource {
    /// Bind the socket, replacing a stale socket file left by a previous run
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::transport(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }
        remove_stale_socket(&path)?;

        let listener = UnixListener::bind(&path)
            .map_err(|e| Error::transport(format!("failed to bind {}: {}", path.display(), e)))?;
        info!("listening for notifications on {}", path.display());

        Ok(Self {
            path,
            listener: Mutex::new(Some(listener)),
        })
    }

    fn take_listener(&self) -> Option<UnixListener> {
        match self.listener.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

impl NotificationSource for UnixSocketNotificationSource {
    /// Accept connections until the returned stream is dropped
    ///
    /// The listener can only be watched once; later calls yield a stream
    /// that ends immediately.
    fn watch(&self) -> Pin<Box<dyn Stream<Item = Notification> + Send + 'static>> {
        let (tx, rx) = mpsc::unbounded_channel();

        match self.take_listener() {
            Some(listener) => {
                tokio::spawn(accept_loop(listener, tx));
            }
            None => warn!("{} is already being watched", self.path.display()),
        }

        Box::pin(UnboundedReceiverStream::new(rx))
    }
}

impl Drop for UnixSocketNotificationSource {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Remove a socket left behind at `path`; anything else there is an error
fn remove_stale_socket(path: &Path) -> Result<()> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(Error::transport(format!(
                "failed to inspect {}: {}",
                path.display(),
                e
            )));
        }
    };

    if !metadata.file_type().is_socket() {
        return Err(Error::transport(format!(
            "{} exists and is not a socket",
            path.display()
        )));
    }

    std::fs::remove_file(path).map_err(|e| {
        Error::transport(format!("failed to remove stale socket {}: {}", path.display(), e))
    })?;
    debug!("removed stale socket {}", path.display());
    Ok(())
}

async fn accept_loop(listener: UnixListener, tx: mpsc::UnboundedSender<Notification>) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    tokio::spawn(read_notifications(stream, tx.clone()));
                }
                Err(e) => warn!("failed to accept notification connection: {}", e),
            },
            _ = tx.closed() => break,
        }
    }
    debug!("notification listener stopped");
}

async fn read_notifications(stream: UnixStream, tx: mpsc::UnboundedSender<Notification>) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("failed to read notification: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Notification>(&line) {
            Ok(notification) => {
                debug!("received {}", line);
                if tx.send(notification).is_err() {
                    break;
                }
            }
            Err(e) => warn!("ignoring malformed notification {:?}: {}", line, e),
        }
    }
}

/// Emitter writing to a listening [`UnixSocketNotificationSource`]
#[derive(Debug, Clone)]
pub struct UnixSocketEmitter {
    path: PathBuf,
}

impl UnixSocketEmitter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for UnixSocketEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_SOCKET_PATH)
    }
}

#[async_trait]
impl Emitter for UnixSocketEmitter {
    async fn emit(&self, notification: &Notification) -> Result<()> {
        let mut line = serde_json::to_string(notification)?;
        line.push('\n');

        let mut stream = UnixStream::connect(&self.path).await.map_err(|e| {
            Error::transport(format!("failed to connect to {}: {}", self.path.display(), e))
        })?;
        stream
            .write_all(line.as_bytes())
            .await
            .map_err(|e| Error::transport(format!("failed to send notification: {}", e)))?;
        stream
            .shutdown()
            .await
            .map_err(|e| Error::transport(format!("failed to close connection: {}", e)))?;
        Ok(())
    }
}

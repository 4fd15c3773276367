//! Watches the config file for changes and signals them on a pipe so the
//! poll-based event loop can pick them up as plain fd readiness.

use lava_core::{LavaError, Result};
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Filesystem watcher whose change notifications arrive as readable bytes
/// on [`ConfigWatcher::fd`].
pub struct ConfigWatcher {
    path: PathBuf,
    read_fd: OwnedFd,
    // Dropping the watcher stops the notify thread.
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    /// Spawn a watcher for `path`.
    pub fn spawn(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let (read_fd, write_fd) =
            nix::unistd::pipe().map_err(|e| LavaError::Io { source: e.into() })?;
        fcntl(read_fd.as_raw_fd(), FcntlArg::F_SETFL(OFlag::O_NONBLOCK))
            .map_err(|e| LavaError::Io { source: e.into() })?;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    use notify::EventKind::{Create, Modify};
                    if matches!(event.kind, Modify(_) | Create(_)) {
                        let _ = nix::unistd::write(&write_fd, b"c");
                    }
                }
                Err(e) => warn!("Watcher error: {e}"),
            },
            Config::default(),
        )
        .map_err(|e| LavaError::Config(format!("cannot create watcher: {e}")))?;

        watcher
            .watch(&path, RecursiveMode::NonRecursive)
            .map_err(|e| {
                LavaError::Config(format!("cannot watch '{}': {e}", path.display()))
            })?;

        info!("Watching config file: {}", path.display());

        Ok(Self {
            path,
            read_fd,
            _watcher: watcher,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The fd to poll for readability.
    pub fn fd(&self) -> BorrowedFd<'_> {
        self.read_fd.as_fd()
    }

    /// Consume queued notification bytes; `true` if any change was signalled.
    pub fn drain(&self) -> bool {
        let mut buf = [0u8; 64];
        let mut any = false;
        while let Ok(n) = nix::unistd::read(self.read_fd.as_raw_fd(), &mut buf) {
            if n == 0 {
                break;
            }
            any = true;
        }
        any
    }
}

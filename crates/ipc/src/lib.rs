//! Compositor IPC client.
//!
//! Supplies the workspace-occupancy signal behind `hidden-mode =
//! workspace-auto`: a nonblocking connection to the compositor's event
//! socket (polled by the main loop), plus one-shot queries against the
//! command socket to compute which outputs currently show any window.

pub mod events;

pub use events::{IpcEvent, MonitorInfo, WorkspaceInfo};

use lava_core::{LavaError, Result};
use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use tracing::{info, warn};

/// Live connection to the compositor's event socket.
///
/// The stream is nonblocking so the poll loop can treat it as one more fd;
/// [`WorkspaceFeed::drain`] consumes whatever arrived and reports whether an
/// occupancy re-query is warranted.
pub struct WorkspaceFeed {
    stream: UnixStream,
    cmd_socket: PathBuf,
    buffer: String,
}

impl WorkspaceFeed {
    /// Connect, discovering sockets from `$HYPRLAND_INSTANCE_SIGNATURE`.
    pub fn connect() -> Result<Self> {
        let sig = std::env::var("HYPRLAND_INSTANCE_SIGNATURE").map_err(|_| {
            LavaError::Ipc(
                "HYPRLAND_INSTANCE_SIGNATURE not set — no workspace status source".into(),
            )
        })?;
        let runtime_dir =
            std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/run/user/1000".to_string());
        let base = PathBuf::from(format!("{runtime_dir}/hypr/{sig}"));

        let event_socket = base.join(".socket2.sock");
        let stream = UnixStream::connect(&event_socket)
            .map_err(|e| LavaError::Ipc(format!("connect '{}': {e}", event_socket.display())))?;
        stream
            .set_nonblocking(true)
            .map_err(|e| LavaError::Ipc(format!("set_nonblocking: {e}")))?;

        info!("Connected to compositor event socket");

        Ok(Self {
            stream,
            cmd_socket: base.join(".socket.sock"),
            buffer: String::new(),
        })
    }

    /// The fd to poll for readability.
    pub fn fd(&self) -> BorrowedFd<'_> {
        self.stream.as_fd()
    }

    /// Consume all queued event lines. Returns `true` if any of them can
    /// have changed workspace occupancy.
    pub fn drain(&mut self) -> bool {
        let mut relevant = false;
        let mut buf = [0u8; 4096];
        loop {
            match (&self.stream).read(&mut buf) {
                Ok(0) => {
                    warn!("Compositor event socket closed");
                    break;
                }
                Ok(n) => {
                    self.buffer.push_str(&String::from_utf8_lossy(&buf[..n]));
                    while let Some(pos) = self.buffer.find('\n') {
                        let line: String = self.buffer.drain(..=pos).collect();
                        if events::parse_event(line.trim_end()).affects_occupancy() {
                            relevant = true;
                        }
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Compositor event socket read failed: {e}");
                    break;
                }
            }
        }
        relevant
    }

    /// Query the compositor and compute, per output name, whether the
    /// output's current workspace shows any window.
    pub fn fetch_occupancy(&self) -> Result<Vec<(String, bool)>> {
        let monitors: Vec<MonitorInfo> = self.command_json("j/monitors")?;
        let workspaces: Vec<WorkspaceInfo> = self.command_json("j/workspaces")?;

        let windows: HashMap<i32, u32> =
            workspaces.iter().map(|w| (w.id, w.windows)).collect();

        Ok(monitors
            .into_iter()
            .map(|m| {
                let occupied = windows
                    .get(&m.active_workspace.id)
                    .is_some_and(|count| *count > 0);
                (m.name, occupied)
            })
            .collect())
    }

    /// Send a one-shot command and parse the JSON reply.
    fn command_json<T: serde::de::DeserializeOwned>(&self, cmd: &str) -> Result<T> {
        let raw = self.command(cmd)?;
        serde_json::from_str(&raw).map_err(|e| LavaError::Ipc(format!("parse `{cmd}`: {e}")))
    }

    /// Send a one-shot command to the command socket and return the raw
    /// response.
    fn command(&self, cmd: &str) -> Result<String> {
        let mut stream = UnixStream::connect(&self.cmd_socket)
            .map_err(|e| LavaError::Ipc(format!("connect: {e}")))?;
        stream
            .write_all(cmd.as_bytes())
            .map_err(|e| LavaError::Ipc(format!("write: {e}")))?;

        let mut buf = String::new();
        stream
            .read_to_string(&mut buf)
            .map_err(|e| LavaError::Ipc(format!("read: {e}")))?;
        Ok(buf)
    }
}

//! The single-threaded poll loop.
//!
//! One `poll()` multiplexes the Wayland socket, the signal self-pipes, the
//! optional config-watch pipe and the optional compositor IPC socket. All
//! state mutation happens in dispatch handlers invoked synchronously from
//! here; the only suspension points are `poll` and the socket read.

use crate::{output, Context};
use lava_config::ConfigWatcher;
use lava_core::{LavaError, Result};
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::signal::{signal, SigHandler, Signal};
use signal_hook::consts::signal::{SIGINT, SIGTERM, SIGUSR1, SIGUSR2};
use std::io::ErrorKind;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use tracing::info;
use wayland_client::backend::WaylandError;
use wayland_client::{Connection, EventQueue};

/// Self-pipes carrying signal arrivals into the poll loop. Installed once
/// per process; reloads reuse the same pipes.
pub struct SignalPipe {
    quit_read: OwnedFd,
    reload_read: OwnedFd,
    _quit_write: OwnedFd,
    _reload_write: OwnedFd,
}

impl SignalPipe {
    /// Install the signal handlers: SIGINT/SIGTERM request a soft stop,
    /// SIGUSR1/SIGUSR2 a reload, and SIGCHLD is ignored so detached command
    /// children never become zombies.
    pub fn install() -> Result<Self> {
        unsafe { signal(Signal::SIGCHLD, SigHandler::SigIgn) }
            .map_err(|e| LavaError::Io { source: e.into() })?;

        let (quit_read, quit_write) = nonblocking_pipe()?;
        let (reload_read, reload_write) = nonblocking_pipe()?;

        for sig in [SIGINT, SIGTERM] {
            signal_hook::low_level::pipe::register_raw(sig, quit_write.as_raw_fd())
                .map_err(|e| LavaError::Io { source: e })?;
        }
        for sig in [SIGUSR1, SIGUSR2] {
            signal_hook::low_level::pipe::register_raw(sig, reload_write.as_raw_fd())
                .map_err(|e| LavaError::Io { source: e })?;
        }

        Ok(Self {
            quit_read,
            reload_read,
            _quit_write: quit_write,
            _reload_write: reload_write,
        })
    }

    fn quit_fd(&self) -> BorrowedFd<'_> {
        self.quit_read.as_fd()
    }

    fn reload_fd(&self) -> BorrowedFd<'_> {
        self.reload_read.as_fd()
    }

    fn drain_quit(&self) -> bool {
        drain_pipe(&self.quit_read)
    }

    fn drain_reload(&self) -> bool {
        drain_pipe(&self.reload_read)
    }
}

fn nonblocking_pipe() -> Result<(OwnedFd, OwnedFd)> {
    let (read, write) = nix::unistd::pipe().map_err(|e| LavaError::Io { source: e.into() })?;
    for fd in [&read, &write] {
        fcntl(fd.as_raw_fd(), FcntlArg::F_SETFL(OFlag::O_NONBLOCK))
            .map_err(|e| LavaError::Io { source: e.into() })?;
    }
    Ok((read, write))
}

fn drain_pipe(fd: &OwnedFd) -> bool {
    let mut buf = [0u8; 64];
    let mut any = false;
    while let Ok(n) = nix::unistd::read(fd.as_raw_fd(), &mut buf) {
        if n == 0 {
            break;
        }
        any = true;
    }
    any
}

/// Run until the context drops its `running` flag or a fatal error occurs.
pub fn run_loop(
    ctx: &mut Context,
    queue: &mut EventQueue<Context>,
    conn: &Connection,
    signals: &SignalPipe,
    watcher: Option<&ConfigWatcher>,
) -> Result<()> {
    while ctx.running {
        flush_requests(queue, conn)?;

        let guard = match queue.prepare_read() {
            Some(guard) => guard,
            None => {
                dispatch(ctx, queue)?;
                continue;
            }
        };

        // Poll readiness is collected into plain flags so the fd borrows end
        // before dispatch mutates the context.
        let ready = {
            let mut fds = Vec::with_capacity(5);
            fds.push(PollFd::new(guard.connection_fd(), PollFlags::POLLIN));
            fds.push(PollFd::new(signals.quit_fd(), PollFlags::POLLIN));
            fds.push(PollFd::new(signals.reload_fd(), PollFlags::POLLIN));
            let watch_idx = watcher.map(|w| {
                fds.push(PollFd::new(w.fd(), PollFlags::POLLIN));
                fds.len() - 1
            });
            let feed_idx = ctx.feed.as_ref().map(|f| {
                fds.push(PollFd::new(f.fd(), PollFlags::POLLIN));
                fds.len() - 1
            });

            match poll(&mut fds, PollTimeout::NONE) {
                Ok(_) => {}
                Err(Errno::EINTR) => {
                    drop(fds);
                    drop(guard);
                    continue;
                }
                Err(e) => return Err(LavaError::Wayland(format!("poll: {e}"))),
            }

            let is_ready = |i: usize| {
                fds[i].revents().is_some_and(|r| {
                    r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR)
                })
            };
            (
                is_ready(0),
                is_ready(1),
                is_ready(2),
                watch_idx.is_some_and(is_ready),
                feed_idx.is_some_and(is_ready),
            )
        };
        let (wayland_ready, quit_ready, reload_ready, watch_ready, feed_ready) = ready;

        if wayland_ready {
            if let Err(e) = guard.read() {
                match &e {
                    WaylandError::Io(io) if io.kind() == ErrorKind::WouldBlock => {}
                    _ => return Err(LavaError::Wayland(format!("connection read: {e}"))),
                }
            }
        } else {
            drop(guard);
        }
        dispatch(ctx, queue)?;

        if quit_ready && signals.drain_quit() {
            info!("Termination signal received; shutting down");
            ctx.running = false;
        }
        if reload_ready && signals.drain_reload() {
            info!("Reload signal received");
            ctx.running = false;
            ctx.reload = true;
        }
        if watch_ready && watcher.is_some_and(ConfigWatcher::drain) {
            info!("Config file changed; reloading");
            ctx.running = false;
            ctx.reload = true;
        }
        if feed_ready {
            let relevant = ctx.feed.as_mut().is_some_and(lava_ipc::WorkspaceFeed::drain);
            if relevant {
                output::refresh_occupancy(ctx);
            }
        }
    }
    Ok(())
}

/// Flush outgoing requests, waiting out a full socket.
fn flush_requests(queue: &EventQueue<Context>, conn: &Connection) -> Result<()> {
    loop {
        match queue.flush() {
            Ok(()) => return Ok(()),
            Err(WaylandError::Io(e)) if e.kind() == ErrorKind::WouldBlock => {
                let backend = conn.backend();
                let mut fds = [PollFd::new(backend.poll_fd(), PollFlags::POLLOUT)];
                match poll(&mut fds, PollTimeout::NONE) {
                    Ok(_) | Err(Errno::EINTR) => continue,
                    Err(e) => return Err(LavaError::Wayland(format!("poll: {e}"))),
                }
            }
            Err(e) => return Err(LavaError::Wayland(format!("connection flush: {e}"))),
        }
    }
}

fn dispatch(ctx: &mut Context, queue: &mut EventQueue<Context>) -> Result<()> {
    queue
        .dispatch_pending(ctx)
        .map_err(|e| LavaError::Wayland(format!("dispatch: {e}")))?;
    // Handlers cannot return errors; they buffer one instead.
    if let Some(msg) = ctx.failure.take() {
        ctx.running = false;
        return Err(LavaError::Wayland(msg));
    }
    Ok(())
}

//! Wayland realization of the launcher: the context carrying all live
//! state, the protocol dispatch modules, and the `run` entry that drives
//! one session from connect to exit-or-reload.

mod buffer;
mod command;
mod event_loop;
mod indicator;
mod instance;
mod output;
mod registry;
mod seat;
mod toplevels;

pub use event_loop::SignalPipe;

use lava_config::{ConfigWatcher, Configuration, Item};
use lava_core::{LavaError, Result};
use lava_ipc::WorkspaceFeed;
use lava_renderer::{icon, Icon};
use tracing::{error, info, warn};
use wayland_client::globals::registry_queue_init;
use wayland_client::protocol::{
    wl_compositor::WlCompositor, wl_shm::WlShm, wl_subcompositor::WlSubcompositor,
};
use wayland_client::{Connection, QueueHandle};
use wayland_cursor::CursorTheme;
use wayland_protocols::xdg::xdg_output::zv1::client::zxdg_output_manager_v1::ZxdgOutputManagerV1;
use wayland_protocols_wlr::foreign_toplevel::v1::client::zwlr_foreign_toplevel_manager_v1::ZwlrForeignToplevelManagerV1;
use wayland_protocols_wlr::layer_shell::v1::client::zwlr_layer_shell_v1::ZwlrLayerShellV1;

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Exit,
    Reload,
}

/// The fixed protocol globals.
pub struct Globals {
    pub compositor: WlCompositor,
    pub subcompositor: WlSubcompositor,
    pub shm: WlShm,
    pub layer_shell: ZwlrLayerShellV1,
    pub xdg_output_manager: ZxdgOutputManagerV1,
    pub toplevel_manager: Option<ZwlrForeignToplevelManagerV1>,
}

/// All live state of one session. Handed explicitly to every dispatch
/// handler; there is no global.
pub struct Context {
    pub conn: Connection,
    pub qh: QueueHandle<Context>,
    pub globals: Globals,
    pub config: Configuration,
    /// Loaded button images, indexed like `config.bars[x].items[y]`.
    pub icons: Vec<Vec<Option<Icon>>>,
    pub outputs: Vec<output::Output>,
    pub seats: Vec<seat::Seat>,
    pub toplevels: toplevels::Toplevels,
    pub feed: Option<WorkspaceFeed>,
    pub cursor_theme: Option<CursorTheme>,
    pub running: bool,
    pub reload: bool,
    /// Buffered fatal error from a dispatch handler.
    pub failure: Option<String>,
    next_id: u64,
}

impl Context {
    /// Fresh id for instances and indicators.
    pub fn alloc_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Buffer a fatal error; the loop picks it up after dispatch.
    pub fn fail(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        error!("{msg}");
        if self.failure.is_none() {
            self.failure = Some(msg);
        }
        self.running = false;
    }

    /// Locate an instance by id as `(output index, instance index)`.
    pub fn find_instance(&self, id: u64) -> Option<(usize, usize)> {
        for (o, output) in self.outputs.iter().enumerate() {
            if let Some(i) = output.instances.iter().position(|inst| inst.id == id) {
                return Some((o, i));
            }
        }
        None
    }
}

/// Run one session against the compositor. Returns whether the caller
/// should reinitialise and go again.
pub fn run(
    config: Configuration,
    config_path: &std::path::Path,
    signals: &SignalPipe,
) -> Result<Outcome> {
    let conn = Connection::connect_to_env()
        .map_err(|e| LavaError::Wayland(format!("cannot connect to Wayland display: {e}")))?;
    let (global_list, mut queue) = registry_queue_init::<Context>(&conn)
        .map_err(|e| LavaError::Wayland(format!("registry init: {e}")))?;
    let qh = queue.handle();

    let globals = registry::bind_globals(&global_list, &qh, config.needs_toplevels())?;
    let icons = load_icons(&config)?;

    let feed = if config.needs_workspace_status() {
        match WorkspaceFeed::connect() {
            Ok(feed) => Some(feed),
            Err(e) => {
                warn!("Workspace status unavailable: {e}");
                None
            }
        }
    } else {
        None
    };
    let watcher = if config.settings.watch_config_file {
        Some(ConfigWatcher::spawn(config_path)?)
    } else {
        None
    };

    let mut ctx = Context {
        conn: conn.clone(),
        qh,
        globals,
        config,
        icons,
        outputs: Vec::new(),
        seats: Vec::new(),
        toplevels: toplevels::Toplevels::default(),
        feed,
        cursor_theme: None,
        running: true,
        reload: false,
        failure: None,
        next_id: 0,
    };
    registry::bind_initial(&global_list, &mut ctx);

    // One roundtrip so outputs report geometry and names; instances spawn
    // from the `done` handlers as the events land.
    queue
        .roundtrip(&mut ctx)
        .map_err(|e| LavaError::Wayland(format!("initial roundtrip: {e}")))?;
    output::refresh_occupancy(&mut ctx);

    info!("Entering event loop");
    let result = event_loop::run_loop(&mut ctx, &mut queue, &conn, signals, watcher.as_ref());

    teardown(&mut ctx);
    let _ = queue.flush();
    result?;

    Ok(if ctx.reload {
        Outcome::Reload
    } else {
        Outcome::Exit
    })
}

/// Load every button image up front; a broken image aborts startup.
fn load_icons(config: &Configuration) -> Result<Vec<Vec<Option<Icon>>>> {
    config
        .bars
        .iter()
        .map(|bar| {
            bar.items
                .iter()
                .map(|item| match item {
                    Item::Button(button) => {
                        button.image_path.as_deref().map(icon::load).transpose()
                    }
                    Item::Spacer(_) => Ok(None),
                })
                .collect()
        })
        .collect()
}

/// Orderly protocol teardown: instances before their outputs.
fn teardown(ctx: &mut Context) {
    while !ctx.outputs.is_empty() {
        let global = ctx.outputs[0].global;
        output::remove_output(ctx, global);
    }
    while let Some(seat) = ctx.seats.first() {
        let global = seat.global;
        seat::remove_seat(ctx, global);
    }
}

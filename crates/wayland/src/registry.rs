//! Registry handling: binding the fixed globals and tracking the dynamic
//! ones (outputs and seats).

use crate::{output, seat, Context, Globals};
use lava_core::{LavaError, Result};
use tracing::warn;
use wayland_client::globals::{GlobalList, GlobalListContents};
use wayland_client::protocol::{
    wl_compositor::WlCompositor, wl_registry, wl_registry::WlRegistry, wl_shm::WlShm,
    wl_subcompositor::WlSubcompositor,
};
use wayland_client::{delegate_noop, Connection, Dispatch, QueueHandle};
use wayland_protocols::xdg::xdg_output::zv1::client::zxdg_output_manager_v1::ZxdgOutputManagerV1;
use wayland_protocols_wlr::foreign_toplevel::v1::client::zwlr_foreign_toplevel_manager_v1::ZwlrForeignToplevelManagerV1;
use wayland_protocols_wlr::layer_shell::v1::client::zwlr_layer_shell_v1::ZwlrLayerShellV1;

fn missing(interface: &str) -> LavaError {
    LavaError::Wayland(format!("compositor does not support {interface}"))
}

/// Bind the fixed globals; each of these being absent is fatal, except the
/// toplevel manager which is only requested when the config needs it.
pub fn bind_globals(
    globals: &GlobalList,
    qh: &QueueHandle<Context>,
    need_toplevels: bool,
) -> Result<Globals> {
    let compositor: WlCompositor = globals
        .bind(qh, 4..=6, ())
        .map_err(|_| missing("wl_compositor"))?;
    let subcompositor: WlSubcompositor = globals
        .bind(qh, 1..=1, ())
        .map_err(|_| missing("wl_subcompositor"))?;
    let shm: WlShm = globals.bind(qh, 1..=1, ()).map_err(|_| missing("wl_shm"))?;
    let layer_shell: ZwlrLayerShellV1 = globals
        .bind(qh, 1..=4, ())
        .map_err(|_| missing("zwlr_layer_shell_v1"))?;
    let xdg_output_manager: ZxdgOutputManagerV1 = globals
        .bind(qh, 3..=3, ())
        .map_err(|_| missing("zxdg_output_manager_v1 (version 3)"))?;

    let toplevel_manager: Option<ZwlrForeignToplevelManagerV1> = if need_toplevels {
        match globals.bind(qh, 1..=3, ()) {
            Ok(manager) => Some(manager),
            Err(_) => {
                warn!(
                    "zwlr_foreign_toplevel_manager_v1 unavailable; \
                     toplevel meta-actions fall back to their commands"
                );
                None
            }
        }
    } else {
        None
    };

    Ok(Globals {
        compositor,
        subcompositor,
        shm,
        layer_shell,
        xdg_output_manager,
        toplevel_manager,
    })
}

/// Pick up the outputs and seats that existed before we connected.
pub fn bind_initial(list: &GlobalList, ctx: &mut Context) {
    let registry = list.registry();
    for global in list.contents().clone_list() {
        match global.interface.as_str() {
            "wl_output" => output::add_output(ctx, registry, global.name, global.version),
            "wl_seat" => seat::add_seat(ctx, registry, global.name, global.version),
            _ => {}
        }
    }
}

impl Dispatch<WlRegistry, GlobalListContents> for Context {
    fn event(
        ctx: &mut Self,
        registry: &WlRegistry,
        event: wl_registry::Event,
        _: &GlobalListContents,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => match interface.as_str() {
                "wl_output" => output::add_output(ctx, registry, name, version),
                "wl_seat" => seat::add_seat(ctx, registry, name, version),
                _ => {}
            },
            wl_registry::Event::GlobalRemove { name } => {
                output::remove_output(ctx, name);
                seat::remove_seat(ctx, name);
            }
            _ => {}
        }
    }
}

// Objects whose events we never act on.
delegate_noop!(Context: ignore WlCompositor);
delegate_noop!(Context: WlSubcompositor);
delegate_noop!(Context: ignore WlShm);
delegate_noop!(Context: ignore wayland_client::protocol::wl_surface::WlSurface);
delegate_noop!(Context: wayland_client::protocol::wl_subsurface::WlSubsurface);
delegate_noop!(Context: wayland_client::protocol::wl_region::WlRegion);
delegate_noop!(Context: wayland_client::protocol::wl_shm_pool::WlShmPool);
delegate_noop!(Context: ignore ZwlrLayerShellV1);
delegate_noop!(Context: ignore ZxdgOutputManagerV1);

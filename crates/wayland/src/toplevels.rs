//! Foreign-toplevel protocol glue feeding the activity tracker.
//!
//! The manager is bound only when some button carries a `toplevel-app-id`.
//! Handles stage `app_id`/`state` into the tracker's pending snapshots; a
//! `done` commits and, when counters moved, repaints every instance.

use crate::{instance, Context};
use lava_toplevel::ActivityTracker;
use std::collections::HashMap;
use tracing::warn;
use wayland_client::backend::ObjectId;
use wayland_client::{event_created_child, Connection, Dispatch, Proxy, QueueHandle};
use wayland_protocols_wlr::foreign_toplevel::v1::client::{
    zwlr_foreign_toplevel_handle_v1::{self, ZwlrForeignToplevelHandleV1},
    zwlr_foreign_toplevel_manager_v1::{self, ZwlrForeignToplevelManagerV1},
};

/// Tracker plus the live protocol handles, keyed by object id so the
/// meta-actions can reach the wire objects.
#[derive(Default)]
pub struct Toplevels {
    pub tracker: ActivityTracker<ObjectId>,
    pub handles: HashMap<ObjectId, ZwlrForeignToplevelHandleV1>,
}

impl Dispatch<ZwlrForeignToplevelManagerV1, ()> for Context {
    fn event(
        ctx: &mut Self,
        _: &ZwlrForeignToplevelManagerV1,
        event: zwlr_foreign_toplevel_manager_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            zwlr_foreign_toplevel_manager_v1::Event::Toplevel { toplevel } => {
                let id = toplevel.id();
                ctx.toplevels.handles.insert(id.clone(), toplevel);
                ctx.toplevels.tracker.announce(id);
            }
            zwlr_foreign_toplevel_manager_v1::Event::Finished => {
                warn!("Toplevel manager finished; activity tracking stops");
                ctx.globals.toplevel_manager = None;
            }
            _ => {}
        }
    }

    event_created_child!(Context, ZwlrForeignToplevelManagerV1, [
        zwlr_foreign_toplevel_manager_v1::EVT_TOPLEVEL_OPCODE => (ZwlrForeignToplevelHandleV1, ())
    ]);
}

impl Dispatch<ZwlrForeignToplevelHandleV1, ()> for Context {
    fn event(
        ctx: &mut Self,
        handle: &ZwlrForeignToplevelHandleV1,
        event: zwlr_foreign_toplevel_handle_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let id = handle.id();
        match event {
            zwlr_foreign_toplevel_handle_v1::Event::AppId { app_id } => {
                ctx.toplevels.tracker.set_app_id(&id, app_id);
            }
            zwlr_foreign_toplevel_handle_v1::Event::State { state } => {
                // States arrive packed as native-endian u32s.
                let activated = state.chunks_exact(4).any(|chunk| {
                    u32::from_ne_bytes(chunk.try_into().unwrap())
                        == zwlr_foreign_toplevel_handle_v1::State::Activated as u32
                });
                ctx.toplevels.tracker.set_activated(&id, activated);
            }
            zwlr_foreign_toplevel_handle_v1::Event::Done => {
                if ctx.toplevels.tracker.commit(&id) {
                    instance::render_all(ctx);
                }
            }
            zwlr_foreign_toplevel_handle_v1::Event::Closed => {
                let changed = ctx.toplevels.tracker.remove(&id);
                ctx.toplevels.handles.remove(&id);
                handle.destroy();
                if changed {
                    instance::render_all(ctx);
                }
            }
            _ => {}
        }
    }
}

//! Output tracking and per-output bar instance reconciliation.
//!
//! An output becomes usable once its name and logical size are known; from
//! then on every `done` burst re-runs the config match and creates, destroys
//! or reconfigures the bar instances bound to it.

use crate::{instance, Context};
use lava_config::choose_config;
use tracing::{debug, info, warn};
use wayland_client::protocol::{wl_output, wl_output::WlOutput, wl_registry::WlRegistry};
use wayland_client::{Connection, Dispatch, Proxy, QueueHandle, WEnum};
use wayland_protocols::xdg::xdg_output::zv1::client::zxdg_output_v1::{self, ZxdgOutputV1};

/// User data keying output objects back to their registry global.
#[derive(Debug, Clone, Copy)]
pub struct OutputData {
    pub global: u32,
}

/// One compositor output and the bar instances living on it.
pub struct Output {
    pub global: u32,
    pub wl: WlOutput,
    pub xdg: ZxdgOutputV1,
    pub name: Option<String>,
    pub scale: i32,
    pub transform: i32,
    /// Logical size from xdg-output.
    pub width: i32,
    pub height: i32,
    /// Workspace-occupied flag from the workspace-status source.
    pub occupied: bool,
    pub instances: Vec<instance::BarInstance>,
}

impl Output {
    fn usable(&self) -> bool {
        self.name.is_some() && self.width > 0 && self.height > 0
    }
}

/// Bind a newly announced output and its xdg-output extension.
pub fn add_output(ctx: &mut Context, registry: &WlRegistry, global: u32, version: u32) {
    let qh = ctx.qh.clone();
    let wl = registry.bind::<WlOutput, _, _>(global, version.min(4), &qh, OutputData { global });
    let xdg = ctx
        .globals
        .xdg_output_manager
        .get_xdg_output(&wl, &qh, OutputData { global });

    ctx.outputs.push(Output {
        global,
        wl,
        xdg,
        name: None,
        scale: 1,
        transform: 0,
        width: 0,
        height: 0,
        occupied: false,
        instances: Vec::new(),
    });
    debug!("Output announced (global {global})");
}

/// The output went away: destroy its instances before the output itself.
pub fn remove_output(ctx: &mut Context, global: u32) {
    let Some(idx) = ctx.outputs.iter().position(|o| o.global == global) else {
        return;
    };
    while !ctx.outputs[idx].instances.is_empty() {
        instance::destroy(ctx, idx, 0);
    }
    let output = ctx.outputs.remove(idx);
    output.xdg.destroy();
    if output.wl.version() >= 3 {
        output.wl.release();
    }
    info!(
        "Output {} removed",
        output.name.as_deref().unwrap_or("(unnamed)")
    );
}

/// Re-run the config match for every bar on this output.
pub fn reconcile(ctx: &mut Context, global: u32) {
    let Some(idx) = ctx.outputs.iter().position(|o| o.global == global) else {
        return;
    };
    if !ctx.outputs[idx].usable() {
        return;
    }

    for bar_index in 0..ctx.config.bars.len() {
        let desired = {
            let output = &ctx.outputs[idx];
            choose_config(
                &ctx.config.bars[bar_index].configs,
                output.scale,
                output.transform,
                output.width,
                output.height,
                output.name.as_deref().unwrap_or(""),
            )
        };
        let existing = ctx.outputs[idx]
            .instances
            .iter()
            .position(|i| i.bar_index == bar_index);

        match (existing, desired) {
            (None, Some(config_index)) => {
                instance::create(ctx, idx, bar_index, config_index);
            }
            (Some(inst_idx), None) => {
                debug!("No config variant matches any more; dropping instance");
                instance::destroy(ctx, idx, inst_idx);
            }
            (Some(inst_idx), Some(config_index)) => {
                if ctx.outputs[idx].instances[inst_idx].config_index != config_index {
                    // The winning variant changed; rebuild from scratch.
                    instance::destroy(ctx, idx, inst_idx);
                    instance::create(ctx, idx, bar_index, config_index);
                } else {
                    instance::reconfigure(ctx, idx, inst_idx);
                }
            }
            (None, None) => {}
        }
    }
}

/// Query the workspace feed and propagate occupancy changes into the hide
/// policy of affected outputs.
pub fn refresh_occupancy(ctx: &mut Context) {
    let occupancy = match ctx.feed.as_ref() {
        Some(feed) => match feed.fetch_occupancy() {
            Ok(list) => list,
            Err(e) => {
                warn!("Workspace occupancy query failed: {e}");
                return;
            }
        },
        None => return,
    };

    for idx in 0..ctx.outputs.len() {
        let new = {
            let output = &ctx.outputs[idx];
            output
                .name
                .as_ref()
                .and_then(|name| occupancy.iter().find(|(m, _)| m == name))
                .map(|(_, occupied)| *occupied)
        };
        if let Some(occupied) = new {
            if ctx.outputs[idx].occupied != occupied {
                ctx.outputs[idx].occupied = occupied;
                instance::apply_hide_policy(ctx, idx);
            }
        }
    }
}

impl Dispatch<WlOutput, OutputData> for Context {
    fn event(
        ctx: &mut Self,
        _: &WlOutput,
        event: wl_output::Event,
        data: &OutputData,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let wl_output::Event::Done = event {
            reconcile(ctx, data.global);
            return;
        }
        let Some(output) = ctx.outputs.iter_mut().find(|o| o.global == data.global) else {
            return;
        };
        match event {
            wl_output::Event::Geometry { transform, .. } => {
                if let WEnum::Value(transform) = transform {
                    output.transform = transform as i32;
                }
            }
            wl_output::Event::Scale { factor } => output.scale = factor.max(1),
            wl_output::Event::Name { name } => output.name = Some(name),
            _ => {}
        }
    }
}

impl Dispatch<ZxdgOutputV1, OutputData> for Context {
    fn event(
        ctx: &mut Self,
        _: &ZxdgOutputV1,
        event: zxdg_output_v1::Event,
        data: &OutputData,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        // Done is deprecated with xdg-output v3 but still sent by some
        // compositors; wl_output.done is the usual aggregation point.
        if let zxdg_output_v1::Event::Done = event {
            reconcile(ctx, data.global);
            return;
        }
        let Some(output) = ctx.outputs.iter_mut().find(|o| o.global == data.global) else {
            return;
        };
        match event {
            zxdg_output_v1::Event::LogicalSize { width, height } => {
                output.width = width;
                output.height = height;
            }
            zxdg_output_v1::Event::Name { name } => output.name = Some(name),
            _ => {}
        }
    }
}

//! Bar instance lifecycle: creation, configure, redraw, hide/unhide and
//! destruction.
//!
//! An instance is the live surface stack of one `(output, config variant)`
//! pairing: the bar surface, the icon sub-surface on top of it, and any
//! transient indicator sub-surfaces below the icons. Every configure is
//! ack'd before the commit that answers it.

use crate::buffer::BufferPool;
use crate::indicator::Indicator;
use crate::{seat, Context, Globals};
use lava_config::{item, BarConfig, Item, ItemSlot, LayerKind};
use lava_core::{LavaError, Orientation, Rect, Result};
use lava_renderer::{draw, layout, BarDimensions, Icon};
use lava_toplevel::ActivityTracker;
use tracing::{debug, info};
use wayland_client::backend::ObjectId;
use wayland_client::protocol::wl_subsurface::WlSubsurface;
use wayland_client::protocol::wl_surface::WlSurface;
use wayland_client::{Connection, Dispatch, QueueHandle};
use wayland_protocols_wlr::layer_shell::v1::client::{
    zwlr_layer_shell_v1::Layer,
    zwlr_layer_surface_v1::{self, Anchor, KeyboardInteractivity, ZwlrLayerSurfaceV1},
};

/// User data on the layer surface, keying configure events back to the
/// owning instance.
#[derive(Debug, Clone, Copy)]
pub struct LayerSurfaceData {
    pub instance: u64,
}

pub struct BarInstance {
    pub id: u64,
    pub bar_index: usize,
    pub config_index: usize,
    pub surface: WlSurface,
    pub icon_surface: WlSurface,
    pub icon_subsurface: WlSubsurface,
    pub layer_surface: ZwlrLayerSurfaceV1,
    pub bar_buffers: BufferPool,
    pub icon_buffers: BufferPool,
    pub dims: BarDimensions,
    pub slots: Vec<ItemSlot>,
    /// At least one configure has been received; drawing is gated on this.
    pub configured: bool,
    pub hidden: bool,
    /// Number of pointers currently on this instance's surface.
    pub hover: u32,
    pub indicators: Vec<Indicator>,
}

impl BarInstance {
    /// Surface-local rectangle of one item cell.
    pub fn item_cell(&self, index: usize, orientation: Orientation) -> Rect {
        let slot = self.slots[index];
        let area = self.dims.item_area;
        match orientation {
            Orientation::Horizontal => {
                Rect::new(area.x + slot.ordinate as i32, area.y, slot.length, area.h)
            }
            Orientation::Vertical => {
                Rect::new(area.x, area.y + slot.ordinate as i32, area.w, slot.length)
            }
        }
    }

    /// Hit-test a surface-local point to an item index.
    pub fn item_under(&self, x: f64, y: f64, orientation: Orientation) -> Option<usize> {
        let area = self.dims.item_area;
        if !area.contains(x, y) {
            return None;
        }
        let ordinate = match orientation {
            Orientation::Horizontal => x - area.x as f64,
            Orientation::Vertical => y - area.y as f64,
        };
        item::item_at(&self.slots, ordinate)
    }

    pub fn remove_indicator(&mut self, id: u64) {
        if let Some(pos) = self.indicators.iter().position(|i| i.id == id) {
            self.indicators.remove(pos).destroy();
        }
    }
}

pub fn layer_kind(layer: LayerKind) -> Layer {
    match layer {
        LayerKind::Overlay => Layer::Overlay,
        LayerKind::Top => Layer::Top,
        LayerKind::Bottom => Layer::Bottom,
        LayerKind::Background => Layer::Background,
    }
}

/// Spawn the surface stack for `(output, config)` and request the first
/// configure.
pub fn create(ctx: &mut Context, output_idx: usize, bar_index: usize, config_index: usize) {
    let id = ctx.alloc_id();
    let qh = ctx.qh.clone();
    let bar = &ctx.config.bars[bar_index];
    let config = &bar.configs[config_index];
    let output = &ctx.outputs[output_idx];

    let slots = item::compute_slots(&bar.items, config.size);
    let total = item::total_length(&bar.items, config.size);
    let dims = layout::compute(config, total, output.width.max(0) as u32, output.height.max(0) as u32);
    let hidden = config.hidden_mode.should_hide(false, output.occupied);

    let surface = ctx.globals.compositor.create_surface(&qh, ());
    let icon_surface = ctx.globals.compositor.create_surface(&qh, ());
    let icon_subsurface = ctx
        .globals
        .subcompositor
        .get_subsurface(&icon_surface, &surface, &qh, ());
    // All input goes to the bar surface.
    let empty = ctx.globals.compositor.create_region(&qh, ());
    icon_surface.set_input_region(Some(&empty));
    empty.destroy();

    let layer_surface = ctx.globals.layer_shell.get_layer_surface(
        &surface,
        Some(&output.wl),
        layer_kind(config.layer),
        config.namespace.clone(),
        &qh,
        LayerSurfaceData { instance: id },
    );

    let inst = BarInstance {
        id,
        bar_index,
        config_index,
        surface,
        icon_surface,
        icon_subsurface,
        layer_surface,
        bar_buffers: BufferPool::new(),
        icon_buffers: BufferPool::new(),
        dims,
        slots,
        configured: false,
        hidden,
        hover: 0,
        indicators: Vec::new(),
    };
    send_layout(&inst);
    set_input_region(&inst, &ctx.globals, &qh);
    inst.surface.commit();

    info!(
        "Created bar instance on output {}",
        output.name.as_deref().unwrap_or("(unnamed)")
    );
    ctx.outputs[output_idx].instances.push(inst);
}

/// Input stays confined to the bar rectangle of the current state; clicks
/// elsewhere on a full-edge surface pass through.
fn set_input_region(inst: &BarInstance, globals: &Globals, qh: &QueueHandle<Context>) {
    let input = if inst.hidden {
        inst.dims.bar_hidden
    } else {
        inst.dims.bar
    };
    let region = globals.compositor.create_region(qh, ());
    region.add(input.x, input.y, input.w as i32, input.h as i32);
    inst.surface.set_input_region(Some(&region));
    region.destroy();
}

/// Send size, anchor, margin and exclusive zone for the current state.
fn send_layout(inst: &BarInstance) {
    let extent = if inst.hidden {
        inst.dims.surface_hidden
    } else {
        inst.dims.surface
    };
    inst.layer_surface.set_size(extent.w, extent.h);
    inst.layer_surface
        .set_anchor(Anchor::from_bits_truncate(inst.dims.anchors.bits()));
    let m = inst.dims.margin;
    inst.layer_surface
        .set_margin(m.top as i32, m.right as i32, m.bottom as i32, m.left as i32);
    inst.layer_surface.set_exclusive_zone(inst.dims.exclusive_zone);
    inst.layer_surface
        .set_keyboard_interactivity(KeyboardInteractivity::None);
}

/// The output's attributes changed but the same variant still wins:
/// recompute, and only touch the wire if something actually moved.
pub fn reconfigure(ctx: &mut Context, output_idx: usize, inst_idx: usize) {
    let output = &ctx.outputs[output_idx];
    let inst = &output.instances[inst_idx];
    let bar = &ctx.config.bars[inst.bar_index];
    let config = &bar.configs[inst.config_index];
    let total = item::total_length(&bar.items, config.size);
    let dims = layout::compute(config, total, output.width.max(0) as u32, output.height.max(0) as u32);

    if dims == inst.dims {
        return;
    }
    let inst = &mut ctx.outputs[output_idx].instances[inst_idx];
    inst.dims = dims;
    send_layout(inst);
    inst.surface.commit();
}

/// Flip the hidden state. Idempotent: an instance already in the requested
/// state produces no wire traffic.
pub fn set_hidden(ctx: &mut Context, output_idx: usize, inst_idx: usize, hidden: bool) {
    let inst = &mut ctx.outputs[output_idx].instances[inst_idx];
    if inst.hidden == hidden {
        return;
    }
    inst.hidden = hidden;
    debug!("Bar instance {}", if hidden { "hiding" } else { "unhiding" });

    let extent = if hidden {
        inst.dims.surface_hidden
    } else {
        inst.dims.surface
    };
    inst.layer_surface.set_size(extent.w, extent.h);
    inst.surface.commit();
    // The redraw follows the compositor's configure for the new size.
}

/// Re-evaluate the hide policy for every instance on one output.
pub fn apply_hide_policy(ctx: &mut Context, output_idx: usize) {
    for inst_idx in 0..ctx.outputs[output_idx].instances.len() {
        let target = {
            let output = &ctx.outputs[output_idx];
            let inst = &output.instances[inst_idx];
            let config = &ctx.config.bars[inst.bar_index].configs[inst.config_index];
            config.hidden_mode.should_hide(inst.hover > 0, output.occupied)
        };
        set_hidden(ctx, output_idx, inst_idx, target);
    }
}

/// Redraw one instance; a no-op until the first configure arrived.
pub fn render(ctx: &mut Context, output_idx: usize, inst_idx: usize) {
    let result = {
        let Context {
            outputs,
            config,
            icons,
            globals,
            qh,
            toplevels,
            ..
        } = ctx;
        let output = &mut outputs[output_idx];
        let scale = output.scale.max(1);
        let inst = &mut output.instances[inst_idx];
        let bar = &config.bars[inst.bar_index];
        render_instance(
            inst,
            &bar.configs[inst.config_index],
            &bar.items,
            &icons[inst.bar_index],
            &toplevels.tracker,
            globals,
            qh,
            scale,
        )
    };
    if let Err(e) = result {
        ctx.fail(format!("rendering bar instance failed: {e}"));
    }
}

/// Redraw every instance everywhere (toplevel counters changed).
pub fn render_all(ctx: &mut Context) {
    for output_idx in 0..ctx.outputs.len() {
        for inst_idx in 0..ctx.outputs[output_idx].instances.len() {
            render(ctx, output_idx, inst_idx);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn render_instance(
    inst: &mut BarInstance,
    config: &BarConfig,
    items: &[Item],
    icons: &[Option<Icon>],
    tracker: &ActivityTracker<ObjectId>,
    globals: &Globals,
    qh: &QueueHandle<Context>,
    scale: i32,
) -> Result<()> {
    if !inst.configured {
        return Ok(());
    }
    let orientation = config.position.orientation();
    let px = |v: u32| v * scale as u32;

    // Bar surface: background and border, or nothing while hidden.
    let extent = if inst.hidden {
        inst.dims.surface_hidden
    } else {
        inst.dims.surface
    };
    {
        let buffer = inst
            .bar_buffers
            .acquire(&globals.shm, qh, px(extent.w), px(extent.h))?;
        let cr = buffer.begin()?;
        draw::clear(&cr).map_err(cairo_err)?;
        if !inst.hidden {
            cr.scale(f64::from(scale), f64::from(scale));
            draw::draw_bar(
                &cr,
                inst.dims.bar,
                config.border,
                config.radii,
                config.background_colour,
                config.border_colour,
            )
            .map_err(cairo_err)?;
        }
        cr.target().flush();
        drop(cr);
        inst.surface.set_buffer_scale(scale);
        inst.surface.attach(Some(buffer.wl()), 0, 0);
        inst.surface
            .damage_buffer(0, 0, px(extent.w) as i32, px(extent.h) as i32);
        buffer.mark_busy();
    }

    set_input_region(inst, globals, qh);

    // Icon sub-surface: one image per button, cleared while hidden.
    let area = if inst.hidden {
        inst.dims.item_area_hidden
    } else {
        inst.dims.item_area
    };
    {
        let buffer = inst
            .icon_buffers
            .acquire(&globals.shm, qh, px(area.w), px(area.h))?;
        let cr = buffer.begin()?;
        draw::clear(&cr).map_err(cairo_err)?;
        if !inst.hidden {
            cr.scale(f64::from(scale), f64::from(scale));
            for (index, item) in items.iter().enumerate() {
                let Some(button) = item.as_button() else {
                    continue;
                };
                let slot = inst.slots[index];
                // Cell rectangle relative to the item area origin.
                let cell = match orientation {
                    Orientation::Horizontal => {
                        Rect::new(slot.ordinate as i32, 0, slot.length, area.h)
                    }
                    Orientation::Vertical => {
                        Rect::new(0, slot.ordinate as i32, area.w, slot.length)
                    }
                };
                if let Some(icon) = &icons[index] {
                    draw::draw_icon(&cr, &icon.surface, cell, config.icon_padding)
                        .map_err(cairo_err)?;
                }
                if let Some(app_id) = &button.app_id {
                    // Light the button up while its application is running.
                    if tracker.activated_count(app_id) > 0 {
                        draw::draw_activity_mark(&cr, cell, config.indicator_active_colour)
                            .map_err(cairo_err)?;
                    } else if tracker.running_count(app_id) > 0 {
                        draw::draw_activity_mark(&cr, cell, config.indicator_hover_colour)
                            .map_err(cairo_err)?;
                    }
                }
            }
        }
        cr.target().flush();
        drop(cr);
        inst.icon_subsurface.set_position(area.x, area.y);
        inst.icon_surface.set_buffer_scale(scale);
        inst.icon_surface.attach(Some(buffer.wl()), 0, 0);
        inst.icon_surface
            .damage_buffer(0, 0, px(area.w) as i32, px(area.h) as i32);
        buffer.mark_busy();
    }

    // Indicators follow their items.
    for k in 0..inst.indicators.len() {
        let cell = inst.item_cell(inst.indicators[k].item_index, orientation);
        let indicator = &mut inst.indicators[k];
        crate::indicator::draw(indicator, cell, config, globals, qh, scale)?;
    }

    inst.icon_surface.commit();
    inst.surface.commit();
    Ok(())
}

fn cairo_err(e: cairo::Error) -> LavaError {
    LavaError::Wayland(format!("cairo: {e}"))
}

/// Tear one instance down, releasing seat references first.
pub fn destroy(ctx: &mut Context, output_idx: usize, inst_idx: usize) {
    let mut inst = ctx.outputs[output_idx].instances.remove(inst_idx);
    seat::forget_instance(&mut ctx.seats, inst.id);
    for indicator in inst.indicators.drain(..) {
        indicator.destroy();
    }
    inst.bar_buffers.destroy();
    inst.icon_buffers.destroy();
    inst.layer_surface.destroy();
    inst.icon_subsurface.destroy();
    inst.icon_surface.destroy();
    inst.surface.destroy();
    debug!("Destroyed bar instance");
}

impl Dispatch<ZwlrLayerSurfaceV1, LayerSurfaceData> for Context {
    fn event(
        ctx: &mut Self,
        layer_surface: &ZwlrLayerSurfaceV1,
        event: zwlr_layer_surface_v1::Event,
        data: &LayerSurfaceData,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            zwlr_layer_surface_v1::Event::Configure {
                serial,
                width,
                height,
            } => {
                // Ack always precedes the commit that answers the configure.
                layer_surface.ack_configure(serial);
                let Some((output_idx, inst_idx)) = ctx.find_instance(data.instance) else {
                    return;
                };

                // The compositor may constrain the surface; re-derive the
                // layout from what it granted (hidden sizes are ours alone).
                let recompute = {
                    let inst = &ctx.outputs[output_idx].instances[inst_idx];
                    !inst.hidden
                        && width > 0
                        && height > 0
                        && (inst.dims.surface.w != width || inst.dims.surface.h != height)
                };
                if recompute {
                    let inst = &ctx.outputs[output_idx].instances[inst_idx];
                    let bar = &ctx.config.bars[inst.bar_index];
                    let config = &bar.configs[inst.config_index];
                    let total = item::total_length(&bar.items, config.size);
                    let dims = layout::compute(config, total, width, height);
                    ctx.outputs[output_idx].instances[inst_idx].dims = dims;
                }

                ctx.outputs[output_idx].instances[inst_idx].configured = true;
                render(ctx, output_idx, inst_idx);
            }
            zwlr_layer_surface_v1::Event::Closed => {
                // Not fatal to the process; only this instance goes away.
                info!("Layer surface closed by the compositor");
                if let Some((output_idx, inst_idx)) = ctx.find_instance(data.instance) {
                    destroy(ctx, output_idx, inst_idx);
                }
            }
            _ => {}
        }
    }
}

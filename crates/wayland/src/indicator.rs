//! Hover/touch indicator sub-surfaces.
//!
//! One indicator exists per pointer focus or active touch point, placed
//! below the icon sub-surface at the focused item's cell, inset by the
//! configured indicator padding. It lives exactly as long as the focus does.

use crate::buffer::BufferPool;
use crate::instance::BarInstance;
use crate::{Context, Globals};
use lava_config::BarConfig;
use lava_core::{Orientation, Rect, Result};
use lava_renderer::draw as shapes;
use wayland_client::protocol::{wl_subsurface::WlSubsurface, wl_surface::WlSurface};
use wayland_client::QueueHandle;

pub struct Indicator {
    pub id: u64,
    pub item_index: usize,
    /// Pressed/touching rather than merely hovered.
    pub active: bool,
    surface: WlSurface,
    subsurface: WlSubsurface,
    buffers: BufferPool,
}

impl Indicator {
    pub fn destroy(mut self) {
        self.buffers.destroy();
        self.subsurface.destroy();
        self.surface.destroy();
    }
}

/// Create an indicator over `item_index` and draw its first frame. The
/// caller commits the parent surface.
#[allow(clippy::too_many_arguments)]
pub fn create(
    globals: &Globals,
    qh: &QueueHandle<Context>,
    inst: &mut BarInstance,
    item_index: usize,
    active: bool,
    config: &BarConfig,
    orientation: Orientation,
    scale: i32,
    id: u64,
) -> Result<u64> {
    let surface = globals.compositor.create_surface(qh, ());
    // Input belongs to the bar surface alone.
    let empty = globals.compositor.create_region(qh, ());
    surface.set_input_region(Some(&empty));
    empty.destroy();

    let subsurface = globals
        .subcompositor
        .get_subsurface(&surface, &inst.surface, qh, ());
    subsurface.place_below(&inst.icon_surface);

    let mut indicator = Indicator {
        id,
        item_index,
        active,
        surface,
        subsurface,
        buffers: BufferPool::new(),
    };
    let cell = inst.item_cell(item_index, orientation);
    draw(&mut indicator, cell, config, globals, qh, scale)?;
    inst.indicators.push(indicator);
    Ok(id)
}

/// Position and repaint an indicator for its item cell.
pub fn draw(
    indicator: &mut Indicator,
    cell: Rect,
    config: &BarConfig,
    globals: &Globals,
    qh: &QueueHandle<Context>,
    scale: i32,
) -> Result<()> {
    let rect = inset(cell, config.indicator_padding);
    indicator.subsurface.set_position(rect.x, rect.y);

    let px = |v: u32| v * scale as u32;
    let buffer = indicator
        .buffers
        .acquire(&globals.shm, qh, px(rect.w), px(rect.h))?;
    let cr = buffer.begin()?;
    shapes::clear(&cr).map_err(|e| lava_core::LavaError::Wayland(format!("cairo: {e}")))?;
    cr.scale(f64::from(scale), f64::from(scale));
    let colour = if indicator.active {
        config.indicator_active_colour
    } else {
        config.indicator_hover_colour
    };
    shapes::draw_indicator(
        &cr,
        Rect::new(0, 0, rect.w, rect.h),
        config.indicator_style,
        colour,
    )
    .map_err(|e| lava_core::LavaError::Wayland(format!("cairo: {e}")))?;
    cr.target().flush();
    drop(cr);

    indicator.surface.set_buffer_scale(scale);
    indicator.surface.attach(Some(buffer.wl()), 0, 0);
    indicator
        .surface
        .damage_buffer(0, 0, px(rect.w) as i32, px(rect.h) as i32);
    buffer.mark_busy();
    indicator.surface.commit();
    Ok(())
}

fn inset(rect: Rect, padding: u32) -> Rect {
    let w = rect.w.saturating_sub(2 * padding).max(1);
    let h = rect.h.saturating_sub(2 * padding).max(1);
    Rect::new(rect.x + padding as i32, rect.y + padding as i32, w, h)
}

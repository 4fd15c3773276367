//! Cairo drawing primitives for bar, icon and indicator buffers.

use crate::layout::clamp_radii;
use cairo::{Context, Operator};
use lava_config::{Corners, IndicatorStyle, Sides};
use lava_core::{Color, Rect};
use std::f64::consts::PI;

/// Wipe a buffer to fully transparent.
pub fn clear(ctx: &Context) -> Result<(), cairo::Error> {
    ctx.save()?;
    ctx.set_operator(Operator::Clear);
    ctx.paint()?;
    ctx.restore()
}

fn set_colour(ctx: &Context, colour: Color) {
    ctx.set_source_rgba(colour.r, colour.g, colour.b, colour.a);
}

/// Trace a rectangle path with per-corner radii.
fn rounded_rectangle(ctx: &Context, rect: Rect, radii: Corners) {
    let (x, y) = (rect.x as f64, rect.y as f64);
    let (w, h) = (rect.w as f64, rect.h as f64);
    let tl = radii.top_left as f64;
    let tr = radii.top_right as f64;
    let bl = radii.bottom_left as f64;
    let br = radii.bottom_right as f64;

    ctx.new_sub_path();
    ctx.arc(x + w - tr, y + tr, tr, -PI / 2.0, 0.0);
    ctx.arc(x + w - br, y + h - br, br, 0.0, PI / 2.0);
    ctx.arc(x + bl, y + h - bl, bl, PI / 2.0, PI);
    ctx.arc(x + tl, y + tl, tl, PI, 1.5 * PI);
    ctx.close_path();
}

/// Paint the bar background and border into an already-cleared buffer.
pub fn draw_bar(
    ctx: &Context,
    bar: Rect,
    border: Sides,
    radii: Corners,
    background: Color,
    border_colour: Color,
) -> Result<(), cairo::Error> {
    let center_w = bar.w.saturating_sub(border.left + border.right);
    let center_h = bar.h.saturating_sub(border.top + border.bottom);
    let radii = clamp_radii(radii, center_w, center_h);

    ctx.save()?;
    ctx.set_operator(Operator::Source);

    // Border colour over the full bar, background over the centre.
    set_colour(ctx, border_colour);
    rounded_rectangle(ctx, bar, radii);
    ctx.fill()?;

    let center = Rect::new(
        bar.x + border.left as i32,
        bar.y + border.top as i32,
        center_w,
        center_h,
    );
    let inner = Corners {
        top_left: radii.top_left.saturating_sub(border.top.max(border.left)),
        top_right: radii.top_right.saturating_sub(border.top.max(border.right)),
        bottom_left: radii.bottom_left.saturating_sub(border.bottom.max(border.left)),
        bottom_right: radii.bottom_right.saturating_sub(border.bottom.max(border.right)),
    };
    set_colour(ctx, background);
    rounded_rectangle(ctx, center, inner);
    ctx.fill()?;

    ctx.restore()
}

/// Paint an indicator shape filling `rect`.
pub fn draw_indicator(
    ctx: &Context,
    rect: Rect,
    style: IndicatorStyle,
    colour: Color,
) -> Result<(), cairo::Error> {
    ctx.save()?;
    ctx.set_operator(Operator::Source);
    set_colour(ctx, colour);
    match style {
        IndicatorStyle::Rectangle => {
            ctx.rectangle(rect.x as f64, rect.y as f64, rect.w as f64, rect.h as f64);
        }
        IndicatorStyle::RoundedRectangle => {
            let radius = rect.w.min(rect.h) / 5;
            rounded_rectangle(ctx, rect, Corners::splat(radius));
        }
        IndicatorStyle::Circle => {
            let r = rect.w.min(rect.h) as f64 / 2.0;
            ctx.arc(
                rect.x as f64 + rect.w as f64 / 2.0,
                rect.y as f64 + rect.h as f64 / 2.0,
                r,
                0.0,
                2.0 * PI,
            );
        }
    }
    ctx.fill()?;
    ctx.restore()
}

/// Draw a button image scaled (aspect preserved) into its cell, inset by the
/// icon padding.
pub fn draw_icon(
    ctx: &Context,
    image: &cairo::ImageSurface,
    cell: Rect,
    padding: u32,
) -> Result<(), cairo::Error> {
    let target_w = cell.w.saturating_sub(2 * padding) as f64;
    let target_h = cell.h.saturating_sub(2 * padding) as f64;
    if target_w <= 0.0 || target_h <= 0.0 {
        return Ok(());
    }
    let (img_w, img_h) = (image.width() as f64, image.height() as f64);
    if img_w <= 0.0 || img_h <= 0.0 {
        return Ok(());
    }

    let scale = (target_w / img_w).min(target_h / img_h);
    let draw_w = img_w * scale;
    let draw_h = img_h * scale;
    let x = cell.x as f64 + padding as f64 + (target_w - draw_w) / 2.0;
    let y = cell.y as f64 + padding as f64 + (target_h - draw_h) / 2.0;

    ctx.save()?;
    ctx.translate(x, y);
    ctx.scale(scale, scale);
    ctx.set_source_surface(image, 0.0, 0.0)?;
    ctx.paint()?;
    ctx.restore()
}

/// Small activity mark on the screen-edge side of a running button's cell.
pub fn draw_activity_mark(
    ctx: &Context,
    cell: Rect,
    colour: Color,
) -> Result<(), cairo::Error> {
    let r = (cell.w.min(cell.h) as f64 / 16.0).max(2.0);
    ctx.save()?;
    set_colour(ctx, colour);
    ctx.arc(
        cell.x as f64 + cell.w as f64 / 2.0,
        cell.y as f64 + cell.h as f64 - r,
        r,
        0.0,
        2.0 * PI,
    );
    ctx.fill()?;
    ctx.restore()
}

//! Seats: pointer, touch and keyboard state, and the dispatch from raw
//! input events to item commands.
//!
//! Mouse commands fire on press-then-release over the same item with the
//! same button; touch commands on down-then-up with the same touch id and
//! no intervening motion off the item. Scroll fires immediately and has no
//! universal fallback. Keyboard state exists only to supply modifiers and
//! is requested only when some bind needs them.

use crate::{command, indicator, instance, output::Output, Context};
use lava_config::{EventKind, ItemCommand, MetaAction, Modifiers, ScrollDirection};
use memmap2::Mmap;
use std::fs::File;
use tracing::{debug, info, warn};
use wayland_client::protocol::{
    wl_keyboard::{self, KeymapFormat, WlKeyboard},
    wl_pointer::{self, Axis, ButtonState, WlPointer},
    wl_registry::WlRegistry,
    wl_seat::{self, Capability, WlSeat},
    wl_surface::WlSurface,
    wl_touch::{self, WlTouch},
};
use wayland_client::{Connection, Dispatch, Proxy, QueueHandle, WEnum};
use wayland_cursor::CursorTheme;
use xkbcommon::xkb;

/// User data keying every seat device back to its registry global.
#[derive(Debug, Clone, Copy)]
pub struct SeatData {
    pub global: u32,
}

/// Pointer focus state: which instance, where, and the indicator that
/// follows it.
pub struct PointerFocus {
    pub instance: u64,
    pub x: f64,
    pub y: f64,
    pub item: Option<usize>,
    /// Item and button recorded at press time.
    pub pressed: Option<(usize, u32)>,
    pub indicator: Option<u64>,
}

pub struct TouchPoint {
    pub touch_id: i32,
    pub instance: u64,
    pub item: Option<usize>,
    pub indicator: Option<u64>,
}

pub struct Seat {
    pub global: u32,
    pub wl: WlSeat,
    pub name: String,
    pub pointer: Option<WlPointer>,
    pub touch: Option<WlTouch>,
    pub keyboard: Option<WlKeyboard>,
    xkb_context: xkb::Context,
    xkb_state: Option<xkb::State>,
    pub modifiers: Modifiers,
    pub focus: Option<PointerFocus>,
    pub touches: Vec<TouchPoint>,
    pub cursor_surface: Option<WlSurface>,
}

pub fn add_seat(ctx: &mut Context, registry: &WlRegistry, global: u32, version: u32) {
    let qh = ctx.qh.clone();
    let wl = registry.bind::<WlSeat, _, _>(global, version.min(5), &qh, SeatData { global });
    ctx.seats.push(Seat {
        global,
        wl,
        name: String::new(),
        pointer: None,
        touch: None,
        keyboard: None,
        xkb_context: xkb::Context::new(xkb::CONTEXT_NO_FLAGS),
        xkb_state: None,
        modifiers: Modifiers::NONE,
        focus: None,
        touches: Vec::new(),
        cursor_surface: None,
    });
    debug!("Seat announced (global {global})");
}

pub fn remove_seat(ctx: &mut Context, global: u32) {
    let Some(idx) = ctx.seats.iter().position(|s| s.global == global) else {
        return;
    };
    clear_pointer_focus(ctx, idx);
    clear_touches(ctx, idx);
    let seat = ctx.seats.remove(idx);
    if let Some(pointer) = seat.pointer {
        pointer.release();
    }
    if let Some(touch) = seat.touch {
        touch.release();
    }
    if let Some(keyboard) = seat.keyboard {
        keyboard.release();
    }
    if let Some(surface) = seat.cursor_surface {
        surface.destroy();
    }
    if seat.wl.version() >= 5 {
        seat.wl.release();
    }
    info!("Seat '{}' removed", seat.name);
}

/// Drop every reference seats hold to a dying instance.
pub fn forget_instance(seats: &mut [Seat], instance_id: u64) {
    for seat in seats {
        if seat.focus.as_ref().is_some_and(|f| f.instance == instance_id) {
            seat.focus = None;
        }
        seat.touches.retain(|tp| tp.instance != instance_id);
    }
}

fn find_seat(seats: &[Seat], global: u32) -> Option<usize> {
    seats.iter().position(|s| s.global == global)
}

fn find_instance_by_surface(
    outputs: &[Output],
    surface: &WlSurface,
) -> Option<(usize, usize, u64)> {
    for (o, output) in outputs.iter().enumerate() {
        for (i, inst) in output.instances.iter().enumerate() {
            if inst.surface == *surface {
                return Some((o, i, inst.id));
            }
        }
    }
    None
}

/// Item under a surface-local point, buttons only.
fn button_under(ctx: &Context, output_idx: usize, inst_idx: usize, x: f64, y: f64) -> Option<usize> {
    let inst = &ctx.outputs[output_idx].instances[inst_idx];
    let bar = &ctx.config.bars[inst.bar_index];
    let orientation = bar.configs[inst.config_index].position.orientation();
    inst.item_under(x, y, orientation)
        .filter(|&ix| bar.items[ix].as_button().is_some())
}

// ── Pointer ───────────────────────────────────────────────────────────────────

fn clear_pointer_focus(ctx: &mut Context, seat_idx: usize) {
    let Some(focus) = ctx.seats[seat_idx].focus.take() else {
        return;
    };
    if let Some((o, i)) = ctx.find_instance(focus.instance) {
        if let Some(ind) = focus.indicator {
            ctx.outputs[o].instances[i].remove_indicator(ind);
            ctx.outputs[o].instances[i].surface.commit();
        }
        let inst = &mut ctx.outputs[o].instances[i];
        inst.hover = inst.hover.saturating_sub(1);
        instance::apply_hide_policy(ctx, o);
    }
}

/// Track the item under the pointer, moving the hover indicator with it.
fn update_pointer_item(ctx: &mut Context, seat_idx: usize) {
    let (instance_id, x, y, previous, old_indicator) = {
        let Some(focus) = &ctx.seats[seat_idx].focus else {
            return;
        };
        (focus.instance, focus.x, focus.y, focus.item, focus.indicator)
    };
    let Some((o, i)) = ctx.find_instance(instance_id) else {
        return;
    };
    let current = button_under(ctx, o, i, x, y);
    if current == previous {
        return;
    }

    if let Some(ind) = old_indicator {
        ctx.outputs[o].instances[i].remove_indicator(ind);
    }
    let new_indicator = match current {
        Some(item_index) => {
            let id = ctx.alloc_id();
            let created = {
                let Context {
                    outputs,
                    config,
                    globals,
                    qh,
                    ..
                } = ctx;
                let output = &mut outputs[o];
                let scale = output.scale.max(1);
                let inst = &mut output.instances[i];
                let cfg = &config.bars[inst.bar_index].configs[inst.config_index];
                indicator::create(
                    globals,
                    qh,
                    inst,
                    item_index,
                    false,
                    cfg,
                    cfg.position.orientation(),
                    scale,
                    id,
                )
            };
            match created {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!("Cannot create indicator: {e}");
                    None
                }
            }
        }
        None => None,
    };
    ctx.outputs[o].instances[i].surface.commit();

    if let Some(focus) = &mut ctx.seats[seat_idx].focus {
        focus.item = current;
        focus.indicator = new_indicator;
    }
}

/// Repaint an indicator in its hover or active colour.
fn set_indicator_active(ctx: &mut Context, instance_id: u64, indicator_id: Option<u64>, active: bool) {
    let Some(ind_id) = indicator_id else {
        return;
    };
    let Some((o, i)) = ctx.find_instance(instance_id) else {
        return;
    };
    let Context {
        outputs,
        config,
        globals,
        qh,
        ..
    } = ctx;
    let output = &mut outputs[o];
    let scale = output.scale.max(1);
    let inst = &mut output.instances[i];
    let cfg = &config.bars[inst.bar_index].configs[inst.config_index];
    let orientation = cfg.position.orientation();

    if let Some(pos) = inst.indicators.iter().position(|d| d.id == ind_id) {
        if inst.indicators[pos].active == active {
            return;
        }
        let cell = inst.item_cell(inst.indicators[pos].item_index, orientation);
        let ind = &mut inst.indicators[pos];
        ind.active = active;
        if let Err(e) = indicator::draw(ind, cell, cfg, globals, qh, scale) {
            warn!("Cannot redraw indicator: {e}");
        }
        inst.surface.commit();
    }
}

impl Dispatch<WlPointer, SeatData> for Context {
    fn event(
        ctx: &mut Self,
        _: &WlPointer,
        event: wl_pointer::Event,
        data: &SeatData,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let Some(seat_idx) = find_seat(&ctx.seats, data.global) else {
            return;
        };
        match event {
            wl_pointer::Event::Enter {
                serial,
                surface,
                surface_x,
                surface_y,
            } => {
                let Some((o, i, inst_id)) = find_instance_by_surface(&ctx.outputs, &surface)
                else {
                    return;
                };
                ctx.outputs[o].instances[i].hover += 1;

                let (cursor_name, scale) = {
                    let inst = &ctx.outputs[o].instances[i];
                    let cfg = &ctx.config.bars[inst.bar_index].configs[inst.config_index];
                    (cfg.cursor_name.clone(), ctx.outputs[o].scale.max(1))
                };
                set_cursor(ctx, seat_idx, serial, &cursor_name, scale);
                instance::apply_hide_policy(ctx, o);

                ctx.seats[seat_idx].focus = Some(PointerFocus {
                    instance: inst_id,
                    x: surface_x,
                    y: surface_y,
                    item: None,
                    pressed: None,
                    indicator: None,
                });
                update_pointer_item(ctx, seat_idx);
            }
            wl_pointer::Event::Leave { .. } => clear_pointer_focus(ctx, seat_idx),
            wl_pointer::Event::Motion {
                surface_x,
                surface_y,
                ..
            } => {
                if let Some(focus) = &mut ctx.seats[seat_idx].focus {
                    focus.x = surface_x;
                    focus.y = surface_y;
                    update_pointer_item(ctx, seat_idx);
                }
            }
            wl_pointer::Event::Button {
                button,
                state: WEnum::Value(state),
                ..
            } => match state {
                ButtonState::Pressed => {
                    let Some(focus) = &mut ctx.seats[seat_idx].focus else {
                        return;
                    };
                    focus.pressed = focus.item.map(|item| (item, button));
                    let (inst_id, ind) = (focus.instance, focus.indicator);
                    if focus.pressed.is_some() {
                        set_indicator_active(ctx, inst_id, ind, true);
                    }
                }
                ButtonState::Released => {
                    let Some(focus) = &mut ctx.seats[seat_idx].focus else {
                        return;
                    };
                    let pressed = focus.pressed.take();
                    let (inst_id, item, ind) = (focus.instance, focus.item, focus.indicator);
                    set_indicator_active(ctx, inst_id, ind, false);
                    if let Some((pressed_item, pressed_button)) = pressed {
                        if pressed_button == button && item == Some(pressed_item) {
                            fire(ctx, seat_idx, inst_id, pressed_item, EventKind::Button(button));
                        }
                    }
                }
                _ => {}
            },
            wl_pointer::Event::Axis {
                axis: WEnum::Value(Axis::VerticalScroll),
                value,
                ..
            } => {
                if value == 0.0 {
                    return;
                }
                let direction = if value < 0.0 {
                    ScrollDirection::Up
                } else {
                    ScrollDirection::Down
                };
                let target = ctx.seats[seat_idx]
                    .focus
                    .as_ref()
                    .and_then(|f| f.item.map(|item| (f.instance, item)));
                if let Some((inst_id, item)) = target {
                    fire(ctx, seat_idx, inst_id, item, EventKind::Scroll(direction));
                }
            }
            _ => {}
        }
    }
}

// ── Touch ─────────────────────────────────────────────────────────────────────

fn clear_touches(ctx: &mut Context, seat_idx: usize) {
    let touches = std::mem::take(&mut ctx.seats[seat_idx].touches);
    for tp in touches {
        if let Some(ind) = tp.indicator {
            if let Some((o, i)) = ctx.find_instance(tp.instance) {
                ctx.outputs[o].instances[i].remove_indicator(ind);
                ctx.outputs[o].instances[i].surface.commit();
            }
        }
    }
}

impl Dispatch<WlTouch, SeatData> for Context {
    fn event(
        ctx: &mut Self,
        _: &WlTouch,
        event: wl_touch::Event,
        data: &SeatData,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let Some(seat_idx) = find_seat(&ctx.seats, data.global) else {
            return;
        };
        match event {
            wl_touch::Event::Down {
                surface, id, x, y, ..
            } => {
                let Some((o, i, inst_id)) = find_instance_by_surface(&ctx.outputs, &surface)
                else {
                    return;
                };
                let item = button_under(ctx, o, i, x, y);
                let indicator = item.and_then(|item_index| {
                    let ind_id = ctx.alloc_id();
                    let created = {
                        let Context {
                            outputs,
                            config,
                            globals,
                            qh,
                            ..
                        } = ctx;
                        let output = &mut outputs[o];
                        let scale = output.scale.max(1);
                        let inst = &mut output.instances[i];
                        let cfg = &config.bars[inst.bar_index].configs[inst.config_index];
                        indicator::create(
                            globals,
                            qh,
                            inst,
                            item_index,
                            true,
                            cfg,
                            cfg.position.orientation(),
                            scale,
                            ind_id,
                        )
                    };
                    ctx.outputs[o].instances[i].surface.commit();
                    created.ok()
                });
                ctx.seats[seat_idx].touches.push(TouchPoint {
                    touch_id: id,
                    instance: inst_id,
                    item,
                    indicator,
                });
            }
            wl_touch::Event::Motion { id, x, y, .. } => {
                let Some(k) = ctx.seats[seat_idx]
                    .touches
                    .iter()
                    .position(|tp| tp.touch_id == id)
                else {
                    return;
                };
                let (inst_id, item, ind) = {
                    let tp = &ctx.seats[seat_idx].touches[k];
                    (tp.instance, tp.item, tp.indicator)
                };
                let Some(tracked) = item else {
                    return;
                };
                let Some((o, i)) = ctx.find_instance(inst_id) else {
                    return;
                };
                // Sliding off the item cancels the pending release.
                if button_under(ctx, o, i, x, y) != Some(tracked) {
                    if let Some(ind) = ind {
                        ctx.outputs[o].instances[i].remove_indicator(ind);
                        ctx.outputs[o].instances[i].surface.commit();
                    }
                    let tp = &mut ctx.seats[seat_idx].touches[k];
                    tp.item = None;
                    tp.indicator = None;
                }
            }
            wl_touch::Event::Up { id, .. } => {
                let Some(k) = ctx.seats[seat_idx]
                    .touches
                    .iter()
                    .position(|tp| tp.touch_id == id)
                else {
                    return;
                };
                let tp = ctx.seats[seat_idx].touches.remove(k);
                if let Some(ind) = tp.indicator {
                    if let Some((o, i)) = ctx.find_instance(tp.instance) {
                        ctx.outputs[o].instances[i].remove_indicator(ind);
                        ctx.outputs[o].instances[i].surface.commit();
                    }
                }
                if let Some(item) = tp.item {
                    fire(ctx, seat_idx, tp.instance, item, EventKind::Touch);
                }
            }
            wl_touch::Event::Cancel => clear_touches(ctx, seat_idx),
            _ => {}
        }
    }
}

// ── Keyboard (modifier tracking only) ─────────────────────────────────────────

fn modifiers_from(state: &xkb::State) -> Modifiers {
    let mut mods = Modifiers::NONE;
    let table = [
        (xkb::MOD_NAME_ALT, Modifiers::ALT),
        (xkb::MOD_NAME_CAPS, Modifiers::CAPSLOCK),
        (xkb::MOD_NAME_CTRL, Modifiers::CONTROL),
        (xkb::MOD_NAME_LOGO, Modifiers::LOGO),
        (xkb::MOD_NAME_NUM, Modifiers::NUMLOCK),
        (xkb::MOD_NAME_SHIFT, Modifiers::SHIFT),
    ];
    for (name, flag) in table {
        if state.mod_name_is_active(name, xkb::STATE_MODS_EFFECTIVE) {
            mods.insert(flag);
        }
    }
    mods
}

impl Dispatch<WlKeyboard, SeatData> for Context {
    fn event(
        ctx: &mut Self,
        _: &WlKeyboard,
        event: wl_keyboard::Event,
        data: &SeatData,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let Some(seat_idx) = find_seat(&ctx.seats, data.global) else {
            return;
        };
        let seat = &mut ctx.seats[seat_idx];
        match event {
            wl_keyboard::Event::Keymap { format, fd, size: _ } => {
                if format != WEnum::Value(KeymapFormat::XkbV1) {
                    return;
                }
                let file = File::from(fd);
                let map = match unsafe { Mmap::map(&file) } {
                    Ok(map) => map,
                    Err(e) => {
                        warn!("Cannot map keymap: {e}");
                        return;
                    }
                };
                let end = map.iter().position(|&b| b == 0).unwrap_or(map.len());
                let Ok(text) = std::str::from_utf8(&map[..end]) else {
                    warn!("Keymap is not valid UTF-8");
                    return;
                };
                seat.xkb_state = xkb::Keymap::new_from_string(
                    &seat.xkb_context,
                    text.to_string(),
                    xkb::KEYMAP_FORMAT_TEXT_V1,
                    xkb::KEYMAP_COMPILE_NO_FLAGS,
                )
                .map(|keymap| xkb::State::new(&keymap));
            }
            wl_keyboard::Event::Modifiers {
                mods_depressed,
                mods_latched,
                mods_locked,
                group,
                ..
            } => {
                if let Some(state) = &mut seat.xkb_state {
                    state.update_mask(mods_depressed, mods_latched, mods_locked, 0, 0, group);
                    seat.modifiers = modifiers_from(state);
                }
            }
            _ => {}
        }
    }
}

// ── Seat capabilities ─────────────────────────────────────────────────────────

impl Dispatch<WlSeat, SeatData> for Context {
    fn event(
        ctx: &mut Self,
        _: &WlSeat,
        event: wl_seat::Event,
        data: &SeatData,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let Some(seat_idx) = find_seat(&ctx.seats, data.global) else {
            return;
        };
        match event {
            wl_seat::Event::Capabilities {
                capabilities: WEnum::Value(caps),
            } => {
                let qh = ctx.qh.clone();
                let want_keyboard = ctx.config.needs_keyboard();
                let seat = &mut ctx.seats[seat_idx];

                if caps.contains(Capability::Pointer) {
                    if seat.pointer.is_none() {
                        seat.pointer = Some(seat.wl.get_pointer(&qh, *data));
                    }
                } else if let Some(pointer) = seat.pointer.take() {
                    pointer.release();
                    clear_pointer_focus(ctx, seat_idx);
                }

                let seat = &mut ctx.seats[seat_idx];
                if caps.contains(Capability::Touch) {
                    if seat.touch.is_none() {
                        seat.touch = Some(seat.wl.get_touch(&qh, *data));
                    }
                } else if let Some(touch) = seat.touch.take() {
                    touch.release();
                    clear_touches(ctx, seat_idx);
                }

                // Keyboard capability is claimed only when binds use
                // modifiers.
                let seat = &mut ctx.seats[seat_idx];
                if caps.contains(Capability::Keyboard) && want_keyboard {
                    if seat.keyboard.is_none() {
                        seat.keyboard = Some(seat.wl.get_keyboard(&qh, *data));
                    }
                } else if let Some(keyboard) = seat.keyboard.take() {
                    keyboard.release();
                    seat.xkb_state = None;
                    seat.modifiers = Modifiers::NONE;
                }
            }
            wl_seat::Event::Name { name } => ctx.seats[seat_idx].name = name,
            _ => {}
        }
    }
}

// ── Command dispatch ──────────────────────────────────────────────────────────

/// Resolve an input event over an item to a command and execute it.
fn fire(ctx: &mut Context, seat_idx: usize, instance_id: u64, item_index: usize, event: EventKind) {
    let Some((output_idx, inst_idx)) = ctx.find_instance(instance_id) else {
        return;
    };
    let resolved = {
        let inst = &ctx.outputs[output_idx].instances[inst_idx];
        let bar = &ctx.config.bars[inst.bar_index];
        let Some(button) = bar.items[item_index].as_button() else {
            return;
        };
        let mods = ctx.seats[seat_idx].modifiers;
        button
            .find_command(event, mods)
            .map(|cmd| (cmd.clone(), button.app_id.clone()))
    };
    if let Some((cmd, app_id)) = resolved {
        execute(ctx, output_idx, seat_idx, &cmd, app_id.as_deref());
    }
}

fn execute(
    ctx: &mut Context,
    output_idx: usize,
    seat_idx: usize,
    cmd: &ItemCommand,
    app_id: Option<&str>,
) {
    match cmd.meta {
        MetaAction::None => {
            if let Some(shell) = &cmd.shell {
                spawn_on_output(ctx, output_idx, shell);
            }
        }
        MetaAction::Reload => {
            info!("Reload requested by item command");
            ctx.running = false;
            ctx.reload = true;
        }
        MetaAction::Exit => {
            info!("Exit requested by item command");
            ctx.running = false;
        }
        MetaAction::ToplevelActivate | MetaAction::ToplevelClose => {
            let handle = app_id
                .and_then(|app| ctx.toplevels.tracker.find_running(app))
                .and_then(|key| ctx.toplevels.handles.get(key))
                .cloned();
            match handle {
                Some(handle) => {
                    if cmd.meta == MetaAction::ToplevelActivate {
                        handle.activate(&ctx.seats[seat_idx].wl);
                    } else {
                        handle.close();
                    }
                }
                // No live toplevel: fall back to the shell command, if any.
                None => {
                    if let Some(shell) = &cmd.shell {
                        spawn_on_output(ctx, output_idx, shell);
                    } else {
                        debug!("No matching toplevel and no fallback command");
                    }
                }
            }
        }
    }
}

fn spawn_on_output(ctx: &Context, output_idx: usize, shell: &str) {
    let output = &ctx.outputs[output_idx];
    command::spawn(shell, output.name.as_deref().unwrap_or(""), output.scale);
}

// ── Cursor ────────────────────────────────────────────────────────────────────

fn set_cursor(ctx: &mut Context, seat_idx: usize, serial: u32, name: &str, scale: i32) {
    if ctx.cursor_theme.is_none() {
        match CursorTheme::load(&ctx.conn, ctx.globals.shm.clone(), 24 * scale as u32) {
            Ok(theme) => ctx.cursor_theme = Some(theme),
            Err(e) => {
                warn!("Cannot load cursor theme: {e}");
                return;
            }
        }
    }
    if ctx.seats[seat_idx].cursor_surface.is_none() {
        let qh = ctx.qh.clone();
        ctx.seats[seat_idx].cursor_surface = Some(ctx.globals.compositor.create_surface(&qh, ()));
    }

    let Context {
        cursor_theme,
        seats,
        ..
    } = ctx;
    let theme = cursor_theme.as_mut().unwrap();
    let seat = &seats[seat_idx];
    let Some(pointer) = &seat.pointer else {
        return;
    };
    let Some(cursor) = theme.get_cursor(name) else {
        warn!("Cursor '{name}' not found in theme");
        return;
    };
    let frame = &cursor[0];
    let (hx, hy) = frame.hotspot();
    let surface = seat.cursor_surface.as_ref().unwrap();
    surface.set_buffer_scale(scale);
    surface.attach(Some(&**frame), 0, 0);
    surface.damage_buffer(0, 0, i32::MAX, i32::MAX);
    surface.commit();
    pointer.set_cursor(serial, Some(surface), hx as i32 / scale, hy as i32 / scale);
}

//! Items (buttons and spacers), their interaction bindings, and the
//! lookup rules the input dispatcher relies on.

use lava_core::{LavaError, Result};
use std::path::PathBuf;

// Linux input event codes for mouse buttons.
const BTN_MISC: u32 = 0x100;
const BTN_LEFT: u32 = 0x110;
const BTN_RIGHT: u32 = 0x111;
const BTN_MIDDLE: u32 = 0x112;
const BTN_SIDE: u32 = 0x113;
const BTN_EXTRA: u32 = 0x114;
const BTN_FORWARD: u32 = 0x115;
const BTN_BACK: u32 = 0x116;
const BTN_TASK: u32 = 0x117;

/// One entry of a bar's ordered item list.
#[derive(Debug, Clone)]
pub enum Item {
    Button(Button),
    Spacer(Spacer),
}

impl Item {
    /// Length along the bar's main axis; buttons are square cells of the
    /// config's `size`.
    #[must_use]
    pub fn length(&self, button_length: u32) -> u32 {
        match self {
            Item::Button(_) => button_length,
            Item::Spacer(s) => s.length,
        }
    }

    #[must_use]
    pub fn as_button(&self) -> Option<&Button> {
        match self {
            Item::Button(b) => Some(b),
            Item::Spacer(_) => None,
        }
    }
}

/// A clickable launcher cell.
#[derive(Debug, Clone, Default)]
pub struct Button {
    /// PNG or SVG image drawn in the cell.
    pub image_path: Option<PathBuf>,
    /// App-id this button is associated with, for activity tracking and the
    /// toplevel meta-actions.
    pub app_id: Option<String>,
    pub commands: Vec<ItemCommand>,
}

/// Non-interactive gap along the main axis.
#[derive(Debug, Clone, Default)]
pub struct Spacer {
    pub length: u32,
}

/// Keyboard modifier bitset, in the seat's current effective state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers(u32);

impl Modifiers {
    pub const NONE: Self = Self(0);
    pub const ALT: Self = Self(1 << 0);
    pub const CAPSLOCK: Self = Self(1 << 1);
    pub const CONTROL: Self = Self(1 << 2);
    pub const LOGO: Self = Self(1 << 3);
    pub const NUMLOCK: Self = Self(1 << 4);
    pub const SHIFT: Self = Self(1 << 5);

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl std::ops::BitOr for Modifiers {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// What kind of input a command is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    MouseButton(u32),
    MouseScroll(ScrollDirection),
    Touch,
    /// Bound with a bare `command =` assignment; matches mouse buttons and
    /// touch, never scroll.
    Universal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Action prefix starting with `@` in a command string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetaAction {
    #[default]
    None,
    ToplevelActivate,
    ToplevelClose,
    Reload,
    Exit,
}

/// A single binding on a button.
#[derive(Debug, Clone)]
pub struct ItemCommand {
    pub kind: InteractionKind,
    pub modifiers: Modifiers,
    pub meta: MetaAction,
    /// The shell command itself, or the fallback for a meta-action.
    pub shell: Option<String>,
}

/// An incoming input event, as seen by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Button(u32),
    Scroll(ScrollDirection),
    Touch,
}

impl Button {
    /// Resolve an event to a command: exact `(kind, modifiers, specific)`
    /// match first, then the universal binding for non-scroll events.
    #[must_use]
    pub fn find_command(&self, event: EventKind, mods: Modifiers) -> Option<&ItemCommand> {
        let exact = self.commands.iter().find(|c| {
            c.modifiers == mods
                && match (c.kind, event) {
                    (InteractionKind::MouseButton(b), EventKind::Button(e)) => b == e,
                    (InteractionKind::MouseScroll(d), EventKind::Scroll(e)) => d == e,
                    (InteractionKind::Touch, EventKind::Touch) => true,
                    _ => false,
                }
        });
        exact.or_else(|| match event {
            EventKind::Scroll(_) => None,
            _ => self
                .commands
                .iter()
                .find(|c| c.kind == InteractionKind::Universal),
        })
    }

    /// `true` if any binding requires modifiers; such bars claim keyboard
    /// capability on their seats.
    #[must_use]
    pub fn uses_modifiers(&self) -> bool {
        self.commands.iter().any(|c| !c.modifiers.is_empty())
    }
}

/// Parse the `BIND` part of a `command[BIND]` key: `+`-joined tokens with
/// exactly one interaction kind and any number of modifiers.
pub fn parse_bind(bind: &str) -> Result<(InteractionKind, Modifiers)> {
    let mut kind = None;
    let mut mods = Modifiers::NONE;

    for token in bind.split('+') {
        let token = token.trim();
        if let Some(m) = parse_modifier(token) {
            mods.insert(m);
            continue;
        }
        let k = parse_interaction(token)
            .ok_or_else(|| LavaError::Config(format!("unknown bind token `{token}`")))?;
        if kind.replace(k).is_some() {
            return Err(LavaError::Config(format!(
                "bind `{bind}` has more than one interaction kind"
            )));
        }
    }

    match kind {
        Some(k) => Ok((k, mods)),
        None => Err(LavaError::Config(format!(
            "bind `{bind}` has no interaction kind"
        ))),
    }
}

fn parse_modifier(token: &str) -> Option<Modifiers> {
    Some(match token {
        "alt" => Modifiers::ALT,
        "capslock" => Modifiers::CAPSLOCK,
        "control" => Modifiers::CONTROL,
        "logo" => Modifiers::LOGO,
        "numlock" => Modifiers::NUMLOCK,
        "shift" => Modifiers::SHIFT,
        _ => return None,
    })
}

fn parse_interaction(token: &str) -> Option<InteractionKind> {
    if token == "touch" {
        return Some(InteractionKind::Touch);
    }
    if token == "scroll-up" {
        return Some(InteractionKind::MouseScroll(ScrollDirection::Up));
    }
    if token == "scroll-down" {
        return Some(InteractionKind::MouseScroll(ScrollDirection::Down));
    }
    let name = token.strip_prefix("mouse-")?;
    let code = match name {
        "left" => BTN_LEFT,
        "right" => BTN_RIGHT,
        "middle" => BTN_MIDDLE,
        "side" => BTN_SIDE,
        "extra" => BTN_EXTRA,
        "forward" => BTN_FORWARD,
        "back" => BTN_BACK,
        "task" => BTN_TASK,
        "misc" => BTN_MISC,
        // The eight generic numbered buttons share the BTN_MISC block.
        _ => {
            let n: u32 = name.parse().ok()?;
            if !(1..=8).contains(&n) {
                return None;
            }
            BTN_MISC + n - 1
        }
    };
    Some(InteractionKind::MouseButton(code))
}

/// Split a command string into its meta-action and shell part.
///
/// `@token [rest]` encodes a meta-action with `rest` as the optional shell
/// fallback; anything else is a plain shell command.
pub fn parse_action(value: &str) -> Result<(MetaAction, Option<String>)> {
    let value = value.trim();
    if !value.starts_with('@') {
        return Ok((MetaAction::None, Some(value.to_string())));
    }

    let (token, rest) = match value.split_once(char::is_whitespace) {
        Some((t, r)) => (t, r.trim()),
        None => (value, ""),
    };
    let meta = match token {
        "@activate-toplevel" => MetaAction::ToplevelActivate,
        "@close-toplevel" => MetaAction::ToplevelClose,
        "@reload" => MetaAction::Reload,
        "@exit" => MetaAction::Exit,
        _ => return Err(LavaError::Config(format!("unknown meta-action `{token}`"))),
    };
    let shell = if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    };
    Ok((meta, shell))
}

// ── Item placement ────────────────────────────────────────────────────────────

/// Measured position of one item along the main axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemSlot {
    pub ordinate: u32,
    pub length: u32,
}

/// Ordinates are the prefix sum of item lengths.
#[must_use]
pub fn compute_slots(items: &[Item], button_length: u32) -> Vec<ItemSlot> {
    let mut ordinate = 0;
    items
        .iter()
        .map(|item| {
            let length = item.length(button_length);
            let slot = ItemSlot { ordinate, length };
            ordinate += length;
            slot
        })
        .collect()
}

/// Total main-axis length of the item area.
#[must_use]
pub fn total_length(items: &[Item], button_length: u32) -> u32 {
    items.iter().map(|i| i.length(button_length)).sum()
}

/// Find the item whose `[ordinate, ordinate + length)` span contains the
/// given main-axis coordinate (relative to the item area start).
#[must_use]
pub fn item_at(slots: &[ItemSlot], ordinate: f64) -> Option<usize> {
    if ordinate < 0.0 {
        return None;
    }
    let ordinate = ordinate as u32;
    slots
        .iter()
        .position(|s| ordinate >= s.ordinate && ordinate < s.ordinate + s.length)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn button_with(commands: Vec<ItemCommand>) -> Button {
        Button {
            image_path: None,
            app_id: None,
            commands,
        }
    }

    fn shell_command(kind: InteractionKind, modifiers: Modifiers, cmd: &str) -> ItemCommand {
        ItemCommand {
            kind,
            modifiers,
            meta: MetaAction::None,
            shell: Some(cmd.to_string()),
        }
    }

    #[test]
    fn ordinates_are_prefix_sums() {
        let items = vec![
            Item::Button(Button::default()),
            Item::Spacer(Spacer { length: 14 }),
            Item::Button(Button::default()),
        ];
        let slots = compute_slots(&items, 60);
        assert_eq!(slots[0], ItemSlot { ordinate: 0, length: 60 });
        for i in 1..slots.len() {
            assert_eq!(
                slots[i].ordinate,
                slots[i - 1].ordinate + slots[i - 1].length
            );
        }
        assert_eq!(total_length(&items, 60), 134);
    }

    #[test]
    fn midpoint_hit_tests_back_to_its_item() {
        let items = vec![
            Item::Button(Button::default()),
            Item::Spacer(Spacer { length: 20 }),
            Item::Button(Button::default()),
        ];
        let slots = compute_slots(&items, 50);
        for (i, slot) in slots.iter().enumerate() {
            let mid = slot.ordinate as f64 + slot.length as f64 / 2.0;
            assert_eq!(item_at(&slots, mid), Some(i));
        }
        assert_eq!(item_at(&slots, -1.0), None);
        assert_eq!(item_at(&slots, 120.0), None);
    }

    #[test]
    fn universal_fires_on_button_and_touch_but_not_scroll() {
        let button = button_with(vec![shell_command(
            InteractionKind::Universal,
            Modifiers::NONE,
            "foot",
        )]);
        assert!(button
            .find_command(EventKind::Button(0x110), Modifiers::NONE)
            .is_some());
        assert!(button.find_command(EventKind::Touch, Modifiers::NONE).is_some());
        assert!(button
            .find_command(EventKind::Scroll(ScrollDirection::Up), Modifiers::NONE)
            .is_none());
    }

    #[test]
    fn exact_bind_wins_over_universal() {
        let button = button_with(vec![
            shell_command(InteractionKind::Universal, Modifiers::NONE, "fallback"),
            shell_command(InteractionKind::MouseButton(0x110), Modifiers::SHIFT, "exact"),
        ]);
        let hit = button
            .find_command(EventKind::Button(0x110), Modifiers::SHIFT)
            .unwrap();
        assert_eq!(hit.shell.as_deref(), Some("exact"));
        // Without the modifier the exact bind does not match; the universal
        // one still does.
        let hit = button
            .find_command(EventKind::Button(0x110), Modifiers::NONE)
            .unwrap();
        assert_eq!(hit.shell.as_deref(), Some("fallback"));
    }

    #[test]
    fn parse_bind_tokens() {
        let (kind, mods) = parse_bind("mouse-left+shift+control").unwrap();
        assert_eq!(kind, InteractionKind::MouseButton(0x110));
        assert_eq!(mods, Modifiers::SHIFT | Modifiers::CONTROL);

        let (kind, _) = parse_bind("scroll-down").unwrap();
        assert_eq!(kind, InteractionKind::MouseScroll(ScrollDirection::Down));

        let (kind, _) = parse_bind("mouse-3").unwrap();
        assert_eq!(kind, InteractionKind::MouseButton(0x102));

        assert!(parse_bind("shift").is_err());
        assert!(parse_bind("mouse-left+touch").is_err());
        assert!(parse_bind("mouse-9").is_err());
    }

    #[test]
    fn parse_action_meta_and_fallback() {
        assert_eq!(
            parse_action("firefox").unwrap(),
            (MetaAction::None, Some("firefox".to_string()))
        );
        assert_eq!(
            parse_action("@activate-toplevel firefox").unwrap(),
            (MetaAction::ToplevelActivate, Some("firefox".to_string()))
        );
        assert_eq!(parse_action("@reload").unwrap(), (MetaAction::Reload, None));
        assert!(parse_action("@frobnicate").is_err());
    }
}

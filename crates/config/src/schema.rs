//! Configuration schema: global settings, bars, and their `[config]`
//! variants, plus the sink that assembles them from scanner events.

use crate::ini::{self, IniSink};
use crate::item::{self, Button, Item, ItemCommand, Spacer};
use lava_core::{Alignment, Color, LavaError, Mode, Position, Result};

/// Fully parsed configuration file.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    pub settings: GlobalSettings,
    pub bars: Vec<Bar>,
}

impl Configuration {
    /// `true` if any bind on any button requires keyboard modifiers.
    #[must_use]
    pub fn needs_keyboard(&self) -> bool {
        self.bars.iter().any(|bar| {
            bar.items
                .iter()
                .filter_map(Item::as_button)
                .any(Button::uses_modifiers)
        })
    }

    /// `true` if any button tracks a toplevel app-id.
    #[must_use]
    pub fn needs_toplevels(&self) -> bool {
        self.bars.iter().any(|bar| {
            bar.items
                .iter()
                .filter_map(Item::as_button)
                .any(|b| b.app_id.is_some())
        })
    }

    /// `true` if any config variant hides based on workspace occupancy.
    #[must_use]
    pub fn needs_workspace_status(&self) -> bool {
        self.bars.iter().any(|bar| {
            bar.configs
                .iter()
                .any(|c| c.hidden_mode == HiddenMode::WorkspaceAuto)
        })
    }
}

/// Process-wide options from `[global-settings]`.
#[derive(Debug, Clone, Default)]
pub struct GlobalSettings {
    pub watch_config_file: bool,
}

impl GlobalSettings {
    fn apply(&mut self, key: &str, value: &str, line: usize) -> Result<()> {
        match key {
            "watch-config-file" => self.watch_config_file = parse_bool(value, line)?,
            _ => {
                return Err(ini::error(
                    line,
                    format!("unknown global setting `{key}`"),
                ))
            }
        }
        Ok(())
    }
}

/// One logical panel: an ordered item list plus its config variants.
///
/// Invariant: `configs` is never empty; the first entry is the defaults the
/// later variants inherit from.
#[derive(Debug, Clone)]
pub struct Bar {
    pub items: Vec<Item>,
    pub configs: Vec<BarConfig>,
}

impl Bar {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            configs: vec![BarConfig::default()],
        }
    }
}

/// Four directional values (top/right/bottom/left).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sides {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl Sides {
    pub const fn splat(v: u32) -> Self {
        Self { top: v, right: v, bottom: v, left: v }
    }
}

/// Four per-corner values (top-left, top-right, bottom-left, bottom-right).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Corners {
    pub top_left: u32,
    pub top_right: u32,
    pub bottom_left: u32,
    pub bottom_right: u32,
}

impl Corners {
    pub const fn splat(v: u32) -> Self {
        Self { top_left: v, top_right: v, bottom_left: v, bottom_right: v }
    }
}

/// Layer-shell layer the bar surface is placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerKind {
    Overlay,
    Top,
    #[default]
    Bottom,
    Background,
}

/// When the bar collapses to its hidden size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HiddenMode {
    #[default]
    Never,
    Always,
    WorkspaceAuto,
}

impl HiddenMode {
    /// The hide policy: whether the bar should currently be hidden.
    #[must_use]
    pub fn should_hide(self, hover: bool, workspace_occupied: bool) -> bool {
        match self {
            HiddenMode::Never => false,
            HiddenMode::Always => !hover,
            HiddenMode::WorkspaceAuto => workspace_occupied && !hover,
        }
    }
}

/// Shape of the hover/touch indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndicatorStyle {
    Rectangle,
    #[default]
    RoundedRectangle,
    Circle,
}

/// Output aspect-ratio condition on a config variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionCondition {
    #[default]
    All,
    WiderThanHigh,
    HigherThanWide,
}

/// Presentation and activation record; one `[config]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct BarConfig {
    pub position: Position,
    pub alignment: Alignment,
    pub mode: Mode,
    pub layer: LayerKind,
    pub size: u32,
    pub hidden_size: u32,
    pub hidden_mode: HiddenMode,
    pub icon_padding: u32,
    /// `1` = claim the bar's thickness, `0` = none, `-1` = stationary.
    pub exclusive_zone: i32,
    pub indicator_padding: u32,
    pub indicator_style: IndicatorStyle,
    pub border: Sides,
    pub margin: Sides,
    pub radii: Corners,
    pub background_colour: Color,
    pub border_colour: Color,
    pub indicator_hover_colour: Color,
    pub indicator_active_colour: Color,
    pub cursor_name: String,
    /// Restrict this variant to one output by name.
    pub only_output: Option<String>,
    pub namespace: String,
    /// `0` matches any scale.
    pub condition_scale: u32,
    /// `-1` matches any transform; otherwise 0..=3.
    pub condition_transform: i32,
    pub condition_resolution: ResolutionCondition,
}

impl Default for BarConfig {
    fn default() -> Self {
        Self {
            position: Position::Bottom,
            alignment: Alignment::Center,
            mode: Mode::Default,
            layer: LayerKind::Bottom,
            size: 60,
            hidden_size: 10,
            hidden_mode: HiddenMode::Never,
            icon_padding: 4,
            exclusive_zone: 1,
            indicator_padding: 0,
            indicator_style: IndicatorStyle::RoundedRectangle,
            border: Sides::splat(1),
            margin: Sides::splat(0),
            radii: Corners::splat(5),
            background_colour: Color::parse("#000000b0").unwrap_or(Color::BLACK),
            border_colour: Color::WHITE,
            indicator_hover_colour: Color::parse("#404040b0").unwrap_or(Color::WHITE),
            indicator_active_colour: Color::parse("#606060b0").unwrap_or(Color::WHITE),
            cursor_name: "pointer".to_string(),
            only_output: None,
            namespace: "lavalauncher".to_string(),
            condition_scale: 0,
            condition_transform: -1,
            condition_resolution: ResolutionCondition::All,
        }
    }
}

impl BarConfig {
    /// Check every activation condition against an output's attributes.
    #[must_use]
    pub fn conditions_pass(
        &self,
        scale: i32,
        transform: i32,
        width: i32,
        height: i32,
        output_name: &str,
    ) -> bool {
        if self.condition_scale != 0 && self.condition_scale as i32 != scale {
            return false;
        }
        if self.condition_transform != -1 && self.condition_transform != transform {
            return false;
        }
        let resolution_ok = match self.condition_resolution {
            ResolutionCondition::All => true,
            ResolutionCondition::WiderThanHigh => width > height,
            ResolutionCondition::HigherThanWide => height > width,
        };
        if !resolution_ok {
            return false;
        }
        match &self.only_output {
            Some(only) => only == output_name,
            None => true,
        }
    }

    fn apply(&mut self, key: &str, value: &str, line: usize) -> Result<()> {
        match key {
            "position" => {
                self.position = match value {
                    "top" => Position::Top,
                    "right" => Position::Right,
                    "bottom" => Position::Bottom,
                    "left" => Position::Left,
                    _ => return Err(bad_value(line, key, value)),
                }
            }
            "alignment" => {
                self.alignment = match value {
                    "start" => Alignment::Start,
                    "center" => Alignment::Center,
                    "end" => Alignment::End,
                    _ => return Err(bad_value(line, key, value)),
                }
            }
            "mode" => {
                self.mode = match value {
                    "default" => Mode::Default,
                    "full" => Mode::Full,
                    "aggressive" => Mode::Aggressive,
                    _ => return Err(bad_value(line, key, value)),
                }
            }
            "layer" => {
                self.layer = match value {
                    "overlay" => LayerKind::Overlay,
                    "top" => LayerKind::Top,
                    "bottom" => LayerKind::Bottom,
                    "background" => LayerKind::Background,
                    _ => return Err(bad_value(line, key, value)),
                }
            }
            "size" => self.size = parse_positive(value, line)?,
            "hidden-size" => self.hidden_size = parse_positive(value, line)?,
            "hidden-mode" => {
                self.hidden_mode = match value {
                    "never" => HiddenMode::Never,
                    "always" => HiddenMode::Always,
                    "workspace-auto" => HiddenMode::WorkspaceAuto,
                    _ => return Err(bad_value(line, key, value)),
                }
            }
            "icon-padding" => self.icon_padding = parse_u32(value, line)?,
            "exclusive-zone" => {
                self.exclusive_zone = match value {
                    "true" | "1" => 1,
                    "false" | "0" => 0,
                    "stationary" | "-1" => -1,
                    _ => return Err(bad_value(line, key, value)),
                }
            }
            "indicator-padding" => self.indicator_padding = parse_u32(value, line)?,
            "indicator-style" => {
                self.indicator_style = match value {
                    "rectangle" => IndicatorStyle::Rectangle,
                    "rounded-rectangle" => IndicatorStyle::RoundedRectangle,
                    "circle" => IndicatorStyle::Circle,
                    _ => return Err(bad_value(line, key, value)),
                }
            }
            "border" => self.border = parse_sides(value, line)?,
            "margin" => self.margin = parse_sides(value, line)?,
            "radius" => self.radii = parse_corners(value, line)?,
            "background-colour" => self.background_colour = parse_colour(value, line)?,
            "border-colour" => self.border_colour = parse_colour(value, line)?,
            "indicator-hover-colour" => {
                self.indicator_hover_colour = parse_colour(value, line)?
            }
            "indicator-active-colour" => {
                self.indicator_active_colour = parse_colour(value, line)?
            }
            "cursor-name" => self.cursor_name = value.to_string(),
            "output" => self.only_output = Some(value.to_string()),
            "namespace" => self.namespace = value.to_string(),
            "condition-scale" => {
                self.condition_scale = if value == "all" {
                    0
                } else {
                    parse_positive(value, line)?
                }
            }
            "condition-transform" => {
                self.condition_transform = if value == "all" {
                    -1
                } else {
                    match value.parse::<i32>() {
                        Ok(t @ 0..=3) => t,
                        _ => return Err(bad_value(line, key, value)),
                    }
                }
            }
            "condition-resolution" => {
                self.condition_resolution = match value {
                    "all" => ResolutionCondition::All,
                    "wider-than-high" => ResolutionCondition::WiderThanHigh,
                    "higher-than-wide" => ResolutionCondition::HigherThanWide,
                    _ => return Err(bad_value(line, key, value)),
                }
            }
            _ => return Err(ini::error(line, format!("unknown config variable `{key}`"))),
        }
        Ok(())
    }
}

/// Pick the first config variant whose conditions all pass.
#[must_use]
pub fn choose_config(
    configs: &[BarConfig],
    scale: i32,
    transform: i32,
    width: i32,
    height: i32,
    output_name: &str,
) -> Option<usize> {
    configs
        .iter()
        .position(|c| c.conditions_pass(scale, transform, width, height, output_name))
}

// ── Value parsers ─────────────────────────────────────────────────────────────

fn bad_value(line: usize, key: &str, value: &str) -> LavaError {
    ini::error(line, format!("invalid value `{value}` for `{key}`"))
}

fn parse_bool(value: &str, line: usize) -> Result<bool> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ini::error(line, format!("expected boolean, got `{value}`"))),
    }
}

fn parse_u32(value: &str, line: usize) -> Result<u32> {
    value
        .parse()
        .map_err(|_| ini::error(line, format!("expected non-negative integer, got `{value}`")))
}

fn parse_positive(value: &str, line: usize) -> Result<u32> {
    match parse_u32(value, line)? {
        0 => Err(ini::error(line, "expected positive integer, got `0`")),
        n => Ok(n),
    }
}

/// One value for all four sides, or four as top/right/bottom/left.
fn parse_sides(value: &str, line: usize) -> Result<Sides> {
    let parts: Vec<u32> = value
        .split_whitespace()
        .map(|p| parse_u32(p, line))
        .collect::<Result<_>>()?;
    match parts.as_slice() {
        [all] => Ok(Sides::splat(*all)),
        [top, right, bottom, left] => Ok(Sides {
            top: *top,
            right: *right,
            bottom: *bottom,
            left: *left,
        }),
        _ => Err(ini::error(line, "expected 1 or 4 integers")),
    }
}

/// One value for all corners, or four as tl/tr/bl/br.
fn parse_corners(value: &str, line: usize) -> Result<Corners> {
    let parts: Vec<u32> = value
        .split_whitespace()
        .map(|p| parse_u32(p, line))
        .collect::<Result<_>>()?;
    match parts.as_slice() {
        [all] => Ok(Corners::splat(*all)),
        [tl, tr, bl, br] => Ok(Corners {
            top_left: *tl,
            top_right: *tr,
            bottom_left: *bl,
            bottom_right: *br,
        }),
        _ => Err(ini::error(line, "expected 1 or 4 integers")),
    }
}

fn parse_colour(value: &str, line: usize) -> Result<Color> {
    Color::parse(value).ok_or_else(|| ini::error(line, format!("invalid colour `{value}`")))
}

// ── Builder (scanner sink) ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    None,
    Global,
    Config,
    Button,
    Spacer,
}

/// Assembles a [`Configuration`] from scanner events.
#[derive(Debug)]
pub struct ConfigBuilder {
    cfg: Configuration,
    scope: Scope,
    /// Set once the first `[config]` section has been seen; that section
    /// edits the implicit defaults instead of adding a variant.
    saw_config: bool,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cfg: Configuration::default(),
            scope: Scope::None,
            saw_config: false,
        }
    }

    /// Validate invariants and hand out the finished configuration.
    pub fn finalize(self, line_count: usize) -> Result<Configuration> {
        let cfg = self.cfg;
        let any_button = cfg
            .bars
            .iter()
            .any(|b| b.items.iter().any(|i| matches!(i, Item::Button(_))));
        if !any_button {
            return Err(ini::error(line_count, "no buttons defined"));
        }
        for bar in &cfg.bars {
            for item in &bar.items {
                if let Item::Spacer(s) = item {
                    if s.length == 0 {
                        return Err(ini::error(line_count, "spacer has no length"));
                    }
                }
            }
        }
        Ok(cfg)
    }

    fn bar(&mut self) -> &mut Bar {
        if self.cfg.bars.is_empty() {
            self.cfg.bars.push(Bar::new());
        }
        self.cfg.bars.last_mut().unwrap()
    }

    /// The button currently in scope. Only called from `Scope::Button`,
    /// which is entered exactly when a button was pushed.
    fn button(&mut self) -> &mut Button {
        match self.bar().items.last_mut() {
            Some(Item::Button(button)) => button,
            _ => unreachable!("button scope without button item"),
        }
    }

    fn command_assignment(&mut self, key: &str, value: &str, line: usize) -> Result<ItemCommand> {
        let (kind, modifiers) = if key == "command" {
            (item::InteractionKind::Universal, item::Modifiers::NONE)
        } else {
            let bind = key
                .strip_prefix("command[")
                .and_then(|k| k.strip_suffix(']'))
                .ok_or_else(|| ini::error(line, format!("unknown button variable `{key}`")))?;
            item::parse_bind(bind).map_err(|e| ini::error(line, e))?
        };
        let (meta, shell) = item::parse_action(value).map_err(|e| ini::error(line, e))?;
        Ok(ItemCommand {
            kind,
            modifiers,
            meta,
            shell,
        })
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IniSink for ConfigBuilder {
    fn section(&mut self, name: &str, line: usize) -> Result<()> {
        match name {
            "global-settings" => self.scope = Scope::Global,
            "config" => {
                let first = !self.saw_config;
                self.saw_config = true;
                let bar = self.bar();
                if !first {
                    // Later variants inherit the defaults, then override.
                    let defaults = bar.configs[0].clone();
                    bar.configs.push(defaults);
                }
                self.scope = Scope::Config;
            }
            "item:button" => {
                self.bar().items.push(Item::Button(Button::default()));
                self.scope = Scope::Button;
            }
            "item:spacer" => {
                self.bar().items.push(Item::Spacer(Spacer::default()));
                self.scope = Scope::Spacer;
            }
            _ => return Err(ini::error(line, format!("unknown section `[{name}]`"))),
        }
        Ok(())
    }

    fn assign(&mut self, key: &str, value: &str, line: usize) -> Result<()> {
        match self.scope {
            Scope::None => Err(ini::error(line, "assignment outside of any section")),
            Scope::Global => self.cfg.settings.apply(key, value, line),
            Scope::Config => {
                let bar = self.bar();
                bar.configs.last_mut().unwrap().apply(key, value, line)
            }
            Scope::Button => {
                match key {
                    "image-path" => self.button().image_path = Some(value.into()),
                    "toplevel-app-id" => self.button().app_id = Some(value.to_string()),
                    _ => {
                        let command = self.command_assignment(key, value, line)?;
                        self.button().commands.push(command);
                    }
                }
                Ok(())
            }
            Scope::Spacer => {
                let length = match key {
                    "length" => parse_positive(value, line)?,
                    _ => return Err(ini::error(line, format!("unknown spacer variable `{key}`"))),
                };
                let Some(Item::Spacer(spacer)) = self.bar().items.last_mut() else {
                    unreachable!("spacer scope without spacer item");
                };
                spacer.length = length;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ini::scan;

    fn build(text: &str) -> Result<Configuration> {
        let mut builder = ConfigBuilder::new();
        scan(text, &mut builder)?;
        builder.finalize(text.lines().count())
    }

    #[test]
    fn minimal_config_builds() {
        let cfg = build(
            "[config]\nposition = top\nsize = 48\n\n[item:button]\ncommand = foot\n",
        )
        .unwrap();
        assert_eq!(cfg.bars.len(), 1);
        let bar = &cfg.bars[0];
        assert_eq!(bar.configs.len(), 1);
        assert_eq!(bar.configs[0].position, Position::Top);
        assert_eq!(bar.configs[0].size, 48);
        assert_eq!(bar.items.len(), 1);
    }

    #[test]
    fn later_variants_inherit_the_first() {
        let cfg = build(
            "[config]\nsize = 48\nlayer = top\n[config]\nsize = 32\n\n[item:button]\ncommand = foot\n",
        )
        .unwrap();
        let configs = &cfg.bars[0].configs;
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].size, 48);
        // The second variant inherits layer=top but overrides size.
        assert_eq!(configs[1].size, 32);
        assert_eq!(configs[1].layer, LayerKind::Top);
    }

    #[test]
    fn no_buttons_is_an_error() {
        let err = build("[config]\nsize = 48\n").unwrap_err();
        assert!(err.to_string().contains("no buttons"));
    }

    #[test]
    fn unknown_key_reports_line() {
        let err = build("[config]\nnot-a-thing = 1\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn sides_accept_one_or_four_values() {
        let cfg = build(
            "[config]\nborder = 2\nmargin = 1 2 3 4\n[item:button]\ncommand = x\n",
        )
        .unwrap();
        let c = &cfg.bars[0].configs[0];
        assert_eq!(c.border, Sides::splat(2));
        assert_eq!(c.margin, Sides { top: 1, right: 2, bottom: 3, left: 4 });
    }

    #[test]
    fn hide_policy_truth_table() {
        use HiddenMode::*;
        assert!(!Never.should_hide(false, true));
        assert!(Always.should_hide(false, false));
        assert!(!Always.should_hide(true, false));
        assert!(WorkspaceAuto.should_hide(false, true));
        assert!(!WorkspaceAuto.should_hide(true, true));
        assert!(!WorkspaceAuto.should_hide(false, false));
    }

    #[test]
    fn choose_config_is_first_match() {
        let mut scaled = BarConfig::default();
        scaled.condition_scale = 2;
        let any = BarConfig::default();
        let configs = vec![scaled, any];

        // Scale 1 output skips the first variant.
        assert_eq!(choose_config(&configs, 1, 0, 1920, 1080, "DP-1"), Some(1));
        // Scale 2 output picks it, deterministically.
        for _ in 0..3 {
            assert_eq!(choose_config(&configs, 2, 0, 1920, 1080, "DP-1"), Some(0));
        }
    }

    #[test]
    fn conditions_cover_all_fields() {
        let mut c = BarConfig::default();
        c.condition_resolution = ResolutionCondition::WiderThanHigh;
        assert!(c.conditions_pass(1, 0, 1920, 1080, "DP-1"));
        assert!(!c.conditions_pass(1, 0, 1080, 1920, "DP-1"));

        c.only_output = Some("HDMI-A-1".to_string());
        assert!(!c.conditions_pass(1, 0, 1920, 1080, "DP-1"));
        assert!(c.conditions_pass(1, 0, 1920, 1080, "HDMI-A-1"));

        c.condition_transform = 2;
        assert!(!c.conditions_pass(1, 0, 1920, 1080, "HDMI-A-1"));
        assert!(c.conditions_pass(1, 2, 1920, 1080, "HDMI-A-1"));
    }
}

//! Pure layout engine: given a config variant, the total item length and the
//! output's logical size, compute every rectangle a bar instance needs.
//!
//! All values are logical pixels; scaling happens at draw time.

use lava_config::{BarConfig, Corners, Sides};
use lava_core::{Alignment, Extent, Mode, Orientation, Position, Rect};

/// Edge anchor bitset. Bit values match the layer-shell wire enum so the
/// protocol layer can convert losslessly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Anchors(u32);

impl Anchors {
    pub const TOP: Self = Self(1);
    pub const BOTTOM: Self = Self(2);
    pub const LEFT: Self = Self(4);
    pub const RIGHT: Self = Self(8);

    #[must_use]
    pub fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Anchors {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Everything measured about one bar instance, visible and hidden variants
/// side by side. Hiding swaps which set is committed; it never re-derives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarDimensions {
    pub surface: Extent,
    pub surface_hidden: Extent,
    /// Bar rectangle in surface-local coordinates.
    pub bar: Rect,
    pub bar_hidden: Rect,
    /// Item area in surface-local coordinates.
    pub item_area: Rect,
    pub item_area_hidden: Rect,
    /// Margins passed to the layer shell (main-axis margins are simulated by
    /// offsetting the bar in full/aggressive modes).
    pub margin: Sides,
    pub anchors: Anchors,
    pub exclusive_zone: i32,
}

/// Compute all rectangles for one `(config, output)` pairing.
#[must_use]
pub fn compute(config: &BarConfig, items_length: u32, output_w: u32, output_h: u32) -> BarDimensions {
    match config.position.orientation() {
        Orientation::Horizontal => compute_horizontal(config, items_length, output_w),
        Orientation::Vertical => compute_vertical(config, items_length, output_h),
    }
}

fn compute_horizontal(config: &BarConfig, items: u32, output_w: u32) -> BarDimensions {
    let b = config.border;
    let m = config.margin;
    let thickness = config.size + b.top + b.bottom;
    let bar_len = items + b.left + b.right;

    let (surface, bar, item_x, margin) = match config.mode {
        Mode::Default => (
            Extent::new(bar_len, thickness),
            Rect::new(0, 0, bar_len, thickness),
            b.left as i32,
            m,
        ),
        Mode::Full => {
            let bar_w = output_w.saturating_sub(m.left + m.right);
            (
                Extent::new(output_w, thickness),
                Rect::new(m.left as i32, 0, bar_w, thickness),
                main_offset(config.alignment, output_w, items, m.left, m.right, b.left, b.right),
                cross_only_horizontal(m),
            )
        }
        Mode::Aggressive => {
            let item_x =
                main_offset(config.alignment, output_w, items, m.left, m.right, b.left, b.right);
            (
                Extent::new(output_w, thickness),
                Rect::new(item_x - b.left as i32, 0, bar_len, thickness),
                item_x,
                cross_only_horizontal(m),
            )
        }
    };

    let item_area = Rect::new(item_x, b.top as i32, items, config.size);
    BarDimensions {
        surface,
        surface_hidden: Extent::new(surface.w, config.hidden_size),
        bar_hidden: Rect::new(bar.x, 0, bar.w, config.hidden_size),
        item_area_hidden: Rect::new(item_area.x, 0, item_area.w, config.hidden_size),
        bar,
        item_area,
        margin,
        anchors: anchors_for(config.position, config.alignment, config.mode),
        exclusive_zone: exclusive_zone(config, thickness),
    }
}

fn compute_vertical(config: &BarConfig, items: u32, output_h: u32) -> BarDimensions {
    let b = config.border;
    let m = config.margin;
    let thickness = config.size + b.left + b.right;
    let bar_len = items + b.top + b.bottom;

    let (surface, bar, item_y, margin) = match config.mode {
        Mode::Default => (
            Extent::new(thickness, bar_len),
            Rect::new(0, 0, thickness, bar_len),
            b.top as i32,
            m,
        ),
        Mode::Full => {
            let bar_h = output_h.saturating_sub(m.top + m.bottom);
            (
                Extent::new(thickness, output_h),
                Rect::new(0, m.top as i32, thickness, bar_h),
                main_offset(config.alignment, output_h, items, m.top, m.bottom, b.top, b.bottom),
                cross_only_vertical(m),
            )
        }
        Mode::Aggressive => {
            let item_y =
                main_offset(config.alignment, output_h, items, m.top, m.bottom, b.top, b.bottom);
            (
                Extent::new(thickness, output_h),
                Rect::new(0, item_y - b.top as i32, thickness, bar_len),
                item_y,
                cross_only_vertical(m),
            )
        }
    };

    let item_area = Rect::new(b.left as i32, item_y, config.size, items);
    BarDimensions {
        surface,
        surface_hidden: Extent::new(config.hidden_size, surface.h),
        bar_hidden: Rect::new(0, bar.y, config.hidden_size, bar.h),
        item_area_hidden: Rect::new(0, item_area.y, config.hidden_size, item_area.h),
        bar,
        item_area,
        margin,
        anchors: anchors_for(config.position, config.alignment, config.mode),
        exclusive_zone: exclusive_zone(config, thickness),
    }
}

/// Item-area offset along the main axis for the full/aggressive modes, where
/// margins are simulated inside the full-edge surface.
fn main_offset(
    alignment: Alignment,
    output_len: u32,
    items: u32,
    margin_start: u32,
    margin_end: u32,
    border_start: u32,
    border_end: u32,
) -> i32 {
    match alignment {
        Alignment::Start => (margin_start + border_start) as i32,
        Alignment::Center => {
            (output_len / 2) as i32 - (items / 2) as i32 + margin_start as i32 - margin_end as i32
        }
        Alignment::End => {
            output_len as i32 - (margin_end + border_end + items) as i32
        }
    }
}

fn cross_only_horizontal(m: Sides) -> Sides {
    Sides { top: m.top, bottom: m.bottom, left: 0, right: 0 }
}

fn cross_only_vertical(m: Sides) -> Sides {
    Sides { top: 0, bottom: 0, left: m.left, right: m.right }
}

fn exclusive_zone(config: &BarConfig, thickness: u32) -> i32 {
    // 1 means "the bar's thickness"; 0 and -1 are meaningful to the
    // compositor and pass through, as does anything else.
    if config.exclusive_zone == 1 {
        thickness as i32
    } else {
        config.exclusive_zone
    }
}

/// The fixed `(position, alignment, mode)` → anchor mapping.
///
/// Default mode anchors a single edge or corner; full and aggressive modes
/// always claim the whole edge.
#[must_use]
pub fn anchors_for(position: Position, alignment: Alignment, mode: Mode) -> Anchors {
    let edge = match position {
        Position::Top => Anchors::TOP,
        Position::Bottom => Anchors::BOTTOM,
        Position::Left => Anchors::LEFT,
        Position::Right => Anchors::RIGHT,
    };
    if mode != Mode::Default {
        return match position {
            Position::Top | Position::Bottom => edge | Anchors::LEFT | Anchors::RIGHT,
            Position::Left | Position::Right => edge | Anchors::TOP | Anchors::BOTTOM,
        };
    }
    let side = match (position, alignment) {
        (_, Alignment::Center) => Anchors::default(),
        (Position::Top | Position::Bottom, Alignment::Start) => Anchors::LEFT,
        (Position::Top | Position::Bottom, Alignment::End) => Anchors::RIGHT,
        (Position::Left | Position::Right, Alignment::Start) => Anchors::TOP,
        (Position::Left | Position::Right, Alignment::End) => Anchors::BOTTOM,
    };
    edge | side
}

/// Clamp each corner radius to half the smaller centre side.
#[must_use]
pub fn clamp_radii(radii: Corners, center_w: u32, center_h: u32) -> Corners {
    let max = center_w.min(center_h) / 2;
    Corners {
        top_left: radii.top_left.min(max),
        top_right: radii.top_right.min(max),
        bottom_left: radii.bottom_left.min(max),
        bottom_right: radii.bottom_right.min(max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lava_core::Position;

    fn base_config() -> BarConfig {
        let mut c = BarConfig::default();
        c.position = Position::Bottom;
        c.alignment = Alignment::Center;
        c.mode = Mode::Default;
        c.size = 60;
        c.border = Sides::splat(2);
        c.margin = Sides::splat(0);
        c
    }

    #[test]
    fn default_mode_bottom_center() {
        // Three buttons of size 60, border 2 on all sides, 1920x1080 output.
        let dims = compute(&base_config(), 180, 1920, 1080);
        assert_eq!(dims.item_area, Rect::new(2, 2, 180, 60));
        assert_eq!(dims.bar, Rect::new(0, 0, 184, 64));
        assert_eq!(dims.surface, Extent::new(184, 64));
        assert_eq!(dims.anchors, Anchors::BOTTOM);
        assert_eq!(dims.margin, Sides::splat(0));
    }

    #[test]
    fn full_mode_margins_shift_bar_and_items() {
        let mut c = base_config();
        c.mode = Mode::Full;
        c.margin = Sides { top: 0, right: 40, bottom: 0, left: 20 };
        let dims = compute(&c, 180, 1920, 1080);
        assert_eq!(dims.surface.w, 1920);
        assert_eq!(dims.bar.x, 20);
        assert_eq!(dims.bar.w, 1860);
        // Centred on the output, then shifted by the margin difference.
        assert_eq!(dims.item_area.x, (1920 / 2 - 90) + (20 - 40));
        // Main-axis margins are simulated, not sent to the layer shell.
        assert_eq!(dims.margin, Sides::splat(0));
    }

    #[test]
    fn full_mode_keeps_cross_margins() {
        let mut c = base_config();
        c.mode = Mode::Full;
        c.margin = Sides { top: 6, right: 40, bottom: 8, left: 20 };
        let dims = compute(&c, 180, 1920, 1080);
        assert_eq!(dims.margin, Sides { top: 6, right: 0, bottom: 8, left: 0 });
    }

    #[test]
    fn aggressive_mode_shrinks_bar_to_items() {
        let mut c = base_config();
        c.mode = Mode::Aggressive;
        c.alignment = Alignment::End;
        c.margin = Sides { top: 0, right: 10, bottom: 0, left: 0 };
        let dims = compute(&c, 180, 1920, 1080);
        assert_eq!(dims.surface.w, 1920);
        assert_eq!(dims.item_area.x, 1920 - 10 - 2 - 180);
        assert_eq!(dims.bar, Rect::new(1726, 0, 184, 64));
    }

    #[test]
    fn vertical_full_mode() {
        let mut c = base_config();
        c.position = Position::Left;
        c.mode = Mode::Full;
        c.margin = Sides { top: 10, right: 0, bottom: 30, left: 4 };
        let dims = compute(&c, 120, 1920, 1080);
        assert_eq!(dims.surface, Extent::new(64, 1080));
        assert_eq!(dims.bar.y, 10);
        assert_eq!(dims.bar.h, 1040);
        assert_eq!(dims.item_area.y, (1080 / 2 - 60) + (10 - 30));
        assert_eq!(dims.item_area.x, 2);
        assert_eq!(dims.margin, Sides { top: 0, right: 0, bottom: 0, left: 4 });
    }

    #[test]
    fn hidden_rects_collapse_only_the_cross_axis() {
        let mut c = base_config();
        c.mode = Mode::Full;
        c.hidden_size = 10;
        let dims = compute(&c, 180, 1920, 1080);
        assert_eq!(dims.surface_hidden, Extent::new(1920, 10));
        assert_eq!(dims.bar_hidden.w, dims.bar.w);
        assert_eq!(dims.bar_hidden.h, 10);

        c.position = Position::Right;
        let dims = compute(&c, 180, 1920, 1080);
        assert_eq!(dims.surface_hidden, Extent::new(10, 1080));
        assert_eq!(dims.bar_hidden.h, dims.bar.h);
    }

    #[test]
    fn anchor_table_has_36_fixed_entries() {
        use Alignment::{Center, End, Start};
        use Mode::{Aggressive, Default, Full};
        use Position::{Bottom, Left, Right, Top};

        let t = Anchors::TOP;
        let b = Anchors::BOTTOM;
        let l = Anchors::LEFT;
        let r = Anchors::RIGHT;

        #[rustfmt::skip]
        let expected = [
            // (position, alignment, mode) -> anchors
            (Top, Start, Default, t | l), (Top, Center, Default, t), (Top, End, Default, t | r),
            (Bottom, Start, Default, b | l), (Bottom, Center, Default, b), (Bottom, End, Default, b | r),
            (Left, Start, Default, l | t), (Left, Center, Default, l), (Left, End, Default, l | b),
            (Right, Start, Default, r | t), (Right, Center, Default, r), (Right, End, Default, r | b),
        ];
        for (pos, align, mode, want) in expected {
            assert_eq!(anchors_for(pos, align, mode), want, "{pos:?}/{align:?}/{mode:?}");
        }

        // Full and aggressive ignore the alignment and claim the whole edge.
        for mode in [Full, Aggressive] {
            for align in [Start, Center, End] {
                assert_eq!(anchors_for(Top, align, mode), t | l | r);
                assert_eq!(anchors_for(Bottom, align, mode), b | l | r);
                assert_eq!(anchors_for(Left, align, mode), l | t | b);
                assert_eq!(anchors_for(Right, align, mode), r | t | b);
            }
        }
    }

    #[test]
    fn exclusive_zone_one_becomes_thickness() {
        let mut c = base_config();
        c.exclusive_zone = 1;
        assert_eq!(compute(&c, 180, 1920, 1080).exclusive_zone, 64);
        c.exclusive_zone = 0;
        assert_eq!(compute(&c, 180, 1920, 1080).exclusive_zone, 0);
        c.exclusive_zone = -1;
        assert_eq!(compute(&c, 180, 1920, 1080).exclusive_zone, -1);
    }

    #[test]
    fn radii_clamped_to_half_center() {
        let clamped = clamp_radii(Corners::splat(40), 180, 60);
        assert_eq!(clamped, Corners::splat(30));
        let clamped = clamp_radii(
            Corners { top_left: 4, top_right: 99, bottom_left: 0, bottom_right: 31 },
            100,
            60,
        );
        assert_eq!(clamped.top_left, 4);
        assert_eq!(clamped.top_right, 30);
        assert_eq!(clamped.bottom_left, 0);
        assert_eq!(clamped.bottom_right, 30);
    }
}

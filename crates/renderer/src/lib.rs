//! Layout and drawing engine for the launcher bar.
//!
//! Everything in [`layout`] is pure arithmetic and fully unit-tested; the
//! [`draw`] module paints into Cairo surfaces the Wayland layer hands it.

pub mod draw;
pub mod icon;
pub mod layout;

pub use icon::Icon;
pub use layout::{anchors_for, clamp_radii, Anchors, BarDimensions};

pub mod color;
pub mod error;
pub mod geometry;

pub use color::Color;
pub use error::{LavaError, Result};
pub use geometry::{Alignment, Extent, Mode, Orientation, Position, Rect};

//! Button image loading. PNG goes straight through Cairo's reader; SVG is
//! rasterised once at load time and scaled like any other image when drawn.

use lava_core::{LavaError, Result};
use std::path::Path;

/// SVG rasterisation target; enough for the largest sane bar size.
const SVG_RASTER_SIZE: f64 = 256.0;

/// A loaded, ready-to-draw button image.
#[derive(Debug, Clone)]
pub struct Icon {
    pub surface: cairo::ImageSurface,
}

/// Load a PNG or SVG image, decided by file extension.
pub fn load(path: &Path) -> Result<Icon> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let surface = match ext.as_deref() {
        Some("png") => load_png(path)?,
        Some("svg") => load_svg(path)?,
        _ => {
            return Err(LavaError::Image(format!(
                "'{}': unsupported image type (expected .png or .svg)",
                path.display()
            )))
        }
    };
    Ok(Icon { surface })
}

fn load_png(path: &Path) -> Result<cairo::ImageSurface> {
    let mut file = std::fs::File::open(path)
        .map_err(|e| LavaError::Image(format!("'{}': {e}", path.display())))?;
    cairo::ImageSurface::create_from_png(&mut file)
        .map_err(|e| LavaError::Image(format!("'{}': invalid PNG: {e}", path.display())))
}

fn load_svg(path: &Path) -> Result<cairo::ImageSurface> {
    use resvg::{tiny_skia, usvg};

    let data = std::fs::read(path)
        .map_err(|e| LavaError::Image(format!("'{}': {e}", path.display())))?;
    let tree = usvg::Tree::from_data(&data, &usvg::Options::default())
        .map_err(|e| LavaError::Image(format!("'{}': invalid SVG: {e}", path.display())))?;

    let size = tree.size();
    let scale = SVG_RASTER_SIZE / f64::from(size.width().max(size.height()));
    let w = (f64::from(size.width()) * scale).round().max(1.0) as u32;
    let h = (f64::from(size.height()) * scale).round().max(1.0) as u32;

    let mut pixmap = tiny_skia::Pixmap::new(w, h).ok_or_else(|| {
        LavaError::Image(format!("'{}': cannot allocate raster buffer", path.display()))
    })?;
    resvg::render(
        &tree,
        tiny_skia::Transform::from_scale(scale as f32, scale as f32),
        &mut pixmap.as_mut(),
    );

    premultiplied_rgba_to_cairo(pixmap.data(), w, h)
        .map_err(|e| LavaError::Image(format!("'{}': {e}", path.display())))
}

/// Repack tiny-skia's premultiplied RGBA bytes into Cairo's native-endian
/// premultiplied ARGB32.
fn premultiplied_rgba_to_cairo(
    rgba: &[u8],
    w: u32,
    h: u32,
) -> std::result::Result<cairo::ImageSurface, cairo::Error> {
    let stride = cairo::Format::ARgb32.stride_for_width(w)? as usize;
    let mut data = vec![0u8; stride * h as usize];

    for y in 0..h as usize {
        for x in 0..w as usize {
            let src = (y * w as usize + x) * 4;
            let (r, g, b, a) = (rgba[src], rgba[src + 1], rgba[src + 2], rgba[src + 3]);
            let px =
                (u32::from(a) << 24) | (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b);
            let dst = y * stride + x * 4;
            data[dst..dst + 4].copy_from_slice(&px.to_ne_bytes());
        }
    }

    cairo::ImageSurface::create_for_data(data, cairo::Format::ARgb32, w as i32, h as i32, stride as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_extension_is_rejected() {
        let err = load(Path::new("logo.jpeg")).unwrap_err();
        assert!(err.to_string().contains("unsupported image type"));
    }
}

use crate::error::{Result, SimError};
use image::GrayImage;
use rayon::prelude::*;

/// Value of taps that fall outside the source image
pub const BORDER_VALUE: u8 = 0;

/// Source pixel or the constant border
#[inline]
fn sample_pixel(src: &GrayImage, x: isize, y: isize) -> f32 {
    let (w, h) = (src.width() as isize, src.height() as isize);
    if x < 0 || y < 0 || x >= w || y >= h {
        return BORDER_VALUE as f32;
    }
    src.as_raw()[(y * w + x) as usize] as f32
}

/// Bilinear sample; each of the four taps falls back to the border on its own
pub fn sample_bilinear(src: &GrayImage, x: f32, y: f32) -> f32 {
    if !(x.is_finite() && y.is_finite()) {
        return BORDER_VALUE as f32;
    }
    // All four taps are outside; also keeps the integer casts below in range
    if x < -1.0 || y < -1.0 || x > src.width() as f32 || y > src.height() as f32 {
        return BORDER_VALUE as f32;
    }

    let x0 = x.floor() as isize;
    let y0 = y.floor() as isize;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let v00 = sample_pixel(src, x0, y0);
    let v10 = sample_pixel(src, x0 + 1, y0);
    let v01 = sample_pixel(src, x0, y0 + 1);
    let v11 = sample_pixel(src, x0 + 1, y0 + 1);

    let v0 = v00 * (1.0 - fx) + v10 * fx;
    let v1 = v01 * (1.0 - fx) + v11 * fx;
    v0 * (1.0 - fy) + v1 * fy
}

/// Inverse warp: `dst(x, y) = src(map_x[y * width + x], map_y[y * width + x])`
pub fn remap_bilinear(
    src: &GrayImage,
    map_x: &[f32],
    map_y: &[f32],
    width: u32,
    height: u32,
) -> Result<GrayImage> {
    let expected = width as usize * height as usize;
    if map_x.len() != expected || map_y.len() != expected {
        return Err(SimError::InvalidInput(format!(
            "remap maps hold {} and {} entries, expected {expected}",
            map_x.len(),
            map_y.len()
        )));
    }

    let mut dst = GrayImage::new(width, height);
    if expected == 0 {
        return Ok(dst);
    }

    let row_len = width as usize;
    dst.as_mut()
        .par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| {
            let offset = y * row_len;
            for (x, out) in row.iter_mut().enumerate() {
                let val = sample_bilinear(src, map_x[offset + x], map_y[offset + x]);
                *out = val.round().clamp(0.0, 255.0) as u8;
            }
        });

    Ok(dst)
}

//! Grayscale image and pattern files

use crate::error::Result;
use image::GrayImage;
use ndarray::Array2;
use pendcam_core::synth::world_to_gray;
use std::path::Path;
use tracing::debug;

/// Read any supported image format and convert it to 8-bit luma
pub fn load_gray<P: AsRef<Path>>(path: P) -> Result<GrayImage> {
    let img = image::open(path.as_ref())?.to_luma8();
    debug!(
        path = %path.as_ref().display(),
        width = img.width(),
        height = img.height(),
        "image loaded"
    );
    Ok(img)
}

/// Write an 8-bit grayscale image; the format follows the file extension
pub fn save_gray<P: AsRef<Path>>(path: P, img: &GrayImage) -> Result<()> {
    img.save(path.as_ref())?;
    debug!(path = %path.as_ref().display(), "image saved");
    Ok(())
}

/// Write a `[0, 1]` intensity pattern (e.g. a checkerboard) as 8-bit grayscale
pub fn save_pattern<P: AsRef<Path>>(path: P, pattern: &Array2<f64>) -> Result<()> {
    save_gray(path, &world_to_gray(pattern))
}

/// Load an 8-bit image as a `[0, 1]` intensity pattern indexed `[row, col]`
pub fn load_pattern<P: AsRef<Path>>(path: P) -> Result<Array2<f64>> {
    let img = load_gray(path)?;
    let (w, h) = img.dimensions();
    Ok(Array2::from_shape_fn((h as usize, w as usize), |(r, c)| {
        img.get_pixel(c as u32, r as u32)[0] as f64 / 255.0
    }))
}

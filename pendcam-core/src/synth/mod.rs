//! Synthetic camera views of a planar world image
//!
//! The world image is laid on the `Z = 0` plane, centered at the origin and
//! scaled to its physical size. Every world pixel is projected through the
//! camera, and the projected coordinates drive an inverse warp of the world
//! image. The warp has the world grid's resolution and is resized to the
//! requested output size afterwards.

mod remap;

pub use remap::{BORDER_VALUE, remap_bilinear, sample_bilinear};

use crate::camera::{CameraModel, Pose};
use crate::error::{Result, SimError};
use crate::noise::{NoiseConfig, apply_noise};
use crate::ode::linspace;
use image::GrayImage;
use image::imageops::{self, FilterType};
use nalgebra::Point3;
use ndarray::Array2;
use tracing::debug;

/// Physical `Z = 0` coordinates (mm) of every world pixel, row-major.
///
/// Column `c` of a `cols` wide image maps linearly onto
/// `[-width_mm / 2, width_mm / 2]`, rows likewise onto the height.
pub fn world_grid(shape: (usize, usize), world_size_mm: (f64, f64)) -> Vec<Point3<f64>> {
    let (rows, cols) = shape;
    let (width_mm, height_mm) = world_size_mm;
    let xs = linspace(-width_mm / 2.0, width_mm / 2.0, cols);
    let ys = linspace(-height_mm / 2.0, height_mm / 2.0, rows);

    ys.iter()
        .flat_map(|&y| xs.iter().map(move |&x| Point3::new(x, y, 0.0)))
        .collect()
}

/// 8-bit rendering of a world image with intensities in `[0, 1]`.
///
/// Values are scaled by 255 and truncated; anything outside the range
/// saturates.
pub fn world_to_gray(world: &Array2<f64>) -> GrayImage {
    let (rows, cols) = world.dim();
    GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        image::Luma([(world[[y as usize, x as usize]] * 255.0) as u8])
    })
}

/// Render the camera view of a planar world image.
///
/// `output_size` is `(width, height)` in pixels. When `noise` is given it is
/// applied to the resized view.
pub fn synthesize(
    camera: &CameraModel,
    world: &Array2<f64>,
    world_size_mm: (f64, f64),
    output_size: (u32, u32),
    pose: &Pose,
    noise: Option<&NoiseConfig>,
) -> Result<GrayImage> {
    let (rows, cols) = world.dim();
    if rows == 0 || cols == 0 {
        return Err(SimError::InvalidInput("world image is empty".into()));
    }
    let (width_mm, height_mm) = world_size_mm;
    if !(width_mm > 0.0 && height_mm > 0.0 && width_mm.is_finite() && height_mm.is_finite()) {
        return Err(SimError::InvalidInput(format!(
            "world size must be positive, got {width_mm} x {height_mm} mm"
        )));
    }
    let (out_w, out_h) = output_size;
    if out_w == 0 || out_h == 0 {
        return Err(SimError::InvalidInput(format!(
            "output size must be non-zero, got {out_w}x{out_h}"
        )));
    }

    let grid = world_grid((rows, cols), world_size_mm);
    let projected = camera.project_with_pose(&grid, pose);
    let map_x: Vec<f32> = projected.iter().map(|p| p.x as f32).collect();
    let map_y: Vec<f32> = projected.iter().map(|p| p.y as f32).collect();

    let source = world_to_gray(world);
    let warped = remap_bilinear(&source, &map_x, &map_y, cols as u32, rows as u32)?;

    let view = if (cols as u32, rows as u32) == (out_w, out_h) {
        warped
    } else {
        imageops::resize(&warped, out_w, out_h, FilterType::Triangle)
    };
    debug!(
        world_cols = cols,
        world_rows = rows,
        width = out_w,
        height = out_h,
        "synthesized camera view"
    );

    match noise {
        Some(config) => apply_noise(&view, config),
        None => Ok(view),
    }
}

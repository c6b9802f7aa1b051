//! Physical display model and on-screen calibration patterns

use crate::error::{Result, SimError};
use ndarray::Array2;

const METERS_PER_INCH: f64 = 0.0254;

/// Screen with known physical extent and resolution.
///
/// Physical quantities are stored in meters; the conversion helpers work
/// in millimetres with the origin at the top-left corner of the screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Display {
    width_m: f64,
    height_m: f64,
    width_px: u32,
    height_px: u32,
}

impl Display {
    pub fn new(width_m: f64, height_m: f64, width_px: u32, height_px: u32) -> Result<Self> {
        if !(width_m > 0.0 && height_m > 0.0 && width_m.is_finite() && height_m.is_finite()) {
            return Err(SimError::InvalidInput(format!(
                "display size must be positive, got {width_m} x {height_m} m"
            )));
        }
        if width_px == 0 || height_px == 0 {
            return Err(SimError::InvalidInput(format!(
                "display resolution must be non-zero, got {width_px}x{height_px}"
            )));
        }
        Ok(Self {
            width_m,
            height_m,
            width_px,
            height_px,
        })
    }

    pub fn size_m(&self) -> (f64, f64) {
        (self.width_m, self.height_m)
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width_px, self.height_px)
    }

    /// Center-to-center pixel distance in meters `(x, y)`
    pub fn pixel_pitch(&self) -> (f64, f64) {
        (
            self.width_m / self.width_px as f64,
            self.height_m / self.height_px as f64,
        )
    }

    pub fn mm_per_pixel(&self) -> (f64, f64) {
        let (px, py) = self.pixel_pitch();
        (px * 1000.0, py * 1000.0)
    }

    /// Dots per inch `(x, y)`
    pub fn dpi(&self) -> (f64, f64) {
        (
            self.width_px as f64 / (self.width_m / METERS_PER_INCH),
            self.height_px as f64 / (self.height_m / METERS_PER_INCH),
        )
    }

    /// Screen pixel coordinates to millimetres
    pub fn pixel_to_world(&self, px_x: f64, px_y: f64) -> (f64, f64) {
        let (mx, my) = self.mm_per_pixel();
        (px_x * mx, px_y * my)
    }

    /// Millimetres to screen pixel coordinates
    pub fn world_to_pixel(&self, x_mm: f64, y_mm: f64) -> (f64, f64) {
        let (mx, my) = self.mm_per_pixel();
        (x_mm / mx, y_mm / my)
    }

    /// Physical `(width, height)` in mm of a pattern shown 1:1 on this display
    pub fn world_size_mm(&self, pattern: &Array2<f64>) -> (f64, f64) {
        let (rows, cols) = pattern.dim();
        self.pixel_to_world(cols as f64, rows as f64)
    }
}

/// Checkerboard of `squares = (cols, rows)` scaled to the display.
///
/// Without `square_size_mm` the largest square that leaves room for one
/// extra square in each direction is used. Cells are `(r + c) % 2`
/// (flipped when `invert`), one value per display pixel. Returns the
/// pattern and the square size in mm.
pub fn generate_checkerboard(
    display: &Display,
    squares: (usize, usize),
    square_size_mm: Option<f64>,
    invert: bool,
) -> Result<(Array2<f64>, f64)> {
    let (cols, rows) = squares;
    if cols == 0 || rows == 0 {
        return Err(SimError::InvalidInput(format!(
            "checkerboard needs at least one square, got {cols}x{rows}"
        )));
    }

    let (mm_x, _) = display.mm_per_pixel();
    let (square_px, square_mm) = match square_size_mm {
        Some(mm) => {
            if !(mm > 0.0 && mm.is_finite()) {
                return Err(SimError::InvalidInput(format!(
                    "square size must be positive, got {mm} mm"
                )));
            }
            (mm / mm_x, mm)
        }
        None => {
            let (w, h) = display.resolution();
            let px = (w as f64 / (cols + 1) as f64).min(h as f64 / (rows + 1) as f64);
            (px, px * mm_x)
        }
    };

    let cell = square_px.floor() as usize;
    if cell == 0 {
        return Err(SimError::InvalidInput(format!(
            "square of {square_mm} mm is smaller than one display pixel"
        )));
    }

    let pattern = Array2::from_shape_fn((rows * cell, cols * cell), |(y, x)| {
        let parity = (y / cell + x / cell) % 2;
        let value = if invert { 1 - parity } else { parity };
        value as f64
    });

    Ok((pattern, square_mm))
}

use nalgebra::{Matrix3, Point2};

/// Pinhole intrinsics read from a 3x3 camera matrix `K`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinholeIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl PinholeIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Extract focal lengths and principal point; skew is ignored
    pub fn from_matrix(k: &Matrix3<f64>) -> Self {
        Self {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
        }
    }

    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    /// Get focal lengths
    pub fn focal_length(&self) -> (f64, f64) {
        (self.fx, self.fy)
    }

    /// Get principal point
    pub fn principal_point(&self) -> (f64, f64) {
        (self.cx, self.cy)
    }

    /// Normalized image coordinates to pixels
    pub fn to_pixel(&self, x_norm: f64, y_norm: f64) -> Point2<f64> {
        Point2::new(self.fx * x_norm + self.cx, self.fy * y_norm + self.cy)
    }

    /// Pixels to normalized image coordinates
    pub fn to_normalized(&self, pixel: &Point2<f64>) -> (f64, f64) {
        ((pixel.x - self.cx) / self.fx, (pixel.y - self.cy) / self.fy)
    }
}

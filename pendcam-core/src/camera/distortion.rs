use crate::error::ProjectionError;
use serde::{Deserialize, Serialize};

const UNDISTORT_ITERS: usize = 20;

type Result<T> = std::result::Result<T, ProjectionError>;

/// Brown-Conrady lens distortion, coefficients in OpenCV order `(k1, k2, p1, p2, k3)`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl Distortion {
    pub fn from_coeffs(c: [f64; 5]) -> Self {
        Self {
            k1: c[0],
            k2: c[1],
            p1: c[2],
            p2: c[3],
            k3: c[4],
        }
    }

    pub fn coeffs(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs().iter().all(|c| *c == 0.0)
    }

    /// Apply distortion to normalized image coordinates
    pub fn distort(&self, x_norm: f64, y_norm: f64) -> (f64, f64) {
        let Self { k1, k2, p1, p2, k3 } = *self;
        let r2 = x_norm * x_norm + y_norm * y_norm;
        let r4 = r2 * r2;
        let r6 = r4 * r2;

        let radial = 1.0 + k1 * r2 + k2 * r4 + k3 * r6;

        let x_dist = x_norm * radial + 2.0 * p1 * x_norm * y_norm + p2 * (r2 + 2.0 * x_norm * x_norm);

        let y_dist = y_norm * radial + p1 * (r2 + 2.0 * y_norm * y_norm) + 2.0 * p2 * x_norm * y_norm;

        (x_dist, y_dist)
    }

    /// Remove distortion from normalized coordinates using Newton-Raphson iteration
    pub fn undistort(&self, x_dist: f64, y_dist: f64) -> Result<(f64, f64)> {
        if self.is_zero() {
            return Ok((x_dist, y_dist));
        }

        let mut x = x_dist;
        let mut y = y_dist;

        for _ in 0..UNDISTORT_ITERS {
            let (fx, fy) = self.distort(x, y);
            let rx = x_dist - fx;
            let ry = y_dist - fy;

            if rx.abs() < 1e-12 && ry.abs() < 1e-12 {
                return Ok((x, y));
            }

            // Finite-difference Jacobian
            let eps = 1e-7;
            let (fx_x, fy_x) = self.distort(x + eps, y);
            let (fx_y, fy_y) = self.distort(x, y + eps);

            let j11 = (fx_x - fx) / eps;
            let j21 = (fy_x - fy) / eps;
            let j12 = (fx_y - fx) / eps;
            let j22 = (fy_y - fy) / eps;

            // Solve J * [dx, dy]^T = [rx, ry]^T
            let det = j11 * j22 - j12 * j21;
            if det.abs() < 1e-18 {
                return Err(ProjectionError::SingularJacobian);
            }

            x += (j22 * rx - j12 * ry) / det;
            y += (-j21 * rx + j11 * ry) / det;
        }

        let (fx, fy) = self.distort(x, y);
        if (x_dist - fx).abs() < 1e-9 && (y_dist - fy).abs() < 1e-9 {
            return Ok((x, y));
        }
        Err(ProjectionError::NoConvergence(UNDISTORT_ITERS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_round_trip() {
        let m = Distortion::default();
        let (x, y) = (0.123, -0.456);
        let (xd, yd) = m.distort(x, y);
        assert_eq!((xd, yd), (x, y));
        let (xu, yu) = m.undistort(xd, yd).unwrap();
        assert_eq!((xu, yu), (x, y));
    }

    #[test]
    fn brown_conrady_round_trip() {
        let m = Distortion::from_coeffs([-0.1, 0.01, 0.001, -0.001, 0.0]);
        let (x, y) = (0.2, -0.15);
        let (xd, yd) = m.distort(x, y);
        let (xu, yu) = m.undistort(xd, yd).unwrap();
        assert!((x - xu).abs() < 1e-9);
        assert!((y - yu).abs() < 1e-9);
    }

    #[test]
    fn coefficient_order_matches_opencv() {
        let m = Distortion::from_coeffs([1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(m.k1, 1.0);
        assert_eq!(m.k2, 2.0);
        assert_eq!(m.p1, 3.0);
        assert_eq!(m.p2, 4.0);
        assert_eq!(m.k3, 5.0);
        assert_eq!(m.coeffs(), [1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn radial_only_scales_along_ray() {
        let m = Distortion::from_coeffs([0.1, 0.0, 0.0, 0.0, 0.0]);
        let (xd, yd) = m.distort(0.3, 0.4);
        // r^2 = 0.25 -> factor 1.025
        assert!((xd - 0.3 * 1.025).abs() < 1e-12);
        assert!((yd - 0.4 * 1.025).abs() < 1e-12);
    }

    #[test]
    fn signals_non_convergence() {
        let m = Distortion::from_coeffs([1e6, 1e6, 1.0, -1.0, 1e6]);
        let res = m.undistort(10.0, 10.0);
        assert!(res.is_err());
    }
}

//! Linear radial distortion estimate from homography residuals.
//!
//! With intrinsics known, the ideal normalized point `n = K^-1 H p` and the
//! observed normalized point `m = K^-1 q` satisfy, to first order,
//! `m - n = n (k1 r^2 + k2 r^4)`. Stacking both components of every
//! correspondence gives an overdetermined system in `(k1, k2)`.

use super::homography::apply_homography;
use crate::camera::PinholeIntrinsics;
use crate::error::CalibrationError;
use nalgebra::{DMatrix, DVector, Matrix3, Point2};

/// One view used by [`fit_radial_distortion`]
pub struct ResidualView<'a> {
    pub homography: Matrix3<f64>,
    pub plane_points: &'a [Point2<f64>],
    pub image_points: &'a [Point2<f64>],
}

/// Minimum squared radius spread before `(k1, k2)` are considered observable
const MIN_RADIAL_SPREAD: f64 = 1e-8;

pub fn fit_radial_distortion(
    intrinsics: &PinholeIntrinsics,
    views: &[ResidualView<'_>],
) -> Result<(f64, f64), CalibrationError> {
    let total: usize = views.iter().map(|v| v.plane_points.len()).sum();
    if total < 2 {
        return Err(CalibrationError::Degenerate(format!(
            "need at least 2 points for distortion estimation, got {total}"
        )));
    }

    let mut a = DMatrix::<f64>::zeros(2 * total, 2);
    let mut b = DVector::<f64>::zeros(2 * total);
    let (mut r2_min, mut r2_max) = (f64::INFINITY, 0.0f64);

    let mut row = 0;
    for view in views {
        for (p, q) in view.plane_points.iter().zip(view.image_points) {
            let ideal = apply_homography(&view.homography, p);
            let (x, y) = intrinsics.to_normalized(&ideal);
            let (xo, yo) = intrinsics.to_normalized(q);

            let r2 = x * x + y * y;
            r2_min = r2_min.min(r2);
            r2_max = r2_max.max(r2);

            a[(row, 0)] = x * r2;
            a[(row, 1)] = x * r2 * r2;
            b[row] = xo - x;
            a[(row + 1, 0)] = y * r2;
            a[(row + 1, 1)] = y * r2 * r2;
            b[row + 1] = yo - y;
            row += 2;
        }
    }

    if r2_max - r2_min < MIN_RADIAL_SPREAD {
        return Err(CalibrationError::Degenerate(
            "insufficient radial diversity for distortion estimation".into(),
        ));
    }

    let svd = a.svd(true, true);
    let x = svd
        .solve(&b, 1e-14)
        .map_err(|e| CalibrationError::Degenerate(e.to_string()))?;

    if x.iter().all(|v| v.is_finite()) {
        Ok((x[0], x[1]))
    } else {
        Err(CalibrationError::Degenerate(
            "non-finite distortion estimate".into(),
        ))
    }
}

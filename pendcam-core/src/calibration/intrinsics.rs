//! Closed-form intrinsics initialisation from plane homographies.
//!
//! Two estimators are provided:
//! - Zhang's method with an explicit zero-skew constraint, which recovers
//!   focal lengths and principal point from three or more views;
//! - a principal-point-at-image-center variant that only solves for the
//!   focal lengths and therefore works from a single tilted view.
//!
//! Both work on homographies pre-multiplied by `N`, which maps the image
//! center to the origin and the mean image side to unit length.

use crate::camera::PinholeIntrinsics;
use crate::error::CalibrationError;
use nalgebra::{DMatrix, DVector, Matrix3, SVector};

type Result<T> = std::result::Result<T, CalibrationError>;

/// Pixel-frame normalisation for an image of `(width, height)` pixels
fn image_normalization(image_size: (u32, u32)) -> (Matrix3<f64>, f64, f64, f64) {
    let (w, h) = (image_size.0 as f64, image_size.1 as f64);
    let s = (0.5 * (w + h)).max(1.0);
    let cx = (w - 1.0) * 0.5;
    let cy = (h - 1.0) * 0.5;
    let n = Matrix3::new(1.0 / s, 0.0, -cx / s, 0.0, 1.0 / s, -cy / s, 0.0, 0.0, 1.0);
    (n, s, cx, cy)
}

fn normalized(n: &Matrix3<f64>, h: &Matrix3<f64>) -> Matrix3<f64> {
    let hn = n * h;
    hn / hn.norm()
}

/// Build the 6-vector v_ij(H) from Zhang's paper (0-based column indices)
fn v_ij(h: &Matrix3<f64>, i: usize, j: usize) -> SVector<f64, 6> {
    let hi = h.column(i);
    let hj = h.column(j);

    SVector::<f64, 6>::from_row_slice(&[
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    ])
}

/// Zhang's closed-form solution with `B12 = 0` enforced. Needs at least 3 views.
pub fn zhang_intrinsics(homographies: &[Matrix3<f64>], image_size: (u32, u32)) -> Result<PinholeIntrinsics> {
    if homographies.len() < 3 {
        return Err(CalibrationError::Degenerate(format!(
            "Zhang's method needs at least 3 views, got {}",
            homographies.len()
        )));
    }

    let (n, s, cx0, cy0) = image_normalization(image_size);

    let m = homographies.len();
    let mut vmtx = DMatrix::<f64>::zeros(2 * m + 1, 6);
    for (k, h) in homographies.iter().enumerate() {
        let h = normalized(&n, h);
        vmtx.row_mut(2 * k).copy_from(&v_ij(&h, 0, 1).transpose());
        vmtx.row_mut(2 * k + 1)
            .copy_from(&(v_ij(&h, 0, 0) - v_ij(&h, 1, 1)).transpose());
    }
    // Zero-skew constraint row
    vmtx[(2 * m, 1)] = 1.0;

    // Solve V b = 0 via SVD: right singular vector of the smallest singular value
    let svd = vmtx.svd(false, true);
    let v_t = svd
        .v_t
        .ok_or_else(|| CalibrationError::Degenerate("svd failed".into()))?;
    let b = v_t.row(v_t.nrows() - 1);

    let (b11, b12, b22, b13, b23, b33) = (b[0], b[1], b[2], b[3], b[4], b[5]);

    let denom = b11 * b22 - b12 * b12;
    if denom.abs() <= 1e-12 * (b11 * b11 + b22 * b22) {
        return Err(CalibrationError::Degenerate(
            "singular image of the absolute conic".into(),
        ));
    }

    let v0 = (b12 * b13 - b11 * b23) / denom;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;

    let alpha_sq = lambda / b11;
    let beta_sq = lambda * b11 / denom;
    if !(alpha_sq > 0.0 && beta_sq > 0.0) {
        return Err(CalibrationError::Degenerate(
            "invalid sign for focal length estimate".into(),
        ));
    }

    let alpha = alpha_sq.sqrt();
    let beta = beta_sq.sqrt();
    let gamma = -b12 * alpha * alpha * beta / lambda;
    let u0 = gamma * v0 / beta - b13 * alpha * alpha / lambda;

    // Undo the normalisation: K = N^-1 K_n
    let intr = PinholeIntrinsics::new(alpha * s, beta * s, u0 * s + cx0, v0 * s + cy0);
    if [intr.fx, intr.fy, intr.cx, intr.cy].iter().all(|v| v.is_finite()) {
        Ok(intr)
    } else {
        Err(CalibrationError::Degenerate("non-finite intrinsics".into()))
    }
}

/// Focal lengths by linear least squares with the principal point fixed at
/// the image center `((w - 1) / 2, (h - 1) / 2)`.
pub fn centered_intrinsics(homographies: &[Matrix3<f64>], image_size: (u32, u32)) -> Result<PinholeIntrinsics> {
    if homographies.is_empty() {
        return Err(CalibrationError::NoUsableObservations);
    }

    let (n, s, cx, cy) = image_normalization(image_size);

    let views = homographies.len();
    let mut a = DMatrix::<f64>::zeros(2 * views, 2);
    let mut rhs = DVector::<f64>::zeros(2 * views);
    for (k, h) in homographies.iter().enumerate() {
        let hs = normalized(&n, h);
        let (h11, h12) = (hs[(0, 0)], hs[(0, 1)]);
        let (h21, h22) = (hs[(1, 0)], hs[(1, 1)]);
        let (h31, h32) = (hs[(2, 0)], hs[(2, 1)]);

        // Orthogonality of r1, r2
        a[(2 * k, 0)] = h11 * h12;
        a[(2 * k, 1)] = h21 * h22;
        rhs[2 * k] = -h31 * h32;

        // Equal norm of r1, r2
        a[(2 * k + 1, 0)] = h11 * h11 - h12 * h12;
        a[(2 * k + 1, 1)] = h21 * h21 - h22 * h22;
        rhs[2 * k + 1] = -(h31 * h31 - h32 * h32);
    }

    let svd = a.svd(true, true);
    let x = svd
        .solve(&rhs, 1e-12)
        .map_err(|e| CalibrationError::Degenerate(e.to_string()))?;

    // x = (1/fx^2, 1/fy^2) in normalised units
    if !(x[0] > 0.0 && x[1] > 0.0) {
        return Err(CalibrationError::Degenerate(
            "focal lengths unobservable (fronto-parallel views?)".into(),
        ));
    }

    Ok(PinholeIntrinsics::new(
        s / x[0].sqrt(),
        s / x[1].sqrt(),
        cx,
        cy,
    ))
}

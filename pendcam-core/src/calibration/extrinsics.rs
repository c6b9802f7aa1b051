use crate::camera::Pose;
use crate::error::CalibrationError;
use nalgebra::{Matrix3, Rotation3};

/// Recover the board pose from a plane homography `H ~ K [r1 r2 t]`.
///
/// The scale is chosen so that `|r1| = 1` and the sign so that the board
/// lies in front of the camera (`t.z > 0`). The rotation is projected onto
/// SO(3) with an SVD.
pub fn pose_from_homography(k: &Matrix3<f64>, h: &Matrix3<f64>) -> Result<Pose, CalibrationError> {
    let k_inv = k
        .try_inverse()
        .ok_or_else(|| CalibrationError::Degenerate("singular camera matrix".into()))?;
    let a = k_inv * h;

    let norm = a.column(0).norm();
    if !(norm.is_finite() && norm > f64::EPSILON) {
        return Err(CalibrationError::Degenerate(
            "homography has a vanishing first column".into(),
        ));
    }

    let mut lambda = 1.0 / norm;
    if a[(2, 2)] * lambda < 0.0 {
        lambda = -lambda;
    }

    let r1 = a.column(0) * lambda;
    let r2 = a.column(1) * lambda;
    let t = a.column(2) * lambda;
    let r3 = r1.cross(&r2);

    let r_approx = Matrix3::from_columns(&[r1, r2, r3]);
    let svd = r_approx.svd(true, true);
    let (u, v_t) = svd
        .u
        .zip(svd.v_t)
        .ok_or_else(|| CalibrationError::Degenerate("svd failed".into()))?;
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_fixed = u;
        u_fixed.set_column(2, &(-u.column(2)));
        r = u_fixed * v_t;
    }

    let rvec = Rotation3::from_matrix_unchecked(r).scaled_axis();
    Ok(Pose::new(rvec, t))
}

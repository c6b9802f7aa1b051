use nalgebra::{Matrix3, Point2, SMatrix, SVector};

/// Estimate `H` such that `image ~ H * plane` using the normalized DLT.
///
/// Returns `None` for fewer than four correspondences, mismatched lengths
/// or a point set without spatial extent.
pub fn dlt_homography(plane: &[Point2<f64>], image: &[Point2<f64>]) -> Option<Matrix3<f64>> {
    let n = plane.len();
    if n < 4 || image.len() != n {
        return None;
    }

    let t_plane = normalizing_transform(plane)?;
    let t_image = normalizing_transform(image)?;

    // Accumulate A^T A directly; A has two rows per correspondence
    let mut ata = SMatrix::<f64, 9, 9>::zeros();
    for (pw, pi) in plane.iter().zip(image) {
        let w = t_plane * pw.to_homogeneous();
        let m = t_image * pi.to_homogeneous();
        let (x, y) = (w.x / w.z, w.y / w.z);
        let (u, v) = (m.x / m.z, m.y / m.z);

        let r0 = SVector::<f64, 9>::from_row_slice(&[-x, -y, -1.0, 0.0, 0.0, 0.0, u * x, u * y, u]);
        let r1 = SVector::<f64, 9>::from_row_slice(&[0.0, 0.0, 0.0, -x, -y, -1.0, v * x, v * y, v]);
        ata += r0 * r0.transpose() + r1 * r1.transpose();
    }

    // Null vector: eigenvector of the smallest eigenvalue
    let eig = ata.symmetric_eigen();
    let (min_idx, _) = eig
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))?;
    let h = eig.eigenvectors.column(min_idx);

    let h_norm = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);
    let mut h_mat = t_image.try_inverse()? * h_norm * t_plane;

    // normalise such that H[2,2] = 1
    let scale = h_mat[(2, 2)];
    if scale.abs() > f64::EPSILON {
        h_mat /= scale;
    }

    if h_mat.iter().all(|v| v.is_finite()) {
        Some(h_mat)
    } else {
        None
    }
}

/// Similarity moving the centroid to the origin with mean distance sqrt(2)
fn normalizing_transform(points: &[Point2<f64>]) -> Option<Matrix3<f64>> {
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / n;
    let mean_dist = points
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    if !(mean_dist.is_finite() && mean_dist > f64::EPSILON) {
        return None;
    }

    let s = std::f64::consts::SQRT_2 / mean_dist;
    Some(Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0))
}

/// Apply a homography to a plane point
pub fn apply_homography(h: &Matrix3<f64>, p: &Point2<f64>) -> Point2<f64> {
    let q = h * p.to_homogeneous();
    Point2::new(q.x / q.z, q.y / q.z)
}

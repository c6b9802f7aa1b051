//! Camera models and projections

mod distortion;
mod pinhole;
mod pose;

pub use distortion::Distortion;
pub use pinhole::PinholeIntrinsics;
pub use pose::Pose;

use crate::error::Result;
use nalgebra::{Matrix3, Point2, Point3, Vector3};
use rayon::prelude::*;

/// Calibrated camera: intrinsic matrix, Brown-Conrady distortion and the
/// extrinsic pose of every calibration observation (in observation order)
#[derive(Debug, Clone, PartialEq)]
pub struct CameraModel {
    k: Matrix3<f64>,
    distortion: Distortion,
    poses: Vec<Pose>,
}

impl CameraModel {
    pub fn new(k: Matrix3<f64>, distortion: Distortion, poses: Vec<Pose>) -> Self {
        Self {
            k,
            distortion,
            poses,
        }
    }

    /// Camera without distortion or stored poses
    pub fn ideal(intrinsics: PinholeIntrinsics) -> Self {
        Self::new(intrinsics.matrix(), Distortion::default(), Vec::new())
    }

    /// Intrinsic matrix `K`
    pub fn k(&self) -> &Matrix3<f64> {
        &self.k
    }

    pub fn intrinsics(&self) -> PinholeIntrinsics {
        PinholeIntrinsics::from_matrix(&self.k)
    }

    pub fn distortion(&self) -> &Distortion {
        &self.distortion
    }

    /// Distortion coefficients `(k1, k2, p1, p2, k3)`
    pub fn dist_coeffs(&self) -> [f64; 5] {
        self.distortion.coeffs()
    }

    pub fn poses(&self) -> &[Pose] {
        &self.poses
    }

    pub fn rvecs(&self) -> Vec<Vector3<f64>> {
        self.poses.iter().map(|p| p.rvec).collect()
    }

    pub fn tvecs(&self) -> Vec<Vector3<f64>> {
        self.poses.iter().map(|p| p.tvec).collect()
    }

    /// Project a single point already expressed in the camera frame.
    ///
    /// A point with `z == 0` is treated as if `z == 1`.
    pub fn project_camera_point(&self, point_camera: &Point3<f64>) -> Point2<f64> {
        let inv_z = if point_camera.z != 0.0 {
            1.0 / point_camera.z
        } else {
            1.0
        };

        // Normalized coordinates
        let x_norm = point_camera.x * inv_z;
        let y_norm = point_camera.y * inv_z;

        let (x_dist, y_dist) = self.distortion.distort(x_norm, y_norm);
        self.intrinsics().to_pixel(x_dist, y_dist)
    }

    /// Project object points through `(rvec, tvec)`, intrinsics and distortion.
    ///
    /// Output has one pixel per input point, in input order.
    pub fn project_points(
        &self,
        object_points: &[Point3<f64>],
        rvec: &Vector3<f64>,
        tvec: &Vector3<f64>,
    ) -> Vec<Point2<f64>> {
        self.project_with_pose(object_points, &Pose::new(*rvec, *tvec))
    }

    pub fn project_with_pose(&self, object_points: &[Point3<f64>], pose: &Pose) -> Vec<Point2<f64>> {
        let rotation = pose.rotation();
        object_points
            .par_iter()
            .map(|p| self.project_camera_point(&(rotation * p + pose.tvec)))
            .collect()
    }

    /// Remove lens distortion from pixel coordinates; the result is expressed
    /// in the same pixel frame (`K` re-applied).
    pub fn undistort_points(&self, points: &[Point2<f64>]) -> Result<Vec<Point2<f64>>> {
        if self.distortion.is_zero() {
            return Ok(points.to_vec());
        }

        let intrinsics = self.intrinsics();
        points
            .iter()
            .map(|p| {
                let (x_dist, y_dist) = intrinsics.to_normalized(p);
                let (x, y) = self.distortion.undistort(x_dist, y_dist)?;
                Ok(intrinsics.to_pixel(x, y))
            })
            .collect()
    }
}

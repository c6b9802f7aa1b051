//! Planar-target camera calibration
//!
//! Each observation is a set of board corners at `Z = 0` (millimetres)
//! matched to their detected pixel positions. The pipeline is closed-form:
//! per-view homographies, intrinsics from the image of the absolute conic,
//! an alternating linear fit of radial distortion, and per-view poses.

mod distortion_fit;
mod extrinsics;
mod homography;
mod intrinsics;

pub use distortion_fit::{ResidualView, fit_radial_distortion};
pub use extrinsics::pose_from_homography;
pub use homography::{apply_homography, dlt_homography};
pub use intrinsics::{centered_intrinsics, zhang_intrinsics};

use crate::camera::{CameraModel, Distortion, PinholeIntrinsics};
use crate::error::{CalibrationError, Result};
use nalgebra::{Matrix3, Point2, Point3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Alternation stops once no parameter moves by more than this
/// (focal-relative for `K`, absolute for `k1`/`k2`)
const CONVERGENCE_TOL: f64 = 1e-10;

/// Largest `|z|` accepted for a board point to count as planar
const PLANE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibratorConfig {
    /// Physical size of one board square
    pub square_size_mm: f64,
    /// Inner corners per board row and column `(cols, rows)`
    pub board_shape: (usize, usize),
    /// Fit radial `(k1, k2)`; otherwise the camera is treated as distortion-free
    pub estimate_distortion: bool,
    /// Cap on alternating intrinsics / distortion rounds
    pub max_distortion_rounds: usize,
}

impl Default for CalibratorConfig {
    fn default() -> Self {
        Self {
            square_size_mm: 20.0,
            board_shape: (9, 6),
            estimate_distortion: true,
            max_distortion_rounds: 500,
        }
    }
}

/// Matched board and image points of one calibration image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanarObservation {
    pub object_points: Vec<Point3<f64>>,
    pub image_points: Vec<Point2<f64>>,
}

/// Result of a calibration run
#[derive(Debug, Clone)]
pub struct Calibration {
    /// Intrinsics, distortion and one pose per used observation
    pub camera: CameraModel,
    /// Root-mean-square reprojection error over all used points (pixels)
    pub rms: f64,
    /// Indices of the input observations that contributed, in pose order
    pub used: Vec<usize>,
}

pub struct CameraCalibrator {
    config: CalibratorConfig,
}

impl CameraCalibrator {
    pub fn new(config: CalibratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CalibratorConfig {
        &self.config
    }

    /// Inner-corner grid on the `Z = 0` plane, row-major with
    /// `x = col * square`, `y = row * square`
    pub fn object_points(&self) -> Vec<Point3<f64>> {
        let (cols, rows) = self.config.board_shape;
        let size = self.config.square_size_mm;
        (0..rows)
            .flat_map(|r| (0..cols).map(move |c| Point3::new(c as f64 * size, r as f64 * size, 0.0)))
            .collect()
    }

    /// Calibrate from per-image corner detections.
    ///
    /// `None` entries (failed detections) and sets whose length does not
    /// match the board are skipped; `used` indexes into `detections`.
    pub fn calibrate(
        &self,
        detections: &[Option<Vec<Point2<f64>>>],
        image_size: (u32, u32),
    ) -> Result<Calibration> {
        if detections.is_empty() {
            return Err(CalibrationError::NoObservations.into());
        }

        let object_points = self.object_points();
        let mut observations = Vec::new();
        let mut origin = Vec::new();
        for (i, det) in detections.iter().enumerate() {
            match det {
                Some(corners) if corners.len() == object_points.len() => {
                    observations.push(PlanarObservation {
                        object_points: object_points.clone(),
                        image_points: corners.clone(),
                    });
                    origin.push(i);
                }
                Some(corners) => warn!(
                    index = i,
                    found = corners.len(),
                    expected = object_points.len(),
                    "skipping incomplete corner set"
                ),
                None => warn!(index = i, "skipping image without detected board"),
            }
        }

        if observations.is_empty() {
            return Err(CalibrationError::NoUsableObservations.into());
        }

        let mut calibration = self.calibrate_correspondences(&observations, image_size)?;
        calibration.used = calibration.used.iter().map(|&j| origin[j]).collect();
        Ok(calibration)
    }

    /// Calibrate from explicit board/image correspondences
    pub fn calibrate_correspondences(
        &self,
        observations: &[PlanarObservation],
        image_size: (u32, u32),
    ) -> Result<Calibration> {
        if observations.is_empty() {
            return Err(CalibrationError::NoObservations.into());
        }

        let mut plane_sets = Vec::new();
        let mut used = Vec::new();
        for (i, obs) in observations.iter().enumerate() {
            if obs.object_points.len() != obs.image_points.len() {
                warn!(
                    index = i,
                    object = obs.object_points.len(),
                    image = obs.image_points.len(),
                    "skipping observation with mismatched point counts"
                );
                continue;
            }
            if obs.object_points.iter().any(|p| p.z.abs() > PLANE_TOLERANCE) {
                warn!(index = i, "skipping observation with non-planar board points");
                continue;
            }
            let plane: Vec<Point2<f64>> = obs.object_points.iter().map(|p| p.xy()).collect();
            if dlt_homography(&plane, &obs.image_points).is_none() {
                warn!(index = i, "skipping observation without a valid homography");
                continue;
            }
            plane_sets.push(plane);
            used.push(i);
        }

        if used.is_empty() {
            return Err(CalibrationError::NoUsableObservations.into());
        }
        debug!(views = used.len(), "homographies estimated");

        let image_sets: Vec<&[Point2<f64>]> =
            used.iter().map(|&i| observations[i].image_points.as_slice()).collect();

        let rounds = if self.config.estimate_distortion {
            self.config.max_distortion_rounds.max(1)
        } else {
            1
        };

        let mut camera = CameraModel::ideal(PinholeIntrinsics::new(1.0, 1.0, 0.0, 0.0));
        let mut homographies = Vec::new();
        for round in 0..rounds {
            homographies = self.undistorted_homographies(&camera, &plane_sets, &image_sets)?;
            let intr = estimate_intrinsics(&homographies, image_size)?;

            let mut distortion = Distortion::default();
            if self.config.estimate_distortion {
                let views: Vec<ResidualView<'_>> = homographies
                    .iter()
                    .zip(&plane_sets)
                    .zip(&image_sets)
                    .map(|((h, plane), image)| ResidualView {
                        homography: *h,
                        plane_points: plane,
                        image_points: image,
                    })
                    .collect();
                match fit_radial_distortion(&intr, &views) {
                    Ok((k1, k2)) => {
                        distortion.k1 = k1;
                        distortion.k2 = k2;
                    }
                    Err(e) => warn!(error = %e, "distortion left at zero"),
                }
            }

            debug!(
                round,
                fx = intr.fx,
                fy = intr.fy,
                cx = intr.cx,
                cy = intr.cy,
                k1 = distortion.k1,
                k2 = distortion.k2,
                "intrinsics estimate"
            );
            let change = if round == 0 {
                f64::INFINITY
            } else {
                parameter_change(&camera, &intr, &distortion)
            };
            camera = CameraModel::new(intr.matrix(), distortion, Vec::new());
            if change <= CONVERGENCE_TOL {
                debug!(rounds = round + 1, "intrinsics converged");
                break;
            }
            if round + 1 == rounds && self.config.estimate_distortion {
                warn!(rounds, change, "distortion fit stopped before converging");
            }
        }

        // Poses come from homographies of points undistorted with the final model
        if self.config.estimate_distortion {
            homographies = self.undistorted_homographies(&camera, &plane_sets, &image_sets)?;
        }
        let poses = homographies
            .iter()
            .map(|h| pose_from_homography(camera.k(), h))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let camera = CameraModel::new(*camera.k(), *camera.distortion(), poses);

        let (mut sq_sum, mut count) = (0.0, 0usize);
        for (&i, pose) in used.iter().zip(camera.poses()) {
            let obs = &observations[i];
            let projected = camera.project_with_pose(&obs.object_points, pose);
            sq_sum += projected
                .iter()
                .zip(&obs.image_points)
                .map(|(p, q)| (p - q).norm_squared())
                .sum::<f64>();
            count += obs.image_points.len();
        }
        let rms = (sq_sum / count as f64).sqrt();

        info!(views = used.len(), rms, "calibration finished");
        Ok(Calibration { camera, rms, used })
    }

    fn undistorted_homographies(
        &self,
        camera: &CameraModel,
        plane_sets: &[Vec<Point2<f64>>],
        image_sets: &[&[Point2<f64>]],
    ) -> Result<Vec<Matrix3<f64>>> {
        plane_sets
            .iter()
            .zip(image_sets)
            .map(|(plane, image)| -> Result<Matrix3<f64>> {
                let image = camera.undistort_points(image)?;
                dlt_homography(plane, &image).ok_or_else(|| {
                    CalibrationError::Degenerate("homography lost after undistortion".into()).into()
                })
            })
            .collect()
    }
}

/// Largest parameter step between two alternation rounds
fn parameter_change(prev: &CameraModel, intr: &PinholeIntrinsics, distortion: &Distortion) -> f64 {
    let old = prev.intrinsics();
    let old_dist = prev.distortion();
    [
        (intr.fx - old.fx).abs() / intr.fx.abs(),
        (intr.fy - old.fy).abs() / intr.fy.abs(),
        (intr.cx - old.cx).abs() / intr.fx.abs(),
        (intr.cy - old.cy).abs() / intr.fy.abs(),
        (distortion.k1 - old_dist.k1).abs(),
        (distortion.k2 - old_dist.k2).abs(),
    ]
    .into_iter()
    .fold(0.0, f64::max)
}

/// Zhang's method when enough views exist, otherwise the centered variant
fn estimate_intrinsics(homographies: &[Matrix3<f64>], image_size: (u32, u32)) -> Result<PinholeIntrinsics> {
    if homographies.len() >= 3 {
        match zhang_intrinsics(homographies, image_size) {
            Ok(intr) => return Ok(intr),
            Err(e) => debug!(error = %e, "falling back to centered principal point"),
        }
    }
    Ok(centered_intrinsics(homographies, image_size)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Pose;
    use nalgebra::Vector3;

    const IMAGE: (u32, u32) = (640, 480);

    fn poses() -> Vec<Pose> {
        vec![
            Pose::new(Vector3::new(0.25, 0.05, 0.02), Vector3::new(-80.0, -50.0, 400.0)),
            Pose::new(Vector3::new(-0.1, 0.3, -0.05), Vector3::new(-90.0, -40.0, 450.0)),
            Pose::new(Vector3::new(0.15, -0.25, 0.1), Vector3::new(-70.0, -60.0, 420.0)),
            Pose::new(Vector3::new(-0.3, -0.1, 0.0), Vector3::new(-85.0, -45.0, 480.0)),
        ]
    }

    fn synthetic(
        camera: &CameraModel,
        calibrator: &CameraCalibrator,
    ) -> Vec<Option<Vec<Point2<f64>>>> {
        let obj = calibrator.object_points();
        poses()
            .iter()
            .map(|pose| Some(camera.project_with_pose(&obj, pose)))
            .collect()
    }

    #[test]
    fn object_points_are_row_major() {
        let calib = CameraCalibrator::new(CalibratorConfig {
            square_size_mm: 10.0,
            board_shape: (3, 2),
            ..CalibratorConfig::default()
        });
        let pts = calib.object_points();
        assert_eq!(pts.len(), 6);
        assert_eq!(pts[1], Point3::new(10.0, 0.0, 0.0));
        assert_eq!(pts[3], Point3::new(0.0, 10.0, 0.0));
        assert_eq!(pts[5], Point3::new(20.0, 10.0, 0.0));
    }

    #[test]
    fn recovers_ideal_camera() {
        let truth = CameraModel::ideal(PinholeIntrinsics::new(800.0, 780.0, 319.5, 239.5));
        let calib = CameraCalibrator::new(CalibratorConfig::default());
        let detections = synthetic(&truth, &calib);

        let result = calib.calibrate(&detections, IMAGE).unwrap();
        let k = result.camera.intrinsics();
        assert!((k.fx - 800.0).abs() < 1e-3, "fx {}", k.fx);
        assert!((k.fy - 780.0).abs() < 1e-3, "fy {}", k.fy);
        assert!((k.cx - 319.5).abs() < 1e-3, "cx {}", k.cx);
        assert!((k.cy - 239.5).abs() < 1e-3, "cy {}", k.cy);
        assert!(result.rms < 1e-4, "rms {}", result.rms);
        assert_eq!(result.used, vec![0, 1, 2, 3]);

        for (est, gt) in result.camera.poses().iter().zip(poses()) {
            assert!((est.tvec - gt.tvec).norm() < 1e-3);
            assert!((est.rvec - gt.rvec).norm() < 1e-6);
        }
    }

    #[test]
    fn recovers_radial_distortion() {
        let truth = CameraModel::new(
            PinholeIntrinsics::new(800.0, 800.0, 319.5, 239.5).matrix(),
            Distortion::from_coeffs([-0.15, 0.05, 0.0, 0.0, 0.0]),
            Vec::new(),
        );
        let calib = CameraCalibrator::new(CalibratorConfig::default());
        let detections = synthetic(&truth, &calib);

        let result = calib.calibrate(&detections, IMAGE).unwrap();
        let k = result.camera.intrinsics();
        assert!((k.fx - 800.0).abs() < 2.0, "fx {}", k.fx);
        assert!((result.camera.distortion().k1 + 0.15).abs() < 0.02);
        assert!(result.rms < 0.1, "rms {}", result.rms);
    }

    #[test]
    fn recovers_strong_wide_angle_distortion() {
        let truth = CameraModel::new(
            PinholeIntrinsics::new(400.0, 400.0, 319.5, 239.5).matrix(),
            Distortion::from_coeffs([-0.3, 0.1, 0.0, 0.0, 0.0]),
            Vec::new(),
        );
        let calib = CameraCalibrator::new(CalibratorConfig::default());
        let detections = synthetic(&truth, &calib);

        let result = calib.calibrate(&detections, IMAGE).unwrap();
        let k = result.camera.intrinsics();
        assert!((k.fx - 400.0).abs() < 0.5, "fx {}", k.fx);
        assert!((k.fy - 400.0).abs() < 0.5, "fy {}", k.fy);
        let k1 = result.camera.distortion().k1;
        assert!((k1 + 0.3).abs() < 5e-3, "k1 {k1}");
        assert!(result.rms < 0.01, "rms {}", result.rms);
    }

    #[test]
    fn round_cap_bounds_alternation() {
        let truth = CameraModel::new(
            PinholeIntrinsics::new(400.0, 400.0, 319.5, 239.5).matrix(),
            Distortion::from_coeffs([-0.3, 0.1, 0.0, 0.0, 0.0]),
            Vec::new(),
        );
        let capped = CameraCalibrator::new(CalibratorConfig {
            max_distortion_rounds: 1,
            ..CalibratorConfig::default()
        });
        let full = CameraCalibrator::new(CalibratorConfig::default());
        let detections = synthetic(&truth, &full);

        let rough = capped.calibrate(&detections, IMAGE).unwrap();
        let fine = full.calibrate(&detections, IMAGE).unwrap();
        assert!(fine.rms < rough.rms, "rms {} vs {}", fine.rms, rough.rms);
    }

    #[test]
    fn skips_missing_and_incomplete_detections() {
        let truth = CameraModel::ideal(PinholeIntrinsics::new(800.0, 800.0, 319.5, 239.5));
        let calib = CameraCalibrator::new(CalibratorConfig {
            estimate_distortion: false,
            ..CalibratorConfig::default()
        });
        let mut detections = synthetic(&truth, &calib);
        detections.insert(1, None);
        detections.push(Some(vec![Point2::new(1.0, 2.0); 5]));

        let result = calib.calibrate(&detections, IMAGE).unwrap();
        assert_eq!(result.used, vec![0, 2, 3, 4]);
        assert_eq!(result.camera.poses().len(), 4);
    }

    #[test]
    fn single_view_uses_centered_principal_point() {
        let truth = CameraModel::ideal(PinholeIntrinsics::new(800.0, 800.0, 319.5, 239.5));
        let calib = CameraCalibrator::new(CalibratorConfig {
            estimate_distortion: false,
            ..CalibratorConfig::default()
        });
        let detections = synthetic(&truth, &calib);

        let result = calib.calibrate(&detections[..1], IMAGE).unwrap();
        let k = result.camera.intrinsics();
        assert_eq!(k.principal_point(), (319.5, 239.5));
        assert!((k.fx - 800.0).abs() < 1e-3, "fx {}", k.fx);
    }

    #[test]
    fn empty_and_unusable_inputs_fail() {
        let calib = CameraCalibrator::new(CalibratorConfig::default());
        assert!(matches!(
            calib.calibrate(&[], IMAGE),
            Err(crate::error::SimError::Calibration(CalibrationError::NoObservations))
        ));
        assert!(matches!(
            calib.calibrate(&[None, None], IMAGE),
            Err(crate::error::SimError::Calibration(CalibrationError::NoUsableObservations))
        ));
    }
}

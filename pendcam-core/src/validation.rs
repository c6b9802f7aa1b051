//! Reprojection and image-similarity metrics

use crate::camera::CameraModel;
use crate::error::{Result, SimError};
use image::{ImageBuffer, Pixel};
use nalgebra::{Point2, Point3};

/// Mean over observations of `||projected - observed||_2 / N`.
///
/// Observation `i` is projected with the camera's `i`-th stored pose.
/// Returns `NaN` when there are no observations.
pub fn reprojection_error(
    camera: &CameraModel,
    object_points: &[Vec<Point3<f64>>],
    image_points: &[Vec<Point2<f64>>],
) -> Result<f64> {
    if object_points.len() != image_points.len() {
        return Err(SimError::InvalidInput(format!(
            "{} object point sets but {} image point sets",
            object_points.len(),
            image_points.len()
        )));
    }
    if object_points.is_empty() {
        return Ok(f64::NAN);
    }
    if camera.poses().len() < object_points.len() {
        return Err(SimError::InvalidInput(format!(
            "{} observations but only {} stored poses",
            object_points.len(),
            camera.poses().len()
        )));
    }

    let mut total = 0.0;
    for ((obj, img), pose) in object_points.iter().zip(image_points).zip(camera.poses()) {
        if obj.len() != img.len() {
            return Err(SimError::ShapeMismatch {
                left: (obj.len(), 3),
                right: (img.len(), 2),
            });
        }
        if obj.is_empty() {
            return Err(SimError::InvalidInput("empty observation".into()));
        }

        let projected = camera.project_with_pose(obj, pose);
        let sq: f64 = projected
            .iter()
            .zip(img)
            .map(|(p, q)| (p - q).norm_squared())
            .sum();
        total += sq.sqrt() / obj.len() as f64;
    }

    Ok(total / object_points.len() as f64)
}

/// Pixel mean squared error between two images of the same pixel type.
///
/// Both `(height, width)` must agree; all channels are compared.
pub fn mse<P>(a: &ImageBuffer<P, Vec<P::Subpixel>>, b: &ImageBuffer<P, Vec<P::Subpixel>>) -> Result<f64>
where
    P: Pixel,
    P::Subpixel: Into<f64>,
{
    if a.dimensions() != b.dimensions() {
        return Err(SimError::ShapeMismatch {
            left: (a.height() as usize, a.width() as usize),
            right: (b.height() as usize, b.width() as usize),
        });
    }
    Ok(mean_squared(a.as_raw().iter().copied(), b.as_raw().iter().copied()))
}

fn mean_squared<T: Into<f64>>(a: impl Iterator<Item = T>, b: impl Iterator<Item = T>) -> f64 {
    let (sum, n) = a.zip(b).fold((0.0, 0usize), |(sum, n), (x, y)| {
        let d = x.into() - y.into();
        (sum + d * d, n + 1)
    });
    // Mean of nothing is NaN
    sum / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{PinholeIntrinsics, Pose};
    use image::{GrayImage, Luma, RgbImage};
    use nalgebra::Vector3;

    fn board() -> Vec<Point3<f64>> {
        (0..4)
            .flat_map(|r| (0..5).map(move |c| Point3::new(c as f64 * 10.0, r as f64 * 10.0, 0.0)))
            .collect()
    }

    fn camera_with_poses() -> CameraModel {
        CameraModel::new(
            PinholeIntrinsics::new(700.0, 700.0, 320.0, 240.0).matrix(),
            Default::default(),
            vec![
                Pose::new(Vector3::new(0.1, 0.0, 0.0), Vector3::new(-20.0, -15.0, 300.0)),
                Pose::new(Vector3::new(0.0, -0.2, 0.05), Vector3::new(-25.0, -10.0, 350.0)),
            ],
        )
    }

    #[test]
    fn zero_observations_is_nan() {
        let err = reprojection_error(&camera_with_poses(), &[], &[]).unwrap();
        assert!(err.is_nan());
    }

    #[test]
    fn exact_projections_have_zero_error() {
        let cam = camera_with_poses();
        let obj = vec![board(), board()];
        let img: Vec<Vec<Point2<f64>>> = cam
            .poses()
            .iter()
            .map(|pose| cam.project_with_pose(&board(), pose))
            .collect();

        let err = reprojection_error(&cam, &obj, &img).unwrap();
        assert!(err.abs() < 1e-12);
    }

    #[test]
    fn per_observation_norm_over_count() {
        let cam = camera_with_poses();
        let obj = vec![board()];
        let mut img = vec![cam.project_with_pose(&board(), &cam.poses()[0])];
        // Shift every point by (3, 4): norm = 5 * sqrt(N), error = 5 / sqrt(N)
        for p in img[0].iter_mut() {
            p.x += 3.0;
            p.y += 4.0;
        }

        let err = reprojection_error(&cam, &obj, &img).unwrap();
        let n = board().len() as f64;
        assert!((err - 5.0 / n.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn mismatched_point_counts_fail() {
        let cam = camera_with_poses();
        let obj = vec![board()];
        let img = vec![vec![Point2::new(0.0, 0.0); 3]];
        assert!(matches!(
            reprojection_error(&cam, &obj, &img),
            Err(SimError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn missing_poses_fail() {
        let cam = CameraModel::ideal(PinholeIntrinsics::new(700.0, 700.0, 320.0, 240.0));
        let obj = vec![board()];
        let img = vec![vec![Point2::new(0.0, 0.0); board().len()]];
        assert!(reprojection_error(&cam, &obj, &img).is_err());
    }

    #[test]
    fn mse_identity_and_symmetry() {
        let a = GrayImage::from_fn(8, 6, |x, y| Luma([(x * 30 + y) as u8]));
        let b = GrayImage::from_fn(8, 6, |x, y| Luma([(y * 40 + x) as u8]));

        assert_eq!(mse(&a, &a).unwrap(), 0.0);
        assert_eq!(mse(&a, &b).unwrap(), mse(&b, &a).unwrap());
        assert!(mse(&a, &b).unwrap() > 0.0);
    }

    #[test]
    fn mse_promotes_before_subtracting() {
        let a = GrayImage::from_pixel(2, 2, Luma([0]));
        let b = GrayImage::from_pixel(2, 2, Luma([255]));
        assert_eq!(mse(&a, &b).unwrap(), 255.0 * 255.0);
    }

    #[test]
    fn mse_compares_all_channels() {
        let a = RgbImage::from_pixel(2, 1, image::Rgb([10, 20, 30]));
        let b = RgbImage::from_pixel(2, 1, image::Rgb([10, 20, 36]));
        assert_eq!(mse(&a, &b).unwrap(), 12.0);
    }

    #[test]
    fn mse_shape_mismatch() {
        let a = GrayImage::new(4, 3);
        let b = GrayImage::new(3, 4);
        match mse(&a, &b) {
            Err(SimError::ShapeMismatch { left, right }) => {
                assert_eq!(left, (3, 4));
                assert_eq!(right, (4, 3));
            }
            other => panic!("expected shape mismatch, got {other:?}"),
        }
    }
}

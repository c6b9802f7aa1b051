//! Calibration persistence as JSON
//!
//! Document layout:
//! ```json
//! {
//!   "K": [[fx, 0, cx], [0, fy, cy], [0, 0, 1]],
//!   "dist_coeffs": [k1, k2, p1, p2, k3],
//!   "rvecs": [[rx, ry, rz], ...],
//!   "tvecs": [[tx, ty, tz], ...]
//! }
//! ```
//! Extrinsics are written only when the camera carries poses. Missing
//! `rvecs`/`tvecs` load as empty; a shorter `dist_coeffs` is zero-padded.

use crate::error::{IoError, Result};
use nalgebra::{Matrix3, Vector3};
use pendcam_core::{CameraModel, Distortion, Pose};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationDocument {
    /// Intrinsic matrix, row-major
    #[serde(rename = "K")]
    pub k: [[f64; 3]; 3],
    pub dist_coeffs: Vec<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rvecs: Vec<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tvecs: Vec<[f64; 3]>,
}

impl CalibrationDocument {
    pub fn from_camera(camera: &CameraModel) -> Self {
        let k = camera.k();
        let rows = std::array::from_fn(|r| std::array::from_fn(|c| k[(r, c)]));

        let (rvecs, tvecs) = if camera.poses().is_empty() {
            (Vec::new(), Vec::new())
        } else {
            camera
                .poses()
                .iter()
                .map(|p| -> ([f64; 3], [f64; 3]) { (p.rvec.into(), p.tvec.into()) })
                .unzip()
        };

        Self {
            k: rows,
            dist_coeffs: camera.dist_coeffs().to_vec(),
            rvecs,
            tvecs,
        }
    }

    pub fn to_camera(&self) -> Result<CameraModel> {
        if self.rvecs.len() != self.tvecs.len() {
            return Err(IoError::InvalidDocument(format!(
                "{} rvecs but {} tvecs",
                self.rvecs.len(),
                self.tvecs.len()
            )));
        }
        if self.dist_coeffs.len() > 5 {
            return Err(IoError::InvalidDocument(format!(
                "expected at most 5 distortion coefficients, got {}",
                self.dist_coeffs.len()
            )));
        }

        let k = Matrix3::from_fn(|r, c| self.k[r][c]);
        let mut coeffs = [0.0; 5];
        coeffs[..self.dist_coeffs.len()].copy_from_slice(&self.dist_coeffs);

        let poses = self
            .rvecs
            .iter()
            .zip(&self.tvecs)
            .map(|(r, t)| Pose::new(Vector3::from(*r), Vector3::from(*t)))
            .collect();

        Ok(CameraModel::new(k, Distortion::from_coeffs(coeffs), poses))
    }
}

/// Write `camera` to `path` as pretty-printed JSON
pub fn save_calibration<P: AsRef<Path>>(path: P, camera: &CameraModel) -> Result<()> {
    let doc = CalibrationDocument::from_camera(camera);
    fs::write(path.as_ref(), serde_json::to_string_pretty(&doc)?)?;
    debug!(path = %path.as_ref().display(), poses = doc.rvecs.len(), "calibration saved");
    Ok(())
}

pub fn load_calibration<P: AsRef<Path>>(path: P) -> Result<CameraModel> {
    let text = fs::read_to_string(path.as_ref())?;
    let doc: CalibrationDocument = serde_json::from_str(&text)?;
    let camera = doc.to_camera()?;
    debug!(path = %path.as_ref().display(), poses = camera.poses().len(), "calibration loaded");
    Ok(camera)
}

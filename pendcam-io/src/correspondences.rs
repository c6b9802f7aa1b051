//! Board/image correspondence sets for offline calibration

use crate::error::{IoError, Result};
use pendcam_core::PlanarObservation;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Calibration input: detected corner sets plus the image size they came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrespondenceSet {
    /// `(width, height)` of the calibration images in pixels
    pub image_size: (u32, u32),
    pub observations: Vec<PlanarObservation>,
}

impl CorrespondenceSet {
    /// Check that every observation pairs its points one-to-one
    pub fn validate(&self) -> Result<()> {
        if self.image_size.0 == 0 || self.image_size.1 == 0 {
            return Err(IoError::InvalidDocument(format!(
                "image size must be non-zero, got {:?}",
                self.image_size
            )));
        }
        for (i, obs) in self.observations.iter().enumerate() {
            if obs.object_points.len() != obs.image_points.len() {
                return Err(IoError::InvalidDocument(format!(
                    "observation {i}: {} object points but {} image points",
                    obs.object_points.len(),
                    obs.image_points.len()
                )));
            }
        }
        Ok(())
    }
}

pub fn load_correspondences<P: AsRef<Path>>(path: P) -> Result<CorrespondenceSet> {
    let text = fs::read_to_string(path.as_ref())?;
    let set: CorrespondenceSet = serde_json::from_str(&text)?;
    set.validate()?;
    debug!(
        path = %path.as_ref().display(),
        observations = set.observations.len(),
        "correspondences loaded"
    );
    Ok(set)
}

pub fn save_correspondences<P: AsRef<Path>>(path: P, set: &CorrespondenceSet) -> Result<()> {
    fs::write(path.as_ref(), serde_json::to_string_pretty(set)?)?;
    Ok(())
}

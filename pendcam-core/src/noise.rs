//! Sensor noise for synthetic 8-bit images
//!
//! Steps run in a fixed order: additive Gaussian, Poisson shot noise,
//! horizontal 1x3 box blur, then clip to `[0, 255]` and truncate. A step
//! whose parameter is zero (or `false`) leaves the samples untouched.

use crate::error::{Result, SimError};
use image::GrayImage;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal, Poisson};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Standard deviation of the additive Gaussian noise (intensity units)
    pub gaussian_std: f64,
    /// Photon budget at full scale; the Poisson rate is `value * lambda / 255`
    pub poisson_lambda: f64,
    /// Apply the 1x3 horizontal box blur
    pub motion_blur: bool,
    /// RNG seed, one seed yields one image
    pub seed: u64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            gaussian_std: 0.0,
            poisson_lambda: 0.0,
            motion_blur: false,
            seed: 42,
        }
    }
}

impl NoiseConfig {
    /// True when every step is disabled
    pub fn is_noop(&self) -> bool {
        self.gaussian_std == 0.0 && self.poisson_lambda == 0.0 && !self.motion_blur
    }
}

pub fn apply_noise(image: &GrayImage, config: &NoiseConfig) -> Result<GrayImage> {
    if !(config.gaussian_std.is_finite() && config.gaussian_std >= 0.0) {
        return Err(SimError::InvalidInput(format!(
            "gaussian_std must be >= 0, got {}",
            config.gaussian_std
        )));
    }
    if !(config.poisson_lambda.is_finite() && config.poisson_lambda >= 0.0) {
        return Err(SimError::InvalidInput(format!(
            "poisson_lambda must be >= 0, got {}",
            config.poisson_lambda
        )));
    }

    let (width, height) = image.dimensions();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut samples: Vec<f64> = image.as_raw().iter().map(|&v| v as f64).collect();

    if config.gaussian_std > 0.0 {
        let normal = Normal::new(0.0, config.gaussian_std)
            .map_err(|e| SimError::InvalidInput(e.to_string()))?;
        for v in samples.iter_mut() {
            *v += normal.sample(&mut rng);
        }
    }

    if config.poisson_lambda > 0.0 {
        let scale = config.poisson_lambda / 255.0;
        for v in samples.iter_mut() {
            // Gaussian noise can push values below zero; such samples have no photons
            let rate = *v * scale;
            *v = if rate > 0.0 {
                let poisson = Poisson::new(rate).map_err(|e| SimError::InvalidInput(e.to_string()))?;
                poisson.sample(&mut rng) / scale
            } else {
                0.0
            };
        }
    }

    if config.motion_blur {
        samples = box_blur_rows(&samples, width as usize);
    }

    let raw: Vec<u8> = samples.iter().map(|v| v.clamp(0.0, 255.0) as u8).collect();
    GrayImage::from_raw(width, height, raw)
        .ok_or_else(|| SimError::InvalidInput("noise buffer does not match image size".into()))
}

/// Reflect-101 index into `[0, n)`
fn reflect101(i: isize, n: usize) -> usize {
    let n = n as isize;
    if n == 1 {
        return 0;
    }
    let period = 2 * n - 2;
    let mut c = i.rem_euclid(period);
    if c >= n {
        c = period - c;
    }
    c as usize
}

/// Mean of each sample and its horizontal neighbours, mirrored at row ends
fn box_blur_rows(samples: &[f64], width: usize) -> Vec<f64> {
    if width == 0 {
        return samples.to_vec();
    }

    let mut out = Vec::with_capacity(samples.len());
    for row in samples.chunks(width) {
        for x in 0..width as isize {
            let left = row[reflect101(x - 1, width)];
            let right = row[reflect101(x + 1, width)];
            out.push((left + row[x as usize] + right) / 3.0);
        }
    }
    out
}

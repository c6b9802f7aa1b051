//! Explicit ODE integration

mod dopri5;

pub use dopri5::integrate_at;

use nalgebra::SVector;
use serde::{Deserialize, Serialize};

/// First-order system `dy/dt = f(t, y)` with a fixed state dimension
pub trait OdeSystem<const N: usize> {
    fn derivative(&self, t: f64, y: &SVector<f64, N>) -> SVector<f64, N>;
}

/// Evenly spaced samples over `[start, end]`, both ends included exactly
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            let mut values: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
            values[n - 1] = end;
            values
        }
    }
}

/// Tolerances and limits for the adaptive integrator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorOptions {
    /// Relative tolerance on each state component
    pub rtol: f64,
    /// Absolute tolerance on each state component
    pub atol: f64,
    /// Upper bound on attempted steps (accepted + rejected)
    pub max_steps: usize,
    /// Initial step; chosen automatically when `None`
    pub first_step: Option<f64>,
}

impl Default for IntegratorOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-9,
            max_steps: 1_000_000,
            first_step: None,
        }
    }
}

use crate::pendulum::{PendulumParameters, PendulumState};
use nalgebra::Vector3;

/// Kinetic, potential and total energy per sample (unit mass)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnergySeries {
    pub kinetic: Vec<f64>,
    pub potential: Vec<f64>,
    pub total: Vec<f64>,
}

/// Convert spherical angles to the bob position on a sphere of radius `length`.
///
/// The pivot sits at `(0, 0, length)` so the rest position is the origin and
/// `z` measures height above the lowest point.
pub fn spherical_to_cartesian(length: f64, theta: f64, phi: f64) -> Vector3<f64> {
    let (sin_th, cos_th) = theta.sin_cos();
    let (sin_ph, cos_ph) = phi.sin_cos();

    Vector3::new(
        length * sin_th * cos_ph,
        length * sin_th * sin_ph,
        length * (1.0 - cos_th),
    )
}

/// Bob positions for a state series
pub fn positions(params: &PendulumParameters, states: &[PendulumState]) -> Vec<Vector3<f64>> {
    let length = params.length();
    states
        .iter()
        .map(|s| spherical_to_cartesian(length, s.theta, s.phi))
        .collect()
}

/// Bob velocities (chain rule of the position map) for a state series
pub fn velocities(params: &PendulumParameters, states: &[PendulumState]) -> Vec<Vector3<f64>> {
    let length = params.length();
    states
        .iter()
        .map(|s| {
            let (sin_th, cos_th) = s.theta.sin_cos();
            let (sin_ph, cos_ph) = s.phi.sin_cos();

            Vector3::new(
                length * (cos_th * cos_ph * s.dtheta - sin_th * sin_ph * s.dphi),
                length * (cos_th * sin_ph * s.dtheta + sin_th * cos_ph * s.dphi),
                length * sin_th * s.dtheta,
            )
        })
        .collect()
}

pub fn energy(params: &PendulumParameters, states: &[PendulumState]) -> EnergySeries {
    let length = params.length();
    let g = params.g();

    let kinetic: Vec<f64> = velocities(params, states)
        .iter()
        .map(|v| 0.5 * v.norm_squared())
        .collect();
    let potential: Vec<f64> = states
        .iter()
        .map(|s| g * length * (1.0 - s.theta.cos()))
        .collect();
    let total = kinetic
        .iter()
        .zip(&potential)
        .map(|(k, p)| k + p)
        .collect();

    EnergySeries {
        kinetic,
        potential,
        total,
    }
}

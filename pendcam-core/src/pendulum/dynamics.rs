use super::{PendulumParameters, PendulumState};
use crate::ode::OdeSystem;
use nalgebra::Vector4;

/// Offset added to `theta` in the azimuthal equation so `sin(theta)` never
/// vanishes at the pole. Not physically exact near `theta = 0`.
pub const SINGULARITY_EPS: f64 = 1e-6;

/// Equations of motion of the damped spherical pendulum
#[derive(Debug, Clone, Copy)]
pub struct SphericalPendulum {
    params: PendulumParameters,
    w0_sq: f64,
}

impl SphericalPendulum {
    pub fn new(params: PendulumParameters) -> Self {
        Self {
            params,
            w0_sq: params.g() / params.length(),
        }
    }

    pub fn params(&self) -> &PendulumParameters {
        &self.params
    }

    /// Angular accelerations `(ddtheta, ddphi)` for a state
    pub fn accelerations(&self, state: &PendulumState) -> (f64, f64) {
        let PendulumState {
            theta,
            dtheta,
            dphi,
            ..
        } = *state;
        let (sin_th, cos_th) = theta.sin_cos();

        let ddtheta = sin_th * cos_th * dphi * dphi
            - self.w0_sq * sin_th
            - 2.0 * self.params.delta_theta() * dtheta;

        // Azimuthal damping carries an extra sin(theta) factor; kept as-is.
        let ddphi = -2.0 * dtheta * dphi * cos_th / (theta + SINGULARITY_EPS).sin()
            - 2.0 * self.params.delta_phi() * sin_th * dphi;

        (ddtheta, ddphi)
    }
}

impl OdeSystem<4> for SphericalPendulum {
    fn derivative(&self, _t: f64, y: &Vector4<f64>) -> Vector4<f64> {
        let state = PendulumState::from_vector(y);
        let (ddtheta, ddphi) = self.accelerations(&state);
        Vector4::new(state.dtheta, state.dphi, ddtheta, ddphi)
    }
}

//! Damped spherical pendulum: parameters, state, dynamics and simulation

mod dynamics;
mod simulator;

pub use dynamics::{SphericalPendulum, SINGULARITY_EPS};
pub use simulator::{simulate, PendulumSimulator, Trajectory};

use crate::error::{Result, SimError};
use nalgebra::Vector4;
use serde::{Deserialize, Serialize};

/// Physical constants of a spherical pendulum (SI units)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PendulumParameters {
    l_string: f64,
    r_sphere: f64,
    g: f64,
    delta_theta: f64,
    delta_phi: f64,
}

impl PendulumParameters {
    /// Create a validated parameter set.
    ///
    /// # Arguments
    /// * `l_string` - String length (m), must be > 0
    /// * `r_sphere` - Bob radius (m), must be >= 0
    /// * `g` - Gravitational acceleration (m/s^2), must be > 0
    /// * `delta_theta` - Polar damping coefficient, must be >= 0
    /// * `delta_phi` - Azimuthal damping coefficient, must be >= 0
    pub fn new(
        l_string: f64,
        r_sphere: f64,
        g: f64,
        delta_theta: f64,
        delta_phi: f64,
    ) -> Result<Self> {
        check(l_string.is_finite() && l_string > 0.0, "L_string must be > 0")?;
        check(r_sphere.is_finite() && r_sphere >= 0.0, "R_sphere must be >= 0")?;
        check(g.is_finite() && g > 0.0, "g must be > 0")?;
        check(
            delta_theta.is_finite() && delta_theta >= 0.0,
            "delta_theta must be >= 0",
        )?;
        check(
            delta_phi.is_finite() && delta_phi >= 0.0,
            "delta_phi must be >= 0",
        )?;

        Ok(Self {
            l_string,
            r_sphere,
            g,
            delta_theta,
            delta_phi,
        })
    }

    /// Same bob and string without any damping
    pub fn undamped(l_string: f64, r_sphere: f64, g: f64) -> Result<Self> {
        Self::new(l_string, r_sphere, g, 0.0, 0.0)
    }

    /// Effective pendulum length: string plus bob radius
    pub fn length(&self) -> f64 {
        self.l_string + self.r_sphere
    }

    /// Small-angle natural frequency `sqrt(g / length)`
    pub fn natural_frequency(&self) -> f64 {
        (self.g / self.length()).sqrt()
    }

    pub fn l_string(&self) -> f64 {
        self.l_string
    }

    pub fn r_sphere(&self) -> f64 {
        self.r_sphere
    }

    pub fn g(&self) -> f64 {
        self.g
    }

    pub fn delta_theta(&self) -> f64 {
        self.delta_theta
    }

    pub fn delta_phi(&self) -> f64 {
        self.delta_phi
    }
}

impl Default for PendulumParameters {
    fn default() -> Self {
        Self {
            l_string: 0.127,
            r_sphere: 0.013,
            g: 9.81,
            delta_theta: 3e-3,
            delta_phi: 3e-3,
        }
    }
}

fn check(ok: bool, msg: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(SimError::InvalidInput(msg.to_string()))
    }
}

/// Angular state `(theta, phi, dtheta, dphi)` in rad and rad/s
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PendulumState {
    pub theta: f64,
    pub phi: f64,
    pub dtheta: f64,
    pub dphi: f64,
}

impl PendulumState {
    pub fn new(theta: f64, phi: f64, dtheta: f64, dphi: f64) -> Self {
        Self {
            theta,
            phi,
            dtheta,
            dphi,
        }
    }

    /// Build a state from angles in degrees and rates in degrees per second
    pub fn from_degrees(theta: f64, phi: f64, dtheta: f64, dphi: f64) -> Self {
        Self::new(
            theta.to_radians(),
            phi.to_radians(),
            dtheta.to_radians(),
            dphi.to_radians(),
        )
    }

    pub fn to_vector(&self) -> Vector4<f64> {
        Vector4::new(self.theta, self.phi, self.dtheta, self.dphi)
    }

    pub fn from_vector(v: &Vector4<f64>) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_includes_bob_radius() {
        let p = PendulumParameters::undamped(0.127, 0.013, 9.81).unwrap();
        assert!((p.length() - 0.14).abs() < 1e-12);
    }

    #[test]
    fn test_default_parameters() {
        let p = PendulumParameters::default();
        assert_eq!(p.l_string(), 0.127);
        assert_eq!(p.r_sphere(), 0.013);
        assert_eq!(p.g(), 9.81);
        assert_eq!(p.delta_theta(), 3e-3);
        assert_eq!(p.delta_phi(), 3e-3);
    }

    #[test]
    fn test_natural_frequency() {
        let p = PendulumParameters::undamped(0.9, 0.1, 9.81).unwrap();
        assert!((p.natural_frequency() - 9.81f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_non_positive_length() {
        assert!(PendulumParameters::new(0.0, 0.01, 9.81, 0.0, 0.0).is_err());
        assert!(PendulumParameters::new(-1.0, 0.01, 9.81, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_rejects_negative_damping_and_gravity() {
        assert!(PendulumParameters::new(0.1, 0.0, 9.81, -1e-3, 0.0).is_err());
        assert!(PendulumParameters::new(0.1, 0.0, 9.81, 0.0, -1e-3).is_err());
        assert!(PendulumParameters::new(0.1, 0.0, 0.0, 0.0, 0.0).is_err());
        assert!(PendulumParameters::new(0.1, -0.01, 9.81, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_state_from_degrees() {
        let s = PendulumState::from_degrees(10.0, 0.0, 60.0, 150.0);
        assert!((s.theta - 10.0f64.to_radians()).abs() < 1e-15);
        assert_eq!(s.phi, 0.0);
        assert!((s.dphi - 150.0 * std::f64::consts::PI / 180.0).abs() < 1e-12);
    }

    #[test]
    fn test_state_vector_conversion() {
        let s = PendulumState::new(0.1, 0.2, 0.3, 0.4);
        assert_eq!(PendulumState::from_vector(&s.to_vector()), s);
    }
}

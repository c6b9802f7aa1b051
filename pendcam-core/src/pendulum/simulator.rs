use super::{PendulumParameters, PendulumState, SphericalPendulum};
use crate::coordinate::{self, EnergySeries};
use crate::error::{Result, SimError};
use crate::ode::{integrate_at, linspace, IntegratorOptions, OdeSystem};
use nalgebra::Vector3;

/// Uniformly sampled pendulum history, time strictly increasing
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    times: Vec<f64>,
    states: Vec<PendulumState>,
}

impl Trajectory {
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn states(&self) -> &[PendulumState] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Iterate over `(time, state)` pairs in time order
    pub fn iter(&self) -> impl Iterator<Item = (f64, &PendulumState)> + '_ {
        self.times.iter().copied().zip(self.states.iter())
    }
}

/// Integrate the pendulum over `[0, t_max]` and sample it at `num_samples`
/// evenly spaced times (both ends included).
///
/// Fails with `InvalidInput` for `t_max <= 0` or `num_samples < 2`, and with
/// `NumericalIntegration` if the integrator cannot reach `t_max`.
pub fn simulate(
    params: &PendulumParameters,
    initial_state: PendulumState,
    t_max: f64,
    num_samples: usize,
    opts: &IntegratorOptions,
) -> Result<Trajectory> {
    if !(t_max.is_finite() && t_max > 0.0) {
        return Err(SimError::InvalidInput(format!("t_max must be > 0, got {t_max}")));
    }
    if num_samples < 2 {
        return Err(SimError::InvalidInput(format!(
            "num_samples must be >= 2, got {num_samples}"
        )));
    }

    let times = linspace(0.0, t_max, num_samples);
    let system = SphericalPendulum::new(*params);
    let ys = integrate_at(&system, initial_state.to_vector(), &times, opts)?;

    tracing::debug!(
        t_max,
        num_samples,
        length = params.length(),
        "pendulum trajectory integrated"
    );

    Ok(Trajectory {
        times,
        states: ys.iter().map(PendulumState::from_vector).collect(),
    })
}

/// Convenience wrapper bundling parameters with the integrator settings
#[derive(Debug, Clone)]
pub struct PendulumSimulator {
    system: SphericalPendulum,
    options: IntegratorOptions,
}

impl PendulumSimulator {
    pub fn new(params: PendulumParameters) -> Self {
        Self::with_options(params, IntegratorOptions::default())
    }

    pub fn with_options(params: PendulumParameters, options: IntegratorOptions) -> Self {
        Self {
            system: SphericalPendulum::new(params),
            options,
        }
    }

    pub fn params(&self) -> &PendulumParameters {
        self.system.params()
    }

    pub fn options(&self) -> &IntegratorOptions {
        &self.options
    }

    /// Small-angle natural frequency `w0`
    pub fn w0(&self) -> f64 {
        self.params().natural_frequency()
    }

    /// Time derivative `(dtheta, dphi, ddtheta, ddphi)` at `state`
    pub fn dynamics(&self, t: f64, state: &PendulumState) -> PendulumState {
        PendulumState::from_vector(&self.system.derivative(t, &state.to_vector()))
    }

    pub fn simulate(
        &self,
        initial_state: PendulumState,
        t_max: f64,
        num_samples: usize,
    ) -> Result<Trajectory> {
        simulate(self.params(), initial_state, t_max, num_samples, &self.options)
    }

    pub fn compute_cartesian(&self, states: &[PendulumState]) -> Vec<Vector3<f64>> {
        coordinate::positions(self.params(), states)
    }

    pub fn compute_velocity(&self, states: &[PendulumState]) -> Vec<Vector3<f64>> {
        coordinate::velocities(self.params(), states)
    }

    pub fn compute_energy(&self, states: &[PendulumState]) -> EnergySeries {
        coordinate::energy(self.params(), states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_state() -> PendulumState {
        PendulumState::from_degrees(10.0, 0.0, 60.0, 150.0)
    }

    #[test]
    fn test_time_grid() {
        let params = PendulumParameters::default();
        let traj = simulate(&params, demo_state(), 5.0, 500, &IntegratorOptions::default())
            .unwrap();

        assert_eq!(traj.len(), 500);
        assert_eq!(traj.times()[0], 0.0);
        assert_eq!(traj.times()[499], 5.0);
        assert!(traj.times().windows(2).all(|w| w[1] > w[0]));
        assert_eq!(traj.states()[0], demo_state());
    }

    #[test]
    fn test_rejects_bad_sampling() {
        let params = PendulumParameters::default();
        let opts = IntegratorOptions::default();
        assert!(matches!(
            simulate(&params, demo_state(), 5.0, 1, &opts),
            Err(SimError::InvalidInput(_))
        ));
        assert!(matches!(
            simulate(&params, demo_state(), 0.0, 10, &opts),
            Err(SimError::InvalidInput(_))
        ));
        assert!(matches!(
            simulate(&params, demo_state(), f64::NAN, 10, &opts),
            Err(SimError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_integration_failure_is_surfaced() {
        let params = PendulumParameters::default();
        let opts = IntegratorOptions {
            max_steps: 2,
            ..Default::default()
        };
        let res = simulate(&params, demo_state(), 5.0, 100, &opts);
        assert!(matches!(res, Err(SimError::NumericalIntegration(_))));
    }

    #[test]
    fn test_deterministic() {
        let sim = PendulumSimulator::new(PendulumParameters::default());
        let a = sim.simulate(demo_state(), 2.0, 200).unwrap();
        let b = sim.simulate(demo_state(), 2.0, 200).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_planar_swing_stays_planar() {
        let sim = PendulumSimulator::new(PendulumParameters::undamped(0.127, 0.013, 9.81).unwrap());
        let traj = sim
            .simulate(PendulumState::new(0.2, 0.0, 0.0, 0.0), 1.0, 50)
            .unwrap();
        for s in traj.states() {
            assert_eq!(s.phi, 0.0);
            assert_eq!(s.dphi, 0.0);
        }
    }

    #[test]
    fn test_small_angle_period() {
        let params = PendulumParameters::undamped(0.9, 0.1, 9.81).unwrap();
        let sim = PendulumSimulator::new(params);
        let period = 2.0 * std::f64::consts::PI / sim.w0();
        let traj = sim
            .simulate(PendulumState::new(0.01, 0.0, 0.0, 0.0), period, 101)
            .unwrap();
        let last = traj.states().last().unwrap();
        assert!((last.theta - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_dynamics_wrapper() {
        let sim = PendulumSimulator::new(PendulumParameters::default());
        let s = PendulumState::new(0.3, 0.1, 0.2, 0.4);
        let d = sim.dynamics(0.0, &s);
        assert_eq!(d.theta, 0.2);
        assert_eq!(d.phi, 0.4);
    }
}

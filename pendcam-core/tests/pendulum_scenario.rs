use approx::assert_relative_eq;
use pendcam_core::{IntegratorOptions, PendulumParameters, PendulumSimulator, PendulumState};

fn demo_state() -> PendulumState {
    PendulumState::from_degrees(10.0, 0.0, 60.0, 150.0)
}

#[test]
fn undamped_demo_conserves_energy() {
    let params = PendulumParameters::new(0.127, 0.013, 9.81, 0.0, 0.0).unwrap();
    let sim = PendulumSimulator::new(params);

    let traj = sim.simulate(demo_state(), 5.0, 500).unwrap();
    assert_eq!(traj.len(), 500);
    assert_eq!(traj.times()[0], 0.0);
    assert_eq!(traj.times()[499], 5.0);

    let energy = sim.compute_energy(traj.states());
    let e0 = energy.total[0];
    assert!(e0 > 0.0);
    assert_relative_eq!(energy.total[499], e0, max_relative = 0.01);
    for e in &energy.total {
        assert_relative_eq!(*e, e0, max_relative = 0.01);
    }
}

#[test]
fn damped_energy_never_increases() {
    let params = PendulumParameters::new(0.127, 0.013, 9.81, 0.05, 0.05).unwrap();
    let options = IntegratorOptions {
        rtol: 1e-10,
        atol: 1e-12,
        ..IntegratorOptions::default()
    };
    let sim = PendulumSimulator::with_options(params, options);

    let traj = sim.simulate(demo_state(), 5.0, 500).unwrap();
    let total = sim.compute_energy(traj.states()).total;
    let slack = 1e-6 * total[0];

    for w in total.windows(2) {
        assert!(w[1] <= w[0] + slack, "energy rose from {} to {}", w[0], w[1]);
    }
    assert!(total[499] < total[0]);
}

#[test]
fn bob_stays_on_sphere() {
    let sim = PendulumSimulator::new(PendulumParameters::default());
    let traj = sim.simulate(demo_state(), 3.0, 300).unwrap();
    let length = sim.params().length();

    for p in sim.compute_cartesian(traj.states()) {
        let r2 = p.x * p.x + p.y * p.y + (length - p.z) * (length - p.z);
        assert_relative_eq!(r2, length * length, max_relative = 1e-12);
    }
}

#[test]
fn repeated_runs_are_identical() {
    let sim = PendulumSimulator::new(PendulumParameters::default());
    let a = sim.simulate(demo_state(), 5.0, 500).unwrap();
    let b = sim.simulate(demo_state(), 5.0, 500).unwrap();
    assert_eq!(a.times(), b.times());
    assert_eq!(a.states(), b.states());
}

#[test]
fn velocity_matches_position_differences() {
    let sim = PendulumSimulator::new(PendulumParameters::default());
    let options = IntegratorOptions {
        rtol: 1e-10,
        atol: 1e-12,
        ..IntegratorOptions::default()
    };
    let sim = PendulumSimulator::with_options(*sim.params(), options);

    let n = 2001;
    let traj = sim.simulate(demo_state(), 1.0, n).unwrap();
    let pos = sim.compute_cartesian(traj.states());
    let vel = sim.compute_velocity(traj.states());
    let dt = traj.times()[1] - traj.times()[0];

    for i in (1..n - 1).step_by(100) {
        let central = (pos[i + 1] - pos[i - 1]) / (2.0 * dt);
        assert!((central - vel[i]).norm() < 1e-4, "sample {i}");
    }
}

//! Cartesian kinematics and energy of the pendulum bob

mod transforms;

pub use transforms::{energy, positions, spherical_to_cartesian, velocities, EnergySeries};

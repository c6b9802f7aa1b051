pub mod calibration;
pub mod camera;
pub mod coordinate;
pub mod display;
pub mod error;
pub mod noise;
pub mod ode;
pub mod pendulum;
pub mod synth;
pub mod validation;

pub use calibration::{CalibratorConfig, CameraCalibrator, Calibration, PlanarObservation};
pub use camera::{CameraModel, Distortion, PinholeIntrinsics, Pose};
pub use coordinate::EnergySeries;
pub use display::{Display, generate_checkerboard};
pub use error::{CalibrationError, IntegrationError, ProjectionError, Result, SimError};
pub use noise::{NoiseConfig, apply_noise};
pub use ode::IntegratorOptions;
pub use pendulum::{PendulumParameters, PendulumSimulator, PendulumState, Trajectory, simulate};
pub use synth::synthesize;
pub use validation::{mse, reprojection_error};

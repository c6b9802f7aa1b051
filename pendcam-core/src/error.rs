use thiserror::Error;

/// Common errors across the pendulum/camera simulation core
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Numerical integration error: {0}")]
    NumericalIntegration(#[from] IntegrationError),

    #[error("Calibration error: {0}")]
    Calibration(#[from] CalibrationError),

    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    #[error("Shape mismatch: {left:?} vs {right:?}")]
    ShapeMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntegrationError {
    #[error("Step size underflow at t={t} (h={h})")]
    StepSizeUnderflow { t: f64, h: f64 },

    #[error("Integration exceeded {0} steps")]
    TooManySteps(usize),

    #[error("Non-finite state at t={t}")]
    NonFinite { t: f64 },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("No observations supplied")]
    NoObservations,

    #[error("No valid observations for calibration")]
    NoUsableObservations,

    #[error("Degenerate calibration geometry: {0}")]
    Degenerate(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("Undistortion did not converge after {0} iterations")]
    NoConvergence(usize),

    #[error("Singular Jacobian during undistortion")]
    SingularJacobian,
}

pub type Result<T> = std::result::Result<T, SimError>;

//! File I/O for calibrations, correspondences and images

pub mod calibration;
pub mod correspondences;
pub mod error;
pub mod gray;

pub use calibration::{CalibrationDocument, load_calibration, save_calibration};
pub use correspondences::{CorrespondenceSet, load_correspondences, save_correspondences};
pub use error::{IoError, Result};
pub use gray::{load_gray, load_pattern, save_gray, save_pattern};

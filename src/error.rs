//! Error taxonomy for the calibration and tracking pipeline.
//!
//! "No candidate" during tracking is deliberately absent here: an empty mask
//! is absorbed by the hold-previous-center policy and never surfaces as an
//! error.

use thiserror::Error;

/// Errors that can occur during calibration or per-frame processing.
#[derive(Debug, Error)]
pub enum Error {
    /// Too few usable calibration views; the intrinsic solve is
    /// underdetermined below the configured minimum.
    #[error("calibration needs at least {required} usable views, got {found}")]
    CalibrationInsufficientData { required: usize, found: usize },

    /// The accumulated normal-equation system is non-invertible, typically
    /// because the detected lines are near-collinear.
    #[error("calibration system is singular: {0}")]
    CalibrationSingular(&'static str),

    /// An input frame or mask does not match the configured dimensions.
    #[error("dimension mismatch: expected {expected_w}x{expected_h}, got {got_w}x{got_h}")]
    MaskDimensionMismatch {
        expected_w: usize,
        expected_h: usize,
        got_w: usize,
        got_h: usize,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

#![doc = include_str!("../README.md")]

// Public modules (stable-ish surface)
pub mod calib;
pub mod error;
pub mod image;
pub mod mask;
pub mod rectify;
pub mod tracker;
pub mod types;

// Lower-level building blocks – public, but considered unstable internals.
pub mod angle;
pub mod config;
pub mod contours;
pub mod edges;
pub mod labels;
pub mod segments;

// --- High-level re-exports -------------------------------------------------

// Main entry points: per-frame tracking and calibration.
pub use crate::calib::{CameraCalibrator, PerspectiveCalibrator};
pub use crate::error::{Error, Result};
pub use crate::rectify::FrameRectifier;
pub use crate::tracker::{step, ScanSide, StepOutput, TrackerConfig, TrackerMode, TrackerState};
pub use crate::types::{CalibrationData, PerspectiveCalibration};

// Mask production seam.
pub use crate::mask::{ClassicalMaskSource, LaneMaskSource};

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```
/// use lane_finder::prelude::*;
///
/// # fn main() {
/// let config = TrackerConfig::default();
/// let mut state = TrackerState::new(&config);
/// let mask = GrayImage::new(config.frame_width, config.frame_height);
/// let out = step(&mask, TrackerMode::DualBlock, false, 0, &config, &mut state)
///     .expect("mask matches configured dimensions");
/// println!("lane center: {}", out.center);
/// # }
/// ```
pub mod prelude {
    pub use crate::image::GrayImage;
    pub use crate::{step, ScanSide, StepOutput, TrackerConfig, TrackerMode, TrackerState};
}

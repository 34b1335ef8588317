//! Offline calibration: camera intrinsics and the ground-plane perspective
//! transform. Both run once against operator-supplied images and persist
//! immutable artifacts; failures here are fatal to the calibration step and
//! are never retried automatically.

pub mod camera;
pub mod chessboard;
pub mod perspective;

pub use camera::{CalibrationOutcome, CameraCalibrator};
pub use chessboard::{find_chessboard_corners, ChessboardSpec};
pub use perspective::{estimate_vanishing_point, PerspectiveCalibrator, PerspectiveOptions};

//! Persistent calibration artifacts.
//!
//! Both artifacts are computed once by the offline tools, written as pretty
//! JSON and loaded read-only thereafter. They are freely shareable across
//! pipeline instances.

use crate::image::io::{read_json_file, write_json_file};
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Intrinsic camera calibration: camera matrix, distortion coefficients and
/// the image size the calibration was computed at.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CalibrationData {
    /// 3×3 pinhole camera matrix.
    pub camera_matrix: Matrix3<f64>,
    /// Radial/tangential distortion coefficients `[k1, k2, p1, p2, (k3..)]`.
    pub distortion_coeffs: Vec<f64>,
    /// (width, height) of the calibration images in pixels.
    pub image_size: (usize, usize),
}

impl CalibrationData {
    pub fn save(&self, path: &Path) -> Result<(), String> {
        write_json_file(path, self)
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        read_json_file(path)
    }
}

/// Ground-plane perspective calibration: the bird's-eye homography, the
/// metric scale of the warped image and the source trapezoid it was built
/// from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PerspectiveCalibration {
    /// 3×3 homography mapping undistorted image coordinates to the
    /// bird's-eye output rectangle.
    pub homography: Matrix3<f64>,
    /// Horizontal and vertical pixels-per-meter in the warped image.
    pub pixels_per_meter: (f64, f64),
    /// Source trapezoid corners (top-left, top-right, bottom-right,
    /// bottom-left) in undistorted image coordinates.
    pub source_quad: [(f64, f64); 4],
}

impl PerspectiveCalibration {
    pub fn save(&self, path: &Path) -> Result<(), String> {
        write_json_file(path, self)
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        read_json_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibration_artifact_json_round_trip() {
        let data = CalibrationData {
            camera_matrix: Matrix3::new(800.0, 0.0, 320.0, 0.0, 790.0, 240.0, 0.0, 0.0, 1.0),
            distortion_coeffs: vec![-0.3, 0.1, 0.001, -0.002],
            image_size: (640, 480),
        };
        let json = serde_json::to_string(&data).unwrap();
        let back: CalibrationData = serde_json::from_str(&json).unwrap();
        assert_eq!(back.camera_matrix, data.camera_matrix);
        assert_eq!(back.distortion_coeffs, data.distortion_coeffs);
        assert_eq!(back.image_size, data.image_size);
    }

    #[test]
    fn perspective_artifact_json_round_trip() {
        let persp = PerspectiveCalibration {
            homography: Matrix3::new(1.1, 0.0, -30.0, 0.02, 0.9, 5.0, 0.0, 0.001, 1.0),
            pixels_per_meter: (46.5, 33.2),
            source_quad: [
                (375.0, 480.0),
                (905.0, 480.0),
                (1120.0, 685.0),
                (160.0, 685.0),
            ],
        };
        let json = serde_json::to_string(&persp).unwrap();
        let back: PerspectiveCalibration = serde_json::from_str(&json).unwrap();
        assert_eq!(back.homography, persp.homography);
        assert_eq!(back.pixels_per_meter, persp.pixels_per_meter);
        assert_eq!(back.source_quad, persp.source_quad);
    }
}

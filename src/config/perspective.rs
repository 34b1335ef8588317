use crate::calib::PerspectiveOptions;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct PerspectiveCalibConfig {
    /// Intrinsics artifact produced by `calibrate_camera`.
    pub camera_calibration: PathBuf,
    /// Straight-road reference images with visible lane markings.
    pub images: Vec<PathBuf>,
    #[serde(default)]
    pub options: PerspectiveOptions,
    /// Destination of the perspective JSON artifact.
    pub output: PathBuf,
}

pub fn load_config(path: &Path) -> Result<PerspectiveCalibConfig, String> {
    let data = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    serde_json::from_str(&data)
        .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))
}

use crate::calib::ChessboardSpec;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct CameraCalibConfig {
    /// Chessboard views, one image per pose.
    pub images: Vec<PathBuf>,
    pub board: ChessboardSpec,
    /// Minimum successful detections; the calibrator default applies when
    /// omitted.
    #[serde(default)]
    pub min_detections: Option<usize>,
    /// Destination of the calibration JSON artifact.
    pub output: PathBuf,
}

pub fn load_config(path: &Path) -> Result<CameraCalibConfig, String> {
    let data = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    serde_json::from_str(&data)
        .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))
}

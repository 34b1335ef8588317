use crate::mask::MaskOptions;
use crate::tracker::{TrackerConfig, TrackerMode};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct TrackingDemoConfig {
    /// Grayscale frames in playback order.
    pub frames: Vec<PathBuf>,
    /// Optional calibration artifacts; frames are rectified when both are
    /// present and used raw otherwise.
    #[serde(default)]
    pub camera_calibration: Option<PathBuf>,
    #[serde(default)]
    pub perspective_calibration: Option<PathBuf>,
    #[serde(default)]
    pub mask: MaskOptions,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default = "default_mode")]
    pub mode: TrackerMode,
    #[serde(default)]
    pub side_tracking: bool,
    #[serde(default)]
    pub center_offset: i32,
    /// Optional speed/turn label file aligned with the frames.
    #[serde(default)]
    pub labels: Option<PathBuf>,
    pub output: TrackingOutputConfig,
}

#[derive(Debug, Deserialize)]
pub struct TrackingOutputConfig {
    pub result_json: PathBuf,
    /// Directory for per-frame annotated masks, written when set.
    #[serde(default)]
    pub debug_dir: Option<PathBuf>,
}

fn default_mode() -> TrackerMode {
    TrackerMode::DualBlock
}

pub fn load_config(path: &Path) -> Result<TrackingDemoConfig, String> {
    let data = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    serde_json::from_str(&data)
        .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))
}

use lane_finder::calib::PerspectiveCalibrator;
use lane_finder::config::perspective::{self, PerspectiveCalibConfig};
use lane_finder::image::io::load_grayscale_image;
use lane_finder::types::CalibrationData;
use std::env;
use std::path::Path;

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let config_path = env::args().nth(1).ok_or_else(usage)?;
    let config: PerspectiveCalibConfig = perspective::load_config(Path::new(&config_path))?;

    let calibration = CalibrationData::load(&config.camera_calibration)?;
    let mut images = Vec::with_capacity(config.images.len());
    for path in &config.images {
        images.push(load_grayscale_image(path)?);
    }

    let calibrator = PerspectiveCalibrator::new(calibration, config.options);
    let result = calibrator.calibrate(&images).map_err(|e| e.to_string())?;

    result.save(&config.output)?;
    println!(
        "Perspective scale: {:.2} px/m across, {:.2} px/m along",
        result.pixels_per_meter.0, result.pixels_per_meter.1
    );
    println!("Saved perspective calibration to {}", config.output.display());
    Ok(())
}

fn usage() -> String {
    "Usage: calibrate_perspective <config.json>".to_string()
}

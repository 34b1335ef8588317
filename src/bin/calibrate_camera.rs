use lane_finder::calib::CameraCalibrator;
use lane_finder::config::camera::{self, CameraCalibConfig};
use lane_finder::image::io::load_grayscale_image;
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
    let config: CameraCalibConfig = camera::load_config(Path::new(&config_path))?;

    let mut images = Vec::with_capacity(config.images.len());
    for path in &config.images {
        images.push(load_grayscale_image(path)?);
    }

    let mut calibrator = CameraCalibrator::new(config.board);
    if let Some(min) = config.min_detections {
        calibrator.min_detections = min;
    }
    let outcome = calibrator.calibrate(&images).map_err(|e| e.to_string())?;

    outcome.data.save(&config.output)?;
    println!(
        "Calibrated from {} of {} views, reprojection RMS {:.4} px",
        outcome.views_used,
        images.len(),
        outcome.reprojection_rms
    );
    println!("Saved camera calibration to {}", config.output.display());
    Ok(())
}

fn usage() -> String {
    "Usage: calibrate_camera <config.json>".to_string()
}

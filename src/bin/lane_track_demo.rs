use lane_finder::angle::contour_steering_angle;
use lane_finder::config::tracking::{self, TrackingDemoConfig};
use lane_finder::contours::find_contours;
use lane_finder::image::io::{load_grayscale_image, save_grayscale_u8, write_json_file};
use lane_finder::image::GrayImage;
use lane_finder::labels::{read_labels, speed_at, LabelRecord};
use lane_finder::mask::{ClassicalMaskSource, LaneMaskSource};
use lane_finder::rectify::FrameRectifier;
use lane_finder::tracker::{step, TrackerState};
use lane_finder::types::{CalibrationData, PerspectiveCalibration};
use serde::Serialize;
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
    let config: TrackingDemoConfig = tracking::load_config(Path::new(&config_path))?;

    let rectifier = build_rectifier(&config)?;
    let labels: Vec<LabelRecord> = match &config.labels {
        Some(path) => read_labels(path)?,
        None => Vec::new(),
    };

    let mask_source = ClassicalMaskSource::new(config.mask);
    let mut state = TrackerState::new(&config.tracker);
    let mut frames_out = Vec::with_capacity(config.frames.len());

    for (frame_id, path) in config.frames.iter().enumerate() {
        let raw = load_grayscale_image(path)?;
        let frame = match &rectifier {
            Some(r) => r.rectify(&raw).map_err(|e| e.to_string())?,
            None => raw,
        };
        let frame = fit_to_tracker(&frame, &config.tracker);
        let mask = mask_source.lane_mask(&frame);

        let out = step(
            &mask,
            config.mode,
            config.side_tracking,
            config.center_offset,
            &config.tracker,
            &mut state,
        )
        .map_err(|e| e.to_string())?;

        if let (Some(dir), Some(dbg)) = (&config.output.debug_dir, &out.debug) {
            let debug_path = dir.join(format!("frame_{frame_id:05}.png"));
            save_grayscale_u8(dbg, &debug_path)?;
        }

        let steering_angle = contour_steering_angle(&find_contours(&mask), 50);
        frames_out.push(FrameOutput {
            frame_id: frame_id as u32,
            center: out.center,
            steering_angle,
            confidence: state.confidence,
            hold_count: state.hold_count,
            speed_kmh: speed_at(&labels, frame_id as u32),
        });
    }

    let result = TrackingDemoOutput {
        frame_count: frames_out.len(),
        mode: format!("{:?}", config.mode),
        side_tracking: config.side_tracking,
        center_offset: config.center_offset,
        frames: frames_out,
    };
    write_json_file(&config.output.result_json, &result)?;
    println!(
        "Tracked {} frames, results in {}",
        result.frame_count,
        config.output.result_json.display()
    );
    Ok(())
}

fn build_rectifier(config: &TrackingDemoConfig) -> Result<Option<FrameRectifier>, String> {
    let (Some(camera), Some(perspective)) =
        (&config.camera_calibration, &config.perspective_calibration)
    else {
        return Ok(None);
    };
    let calibration = CalibrationData::load(camera)?;
    let perspective = PerspectiveCalibration::load(perspective)?;
    let output_size = (config.tracker.frame_width, config.tracker.frame_height);
    FrameRectifier::new(calibration, perspective, output_size)
        .map(Some)
        .map_err(|e| e.to_string())
}

fn fit_to_tracker(frame: &GrayImage, tracker: &lane_finder::TrackerConfig) -> GrayImage {
    if frame.w == tracker.frame_width && frame.h == tracker.frame_height {
        frame.clone()
    } else {
        frame.resize(tracker.frame_width, tracker.frame_height)
    }
}

fn usage() -> String {
    "Usage: lane_track_demo <config.json>".to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TrackingDemoOutput {
    frame_count: usize,
    mode: String,
    side_tracking: bool,
    center_offset: i32,
    frames: Vec<FrameOutput>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FrameOutput {
    frame_id: u32,
    center: i32,
    steering_angle: Option<f32>,
    confidence: f32,
    hold_count: u32,
    speed_kmh: Option<f32>,
}

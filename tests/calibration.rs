use lane_finder::types::{CalibrationData, PerspectiveCalibration};
use nalgebra::Matrix3;
use std::fs;
use std::path::PathBuf;

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("lane_finder_{tag}_{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn camera_artifact_save_load_save_is_idempotent() {
    let dir = scratch_dir("camera");
    let first = dir.join("camera.json");
    let second = dir.join("camera_again.json");

    let data = CalibrationData {
        camera_matrix: Matrix3::new(
            412.5, 0.0, 239.2, 0.0, 418.9, 161.7, 0.0, 0.0, 1.0,
        ),
        distortion_coeffs: vec![-0.31, 0.12, 0.001, -0.0004, 0.0],
        image_size: (480, 320),
    };
    data.save(&first).unwrap();

    let loaded = CalibrationData::load(&first).unwrap();
    assert_eq!(loaded.camera_matrix, data.camera_matrix);
    assert_eq!(loaded.distortion_coeffs, data.distortion_coeffs);
    assert_eq!(loaded.image_size, data.image_size);

    loaded.save(&second).unwrap();
    assert_eq!(
        fs::read_to_string(&first).unwrap(),
        fs::read_to_string(&second).unwrap()
    );
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn perspective_artifact_save_load_save_is_idempotent() {
    let dir = scratch_dir("perspective");
    let first = dir.join("perspective.json");
    let second = dir.join("perspective_again.json");

    let calib = PerspectiveCalibration {
        homography: Matrix3::new(
            0.82, -0.11, 30.5, 0.02, 1.43, -95.0, 0.0, -0.0012, 1.0,
        ),
        pixels_per_meter: (132.4, 88.1),
        source_quad: [(118.0, 185.0), (362.0, 185.0), (455.0, 285.0), (25.0, 285.0)],
    };
    calib.save(&first).unwrap();

    let loaded = PerspectiveCalibration::load(&first).unwrap();
    assert_eq!(loaded.homography, calib.homography);
    assert_eq!(loaded.pixels_per_meter, calib.pixels_per_meter);
    assert_eq!(loaded.source_quad, calib.source_quad);

    loaded.save(&second).unwrap();
    assert_eq!(
        fs::read_to_string(&first).unwrap(),
        fs::read_to_string(&second).unwrap()
    );
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn loading_a_missing_artifact_reports_the_path() {
    let err = CalibrationData::load(&PathBuf::from("/nonexistent/calib.json")).unwrap_err();
    assert!(err.contains("/nonexistent/calib.json"), "{err}");
}

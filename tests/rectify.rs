mod common;

use common::synthetic_mask::gradient_image;
use lane_finder::error::Error;
use lane_finder::image::GrayImage;
use lane_finder::rectify::{warp_perspective, FrameRectifier};
use lane_finder::types::{CalibrationData, PerspectiveCalibration};
use nalgebra::Matrix3;

fn pinhole(w: usize, h: usize) -> CalibrationData {
    CalibrationData {
        camera_matrix: Matrix3::new(
            100.0,
            0.0,
            w as f64 / 2.0,
            0.0,
            100.0,
            h as f64 / 2.0,
            0.0,
            0.0,
            1.0,
        ),
        distortion_coeffs: vec![0.0; 5],
        image_size: (w, h),
    }
}

#[test]
fn translation_warp_round_trips_exactly() {
    let src = gradient_image(120, 90);
    let shift = Matrix3::new(1.0, 0.0, 7.0, 0.0, 1.0, 4.0, 0.0, 0.0, 1.0);

    let warped = warp_perspective(&src, &shift, 120, 90).unwrap();
    let inverse = shift.try_inverse().unwrap();
    let back = warp_perspective(&warped, &inverse, 120, 90).unwrap();

    // Interior pixels survive both trips; the border strip that sampled
    // outside the source stays background.
    for y in 10..80 {
        for x in 10..110 {
            assert_eq!(back.get(x, y), src.get(x, y), "pixel ({x}, {y})");
        }
    }
}

#[test]
fn singular_homography_is_rejected() {
    let src = gradient_image(20, 20);
    let mut h = Matrix3::zeros();
    h[(0, 0)] = 1.0;
    assert!(warp_perspective(&src, &h, 20, 20).is_none());
}

#[test]
fn rectifier_with_identity_artifacts_is_a_no_op() {
    let frame = gradient_image(160, 120);
    let perspective = PerspectiveCalibration {
        homography: Matrix3::identity(),
        pixels_per_meter: (40.0, 40.0),
        source_quad: [(0.0, 0.0), (160.0, 0.0), (160.0, 120.0), (0.0, 120.0)],
    };
    let rectifier = FrameRectifier::new(pinhole(160, 120), perspective, (160, 120)).unwrap();
    let out = rectifier.rectify(&frame).unwrap();
    assert_eq!(out.data, frame.data);
}

#[test]
fn rectifier_rejects_mismatched_frame() {
    let perspective = PerspectiveCalibration {
        homography: Matrix3::identity(),
        pixels_per_meter: (40.0, 40.0),
        source_quad: [(0.0, 0.0), (160.0, 0.0), (160.0, 120.0), (0.0, 120.0)],
    };
    let rectifier = FrameRectifier::new(pinhole(160, 120), perspective, (160, 120)).unwrap();
    match rectifier.rectify(&GrayImage::new(80, 60)) {
        Err(Error::MaskDimensionMismatch { expected_w, .. }) => assert_eq!(expected_w, 160),
        other => panic!("expected dimension mismatch, got {other:?}"),
    }
}

#[test]
fn degenerate_perspective_artifact_is_rejected_at_construction() {
    let perspective = PerspectiveCalibration {
        homography: Matrix3::zeros(),
        pixels_per_meter: (40.0, 40.0),
        source_quad: [(0.0, 0.0); 4],
    };
    match FrameRectifier::new(pinhole(160, 120), perspective, (160, 120)) {
        Err(Error::CalibrationSingular(_)) => {}
        other => panic!("expected singular calibration, got {other:?}"),
    }
}

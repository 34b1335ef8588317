mod common;

use common::synthetic_mask::mask_with_bars;
use lane_finder::image::GrayImage;
use lane_finder::tracker::{step, ScanSide, TrackerConfig, TrackerMode, TrackerState};

fn config() -> TrackerConfig {
    TrackerConfig::default()
}

// Lane-sized bar: 19 px wide, 70 px tall, inside the bottom band.
fn lane_bar(center_x: usize) -> (usize, usize, usize, usize) {
    (center_x, 9, 240, 310)
}

#[test]
fn tracker_follows_moving_marking() {
    let cfg = config();
    let mut state = TrackerState::new(&cfg);
    let offset = 5;

    for bar_x in (150..190).step_by(10) {
        let mask = mask_with_bars(cfg.frame_width, cfg.frame_height, &[lane_bar(bar_x)]);
        let out = step(&mask, TrackerMode::DualBlock, false, offset, &cfg, &mut state).unwrap();
        assert_eq!(out.center, bar_x as i32 + offset);
    }
    assert_eq!(state.direction, 1);
    assert_eq!(state.hold_count, 0);
    assert!(state.confidence > 0.5);
}

#[test]
fn lost_marking_holds_center_and_decays_confidence() {
    let cfg = config();
    let mut state = TrackerState::new(&cfg);

    let mask = mask_with_bars(cfg.frame_width, cfg.frame_height, &[lane_bar(200)]);
    let seen = step(&mask, TrackerMode::DualBlock, false, 0, &cfg, &mut state)
        .unwrap()
        .center;
    let confidence_after_hit = state.confidence;

    let empty = GrayImage::new(cfg.frame_width, cfg.frame_height);
    for expected_holds in 1..=4u32 {
        let out = step(&empty, TrackerMode::DualBlock, false, 0, &cfg, &mut state).unwrap();
        assert_eq!(out.center, seen);
        assert_eq!(state.hold_count, expected_holds);
    }
    assert!(state.confidence < confidence_after_hit);
}

#[test]
fn two_blob_disambiguation_vectors() {
    let cfg = config();

    // Opposite sides of the 380 threshold: own-lane (minimum) wins.
    let mut state = TrackerState::new(&cfg);
    let mask = mask_with_bars(
        cfg.frame_width,
        cfg.frame_height,
        &[lane_bar(150), lane_bar(410)],
    );
    let out = step(&mask, TrackerMode::DualBlock, false, 8, &cfg, &mut state).unwrap();
    assert_eq!(out.center, 158);

    // Both below the threshold: outermost (maximum) wins.
    let mut state = TrackerState::new(&cfg);
    let mask = mask_with_bars(
        cfg.frame_width,
        cfg.frame_height,
        &[lane_bar(150), lane_bar(200)],
    );
    let out = step(&mask, TrackerMode::DualBlock, false, 8, &cfg, &mut state).unwrap();
    assert_eq!(out.center, 208);
}

#[test]
fn mirror_invariance_over_a_sequence() {
    let cfg = config();
    let width = cfg.frame_width as i32;
    let offset = 4;

    let frames: Vec<GrayImage> = vec![
        mask_with_bars(cfg.frame_width, cfg.frame_height, &[lane_bar(150)]),
        mask_with_bars(
            cfg.frame_width,
            cfg.frame_height,
            &[lane_bar(160), lane_bar(400)],
        ),
        GrayImage::new(cfg.frame_width, cfg.frame_height),
        mask_with_bars(cfg.frame_width, cfg.frame_height, &[lane_bar(170)]),
    ];

    let mut plain = TrackerState::new(&cfg);
    let mut mirrored = TrackerState::new(&cfg);
    mirrored.center = width - plain.center;

    for mask in &frames {
        let a = step(mask, TrackerMode::DualBlock, false, offset, &cfg, &mut plain).unwrap();
        let b = step(
            &mask.flipped_horizontal(),
            TrackerMode::DualBlock,
            true,
            offset,
            &cfg,
            &mut mirrored,
        )
        .unwrap();
        assert_eq!(b.center, width - a.center);
    }
}

#[test]
fn mirror_invariance_in_edge_scan_mode() {
    let cfg = config();
    let width = cfg.frame_width as i32;
    let mask = mask_with_bars(
        cfg.frame_width,
        cfg.frame_height,
        &[(120, 9, 222, 238), (300, 9, 222, 238)],
    );

    let mut plain = TrackerState::new(&cfg);
    let mut mirrored = TrackerState::new(&cfg);
    mirrored.center = width - plain.center;

    let a = step(
        &mask,
        TrackerMode::EdgeScan(ScanSide::Left),
        false,
        6,
        &cfg,
        &mut plain,
    )
    .unwrap();
    let b = step(
        &mask.flipped_horizontal(),
        TrackerMode::EdgeScan(ScanSide::Left),
        true,
        6,
        &cfg,
        &mut mirrored,
    )
    .unwrap();
    assert_eq!(b.center, width - a.center);
}

#[test]
fn edge_scan_gate_ignores_far_rectangles() {
    let cfg = config();
    // Blobs inside the 20-row scan strip at the top of the band.
    let strip_blobs = [(70usize, 9usize, 222usize, 238usize), (450, 9, 222, 238)];
    let mask = mask_with_bars(cfg.frame_width, cfg.frame_height, &strip_blobs);

    let mut state = TrackerState::new(&cfg);
    let left = step(
        &mask,
        TrackerMode::EdgeScan(ScanSide::Left),
        false,
        0,
        &cfg,
        &mut state,
    )
    .unwrap();
    // Leftmost rectangle edge under the limit; the blob at 450 is beyond it.
    assert_eq!(left.center, 61);

    let mut state = TrackerState::new(&cfg);
    let right = step(
        &mask,
        TrackerMode::EdgeScan(ScanSide::Right),
        false,
        0,
        &cfg,
        &mut state,
    )
    .unwrap();
    assert_eq!(right.center, 80);
}

#[test]
fn mode_switch_keeps_state_continuity() {
    let cfg = config();
    let mut state = TrackerState::new(&cfg);

    let mask = mask_with_bars(cfg.frame_width, cfg.frame_height, &[lane_bar(200)]);
    step(&mask, TrackerMode::DualBlock, false, 0, &cfg, &mut state).unwrap();
    assert_eq!(state.mode, TrackerMode::DualBlock);
    let carried = state.center;

    // Switching to edge-scan with no strip content holds the carried center.
    let empty = GrayImage::new(cfg.frame_width, cfg.frame_height);
    let out = step(
        &empty,
        TrackerMode::EdgeScan(ScanSide::Left),
        false,
        0,
        &cfg,
        &mut state,
    )
    .unwrap();
    assert_eq!(out.center, carried);
    assert_eq!(state.mode, TrackerMode::EdgeScan(ScanSide::Left));
}

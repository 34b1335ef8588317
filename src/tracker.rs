//! Stateful contour-based lane-center tracker.
//!
//! One [`step`] call per frame turns a binary lane mask into a smoothed
//! lane-center pixel position. Three disjoint algorithms share the same
//! state and output contract, selected by [`TrackerMode`]:
//!
//! - **DualBlock**: oriented-box blob geometry over the near band, with
//!   one/two-blob disambiguation against a screen threshold;
//! - **EdgeScan (left/right)**: axis-aligned rectangle scanning over a thin
//!   strip near the top of the band.
//!
//! Side-tracking mirrors the mask and previous center on the way in and
//! exactly undoes the mirroring on the way out, so one algorithm serves both
//! left- and right-mounted camera variants. A frame with no acceptable
//! candidate never errors: the tracker holds the previous center and decays
//! its confidence.

use crate::contours::{find_contours, Contour, OrientedBox};
use crate::error::{Error, Result};
use crate::image::GrayImage;
use log::debug;
use serde::{Deserialize, Serialize};

/// Which image edge the scan modes latch onto.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanSide {
    Left,
    Right,
}

/// Closed set of tracking algorithms sharing one state/output contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackerMode {
    /// Oriented-box blob tracking over the near band.
    DualBlock,
    /// Bounding-rectangle scan along one image edge.
    EdgeScan(ScanSide),
}

/// Every tuned constant of the tracker. Defaults reproduce the original
/// 480×320 camera tuning; none of them is a fixed requirement.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Working mask width in pixels.
    pub frame_width: usize,
    /// Working mask height in pixels.
    pub frame_height: usize,
    /// Height of the near band at the bottom of the mask.
    pub band_height: usize,
    /// Accepted lane-marking short-side range, px.
    pub blob_min_width: f32,
    pub blob_max_width: f32,
    /// Minimum long side of an accepted blob, px.
    pub blob_min_height: f32,
    /// Maximum blob area; filters filled regions and noise.
    pub blob_max_area: f32,
    /// At most this many blobs participate in disambiguation.
    pub max_blobs: usize,
    /// Screen x threshold separating own-lane from neighbor-lane blobs.
    pub split_threshold: i32,
    /// Edge-scan rectangles beyond this x are ignored.
    pub edge_scan_limit: i32,
    /// Height of the edge-scan strip at the top of the band.
    pub edge_scan_strip: usize,
    /// Emit the annotated diagnostic mask from every step.
    pub emit_debug: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            frame_width: 480,
            frame_height: 320,
            band_height: 100,
            blob_min_width: 10.0,
            blob_max_width: 80.0,
            blob_min_height: 50.0,
            blob_max_area: 5000.0,
            max_blobs: 3,
            split_threshold: 380,
            edge_scan_limit: 420,
            edge_scan_strip: 20,
            emit_debug: false,
        }
    }
}

/// Mutable per-camera tracking state, threaded explicitly through [`step`].
///
/// Mutated exactly once per processed frame and never implicitly reset;
/// multiple cameras each own an independent instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackerState {
    /// Mode used by the most recent step.
    pub mode: TrackerMode,
    /// Side-tracking flag mirrored from the most recent step's input.
    pub side_tracking: bool,
    /// Last lane-center estimate, clamped to the mask width.
    pub center: i32,
    /// Sign of the last center movement: -1, 0 or +1.
    pub direction: i32,
    /// Detection confidence in [0, 1]; decays while holding.
    pub confidence: f32,
    /// Smoothing offset applied by the most recent step.
    pub offset: i32,
    /// Consecutive frames spent holding the previous center.
    pub hold_count: u32,
}

impl TrackerState {
    /// Fresh state centered in the working frame.
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            mode: TrackerMode::DualBlock,
            side_tracking: false,
            center: (config.frame_width / 2) as i32,
            direction: 0,
            confidence: 0.0,
            offset: 0,
            hold_count: 0,
        }
    }
}

/// Per-frame tracker output.
#[derive(Clone, Debug)]
pub struct StepOutput {
    /// New lane-center estimate in mask coordinates.
    pub center: i32,
    /// Annotated working mask, present when `emit_debug` is set.
    /// Diagnostic only, never authoritative.
    pub debug: Option<GrayImage>,
}

/// Candidate lane-marking blob accepted by the dual-block filter.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    /// Horizon-side transverse midpoint x.
    far: i32,
    /// Vehicle-side transverse midpoint x.
    near: i32,
    rect: OrientedBox,
}

/// Advance the tracker by one frame.
///
/// Never errors on missing detections; rejects only masks whose dimensions
/// disagree with the configuration.
pub fn step(
    mask: &GrayImage,
    mode: TrackerMode,
    side_tracking: bool,
    offset: i32,
    config: &TrackerConfig,
    state: &mut TrackerState,
) -> Result<StepOutput> {
    if mask.w != config.frame_width || mask.h != config.frame_height {
        return Err(Error::MaskDimensionMismatch {
            expected_w: config.frame_width,
            expected_h: config.frame_height,
            got_w: mask.w,
            got_h: mask.h,
        });
    }
    let width = config.frame_width as i32;

    // Mirror-in: one algorithm serves both camera mounts.
    let (work_mask, mut prev_center) = if side_tracking {
        (mask.flipped_horizontal(), width - state.center)
    } else {
        (mask.clone(), state.center)
    };
    prev_center = prev_center.clamp(0, width);

    let band_top = config.frame_height.saturating_sub(config.band_height);
    let band = work_mask.crop_rows(band_top, config.frame_height);

    let (found, mut center, mut dbg) = match mode {
        TrackerMode::DualBlock => step_dual_block(&band, prev_center, offset, config),
        TrackerMode::EdgeScan(side) => step_edge_scan(&band, side, prev_center, offset, config),
    };
    center = center.clamp(0, width);

    // Mirror-out: exactly undo the mirroring applied above.
    let output_center = if side_tracking { width - center } else { center };
    if let (true, Some(d)) = (side_tracking, dbg.as_mut()) {
        *d = d.flipped_horizontal();
    }

    if found {
        state.direction = (output_center - state.center).signum();
        state.confidence = (state.confidence + 0.25).min(1.0);
        state.hold_count = 0;
    } else {
        debug!("tracker: no candidate, holding center {}", state.center);
        state.confidence = (state.confidence - 0.1).max(0.0);
        state.hold_count += 1;
    }
    state.mode = mode;
    state.side_tracking = side_tracking;
    state.offset = offset;
    state.center = output_center.clamp(0, width);

    Ok(StepOutput {
        center: state.center,
        debug: dbg,
    })
}

/// Dual-block mode: oriented-box blob geometry plus threshold
/// disambiguation. Returns (candidate found, new center, debug mask).
fn step_dual_block(
    band: &GrayImage,
    prev_center: i32,
    offset: i32,
    config: &TrackerConfig,
) -> (bool, i32, Option<GrayImage>) {
    let contours = find_contours(band);
    let mut candidates: Vec<Candidate> = Vec::new();
    for contour in &contours {
        if candidates.len() >= config.max_blobs {
            break;
        }
        if let Some(candidate) = accept_blob(contour, config) {
            candidates.push(candidate);
        }
    }

    let threshold = config.split_threshold;
    let (found, center) = match candidates.len() {
        1 => {
            if candidates[0].far <= threshold {
                (true, candidates[0].near + offset)
            } else {
                (false, prev_center)
            }
        }
        2 => {
            let a = candidates[0].near;
            let b = candidates[1].near;
            if ((a - threshold) as i64) * ((b - threshold) as i64) < 0 {
                // Opposite sides of the threshold: take the own-lane edge.
                (true, a.min(b) + offset)
            } else {
                (true, a.max(b) + offset)
            }
        }
        _ => (false, prev_center),
    };

    let dbg = config
        .emit_debug
        .then(|| annotate(band, &candidates, center));
    (found, center, dbg)
}

/// Blob filter: elongated marking-like blobs only.
fn accept_blob(contour: &Contour, config: &TrackerConfig) -> Option<Candidate> {
    let area = contour.area();
    if area >= config.blob_max_area {
        return None;
    }
    let rect = contour.min_area_rect();
    let short = rect.short_side();
    let long = rect.long_side();
    if short <= config.blob_min_width || short >= config.blob_max_width {
        return None;
    }
    if long <= config.blob_min_height {
        return None;
    }

    // corners[0] is the bottommost corner; the short edge containing it is
    // the vehicle-side end of the blob. The diagonal pairing with the
    // longer span fixes which adjacent edge that is.
    let c = &rect.corners;
    let side01 = (c[0][0] - c[1][0]).hypot(c[0][1] - c[1][1]);
    let side03 = (c[0][0] - c[3][0]).hypot(c[0][1] - c[3][1]);
    let (far, near) = if side01 > side03 {
        (
            (c[1][0] + c[2][0]) * 0.5,
            (c[0][0] + c[3][0]) * 0.5,
        )
    } else {
        (
            (c[3][0] + c[2][0]) * 0.5,
            (c[0][0] + c[1][0]) * 0.5,
        )
    };
    Some(Candidate {
        far: far.round() as i32,
        near: near.round() as i32,
        rect,
    })
}

/// Edge-scan mode: axis-aligned rectangles over a thin strip near the top
/// of the band.
fn step_edge_scan(
    band: &GrayImage,
    side: ScanSide,
    prev_center: i32,
    offset: i32,
    config: &TrackerConfig,
) -> (bool, i32, Option<GrayImage>) {
    let strip_h = config.edge_scan_strip.min(band.h);
    let strip = band.crop_rows(0, strip_h);
    let limit = config.edge_scan_limit;

    let mut best: Option<i32> = None;
    for contour in find_contours(&strip) {
        let rect = contour.bounding_rect();
        match side {
            ScanSide::Left => {
                if rect.x < limit && best.map_or(true, |b| rect.x < b) {
                    best = Some(rect.x);
                }
            }
            ScanSide::Right => {
                if rect.right() < limit && best.map_or(true, |b| rect.right() > b) {
                    best = Some(rect.right());
                }
            }
        }
    }

    let (found, center) = match best {
        Some(edge) => (true, edge + offset),
        None => (false, prev_center),
    };
    let dbg = config.emit_debug.then(|| annotate(band, &[], center));
    (found, center, dbg)
}

/// Diagnostic mask: accepted oriented boxes filled at mid-gray, the center
/// estimate as a bright column.
fn annotate(band: &GrayImage, candidates: &[Candidate], center: i32) -> GrayImage {
    let mut out = band.clone();
    for cand in candidates {
        let rect = cand.rect;
        let min_x = rect.corners.iter().map(|c| c[0]).fold(f32::MAX, f32::min) as i32;
        let max_x = rect.corners.iter().map(|c| c[0]).fold(f32::MIN, f32::max) as i32;
        let min_y = rect.corners.iter().map(|c| c[1]).fold(f32::MAX, f32::min) as i32;
        let max_y = rect.corners.iter().map(|c| c[1]).fold(f32::MIN, f32::max) as i32;
        for y in min_y.max(0)..=max_y.min(out.h as i32 - 1) {
            for x in min_x.max(0)..=max_x.min(out.w as i32 - 1) {
                if out.get(x as usize, y as usize) == 0 {
                    out.set(x as usize, y as usize, 128);
                }
            }
        }
    }
    if (0..out.w as i32).contains(&center) {
        for y in 0..out.h {
            out.set(center as usize, y, 200);
        }
    }
    out
}

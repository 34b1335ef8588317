//! Angle utilities and the line/contour steering-bias estimators.

use crate::contours::Contour;
use crate::segments::Segment;

/// Computes the smallest unsigned angular difference between two angles,
/// treating antipodal directions as equivalent (i.e. π apart → 0).
#[inline]
pub fn angular_difference(a: f32, b: f32) -> f32 {
    let mut diff = (a - b).abs();
    if diff > std::f32::consts::PI {
        diff = diff.rem_euclid(std::f32::consts::PI);
    }
    if diff > std::f32::consts::FRAC_PI_2 {
        std::f32::consts::PI - diff
    } else {
        diff
    }
}

/// Aggregate slant of detected line segments.
///
/// `bias` is the sum of signed horizontal deltas after normalizing every
/// segment upper-endpoint-first; its sign indicates the overall lane-line
/// slant. `segments` is the supporting count and doubles as a confidence
/// indicator.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SlantSignal {
    pub bias: f32,
    pub segments: usize,
}

/// Sum signed horizontal deltas across segments, each normalized so its
/// first endpoint is the upper one.
pub fn segment_slant(segments: &[Segment]) -> SlantSignal {
    let mut bias = 0.0f32;
    for seg in segments {
        let (top, bottom) = if seg.p0[1] <= seg.p1[1] {
            (seg.p0, seg.p1)
        } else {
            (seg.p1, seg.p0)
        };
        bias += bottom[0] - top[0];
    }
    SlantSignal {
        bias,
        segments: segments.len(),
    }
}

const EPSILON: f32 = 1e-5;

/// Area-weighted steering angle from bird's-eye mask contours, in [-1, 1].
///
/// Per contour with at least `min_points` boundary points: successive
/// per-point angular deltas, weighted by vertical position so rows closer to
/// the vehicle weigh more, averaged per contour; contours are then averaged
/// weighted by enclosed area. `None` when no contour qualifies.
pub fn contour_steering_angle(contours: &[Contour], min_points: usize) -> Option<f32> {
    let mut sum_weighted = 0.0f64;
    let mut sum_weights = 0.0f64;

    for contour in contours {
        let points = &contour.points;
        if points.len() < min_points.max(2) {
            continue;
        }

        let mut angle_sum = 0.0f64;
        let mut weight_sum = 0.0f64;
        for pair in points.windows(2) {
            let prev = pair[0];
            let point = pair[1];
            let dy = (point[1] - prev[1]) as f32;
            let dx = (point[0] - prev[0]) as f32;
            let angle = ((dy + EPSILON) / (dx + EPSILON)).atan();
            let weight = (prev[1] + point[1]) as f64 * 0.5;
            angle_sum += angle as f64 * weight;
            weight_sum += weight;
        }
        if weight_sum <= 0.0 {
            continue;
        }
        let contour_angle = angle_sum / weight_sum;
        let area = contour.area().max(1.0) as f64;
        sum_weighted += contour_angle * area;
        sum_weights += area;
    }

    if sum_weights <= 0.0 {
        return None;
    }
    let angle = (sum_weighted / sum_weights) / std::f64::consts::FRAC_PI_2;
    Some(angle.clamp(-1.0, 1.0) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::Segment;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn angular_difference_handles_wrap() {
        assert!(approx_eq(
            angular_difference(0.0, std::f32::consts::PI),
            0.0
        ));
        assert!(approx_eq(
            angular_difference(0.0, std::f32::consts::FRAC_PI_2),
            std::f32::consts::FRAC_PI_2
        ));
        assert!(approx_eq(
            angular_difference(std::f32::consts::FRAC_PI_4, -std::f32::consts::FRAC_PI_4),
            std::f32::consts::FRAC_PI_2
        ));
    }

    #[test]
    fn slant_sign_follows_segment_tilt() {
        // Both segments lean right going down the image.
        let right = vec![
            Segment::from_endpoints([10.0, 0.0], [30.0, 40.0], 1.0),
            Segment::from_endpoints([55.0, 40.0], [50.0, 0.0], 1.0),
        ];
        let signal = segment_slant(&right);
        assert!(signal.bias > 0.0);
        assert_eq!(signal.segments, 2);

        // Mirrored segments lean left.
        let left = vec![Segment::from_endpoints([30.0, 0.0], [10.0, 40.0], 1.0)];
        assert!(segment_slant(&left).bias < 0.0);
    }

    #[test]
    fn slant_is_endpoint_order_invariant() {
        let a = segment_slant(&[Segment::from_endpoints([10.0, 0.0], [30.0, 40.0], 1.0)]);
        let b = segment_slant(&[Segment::from_endpoints([30.0, 40.0], [10.0, 0.0], 1.0)]);
        assert!(approx_eq(a.bias, b.bias));
    }

    #[test]
    fn no_signal_without_qualifying_contours() {
        assert_eq!(contour_steering_angle(&[], 10), None);
    }
}

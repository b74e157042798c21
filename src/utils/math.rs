//! Small numeric helpers shared by the segmentation scoring code.

/// Clamps `value` to `[min, max]` and maps it linearly onto `[target1, target2]`.
///
/// `target1` may be larger than `target2`, in which case the mapping is
/// decreasing. `min` must not exceed `max`; a degenerate range maps every value
/// to `target1`.
pub fn scale(value: f32, min: f32, max: f32, target1: f32, target2: f32) -> f32 {
    debug_assert!(min <= max, "scale: min {} > max {}", min, max);
    if max <= min {
        return target1;
    }
    let clamped = value.clamp(min, max);
    let ratio = (clamped - min) / (max - min);
    target1 + ratio * (target2 - target1)
}

/// Euclidean distance between two integer points.
pub fn distance(x1: i32, y1: i32, x2: i32, y2: i32) -> f32 {
    let dx = (x2 - x1) as f32;
    let dy = (y2 - y1) as f32;
    (dx * dx + dy * dy).sqrt()
}

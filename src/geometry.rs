//! Geometry helpers
//!
//! Bounding boxes from landmark extrema and box intersection-over-union.

use crate::types::{BoundingBox, Landmark};

/// Extrema-derived box around a landmark set.
///
/// An empty set yields a zero-area box at the origin.
pub fn bounding_box(points: &[Landmark]) -> BoundingBox {
    if points.is_empty() {
        return BoundingBox::default();
    }

    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    BoundingBox {
        x: min_x,
        y: min_y,
        w: (max_x - min_x).max(0.0),
        h: (max_y - min_y).max(0.0),
    }
}

/// Intersection area over union area of two boxes.
///
/// Returns 0 when either box is absent or the union is empty.
pub fn iou(a: Option<&BoundingBox>, b: Option<&BoundingBox>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) => box_iou(a, b),
        _ => 0.0,
    }
}

/// IoU of two present boxes
pub fn box_iou(a: &BoundingBox, b: &BoundingBox) -> f64 {
    let ix1 = a.x.max(b.x);
    let iy1 = a.y.max(b.y);
    let ix2 = (a.x + a.w).min(b.x + b.w);
    let iy2 = (a.y + a.h).min(b.y + b.h);

    let intersection = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    let union = a.area() + b.area() - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

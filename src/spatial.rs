//! Planar geometry helpers over the `geo` primitives.
//!
//! All coordinates are abstract Cartesian values inside one global bounding
//! rectangle; no geographic projection is involved, so every distance here is
//! plain Euclidean. Point containment is inclusive of rectangle boundaries,
//! while rectangle intersection requires actual shared area: a rectangle that
//! only touches another along an edge does not intersect it.

use crate::error::{Result, SpatextError};
use geo::{Coord, Distance, Euclidean, Point, Rect};

/// Build a validated rectangle from raw coordinates.
///
/// # Errors
///
/// Returns [`SpatextError::InvalidBounds`] if any coordinate is non-finite or
/// the minimum exceeds the maximum on either axis.
pub fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Rect> {
    if ![min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite()) {
        return Err(SpatextError::InvalidBounds(
            "coordinates must be finite".to_string(),
        ));
    }
    if min_x > max_x || min_y > max_y {
        return Err(SpatextError::InvalidBounds(format!(
            "min ({}, {}) must not exceed max ({}, {})",
            min_x, min_y, max_x, max_y
        )));
    }
    Ok(Rect::new(
        Coord { x: min_x, y: min_y },
        Coord { x: max_x, y: max_y },
    ))
}

/// Inclusive point-in-rectangle test.
pub fn contains_point(r: &Rect, p: &Point) -> bool {
    let (min, max) = (r.min(), r.max());
    p.x() >= min.x && p.x() <= max.x && p.y() >= min.y && p.y() <= max.y
}

/// `true` when `inner` lies entirely within `outer` (boundaries allowed).
pub fn covers(outer: &Rect, inner: &Rect) -> bool {
    outer.min().x <= inner.min().x
        && outer.min().y <= inner.min().y
        && outer.max().x >= inner.max().x
        && outer.max().y >= inner.max().y
}

/// Intersection of two rectangles, or `None` when the overlap has no area.
///
/// Touching along an edge or at a corner is not an intersection: filing a
/// query into a cell it only touches would replicate it into cells where it
/// can never gain a match it does not already have next door.
pub fn intersection(a: &Rect, b: &Rect) -> Option<Rect> {
    let min_x = a.min().x.max(b.min().x);
    let min_y = a.min().y.max(b.min().y);
    let max_x = a.max().x.min(b.max().x);
    let max_y = a.max().y.min(b.max().y);
    if min_x >= max_x || min_y >= max_y {
        return None;
    }
    Some(Rect::new(
        Coord { x: min_x, y: min_y },
        Coord { x: max_x, y: max_y },
    ))
}

/// Euclidean distance between two points.
pub fn distance(a: &Point, b: &Point) -> f64 {
    Euclidean.distance(*a, *b)
}

/// Whether a disk of the given radius around `center` reaches `r`.
///
/// An infinite radius always overlaps; that is the state of a kNN query that
/// has not yet collected `k` candidates.
pub fn disk_overlaps_rect(center: &Point, radius: f64, r: &Rect) -> bool {
    if radius.is_infinite() {
        return true;
    }
    let cx = center.x().clamp(r.min().x, r.max().x);
    let cy = center.y().clamp(r.min().y, r.max().y);
    let dx = center.x() - cx;
    let dy = center.y() - cy;
    dx * dx + dy * dy <= radius * radius
}

/// Axis-aligned box around a disk, clamped to `clamp_to`.
///
/// With an infinite radius the disk covers all of `clamp_to`.
pub fn disk_box(center: &Point, radius: f64, clamp_to: &Rect) -> Rect {
    if radius.is_infinite() {
        return *clamp_to;
    }
    Rect::new(
        Coord {
            x: (center.x() - radius).max(clamp_to.min().x),
            y: (center.y() - radius).max(clamp_to.min().y),
        },
        Coord {
            x: (center.x() + radius).min(clamp_to.max().x),
            y: (center.y() + radius).min(clamp_to.max().y),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_validation() {
        assert!(rect(0.0, 0.0, 10.0, 10.0).is_ok());
        assert!(rect(10.0, 0.0, 0.0, 10.0).is_err());
        assert!(rect(0.0, f64::NAN, 1.0, 1.0).is_err());
    }

    #[test]
    fn test_contains_point_inclusive() {
        let r = rect(0.0, 0.0, 10.0, 10.0).unwrap();
        assert!(contains_point(&r, &Point::new(5.0, 5.0)));
        assert!(contains_point(&r, &Point::new(0.0, 0.0)));
        assert!(contains_point(&r, &Point::new(10.0, 10.0)));
        assert!(!contains_point(&r, &Point::new(10.1, 5.0)));
    }

    #[test]
    fn test_intersection() {
        let a = rect(0.0, 0.0, 6.0, 6.0).unwrap();
        let b = rect(4.0, 4.0, 10.0, 10.0).unwrap();
        let i = intersection(&a, &b).unwrap();
        assert_eq!(i.min().x, 4.0);
        assert_eq!(i.max().y, 6.0);

        let c = rect(7.0, 0.0, 8.0, 3.0).unwrap();
        assert!(intersection(&a, &c).is_none());
    }

    #[test]
    fn test_intersection_rejects_edge_touches() {
        let a = rect(0.0, 0.0, 5.0, 5.0).unwrap();
        let edge = rect(5.0, 0.0, 10.0, 5.0).unwrap();
        let corner = rect(5.0, 5.0, 10.0, 10.0).unwrap();
        assert!(intersection(&a, &edge).is_none());
        assert!(intersection(&a, &corner).is_none());
    }

    #[test]
    fn test_covers() {
        let outer = rect(0.0, 0.0, 10.0, 10.0).unwrap();
        let inner = rect(2.0, 2.0, 8.0, 8.0).unwrap();
        assert!(covers(&outer, &inner));
        assert!(!covers(&inner, &outer));
    }

    #[test]
    fn test_disk_overlaps_rect() {
        let r = rect(0.0, 0.0, 10.0, 10.0).unwrap();
        assert!(disk_overlaps_rect(&Point::new(12.0, 5.0), 3.0, &r));
        assert!(!disk_overlaps_rect(&Point::new(14.0, 5.0), 3.0, &r));
        assert!(disk_overlaps_rect(&Point::new(100.0, 100.0), f64::INFINITY, &r));
    }

    #[test]
    fn test_disk_box_clamped() {
        let bounds = rect(0.0, 0.0, 100.0, 100.0).unwrap();
        let b = disk_box(&Point::new(5.0, 5.0), 10.0, &bounds);
        assert_eq!(b.min().x, 0.0);
        assert_eq!(b.max().x, 15.0);

        let whole = disk_box(&Point::new(5.0, 5.0), f64::INFINITY, &bounds);
        assert_eq!(whole.min().x, 0.0);
        assert_eq!(whole.max().y, 100.0);
    }
}

//! Closed Catmull-Rom interpolation and waypoint mirroring.

use crate::geometry::Point;

/// Uniform Catmull-Rom point between `p1` and `p2` at `t ∈ [0, 1)`.
fn catmull_rom(p0: Point, p1: Point, p2: Point, p3: Point, t: f64) -> Point {
    let t2 = t * t;
    let t3 = t2 * t;
    let a = p1 * 2.0;
    let b = (p2 - p0) * t;
    let c = (p0 * 2.0 - p1 * 5.0 + p2 * 4.0 - p3) * t2;
    let d = (p1 * 3.0 - p0 - p2 * 3.0 + p3) * t3;
    (a + b + c + d) * 0.5
}

/// Interpolates a closed loop through `waypoints`.
///
/// The result holds `waypoints.len() * samples_per_segment` points and never
/// repeats the first point at the end.
pub fn closed_catmull_rom(waypoints: &[Point], samples_per_segment: usize) -> Vec<Point> {
    let n = waypoints.len();
    let samples = samples_per_segment.max(1);
    let mut out = Vec::with_capacity(n * samples);
    for i in 0..n {
        let p0 = waypoints[(i + n - 1) % n];
        let p1 = waypoints[i];
        let p2 = waypoints[(i + 1) % n];
        let p3 = waypoints[(i + 2) % n];
        for s in 0..samples {
            out.push(catmull_rom(p0, p1, p2, p3, s as f64 / samples as f64));
        }
    }
    out
}

/// Completes one half of a left/right symmetric circuit.
///
/// `half` runs from a point on the mirror axis around one side; the other
/// side is appended as its reflection across `x = axis_x`, in reverse order.
/// Endpoints lying on the axis are not duplicated.
pub fn mirror_waypoints(half: &[Point], axis_x: f64) -> Vec<Point> {
    const ON_AXIS: f64 = 1e-9;

    let mut out = half.to_vec();
    let len = half.len();
    for (i, p) in half.iter().enumerate().rev() {
        let on_axis = (p.x - axis_x).abs() < ON_AXIS;
        if on_axis && (i == 0 || i + 1 == len) {
            continue;
        }
        out.push(Point::new(2.0 * axis_x - p.x, p.y));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passes_through_waypoints() {
        let waypoints = vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(0.0, 100.0),
        ];
        let curve = closed_catmull_rom(&waypoints, 10);
        assert_eq!(curve.len(), 40);
        for (i, wp) in waypoints.iter().enumerate() {
            let p = curve[i * 10];
            assert!(p.distance(*wp) < 1e-9);
        }
    }

    #[test]
    fn test_mirror_skips_axis_endpoints() {
        let half = vec![
            Point::new(500.0, 100.0),
            Point::new(800.0, 200.0),
            Point::new(500.0, 600.0),
        ];
        let full = mirror_waypoints(&half, 500.0);
        assert_eq!(full.len(), 4);
        assert_eq!(full[3], Point::new(200.0, 200.0));
    }
}

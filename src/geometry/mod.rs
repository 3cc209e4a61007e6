//! # Geometry
//!
//! Plain value types for 2D points and wall segments, plus the intersection
//! primitives the sensors and the collision check are built on.
pub mod spatial_grid;

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

pub use spatial_grid::SpatialGrid;

/// Determinant magnitude below which two segments are treated as parallel.
const PARALLEL_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Unit vector pointing along `angle` (radians).
    pub fn from_angle(angle: f64) -> Self {
        Self::new(angle.cos(), angle.sin())
    }

    pub fn dot(self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// z-component of the 3D cross product.
    pub fn cross(self, other: Point) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance(self, other: Point) -> f64 {
        (other - self).length()
    }

    pub fn distance_sq(self, other: Point) -> f64 {
        let d = other - self;
        d.dot(d)
    }

    /// Returns the unit vector, or the zero vector for a zero-length input.
    pub fn normalized(self) -> Point {
        let len = self.length();
        if len > 0.0 {
            self * (1.0 / len)
        } else {
            Point::default()
        }
    }

    /// Left-hand perpendicular `(-y, x)`.
    pub fn perpendicular(self) -> Point {
        Point::new(-self.y, self.x)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;

    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

/// A wall segment between two points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub p1: Point,
    pub p2: Point,
}

impl Segment {
    pub const fn new(p1: Point, p2: Point) -> Self {
        Self { p1, p2 }
    }

    pub fn length(&self) -> f64 {
        self.p1.distance(self.p2)
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.p1, self.p2)
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Point,
    pub max: Point,
}

impl Aabb {
    pub fn from_points(a: Point, b: Point) -> Self {
        Self {
            min: Point::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// Smallest box around `center` extending `radius` in every direction.
    pub fn around(center: Point, radius: f64) -> Self {
        Self {
            min: Point::new(center.x - radius, center.y - radius),
            max: Point::new(center.x + radius, center.y + radius),
        }
    }

    /// Bounding box of a point set, `None` when empty.
    pub fn enclosing(points: impl IntoIterator<Item = Point>) -> Option<Self> {
        points.into_iter().fold(None, |acc, p| {
            Some(match acc {
                None => Aabb { min: p, max: p },
                Some(b) => b.union(&Aabb { min: p, max: p }),
            })
        })
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    pub fn expanded(&self, margin: f64) -> Aabb {
        Aabb {
            min: Point::new(self.min.x - margin, self.min.y - margin),
            max: Point::new(self.max.x + margin, self.max.y + margin),
        }
    }
}

/// Where a ray or segment crossed a wall.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    pub point: Point,
    /// Parameter along the first segment, in `[0, 1]`.
    pub t: f64,
}

/// Parametric intersection of segments `a1→a2` and `b1→b2`.
///
/// Parallel and collinear segments report no intersection.
pub fn segment_intersection(a1: Point, a2: Point, b1: Point, b2: Point) -> Option<Intersection> {
    let r = a2 - a1;
    let s = b2 - b1;
    let denom = r.cross(s);
    if denom.abs() < PARALLEL_EPSILON {
        return None;
    }

    let qp = b1 - a1;
    let t = qp.cross(s) / denom;
    let u = qp.cross(r) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(Intersection {
            point: a1 + r * t,
            t,
        })
    } else {
        None
    }
}

/// Casts a ray of length `max_dist` from `origin` along the unit vector
/// `direction` and returns the hit point and its distance.
pub fn ray_segment_intersection(
    origin: Point,
    direction: Point,
    max_dist: f64,
    segment: &Segment,
) -> Option<(Point, f64)> {
    let end = origin + direction * max_dist;
    segment_intersection(origin, end, segment.p1, segment.p2).map(|hit| (hit.point, hit.t * max_dist))
}

/// Nearest hit of a ray against a set of segments.
pub fn nearest_hit<'a>(
    origin: Point,
    direction: Point,
    max_dist: f64,
    segments: impl IntoIterator<Item = &'a Segment>,
) -> Option<(Point, f64)> {
    segments
        .into_iter()
        .filter_map(|seg| ray_segment_intersection(origin, direction, max_dist, seg))
        .fold(None, |best, hit| match best {
            Some((_, d)) if d <= hit.1 => best,
            _ => Some(hit),
        })
}

/// Whether any edge of the closed polygon crosses `segment`.
pub fn polygon_intersects_segment(polygon: &[Point], segment: &Segment) -> bool {
    let n = polygon.len();
    (0..n).any(|i| {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        segment_intersection(a, b, segment.p1, segment.p2).is_some()
    })
}

/// Projection of `p` onto segment `a→b`, clamped to the segment.
///
/// Returns the projected point and its parameter `t ∈ [0, 1]`.
pub fn closest_point_on_segment(p: Point, a: Point, b: Point) -> (Point, f64) {
    let ab = b - a;
    let len_sq = ab.dot(ab);
    if len_sq == 0.0 {
        return (a, 0.0);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (a + ab * t, t)
}

/// Wraps an angle into `(-π, π]`.
pub fn normalize_angle(angle: f64) -> f64 {
    use std::f64::consts::{PI, TAU};

    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

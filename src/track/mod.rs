//! # Track
//!
//! A closed race track: a Catmull-Rom centerline, inner and outer walls
//! offset by half the track width, the wall segments indexed in a
//! [`SpatialGrid`], and a cumulative arc-length table used as the fitness
//! coordinate.
//!
//! ## Example
//!
//! ```rust
//! use neurorace::geometry::Point;
//! use neurorace::track::{Track, TrackOptions};
//!
//! let track = Track::oval(Point::new(400.0, 300.0), 300.0, 200.0, 16, TrackOptions::default())?;
//! let closest = track.get_closest_point_on_centerline(track.start_position());
//! assert!(closest.distance < 1e-6);
//! assert!(track.get_total_length() > 0.0);
//! # Ok::<(), neurorace::error::RaceError>(())
//! ```
pub mod spline;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{RaceError, Result};
use crate::geometry::{
    closest_point_on_segment, normalize_angle, spatial_grid::DEFAULT_CELL_SIZE, Point, Segment,
    SpatialGrid,
};
use crate::rng::RandomNumberGenerator;

pub use spline::{closed_catmull_rom, mirror_waypoints};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackOptions {
    /// Distance between the inner and the outer wall.
    pub track_width: f64,
    /// Centerline samples generated between two consecutive waypoints.
    pub samples_per_segment: usize,
    pub grid_cell_size: f64,
    /// Seam tangent mismatch (radians) above which a warning is logged.
    pub seam_warn_threshold: f64,
}

impl Default for TrackOptions {
    fn default() -> Self {
        Self {
            track_width: 80.0,
            samples_per_segment: 20,
            grid_cell_size: DEFAULT_CELL_SIZE,
            seam_warn_threshold: 0.2,
        }
    }
}

/// Result of a centerline projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPoint {
    pub point: Point,
    /// Arc length from the start index to `point`, in `[0, total_length)`.
    pub distance: f64,
    /// Index of the centerline segment `point` lies on.
    pub segment_index: usize,
}

/// How smoothly the centerline closes on itself at index 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeamContinuity {
    /// Angle between the incoming and outgoing tangents, radians.
    pub tangent_angle_diff: f64,
    /// Absolute curvature difference between the two sides of the seam.
    pub curvature_diff: f64,
}

#[derive(Debug, Clone)]
pub struct Track {
    centerline: Vec<Point>,
    inner_wall: Vec<Point>,
    outer_wall: Vec<Point>,
    cumulative_lengths: Vec<f64>,
    grid: SpatialGrid,
    start_index: usize,
    start_position: Point,
    start_angle: f64,
    options: TrackOptions,
}

impl Track {
    /// Builds a track whose centerline is a closed spline through `waypoints`.
    ///
    /// # Errors
    ///
    /// Fails with a configuration error for fewer than three waypoints, a
    /// non-positive width, or non-finite coordinates.
    pub fn new(waypoints: &[Point], options: TrackOptions) -> Result<Self> {
        if waypoints.len() < 3 {
            return Err(RaceError::Configuration(format!(
                "a closed track needs at least 3 waypoints, got {}",
                waypoints.len()
            )));
        }
        if !(options.track_width.is_finite() && options.track_width > 0.0) {
            return Err(RaceError::Configuration(format!(
                "track width must be positive, got {}",
                options.track_width
            )));
        }
        if waypoints.iter().any(|p| !p.is_finite()) {
            return Err(RaceError::InvalidNumericValue(
                "waypoint with non-finite coordinates".to_string(),
            ));
        }

        let centerline = closed_catmull_rom(waypoints, options.samples_per_segment);
        Self::from_centerline(centerline, options)
    }

    /// Builds a left/right symmetric track from one half of its waypoints.
    pub fn mirrored(half: &[Point], axis_x: f64, options: TrackOptions) -> Result<Self> {
        Self::new(&mirror_waypoints(half, axis_x), options)
    }

    /// Elliptical track with `waypoint_count` evenly spaced waypoints.
    pub fn oval(
        center: Point,
        radius_x: f64,
        radius_y: f64,
        waypoint_count: usize,
        options: TrackOptions,
    ) -> Result<Self> {
        let waypoints: Vec<Point> = (0..waypoint_count)
            .map(|i| {
                let theta = std::f64::consts::TAU * i as f64 / waypoint_count as f64;
                Point::new(
                    center.x + radius_x * theta.cos(),
                    center.y + radius_y * theta.sin(),
                )
            })
            .collect();
        Self::new(&waypoints, options)
    }

    fn from_centerline(centerline: Vec<Point>, options: TrackOptions) -> Result<Self> {
        let n = centerline.len();
        let half_width = options.track_width * 0.5;

        // Positive signed area means the left normal points into the loop.
        let signed_area: f64 = (0..n)
            .map(|i| centerline[i].cross(centerline[(i + 1) % n]))
            .sum::<f64>()
            * 0.5;
        let inward = if signed_area >= 0.0 { 1.0 } else { -1.0 };

        let mut inner_wall = Vec::with_capacity(n);
        let mut outer_wall = Vec::with_capacity(n);
        for i in 0..n {
            let tangent = (centerline[(i + 1) % n] - centerline[(i + n - 1) % n]).normalized();
            let normal = tangent.perpendicular() * inward;
            inner_wall.push(centerline[i] + normal * half_width);
            outer_wall.push(centerline[i] - normal * half_width);
        }

        let wall_segments: Vec<Segment> = [&inner_wall, &outer_wall]
            .into_iter()
            .flat_map(|wall| (0..n).map(move |i| Segment::new(wall[i], wall[(i + 1) % n])))
            .collect();
        let grid = SpatialGrid::new(wall_segments, options.grid_cell_size)?;

        let mut cumulative_lengths = Vec::with_capacity(n + 1);
        cumulative_lengths.push(0.0);
        for i in 1..=n {
            let prev = cumulative_lengths[i - 1];
            cumulative_lengths.push(prev + centerline[i - 1].distance(centerline[i % n]));
        }

        let mut track = Self {
            centerline,
            inner_wall,
            outer_wall,
            cumulative_lengths,
            grid,
            start_index: 0,
            start_position: Point::default(),
            start_angle: 0.0,
            options,
        };
        track.set_start_index(0);

        let seam = track.seam_continuity();
        debug!(
            points = n,
            length = track.get_total_length(),
            tangent_diff = seam.tangent_angle_diff,
            curvature_diff = seam.curvature_diff,
            "built track"
        );
        if seam.tangent_angle_diff > track.options.seam_warn_threshold {
            warn!(
                tangent_diff = seam.tangent_angle_diff,
                "track centerline has a visible kink at its seam"
            );
        }

        Ok(track)
    }

    pub fn centerline(&self) -> &[Point] {
        &self.centerline
    }

    pub fn inner_wall(&self) -> &[Point] {
        &self.inner_wall
    }

    pub fn outer_wall(&self) -> &[Point] {
        &self.outer_wall
    }

    pub fn wall_segments(&self) -> &[Segment] {
        self.grid.segments()
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    /// `centerline.len() + 1` entries; the last one closes the loop.
    pub fn cumulative_lengths(&self) -> &[f64] {
        &self.cumulative_lengths
    }

    pub fn start_index(&self) -> usize {
        self.start_index
    }

    pub fn start_position(&self) -> Point {
        self.start_position
    }

    pub fn start_angle(&self) -> f64 {
        self.start_angle
    }

    pub fn options(&self) -> &TrackOptions {
        &self.options
    }

    pub fn get_total_length(&self) -> f64 {
        self.cumulative_lengths.last().copied().unwrap_or(0.0)
    }

    /// Projects `position` onto the centerline, wrap-around segment included.
    pub fn get_closest_point_on_centerline(&self, position: Point) -> ClosestPoint {
        let n = self.centerline.len();
        let mut best = ClosestPoint {
            point: self.centerline[0],
            distance: 0.0,
            segment_index: 0,
        };
        let mut best_dist_sq = f64::INFINITY;
        let mut best_raw = 0.0;

        for i in 0..n {
            let a = self.centerline[i];
            let b = self.centerline[(i + 1) % n];
            let (point, t) = closest_point_on_segment(position, a, b);
            let dist_sq = point.distance_sq(position);
            if dist_sq < best_dist_sq {
                best_dist_sq = dist_sq;
                best.point = point;
                best.segment_index = i;
                best_raw = self.cumulative_lengths[i] + t * a.distance(b);
            }
        }

        let total = self.get_total_length();
        if total > 0.0 {
            best.distance =
                (best_raw - self.cumulative_lengths[self.start_index]).rem_euclid(total);
        }
        best
    }

    /// Moves the start/finish line to the centerline index whose cumulative
    /// length is nearest to `ratio` of the total length.
    pub fn set_start_ratio(&mut self, ratio: f64) {
        let target = ratio.rem_euclid(1.0) * self.get_total_length();
        let n = self.centerline.len();
        let index = (0..n)
            .min_by(|&a, &b| {
                let da = (self.cumulative_lengths[a] - target).abs();
                let db = (self.cumulative_lengths[b] - target).abs();
                da.total_cmp(&db)
            })
            .unwrap_or(0);
        self.set_start_index(index);
    }

    /// Relocates the start/finish line to a random point of the centerline.
    pub fn randomize_start_position(&mut self, rng: &mut RandomNumberGenerator) {
        let ratio = rng.next_f64();
        self.set_start_ratio(ratio);
    }

    fn set_start_index(&mut self, index: usize) {
        let n = self.centerline.len();
        self.start_index = index % n;
        self.start_position = self.centerline[self.start_index];
        let next = self.centerline[(self.start_index + 1) % n];
        let dir = next - self.start_position;
        self.start_angle = dir.y.atan2(dir.x);
    }

    /// Tangent and curvature mismatch where the centerline closes.
    ///
    /// Diagnostic only; a kink at the seam does not make the track invalid.
    pub fn seam_continuity(&self) -> SeamContinuity {
        let n = self.centerline.len();
        let heading = |i: usize| {
            let d = self.centerline[(i + 1) % n] - self.centerline[i % n];
            d.y.atan2(d.x)
        };
        let curvature = |i: usize| {
            let turn = normalize_angle(heading(i) - heading(i + n - 1));
            let len = self.centerline[(i + 1) % n].distance(self.centerline[(i + n - 1) % n]) * 0.5;
            if len > 0.0 {
                turn / len
            } else {
                0.0
            }
        };

        SeamContinuity {
            tangent_angle_diff: normalize_angle(heading(0) - heading(n - 1)).abs(),
            curvature_diff: (curvature(0) - curvature(n - 1)).abs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oval() -> Track {
        Track::oval(
            Point::new(500.0, 400.0),
            300.0,
            200.0,
            12,
            TrackOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_too_few_waypoints() {
        let result = Track::new(
            &[Point::new(0.0, 0.0), Point::new(1.0, 1.0)],
            TrackOptions::default(),
        );
        assert!(matches!(result, Err(RaceError::Configuration(_))));
    }

    #[test]
    fn test_cumulative_lengths() {
        let track = oval();
        let lengths = track.cumulative_lengths();
        assert_eq!(lengths.len(), track.centerline().len() + 1);
        assert_eq!(lengths[0], 0.0);
        assert!(lengths.windows(2).all(|w| w[1] >= w[0]));
        assert_eq!(track.get_total_length(), *lengths.last().unwrap());
        // Ellipse perimeter by Ramanujan's approximation.
        let (a, b) = (300.0_f64, 200.0_f64);
        let h = ((a - b) / (a + b)).powi(2);
        let perimeter =
            std::f64::consts::PI * (a + b) * (1.0 + 3.0 * h / (10.0 + (4.0 - 3.0 * h).sqrt()));
        assert!((track.get_total_length() - perimeter).abs() / perimeter < 0.02);
    }

    #[test]
    fn test_walls_are_offset_by_half_width() {
        let track = oval();
        for i in 0..track.centerline().len() {
            let c = track.centerline()[i];
            assert!((track.inner_wall()[i].distance(c) - 40.0).abs() < 1e-6);
            assert!((track.outer_wall()[i].distance(c) - 40.0).abs() < 1e-6);
            // Inner wall sits closer to the center of the ellipse.
            let center = Point::new(500.0, 400.0);
            assert!(track.inner_wall()[i].distance(center) < track.outer_wall()[i].distance(center));
        }
        assert_eq!(track.wall_segments().len(), 2 * track.centerline().len());
    }

    #[test]
    fn test_closest_point_distance_is_arc_length() {
        let track = oval();
        let idx = track.centerline().len() / 4;
        let closest = track.get_closest_point_on_centerline(track.centerline()[idx]);
        assert!((closest.distance - track.cumulative_lengths()[idx]).abs() < 1e-6);
    }

    #[test]
    fn test_closest_point_on_wrap_segment() {
        let track = oval();
        let n = track.centerline().len();
        let a = track.centerline()[n - 1];
        let b = track.centerline()[0];
        let mid = (a + b) * 0.5;
        let closest = track.get_closest_point_on_centerline(mid);
        assert_eq!(closest.segment_index, n - 1);
        let expected = track.cumulative_lengths()[n - 1] + a.distance(b) * 0.5;
        assert!((closest.distance - expected).abs() < 1e-6);
    }

    #[test]
    fn test_start_ratio_shifts_distance_origin() {
        let mut track = oval();
        track.set_start_ratio(0.5);
        let closest = track.get_closest_point_on_centerline(track.start_position());
        assert!(closest.distance < 1e-6 || (track.get_total_length() - closest.distance) < 1e-6);
        let start = track.cumulative_lengths()[track.start_index()];
        assert!((start / track.get_total_length() - 0.5).abs() < 0.02);
    }

    #[test]
    fn test_randomize_start_is_seeded() {
        let mut a = oval();
        let mut b = oval();
        a.randomize_start_position(&mut RandomNumberGenerator::from_seed(5));
        b.randomize_start_position(&mut RandomNumberGenerator::from_seed(5));
        assert_eq!(a.start_index(), b.start_index());
    }

    #[test]
    fn test_smooth_oval_seam() {
        let seam = oval().seam_continuity();
        assert!(seam.tangent_angle_diff < 0.1);
    }

    #[test]
    fn test_mirrored_track_is_symmetric() {
        let half = vec![
            Point::new(500.0, 100.0),
            Point::new(800.0, 150.0),
            Point::new(900.0, 400.0),
            Point::new(800.0, 650.0),
            Point::new(500.0, 700.0),
        ];
        let track = Track::mirrored(&half, 500.0, TrackOptions::default()).unwrap();
        let total = track.get_total_length();
        assert!(total > 0.0);
        let min_x = track.centerline().iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let max_x = track.centerline().iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        assert!(((500.0 - min_x) - (max_x - 500.0)).abs() < 1.0);
    }
}

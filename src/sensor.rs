//! # RayCaster
//!
//! Distance sensors for a car: a fixed fan of rays at configured angles
//! relative to the heading, each cast against the track walls. Distances are
//! normalized so that `0` means "far or no hit" and `1` means "touching".
//!
//! ## Example
//!
//! ```rust
//! use neurorace::geometry::{Point, Segment};
//! use neurorace::sensor::{RayCaster, SensorOptions};
//!
//! let caster = RayCaster::new(SensorOptions::default())?;
//! let wall = [Segment::new(Point::new(100.0, -500.0), Point::new(100.0, 500.0))];
//! let reading = caster.cast_rays(Point::default(), 0.0, &wall);
//! let forward = reading.distances[caster.forward_index().unwrap()];
//! assert!((forward - 0.5).abs() < 1e-9);
//! # Ok::<(), neurorace::error::RaceError>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{RaceError, Result};
use crate::geometry::{nearest_hit, Point, Segment, SpatialGrid};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorOptions {
    /// Ray angles relative to the heading, in degrees. Negative is left.
    pub ray_angles_deg: Vec<f64>,
    /// Length of every cast ray.
    pub ray_length: f64,
    /// Hit distance that maps to a normalized reading of `0`.
    pub normalize_distance: f64,
}

impl Default for SensorOptions {
    fn default() -> Self {
        Self {
            ray_angles_deg: vec![-90.0, -60.0, -35.0, -15.0, 0.0, 15.0, 35.0, 60.0, 90.0],
            ray_length: 1000.0,
            normalize_distance: 200.0,
        }
    }
}

/// The last sensor sample of a car.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorReading {
    /// Normalized distances, one per ray.
    pub distances: Vec<f64>,
    /// Raw hit points, `None` when a ray hit nothing.
    pub hit_points: Vec<Option<Point>>,
}

/// Forward ray plus mirrored left/right pairs, for differential inputs.
#[derive(Debug, Clone, PartialEq)]
struct DifferentialLayout {
    forward: usize,
    pairs: Vec<(usize, usize)>,
}

#[derive(Debug, Clone)]
pub struct RayCaster {
    angles: Vec<f64>,
    ray_length: f64,
    normalize_distance: f64,
    layout: Option<DifferentialLayout>,
}

impl RayCaster {
    /// # Errors
    ///
    /// Returns a configuration error for an empty ray fan or non-positive
    /// lengths.
    pub fn new(options: SensorOptions) -> Result<Self> {
        if options.ray_angles_deg.is_empty() {
            return Err(RaceError::Configuration(
                "at least one sensor ray is required".to_string(),
            ));
        }
        if !(options.ray_length > 0.0 && options.normalize_distance > 0.0) {
            return Err(RaceError::Configuration(
                "ray length and normalize distance must be positive".to_string(),
            ));
        }

        let angles: Vec<f64> = options
            .ray_angles_deg
            .iter()
            .map(|deg| deg.to_radians())
            .collect();

        Ok(Self {
            layout: differential_layout(&options.ray_angles_deg),
            angles,
            ray_length: options.ray_length,
            normalize_distance: options.normalize_distance,
        })
    }

    pub fn ray_count(&self) -> usize {
        self.angles.len()
    }

    /// Index of the straight-ahead ray, if the fan has one.
    pub fn forward_index(&self) -> Option<usize> {
        self.layout.as_ref().map(|l| l.forward)
    }

    /// Width of the differential input vector, if the fan supports it.
    pub fn differential_width(&self) -> Option<usize> {
        self.layout.as_ref().map(|l| 1 + l.pairs.len())
    }

    /// Casts every ray against `walls` (brute force).
    pub fn cast_rays(&self, origin: Point, heading: f64, walls: &[Segment]) -> SensorReading {
        self.cast_with(origin, heading, |_, _| walls.iter().collect())
    }

    /// Casts every ray against the grid-filtered wall candidates.
    pub fn cast_rays_indexed(&self, origin: Point, heading: f64, grid: &SpatialGrid) -> SensorReading {
        self.cast_with(origin, heading, |o, dir| grid.query_ray(o, dir, self.ray_length))
    }

    fn cast_with<'a, F>(&self, origin: Point, heading: f64, candidates: F) -> SensorReading
    where
        F: Fn(Point, Point) -> Vec<&'a Segment>,
    {
        let mut reading = SensorReading {
            distances: Vec::with_capacity(self.angles.len()),
            hit_points: Vec::with_capacity(self.angles.len()),
        };

        for &relative in &self.angles {
            let direction = Point::from_angle(heading + relative);
            let walls = candidates(origin, direction);
            match nearest_hit(origin, direction, self.ray_length, walls) {
                Some((point, dist)) => {
                    reading
                        .distances
                        .push(1.0 - (dist / self.normalize_distance).min(1.0));
                    reading.hit_points.push(Some(point));
                }
                None => {
                    reading.distances.push(0.0);
                    reading.hit_points.push(None);
                }
            }
        }

        reading
    }

    /// Forward reading followed by `left - right` for every mirrored pair.
    ///
    /// # Errors
    ///
    /// Fails if the ray fan has no forward ray or is not symmetric, or if
    /// `distances` does not match the ray count.
    pub fn differential_input(&self, distances: &[f64]) -> Result<Vec<f64>> {
        let layout = self.layout.as_ref().ok_or_else(|| {
            RaceError::Configuration(
                "differential inputs need a forward ray and symmetric ray pairs".to_string(),
            )
        })?;
        if distances.len() != self.angles.len() {
            return Err(RaceError::InputSize {
                expected: self.angles.len(),
                actual: distances.len(),
            });
        }

        let mut input = Vec::with_capacity(1 + layout.pairs.len());
        input.push(distances[layout.forward]);
        input.extend(
            layout
                .pairs
                .iter()
                .map(|&(left, right)| distances[left] - distances[right]),
        );
        Ok(input)
    }
}

fn differential_layout(angles_deg: &[f64]) -> Option<DifferentialLayout> {
    const SAME_ANGLE: f64 = 1e-6;

    let forward = angles_deg.iter().position(|a| a.abs() < SAME_ANGLE)?;
    let mut pairs = Vec::new();
    for (left, &angle) in angles_deg.iter().enumerate() {
        if angle >= -SAME_ANGLE {
            continue;
        }
        let right = angles_deg
            .iter()
            .position(|&other| (other + angle).abs() < SAME_ANGLE)?;
        pairs.push((left, right));
    }
    let paired_rays = 1 + 2 * pairs.len();
    (paired_rays == angles_deg.len()).then_some(DifferentialLayout { forward, pairs })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn box_walls(half: f64) -> Vec<Segment> {
        let c = [
            Point::new(-half, -half),
            Point::new(half, -half),
            Point::new(half, half),
            Point::new(-half, half),
        ];
        (0..4).map(|i| Segment::new(c[i], c[(i + 1) % 4])).collect()
    }

    #[test]
    fn test_rejects_empty_fan() {
        let options = SensorOptions {
            ray_angles_deg: Vec::new(),
            ..SensorOptions::default()
        };
        assert!(RayCaster::new(options).is_err());
    }

    #[test]
    fn test_every_ray_hits_a_closed_box() {
        let caster = RayCaster::new(SensorOptions::default()).unwrap();
        let reading = caster.cast_rays(Point::default(), 0.3, &box_walls(100.0));
        assert_eq!(reading.distances.len(), 9);
        assert!(reading.hit_points.iter().all(|h| h.is_some()));
        assert!(reading.distances.iter().all(|d| (0.0..=1.0).contains(d)));
    }

    #[test]
    fn test_no_walls_reads_zero() {
        let caster = RayCaster::new(SensorOptions::default()).unwrap();
        let reading = caster.cast_rays(Point::default(), 0.0, &[]);
        assert!(reading.distances.iter().all(|&d| d == 0.0));
        assert!(reading.hit_points.iter().all(|h| h.is_none()));
    }

    #[test]
    fn test_far_wall_clamps_to_zero() {
        let caster = RayCaster::new(SensorOptions::default()).unwrap();
        let reading = caster.cast_rays(Point::default(), 0.0, &box_walls(500.0));
        let forward = caster.forward_index().unwrap();
        assert_eq!(reading.distances[forward], 0.0);
        assert!(reading.hit_points[forward].is_some());
    }

    #[test]
    fn test_indexed_matches_brute_force() {
        let walls = box_walls(150.0);
        let grid = SpatialGrid::new(walls.clone(), 40.0).unwrap();
        let caster = RayCaster::new(SensorOptions::default()).unwrap();
        let origin = Point::new(20.0, -35.0);
        let brute = caster.cast_rays(origin, 1.1, &walls);
        let indexed = caster.cast_rays_indexed(origin, 1.1, &grid);
        assert_eq!(brute, indexed);
    }

    #[test]
    fn test_differential_input() {
        let caster = RayCaster::new(SensorOptions::default()).unwrap();
        assert_eq!(caster.differential_width(), Some(5));
        let distances = [0.9, 0.7, 0.5, 0.3, 0.1, 0.2, 0.4, 0.6, 0.8];
        let input = caster.differential_input(&distances).unwrap();
        assert_eq!(input.len(), 5);
        assert_eq!(input[0], 0.1);
        assert!((input[1] - (0.9 - 0.8)).abs() < 1e-12);
        assert!((input[4] - (0.3 - 0.2)).abs() < 1e-12);
    }

    #[test]
    fn test_asymmetric_fan_has_no_differential_layout() {
        let caster = RayCaster::new(SensorOptions {
            ray_angles_deg: vec![-30.0, 0.0, 45.0],
            ..SensorOptions::default()
        })
        .unwrap();
        assert!(caster.differential_width().is_none());
        assert!(caster.differential_input(&[0.0, 0.0, 0.0]).is_err());
    }
}

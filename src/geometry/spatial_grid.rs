//! # SpatialGrid
//!
//! Uniform-grid index over a fixed set of wall segments. Each segment is
//! bucketed into every cell its bounding box overlaps, so a query only has to
//! gather the cells overlapping its own bounding box. Results are a
//! conservative superset of the segments that can touch the query; a segment
//! that truly intersects is never omitted.
//!
//! The grid is immutable after construction. A new track means a new grid.

use super::{Aabb, Point, Segment};
use crate::error::{RaceError, Result};

/// Default edge length of a grid cell, in world units.
pub const DEFAULT_CELL_SIZE: f64 = 50.0;

#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f64,
    origin: Point,
    cols: usize,
    rows: usize,
    cells: Vec<Vec<usize>>,
    segments: Vec<Segment>,
}

impl SpatialGrid {
    /// Builds the grid over `segments`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `cell_size` is not a positive finite
    /// number or a segment has non-finite coordinates.
    pub fn new(segments: Vec<Segment>, cell_size: f64) -> Result<Self> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(RaceError::Configuration(format!(
                "grid cell size must be positive, got {}",
                cell_size
            )));
        }
        if segments.iter().any(|s| !s.p1.is_finite() || !s.p2.is_finite()) {
            return Err(RaceError::InvalidNumericValue(
                "wall segment with non-finite coordinates".to_string(),
            ));
        }

        // One cell of padding on every side.
        let bounds = Aabb::enclosing(segments.iter().flat_map(|s| [s.p1, s.p2]))
            .unwrap_or(Aabb::around(Point::default(), 0.0))
            .expanded(cell_size);
        let cols = (((bounds.max.x - bounds.min.x) / cell_size).ceil() as usize).max(1);
        let rows = (((bounds.max.y - bounds.min.y) / cell_size).ceil() as usize).max(1);

        let mut grid = Self {
            cell_size,
            origin: bounds.min,
            cols,
            rows,
            cells: vec![Vec::new(); cols * rows],
            segments,
        };

        for idx in 0..grid.segments.len() {
            let bounds = grid.segments[idx].bounds();
            if let Some((c0, c1, r0, r1)) = grid.cell_range(&bounds) {
                for row in r0..=r1 {
                    for col in c0..=c1 {
                        grid.cells[row * cols + col].push(idx);
                    }
                }
            }
        }

        Ok(grid)
    }

    /// All indexed segments, in insertion order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// `(cols, rows)` of the grid.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    /// Segments possibly hit by a ray of length `max_dist` from `origin`
    /// along the unit vector `direction`.
    pub fn query_ray(&self, origin: Point, direction: Point, max_dist: f64) -> Vec<&Segment> {
        let end = origin + direction * max_dist;
        let bounds = Aabb::from_points(origin, end).expanded(self.cell_size * 0.5);
        self.query_aabb(&bounds)
    }

    /// Segments possibly within `radius` of `point`.
    pub fn query_point(&self, point: Point, radius: f64) -> Vec<&Segment> {
        self.query_aabb(&Aabb::around(point, radius.max(0.0)))
    }

    /// Segments whose cells overlap `bounds`.
    pub fn query_aabb(&self, bounds: &Aabb) -> Vec<&Segment> {
        self.query_indices(bounds)
            .into_iter()
            .map(|idx| &self.segments[idx])
            .collect()
    }

    /// De-duplicated segment indices whose cells overlap `bounds`.
    pub fn query_indices(&self, bounds: &Aabb) -> Vec<usize> {
        let Some((c0, c1, r0, r1)) = self.cell_range(bounds) else {
            return Vec::new();
        };

        let mut found = Vec::new();
        for row in r0..=r1 {
            for col in c0..=c1 {
                found.extend_from_slice(&self.cells[row * self.cols + col]);
            }
        }
        found.sort_unstable();
        found.dedup();
        found
    }

    /// Inclusive `(col_min, col_max, row_min, row_max)` overlapped by
    /// `bounds`, or `None` if the box lies entirely outside the grid.
    fn cell_range(&self, bounds: &Aabb) -> Option<(usize, usize, usize, usize)> {
        if !(bounds.min.is_finite() && bounds.max.is_finite()) {
            // Degenerate query; fall back to every cell.
            return Some((0, self.cols - 1, 0, self.rows - 1));
        }

        let to_cell = |v: f64, o: f64| ((v - o) / self.cell_size).floor() as i64;
        let c0 = to_cell(bounds.min.x, self.origin.x);
        let c1 = to_cell(bounds.max.x, self.origin.x);
        let r0 = to_cell(bounds.min.y, self.origin.y);
        let r1 = to_cell(bounds.max.y, self.origin.y);

        let cols = self.cols as i64;
        let rows = self.rows as i64;
        if c1 < 0 || r1 < 0 || c0 >= cols || r0 >= rows {
            return None;
        }

        Some((
            c0.clamp(0, cols - 1) as usize,
            c1.clamp(0, cols - 1) as usize,
            r0.clamp(0, rows - 1) as usize,
            r1.clamp(0, rows - 1) as usize,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_walls() -> Vec<Segment> {
        let corners = [
            Point::new(0.0, 0.0),
            Point::new(400.0, 0.0),
            Point::new(400.0, 400.0),
            Point::new(0.0, 400.0),
        ];
        (0..4)
            .map(|i| Segment::new(corners[i], corners[(i + 1) % 4]))
            .collect()
    }

    #[test]
    fn test_rejects_bad_cell_size() {
        assert!(SpatialGrid::new(square_walls(), 0.0).is_err());
        assert!(SpatialGrid::new(square_walls(), f64::NAN).is_err());
    }

    #[test]
    fn test_point_query_near_wall() {
        let grid = SpatialGrid::new(square_walls(), 50.0).unwrap();
        let near_left = grid.query_point(Point::new(10.0, 200.0), 5.0);
        assert!(near_left
            .iter()
            .any(|s| s.p1 == Point::new(0.0, 400.0) && s.p2 == Point::new(0.0, 0.0)));
        let center = grid.query_point(Point::new(200.0, 200.0), 5.0);
        assert!(center.is_empty());
    }

    #[test]
    fn test_results_are_deduplicated() {
        let grid = SpatialGrid::new(square_walls(), 50.0).unwrap();
        let all = grid.query_aabb(&Aabb::around(Point::new(200.0, 200.0), 1000.0));
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_query_outside_grid_is_empty() {
        let grid = SpatialGrid::new(square_walls(), 50.0).unwrap();
        assert!(grid
            .query_point(Point::new(5000.0, 5000.0), 1.0)
            .is_empty());
    }

    #[test]
    fn test_ray_query_contains_hit_wall() {
        let grid = SpatialGrid::new(square_walls(), 50.0).unwrap();
        let candidates = grid.query_ray(Point::new(200.0, 200.0), Point::new(1.0, 0.0), 1000.0);
        assert!(candidates.iter().any(|s| s.p1.x == 400.0 && s.p2.x == 400.0));
    }

    #[test]
    fn test_empty_grid() {
        let grid = SpatialGrid::new(Vec::new(), 50.0).unwrap();
        assert!(grid.query_point(Point::default(), 10.0).is_empty());
        assert_eq!(grid.dimensions(), (2, 2));
    }
}

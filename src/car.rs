//! # Car
//!
//! One driving agent. Each tick a live car samples its distance sensors,
//! feeds them to its brain, integrates a constant-speed steering model,
//! checks its body against the walls, and advances its fitness along the
//! track centerline. A car that dies stays dead.
//!
//! ## Fitness
//!
//! `signed_fitness` accumulates wrap-corrected centerline progress and can
//! exceed one lap or go negative. `max_distance_reached` is its running
//! maximum and is what the genetic algorithm ranks by.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::Result;
use crate::evolution::species::SpeciesId;
use crate::geometry::{normalize_angle, polygon_intersects_segment, Aabb, Point, Segment, SpatialGrid};
use crate::network::{NeuralInput, NeuralNetwork};
use crate::sensor::{RayCaster, SensorReading};
use crate::track::Track;

/// How sensor distances are turned into network inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputModification {
    /// Raw normalized distances, one per ray.
    #[default]
    Direct,
    /// Forward ray plus `left - right` for every mirrored ray pair.
    Differential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarPhysics {
    /// Constant forward speed, world units per second.
    pub speed: f64,
    pub steering_sensitivity: f64,
    pub length: f64,
    pub width: f64,
    /// Frames between two "went backwards" checks.
    pub progress_check_interval: u32,
    /// Frames after which a car must have made `min_progress_ratio` of a lap.
    pub min_progress_frames: u32,
    pub min_progress_ratio: f64,
}

impl Default for CarPhysics {
    fn default() -> Self {
        Self {
            speed: 150.0,
            steering_sensitivity: 0.02,
            length: 20.0,
            width: 10.0,
            progress_check_interval: 30,
            min_progress_frames: 60,
            min_progress_ratio: 0.01,
        }
    }
}

/// Which wall set a car collides with and senses.
#[derive(Debug, Clone, Copy)]
pub enum WallSource<'a> {
    /// Grid-filtered candidates from the track's spatial index.
    Indexed(&'a SpatialGrid),
    /// An explicit segment list, scanned in full.
    Segments(&'a [Segment]),
}

/// Everything a car needs from the world to advance one tick.
#[derive(Debug, Clone, Copy)]
pub struct DriveContext<'a> {
    pub track: &'a Track,
    pub walls: WallSource<'a>,
    pub sensors: &'a RayCaster,
    pub physics: &'a CarPhysics,
}

impl<'a> DriveContext<'a> {
    /// Context sensing and colliding with the track's own indexed walls.
    pub fn new(track: &'a Track, sensors: &'a RayCaster, physics: &'a CarPhysics) -> Self {
        Self {
            track,
            walls: WallSource::Indexed(track.grid()),
            sensors,
            physics,
        }
    }

    /// Replaces the wall set, keeping the track for fitness.
    pub fn with_walls(mut self, walls: &'a [Segment]) -> Self {
        self.walls = WallSource::Segments(walls);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Car {
    pub x: f64,
    pub y: f64,
    /// Heading in radians, kept in `(-π, π]`.
    pub angle: f64,
    /// Mirrors [`CarPhysics::speed`] of the last update.
    pub speed: f64,
    pub alive: bool,
    pub frame_count: u32,

    pub signed_fitness: f64,
    pub max_distance_reached: f64,
    pub last_centerline_distance: f64,
    pub starting_distance: f64,
    pub current_progress_ratio: f64,
    pub previous_progress_ratio: f64,
    fitness_initialized: bool,

    pub brain: NeuralNetwork,
    pub species_id: SpeciesId,
    pub input_modification: InputModification,
    /// Above `1.0` marks the unmutated elite of a generation.
    pub size_multiplier: f64,

    pub last_sensors: SensorReading,
    pub last_closest_point: Option<Point>,
}

impl Car {
    pub fn new(
        position: Point,
        angle: f64,
        brain: NeuralNetwork,
        species_id: SpeciesId,
        input_modification: InputModification,
    ) -> Self {
        Self {
            x: position.x,
            y: position.y,
            angle: normalize_angle(angle),
            speed: CarPhysics::default().speed,
            alive: true,
            frame_count: 0,
            signed_fitness: 0.0,
            max_distance_reached: 0.0,
            last_centerline_distance: 0.0,
            starting_distance: 0.0,
            current_progress_ratio: 0.0,
            previous_progress_ratio: 0.0,
            fitness_initialized: false,
            brain,
            species_id,
            input_modification,
            size_multiplier: 1.0,
            last_sensors: SensorReading::default(),
            last_closest_point: None,
        }
    }

    pub fn with_size_multiplier(mut self, size_multiplier: f64) -> Self {
        self.size_multiplier = size_multiplier;
        self
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn is_elite(&self) -> bool {
        self.size_multiplier > 1.0
    }

    /// Advances the car by `dt` seconds. Dead cars are left untouched.
    ///
    /// # Errors
    ///
    /// Propagates contract violations from the brain (input width mismatch)
    /// and from the differential input transform.
    pub fn update(&mut self, dt: f64, ctx: &DriveContext<'_>) -> Result<()> {
        if !self.alive {
            return Ok(());
        }
        self.frame_count += 1;
        self.speed = ctx.physics.speed;

        let origin = self.position();
        let reading = match ctx.walls {
            WallSource::Indexed(grid) => ctx.sensors.cast_rays_indexed(origin, self.angle, grid),
            WallSource::Segments(walls) => ctx.sensors.cast_rays(origin, self.angle, walls),
        };
        let rays = match self.input_modification {
            InputModification::Direct => reading.distances.clone(),
            InputModification::Differential => ctx.sensors.differential_input(&reading.distances)?,
        };
        let output = self.brain.run(&NeuralInput::new(rays))?;
        self.last_sensors = reading;

        let heading = Point::from_angle(self.angle);
        self.x += heading.x * self.speed * dt;
        self.y += heading.y * self.speed * dt;
        self.angle = normalize_angle(
            self.angle + output.direction * self.speed * ctx.physics.steering_sensitivity * dt,
        );
        if self.x.is_nan() || self.y.is_nan() || self.angle.is_nan() {
            trace!(species = %self.species_id, "car state became NaN");
            self.alive = false;
            return Ok(());
        }

        if self.collides(ctx) {
            trace!(species = %self.species_id, frame = self.frame_count, "car hit a wall");
            self.alive = false;
        }

        let closest = ctx.track.get_closest_point_on_centerline(self.position());
        self.last_closest_point = Some(closest.point);
        self.update_signed_fitness(closest.distance, ctx.track.get_total_length());

        let interval = ctx.physics.progress_check_interval.max(1);
        if self.alive && self.frame_count % interval == 0 {
            if self.has_gone_backwards() {
                trace!(species = %self.species_id, frame = self.frame_count, "car stalled or reversed");
                self.alive = false;
            }
            self.previous_progress_ratio = self.current_progress_ratio;
        }
        if self.alive
            && self.has_failed_minimum_progress(
                ctx.physics.min_progress_frames,
                ctx.physics.min_progress_ratio,
            )
        {
            trace!(species = %self.species_id, "car made too little progress");
            self.alive = false;
        }

        Ok(())
    }

    /// Corners of the car body, front-left first, clockwise in screen space.
    pub fn corners(&self, physics: &CarPhysics) -> [Point; 4] {
        let center = self.position();
        let forward = Point::from_angle(self.angle);
        let side = forward.perpendicular();
        let half_len = physics.length * self.size_multiplier * 0.5;
        let half_width = physics.width * self.size_multiplier * 0.5;
        let f = forward * half_len;
        let s = side * half_width;
        [
            center + f - s,
            center + f + s,
            center - f + s,
            center - f - s,
        ]
    }

    fn collides(&self, ctx: &DriveContext<'_>) -> bool {
        let body = self.corners(ctx.physics);
        match ctx.walls {
            WallSource::Indexed(grid) => {
                let Some(bounds) = Aabb::enclosing(body) else {
                    return false;
                };
                grid.query_aabb(&bounds)
                    .into_iter()
                    .any(|wall| polygon_intersects_segment(&body, wall))
            }
            WallSource::Segments(walls) => walls
                .iter()
                .any(|wall| polygon_intersects_segment(&body, wall)),
        }
    }

    /// Advances the wrap-corrected progress along the centerline.
    ///
    /// The first call only records the spawn distance as the baseline.
    pub fn update_signed_fitness(&mut self, current_centerline_distance: f64, track_length: f64) {
        if !self.fitness_initialized {
            self.fitness_initialized = true;
            self.starting_distance = current_centerline_distance;
            self.last_centerline_distance = current_centerline_distance;
            return;
        }
        if track_length <= 0.0 {
            return;
        }

        let mut delta = current_centerline_distance - self.last_centerline_distance;
        if delta > track_length / 2.0 {
            delta -= track_length;
        } else if delta < -track_length / 2.0 {
            delta += track_length;
        }

        self.signed_fitness += delta;
        self.last_centerline_distance = current_centerline_distance;
        self.current_progress_ratio = self.signed_fitness / track_length;
        self.max_distance_reached = self.max_distance_reached.max(self.signed_fitness);
    }

    /// True when progress did not increase since the last check (stalls count).
    pub fn has_gone_backwards(&self) -> bool {
        self.current_progress_ratio <= self.previous_progress_ratio
    }

    pub fn has_failed_minimum_progress(&self, min_frames: u32, min_ratio: f64) -> bool {
        self.frame_count >= min_frames && self.current_progress_ratio < min_ratio
    }

    pub fn has_completed_lap(&self, track_length: f64) -> bool {
        track_length > 0.0 && self.signed_fitness >= track_length
    }
}

//! # Simulation
//!
//! A fixed-timestep driving loop over one shared car population.
//!
//! Each [`Simulation::step`] updates every live car once, in order, then
//! checks every species: when all its cars are dead, or one of them has
//! completed a lap, the species' slice of the population is replaced
//! wholesale by the next generation. Cars of the finished generation move
//! into a bounded buffer of recently dead cars.
//!
//! ## Example
//!
//! ```rust
//! use neurorace::evolution::{EvolutionOptions, GeneticAlgorithm, SpeciesConfig};
//! use neurorace::geometry::Point;
//! use neurorace::network::Activation;
//! use neurorace::simulation::{Simulation, SimulationOptions};
//! use neurorace::track::{Track, TrackOptions};
//!
//! let track = Track::oval(Point::new(0.0, 0.0), 400.0, 250.0, 24, TrackOptions::default())?;
//! let species = vec![SpeciesConfig::new("a", vec![9, 6, 1], Activation::Relu)];
//! let ga = GeneticAlgorithm::new(EvolutionOptions::default(), 1);
//! let options = SimulationOptions { initial_population: 8, ..SimulationOptions::default() };
//!
//! let mut sim = Simulation::new(track, species, ga, options)?;
//! sim.advance(120)?;
//! assert!(sim.elapsed() > 1.9);
//! # Ok::<(), neurorace::error::RaceError>(())
//! ```

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::car::{Car, CarPhysics, DriveContext, InputModification};
use crate::error::{RaceError, Result};
use crate::evolution::mutation::nearness_ratio;
use crate::evolution::{BrainStrategy, EvolveRequest, GeneticAlgorithm, SpeciesConfig, SpeciesId};
use crate::performance::PopulationDecision;
use crate::sensor::{RayCaster, SensorOptions};
use crate::track::Track;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationOptions {
    /// Seconds per physics sub-step.
    pub physics_dt: f64,
    /// Total cars of the first generation, split across species.
    pub initial_population: usize,
    pub brain_strategy: BrainStrategy,
    pub mutation_by_distance: bool,
    pub max_recent_dead: usize,
    pub mutation_rate_index: Option<usize>,
    /// Progress gap to the all-time best at which nearness reaches zero.
    /// `None` disables nearness blending.
    pub nearness_window: Option<f64>,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            physics_dt: 1.0 / 60.0,
            initial_population: 100,
            brain_strategy: BrainStrategy::default(),
            mutation_by_distance: true,
            max_recent_dead: 200,
            mutation_rate_index: None,
            nearness_window: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationEnd {
    Extinct,
    LapCompleted,
}

/// One species moving to its next generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationEvent {
    pub species: SpeciesId,
    pub generation: u32,
    pub end: GenerationEnd,
    pub best_fitness: f64,
    pub duration: f64,
}

#[derive(Debug)]
pub struct Simulation {
    options: SimulationOptions,
    track: Track,
    sensors: RayCaster,
    physics: CarPhysics,
    ga: GeneticAlgorithm,
    species: Vec<SpeciesConfig>,
    cars: Vec<Car>,
    recent_dead: VecDeque<Car>,
    generation_time: BTreeMap<SpeciesId, f64>,
    population_per_type: usize,
    elapsed: f64,
}

impl Simulation {
    /// Builds the loop with default sensors and physics and spawns the first
    /// generation.
    ///
    /// # Errors
    ///
    /// Fails when a species' input width does not fit the sensor layout or
    /// the population cannot be initialized.
    pub fn new(
        track: Track,
        species: Vec<SpeciesConfig>,
        mut ga: GeneticAlgorithm,
        options: SimulationOptions,
    ) -> Result<Self> {
        if !(options.physics_dt > 0.0 && options.physics_dt.is_finite()) {
            return Err(RaceError::Configuration(format!(
                "physics_dt must be positive, got {}",
                options.physics_dt
            )));
        }
        let sensors = RayCaster::new(SensorOptions::default())?;
        check_input_widths(&species, &sensors)?;

        let cars = ga.initialize_population(&track, options.initial_population, &species)?;
        let population_per_type = (options.initial_population / species.len()).max(1);
        let generation_time = species.iter().map(|s| (s.id.clone(), 0.0)).collect();

        Ok(Self {
            options,
            track,
            sensors,
            physics: CarPhysics::default(),
            ga,
            species,
            cars,
            recent_dead: VecDeque::new(),
            generation_time,
            population_per_type,
            elapsed: 0.0,
        })
    }

    /// Replaces the sensor layout.
    ///
    /// # Errors
    ///
    /// Fails when a species' input width does not fit the new layout.
    pub fn with_sensors(mut self, sensors: RayCaster) -> Result<Self> {
        check_input_widths(&self.species, &sensors)?;
        self.sensors = sensors;
        Ok(self)
    }

    pub fn with_physics(mut self, physics: CarPhysics) -> Self {
        self.physics = physics;
        self
    }

    pub fn options(&self) -> &SimulationOptions {
        &self.options
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn cars(&self) -> &[Car] {
        &self.cars
    }

    pub fn recent_dead(&self) -> impl Iterator<Item = &Car> {
        self.recent_dead.iter()
    }

    pub fn species(&self) -> &[SpeciesConfig] {
        &self.species
    }

    pub fn genetic_algorithm(&self) -> &GeneticAlgorithm {
        &self.ga
    }

    pub fn genetic_algorithm_mut(&mut self) -> &mut GeneticAlgorithm {
        &mut self.ga
    }

    pub fn population_per_type(&self) -> usize {
        self.population_per_type
    }

    /// Simulated seconds since construction.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn alive_count(&self) -> usize {
        self.cars.iter().filter(|car| car.alive).count()
    }

    /// Sizes the generations spawned from now on.
    pub fn apply_decision(&mut self, decision: &PopulationDecision) {
        self.population_per_type = decision.population_per_type.max(1);
    }

    /// Runs `steps` physics sub-steps back to back.
    pub fn advance(&mut self, steps: usize) -> Result<Vec<GenerationEvent>> {
        let mut events = Vec::new();
        for _ in 0..steps {
            events.extend(self.step()?);
        }
        Ok(events)
    }

    /// One physics sub-step followed by the generation checks.
    ///
    /// # Errors
    ///
    /// Propagates car update and evolution failures. Cars updated before
    /// the failure keep their new state.
    pub fn step(&mut self) -> Result<Vec<GenerationEvent>> {
        let dt = self.options.physics_dt;
        let ctx = DriveContext::new(&self.track, &self.sensors, &self.physics);
        for car in &mut self.cars {
            if !car.alive {
                continue;
            }
            car.update(dt, &ctx)?;
            if !car.alive {
                trace!(
                    species = %car.species_id,
                    frame = car.frame_count,
                    fitness = car.max_distance_reached,
                    "car died"
                );
            }
        }
        self.elapsed += dt;
        for time in self.generation_time.values_mut() {
            *time += dt;
        }

        let track_length = self.track.get_total_length();
        let mut events = Vec::new();
        for index in 0..self.species.len() {
            let id = &self.species[index].id;
            let mut members = self.cars.iter().filter(|car| car.species_id == *id).peekable();
            if members.peek().is_none() {
                continue;
            }
            let mut any_alive = false;
            let mut lap = false;
            for car in members {
                any_alive |= car.alive;
                lap |= car.alive && car.has_completed_lap(track_length);
            }
            if lap {
                events.push(self.evolve_species(index, GenerationEnd::LapCompleted)?);
            } else if !any_alive {
                events.push(self.evolve_species(index, GenerationEnd::Extinct)?);
            }
        }
        Ok(events)
    }

    fn evolve_species(&mut self, index: usize, end: GenerationEnd) -> Result<GenerationEvent> {
        let species = &self.species[index];
        let (finished, others): (Vec<Car>, Vec<Car>) = std::mem::take(&mut self.cars)
            .into_iter()
            .partition(|car| car.species_id == species.id);

        let track_length = self.track.get_total_length();
        let winner = match end {
            GenerationEnd::LapCompleted => finished
                .iter()
                .filter(|car| car.alive && car.has_completed_lap(track_length))
                .max_by(|a, b| a.signed_fitness.total_cmp(&b.signed_fitness)),
            GenerationEnd::Extinct => None,
        };
        let generation_best = finished
            .iter()
            .map(|car| car.max_distance_reached)
            .filter(|d| d.is_finite())
            .fold(0.0, f64::max);
        let nearness = self.options.nearness_window.map(|window| {
            let all_time = self
                .ga
                .state(species.id.as_str())
                .map_or(0.0, |state| state.best_fitness_all_time);
            nearness_ratio(generation_best, all_time, window)
        });
        let duration = self.generation_time.get(&species.id).copied().unwrap_or(0.0);

        let request = EvolveRequest {
            cars: &finished,
            species,
            track: &self.track,
            generation_time: duration,
            winner,
            mutation_by_distance: self.options.mutation_by_distance,
            target_population: self.population_per_type,
            brain_strategy: self.options.brain_strategy,
            nearness_ratio: nearness,
            mutation_rate_index: self.options.mutation_rate_index,
        };
        let next = match self.ga.evolve_population(request) {
            Ok(next) => next,
            Err(e) => {
                self.cars = others.into_iter().chain(finished).collect();
                return Err(e);
            }
        };

        if end == GenerationEnd::LapCompleted {
            debug!(species = %species.id, duration, "lap completed");
        }
        let generation = self
            .ga
            .state(species.id.as_str())
            .map_or(0, |state| state.generation);
        let event = GenerationEvent {
            species: species.id.clone(),
            generation,
            end,
            best_fitness: generation_best,
            duration,
        };

        self.generation_time.insert(species.id.clone(), 0.0);
        self.cars = others;
        self.cars.extend(next);
        let limit = self.options.max_recent_dead;
        for car in finished {
            self.recent_dead.push_back(car);
        }
        while self.recent_dead.len() > limit {
            self.recent_dead.pop_front();
        }
        Ok(event)
    }

    /// Clears evolution state and spawns a fresh first generation.
    pub fn reset(&mut self) -> Result<()> {
        self.ga.reset();
        let total = self.population_per_type * self.species.len();
        self.cars = self.ga.initialize_population(&self.track, total, &self.species)?;
        self.recent_dead.clear();
        for time in self.generation_time.values_mut() {
            *time = 0.0;
        }
        self.elapsed = 0.0;
        Ok(())
    }
}

fn check_input_widths(species: &[SpeciesConfig], sensors: &RayCaster) -> Result<()> {
    for config in species {
        let expected = match config.input_modification {
            InputModification::Direct => Some(sensors.ray_count()),
            InputModification::Differential => sensors.differential_width(),
        };
        let actual = config.architecture.first().copied();
        if expected.is_none() || expected != actual {
            return Err(RaceError::Configuration(format!(
                "species `{}` takes {:?} inputs but the sensors provide {:?}",
                config.id, actual, expected
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::EvolutionOptions;
    use crate::geometry::Point;
    use crate::network::Activation;
    use crate::track::TrackOptions;

    fn track() -> Track {
        Track::oval(Point::new(0.0, 0.0), 400.0, 250.0, 24, TrackOptions::default()).unwrap()
    }

    #[test]
    fn test_input_width_checked() {
        let species = vec![SpeciesConfig::new("a", vec![5, 1], Activation::Relu)];
        let ga = GeneticAlgorithm::new(EvolutionOptions::default(), 1);
        let err = Simulation::new(track(), species, ga, SimulationOptions::default()).unwrap_err();
        assert!(matches!(err, RaceError::Configuration(_)));
    }

    #[test]
    fn test_differential_species_accepted() {
        let species = vec![SpeciesConfig::new("d", vec![5, 4, 1], Activation::Relu)
            .with_input_modification(InputModification::Differential)];
        let ga = GeneticAlgorithm::new(EvolutionOptions::default(), 1);
        let options = SimulationOptions {
            initial_population: 4,
            ..SimulationOptions::default()
        };
        let mut sim = Simulation::new(track(), species, ga, options).unwrap();
        sim.step().unwrap();
        assert_eq!(sim.cars().len(), 4);
    }

    #[test]
    fn test_extinction_triggers_next_generation() {
        let species = vec![SpeciesConfig::new("a", vec![9, 6, 1], Activation::Relu)];
        let ga = GeneticAlgorithm::new(EvolutionOptions::default(), 3);
        let options = SimulationOptions {
            initial_population: 6,
            max_recent_dead: 4,
            ..SimulationOptions::default()
        };
        let mut sim = Simulation::new(track(), species, ga, options).unwrap();
        for car in &mut sim.cars {
            car.alive = false;
        }
        let events = sim.step().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].end, GenerationEnd::Extinct);
        assert_eq!(events[0].generation, 1);
        assert_eq!(sim.cars().len(), 6);
        assert!(sim.cars()[0].is_elite());
        assert_eq!(sim.recent_dead().count(), 4);
    }

    #[test]
    fn test_lap_wins_over_ranking() {
        let species = vec![SpeciesConfig::new("a", vec![9, 6, 1], Activation::Relu)];
        let ga = GeneticAlgorithm::new(EvolutionOptions::default(), 4);
        let options = SimulationOptions {
            initial_population: 5,
            ..SimulationOptions::default()
        };
        let mut sim = Simulation::new(track(), species, ga, options).unwrap();
        let length = sim.track.get_total_length();
        sim.cars[0].max_distance_reached = length * 0.9;
        sim.cars[3].signed_fitness = length + 1.0;
        let winner = sim.cars[3].brain.clone();

        let events = sim.step().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].end, GenerationEnd::LapCompleted);
        assert_eq!(sim.cars()[0].brain, winner);
        assert_eq!(sim.recent_dead().count(), 5);
    }
}

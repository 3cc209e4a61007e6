//! # GeneticAlgorithm
//!
//! Owns one [`EvolutionState`] per species and turns a finished generation
//! into the next one. It never decides *when* a generation ends; the driving
//! loop calls [`GeneticAlgorithm::evolve_population`] on extinction or lap
//! completion.
//!
//! ## Example
//!
//! ```rust
//! use neurorace::evolution::{EvolutionOptions, GeneticAlgorithm, SpeciesConfig};
//! use neurorace::geometry::Point;
//! use neurorace::network::Activation;
//! use neurorace::track::{Track, TrackOptions};
//!
//! let track = Track::oval(Point::new(0.0, 0.0), 400.0, 250.0, 16, TrackOptions::default())?;
//! let species = vec![
//!     SpeciesConfig::new("small", vec![9, 6, 1], Activation::Relu),
//!     SpeciesConfig::new("deep", vec![9, 8, 4, 1], Activation::Gelu),
//! ];
//!
//! let mut ga = GeneticAlgorithm::new(EvolutionOptions::default(), 42);
//! let cars = ga.initialize_population(&track, 20, &species)?;
//! assert_eq!(cars.len(), 20);
//! assert_eq!(ga.state("small").map(|s| s.generation), Some(0));
//! # Ok::<(), neurorace::error::RaceError>(())
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use super::mutation::{MutationRange, SigmaInputs};
use super::options::EvolutionOptions;
use super::persist::{self, ImportReport};
use super::species::{BrainStrategy, SpeciesConfig, SpeciesId};
use super::state::{EvolutionState, GenerationMarker};
use crate::car::Car;
use crate::error::{OptionExt, RaceError, Result};
use crate::network::{NetworkWeights, NeuralNetwork};
use crate::rng::{RandomNumberGenerator, SeedSource};
use crate::track::Track;

/// Inputs of one evolution event for one species.
#[derive(Debug, Clone, Copy)]
pub struct EvolveRequest<'a> {
    /// The finished generation. Cars of other species are ignored.
    pub cars: &'a [Car],
    pub species: &'a SpeciesConfig,
    pub track: &'a Track,
    /// Seconds the finished generation ran.
    pub generation_time: f64,
    /// A car that completed a lap, taking precedence over the ranking.
    pub winner: Option<&'a Car>,
    pub mutation_by_distance: bool,
    pub target_population: usize,
    pub brain_strategy: BrainStrategy,
    pub nearness_ratio: Option<f64>,
    /// Selects one of [`EvolutionOptions`]' mutation presets.
    pub mutation_rate_index: Option<usize>,
}

impl<'a> EvolveRequest<'a> {
    /// Request with distance-decayed mutation and the default strategy.
    pub fn new(cars: &'a [Car], species: &'a SpeciesConfig, track: &'a Track, target_population: usize) -> Self {
        Self {
            cars,
            species,
            track,
            generation_time: 0.0,
            winner: None,
            mutation_by_distance: true,
            target_population,
            brain_strategy: BrainStrategy::default(),
            nearness_ratio: None,
            mutation_rate_index: None,
        }
    }
}

#[derive(Debug)]
pub struct GeneticAlgorithm {
    options: EvolutionOptions,
    states: BTreeMap<SpeciesId, EvolutionState>,
    seeds: Box<dyn SeedSource>,
    /// Architecture of every registered species.
    architectures: BTreeMap<SpeciesId, Vec<usize>>,
    /// Smallest and largest parameter count among the known species.
    param_range: Option<(usize, usize)>,
}

impl GeneticAlgorithm {
    /// Deterministic algorithm: every stochastic step draws its seed from a
    /// generator seeded with `seed`.
    pub fn new(options: EvolutionOptions, seed: u64) -> Self {
        Self::with_seed_source(options, Box::new(RandomNumberGenerator::from_seed(seed)))
    }

    pub fn with_seed_source(options: EvolutionOptions, seeds: Box<dyn SeedSource>) -> Self {
        Self {
            options,
            states: BTreeMap::new(),
            seeds,
            architectures: BTreeMap::new(),
            param_range: None,
        }
    }

    pub fn options(&self) -> &EvolutionOptions {
        &self.options
    }

    pub fn states(&self) -> &BTreeMap<SpeciesId, EvolutionState> {
        &self.states
    }

    pub fn state(&self, species: &str) -> Option<&EvolutionState> {
        self.states.get(species)
    }

    /// Registers the active species, creating empty state for new ids and
    /// updating the parameter-count range used for mutation scaling.
    ///
    /// Stored brains that do not fit a species' architecture are discarded.
    pub fn register_species(&mut self, species: &[SpeciesConfig]) {
        for config in species {
            let state = self.states.entry(config.id.clone()).or_default();
            discard_foreign_brains(&config.id, state, &config.architecture);
            self.architectures
                .insert(config.id.clone(), config.architecture.clone());
        }
        let counts = species.iter().map(SpeciesConfig::parameter_count);
        self.param_range = counts.clone().min().zip(counts.max());
    }

    /// Spawns the first generation, `total_population / species.len()` cars
    /// per species (at least one), each with a fresh random brain.
    ///
    /// # Errors
    ///
    /// Fails on an empty species list or an invalid architecture.
    pub fn initialize_population(
        &mut self,
        track: &Track,
        total_population: usize,
        species: &[SpeciesConfig],
    ) -> Result<Vec<Car>> {
        if species.is_empty() {
            return Err(RaceError::Configuration(
                "at least one species is required".to_string(),
            ));
        }
        self.register_species(species);

        let per_species = (total_population / species.len()).max(1);
        let jitter_deg = self.options.get_initial_heading_jitter_deg();
        let mut jitter = RandomNumberGenerator::from_seed(self.seeds.next_seed());
        let mut cars = Vec::with_capacity(per_species * species.len());

        for config in species {
            for _ in 0..per_species {
                let brain = NeuralNetwork::create_random(
                    self.seeds.next_seed(),
                    &config.architecture,
                    config.activation,
                )?;
                cars.push(Car::new(
                    track.start_position(),
                    jittered(&mut jitter, track.start_angle(), jitter_deg),
                    brain,
                    config.id.clone(),
                    config.input_modification,
                ));
            }
            info!(species = %config.id, cars = per_species, "initialized population");
        }
        Ok(cars)
    }

    /// Selects a parent brain from the finished generation and spawns the next one.
    ///
    /// The returned vector holds `target_population` cars (at least one).
    /// Index 0 is the unmutated elite carrying the parent brain, the rest
    /// are mutated copies.
    ///
    /// # Errors
    ///
    /// [`RaceError::EmptyPopulation`] when the request holds no car of the
    /// species, [`RaceError::ShapeMismatch`] when the stored brain does not
    /// fit the species architecture. State is left unchanged on error.
    pub fn evolve_population(&mut self, request: EvolveRequest<'_>) -> Result<Vec<Car>> {
        let species = request.species;
        let mut ranked: Vec<&Car> = request
            .cars
            .iter()
            .filter(|car| car.species_id == species.id)
            .collect();
        ranked.sort_by(|a, b| by_distance_desc(a.max_distance_reached, b.max_distance_reached));

        let best = request
            .winner
            .or_else(|| ranked.iter().copied().find(|car| !car.is_elite()))
            .or_else(|| ranked.first().copied())
            .ok_or_else_race(|| RaceError::EmptyPopulation)?;
        let generation_fitness = finite_or_zero(best.max_distance_reached);
        let generation_weights = best.brain.weights();

        let parent_weights = select_parent(
            request.brain_strategy,
            self.states.get(&species.id),
            generation_weights,
            generation_fitness,
        )?;
        let parent = NeuralNetwork::from_weights(parent_weights, species.activation)?;
        if parent.architecture() != species.architecture.as_slice() {
            return Err(RaceError::ShapeMismatch(format!(
                "parent brain {:?} does not match species `{}` architecture {:?}",
                parent.architecture(),
                species.id,
                species.architecture
            )));
        }

        let track_length = request.track.get_total_length();
        let progress_ratio = (request.mutation_by_distance && track_length > 0.0)
            .then(|| generation_fitness / track_length);
        let range = self.mutation_range(species, request.mutation_rate_index);
        let sigma = self.options.schedule().sigma(&SigmaInputs {
            base_rate: range.base,
            floor_rate: range.floor,
            progress_ratio,
            param_count: parent.parameter_count(),
            param_range: self
                .param_range
                .unwrap_or((parent.parameter_count(), parent.parameter_count())),
            nearness: request.nearness_ratio,
        });

        let state = self.states.entry(species.id.clone()).or_default();
        let improved =
            state.best_weights_all_time.is_none() || generation_fitness >= state.best_fitness_all_time;
        if improved {
            if generation_fitness > state.best_fitness_all_time {
                debug!(
                    species = %species.id,
                    previous = state.best_fitness_all_time,
                    fitness = generation_fitness,
                    "new all-time best"
                );
            }
            state.best_fitness_all_time = state.best_fitness_all_time.max(generation_fitness);
            state.best_weights_all_time = Some(generation_weights.clone());
        }
        state.best_fitness_last_generation = generation_fitness;
        state.best_weights_last_generation = Some(generation_weights.clone());
        state.generation += 1;
        state.total_time += request.generation_time.max(0.0);
        state.markers.push(
            GenerationMarker::new(
                best.x,
                best.y,
                state.generation,
                generation_fitness,
                request.generation_time,
            ),
            improved,
            self.options.get_max_markers(),
        );

        info!(
            species = %species.id,
            generation = state.generation,
            fitness = generation_fitness,
            best = state.best_fitness_all_time,
            sigma,
            strategy = %request.brain_strategy,
            "evolved generation"
        );

        let target = request.target_population.max(1);
        let mut jitter = RandomNumberGenerator::from_seed(self.seeds.next_seed());
        let jitter_deg = self.options.get_respawn_heading_jitter_deg();
        let start = request.track.start_position();
        let start_angle = request.track.start_angle();

        let mut next = Vec::with_capacity(target);
        next.push(
            Car::new(
                start,
                start_angle,
                parent.clone(),
                species.id.clone(),
                species.input_modification,
            )
            .with_size_multiplier(self.options.get_elite_size_multiplier()),
        );
        for _ in 1..target {
            let child = parent.mutate(sigma, self.seeds.next_seed());
            next.push(Car::new(
                start,
                jittered(&mut jitter, start_angle, jitter_deg),
                child,
                species.id.clone(),
                species.input_modification,
            ));
        }
        Ok(next)
    }

    /// Preset range if the index selects one, else the species' own bounds.
    fn mutation_range(&self, species: &SpeciesConfig, index: Option<usize>) -> MutationRange {
        if let Some(preset) = index.and_then(|i| self.options.preset(i)) {
            return preset;
        }
        let own = MutationRange::new(species.base_mutation_rate, species.min_mutation_rate);
        if own.base.is_finite() && own.floor.is_finite() && own.base >= 0.0 && own.floor >= 0.0 {
            own
        } else {
            self.options.fallback_range()
        }
    }

    /// Serializes every species' state to the `stateByConfigId` JSON form.
    pub fn export_weights(&self) -> Result<String> {
        persist::encode(&self.states)
    }

    /// Restores species states from either snapshot layout.
    ///
    /// Species present in the snapshot replace the current state of the
    /// same id, other species are kept. Marker history of restored species
    /// starts empty. A stored brain whose shape does not match a registered
    /// species is dropped together with its fitness and listed in
    /// [`ImportReport::skipped_fields`].
    ///
    /// # Errors
    ///
    /// On malformed input nothing is changed and the error is returned.
    pub fn import_weights(&mut self, json: &str) -> Result<ImportReport> {
        let (mut states, mut report) = persist::decode(json)?;
        for (id, state) in &mut states {
            if let Some(architecture) = self.architectures.get(id) {
                report
                    .skipped_fields
                    .extend(discard_foreign_brains(id, state, architecture));
            }
        }
        self.states.extend(states);
        info!(
            schema = %report.schema,
            species = report.species_restored.len(),
            skipped = report.skipped_fields.len(),
            "imported evolution state"
        );
        Ok(report)
    }

    /// Every species back to generation 0 with no stored brains.
    pub fn reset(&mut self) {
        for state in self.states.values_mut() {
            state.reset();
        }
        info!(species = self.states.len(), "reset evolution state");
    }
}

fn select_parent(
    strategy: BrainStrategy,
    stored: Option<&EvolutionState>,
    generation: &NetworkWeights,
    generation_fitness: f64,
) -> Result<NetworkWeights> {
    let Some((stored, alltime)) =
        stored.and_then(|state| state.best_weights_all_time.as_ref().map(|w| (state, w)))
    else {
        return Ok(generation.clone());
    };
    match strategy {
        BrainStrategy::Generation => Ok(generation.clone()),
        BrainStrategy::AllTime => {
            if generation_fitness >= stored.best_fitness_all_time {
                Ok(generation.clone())
            } else {
                Ok(alltime.clone())
            }
        }
        BrainStrategy::Averaging => alltime.average(generation),
        BrainStrategy::Overcorrect => NetworkWeights::overcorrect(alltime, generation),
    }
}

/// Clears stored brains shaped for another architecture and returns the
/// `species.field` paths that were cleared.
fn discard_foreign_brains(id: &SpeciesId, state: &mut EvolutionState, architecture: &[usize]) -> Vec<String> {
    let fits = |weights: &Option<NetworkWeights>| {
        weights
            .as_ref()
            .map_or(true, |w| w.architecture().map_or(false, |a| a == architecture))
    };

    let mut dropped = Vec::new();
    if !fits(&state.best_weights_all_time) {
        state.best_weights_all_time = None;
        state.best_fitness_all_time = 0.0;
        dropped.push(format!("{id}.bestWeightsAllTime"));
    }
    if !fits(&state.best_weights_last_generation) {
        state.best_weights_last_generation = None;
        dropped.push(format!("{id}.bestWeightsLastGeneration"));
    }
    for path in &dropped {
        warn!(field = %path, ?architecture, "discarded stored brain with a foreign architecture");
    }
    dropped
}

/// Descending, NaN last.
fn by_distance_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or_else(|| {
        if b.is_nan() && !a.is_nan() {
            Ordering::Less
        } else if a.is_nan() && !b.is_nan() {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    })
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn jittered(rng: &mut RandomNumberGenerator, base: f64, jitter_deg: f64) -> f64 {
    base + (rng.next_f64() * 2.0 - 1.0) * jitter_deg.abs().to_radians()
}

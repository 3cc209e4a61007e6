pub mod genetic;
pub mod mutation;
pub mod options;
pub mod persist;
pub mod species;
pub mod state;

pub use genetic::{EvolveRequest, GeneticAlgorithm};
pub use mutation::{CubicBezier, MutationRange, MutationSchedule};
pub use options::{EvolutionOptions, EvolutionOptionsBuilder};
pub use persist::{ImportReport, SchemaVersion};
pub use species::{BrainStrategy, SpeciesConfig, SpeciesId};
pub use state::{EvolutionState, GenerationMarker, MarkerHistory};

pub mod car;
pub mod error;
pub mod evolution;
pub mod geometry;
pub mod network;
pub mod performance;
pub mod rng;
pub mod sensor;
pub mod simulation;
pub mod track;

// Re-export commonly used types for convenience
pub use car::{Car, CarPhysics, InputModification};
pub use error::{OptionExt, RaceError, Result, ResultExt};
pub use evolution::{BrainStrategy, EvolutionOptions, GeneticAlgorithm, SpeciesConfig, SpeciesId};
pub use network::{Activation, NeuralNetwork};
pub use simulation::{Simulation, SimulationOptions};
pub use track::Track;

use neurorace::{
    evolution::{EvolutionOptions, GeneticAlgorithm, SpeciesConfig},
    geometry::Point,
    network::Activation,
    performance::{AdjustmentReason, PerformanceMetrics, PopulationDecision},
    simulation::{Simulation, SimulationOptions},
    track::{Track, TrackOptions},
    InputModification,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn species() -> Vec<SpeciesConfig> {
    vec![
        SpeciesConfig::new("relu", vec![9, 6, 1], Activation::Relu),
        SpeciesConfig::new("diff", vec![5, 6, 1], Activation::Gelu)
            .with_input_modification(InputModification::Differential),
    ]
}

fn simulation(seed: u64, population: usize) -> Simulation {
    let track = Track::oval(Point::new(0.0, 0.0), 400.0, 250.0, 24, TrackOptions::default()).unwrap();
    let ga = GeneticAlgorithm::new(EvolutionOptions::default(), seed);
    let options = SimulationOptions {
        initial_population: population,
        max_recent_dead: 30,
        nearness_window: Some(500.0),
        ..SimulationOptions::default()
    };
    Simulation::new(track, species(), ga, options).unwrap()
}

#[test]
fn test_generations_roll_over() {
    init_tracing();
    let mut sim = simulation(42, 20);
    let events = sim.advance(60 * 30).unwrap();

    assert!(!events.is_empty());
    for event in &events {
        assert!(event.generation >= 1);
        assert!(event.best_fitness >= 0.0);
        assert!(event.duration > 0.0);
    }
    for config in sim.species() {
        let state = sim.genetic_algorithm().state(config.id.as_str()).unwrap();
        let last = events.iter().rev().find(|e| e.species == config.id);
        assert_eq!(last.map_or(0, |e| e.generation), state.generation);
        let members = sim.cars().iter().filter(|car| car.species_id == config.id).count();
        assert_eq!(members, 10);
    }
    assert!(sim.recent_dead().count() <= 30);
    assert!((sim.elapsed() - 30.0).abs() < 1e-6);
}

#[test]
fn test_same_seed_same_run() {
    let mut a = simulation(7, 12);
    let mut b = simulation(7, 12);
    let events_a = a.advance(600).unwrap();
    let events_b = b.advance(600).unwrap();

    assert_eq!(events_a, events_b);
    assert_eq!(a.cars().len(), b.cars().len());
    for (x, y) in a.cars().iter().zip(b.cars()) {
        assert_eq!(x.x.to_bits(), y.x.to_bits());
        assert_eq!(x.y.to_bits(), y.y.to_bits());
        assert_eq!(x.alive, y.alive);
        assert_eq!(x.brain, y.brain);
    }
    assert_eq!(
        a.genetic_algorithm().export_weights().unwrap(),
        b.genetic_algorithm().export_weights().unwrap()
    );
}

#[test]
fn test_population_decision_sizes_next_generations() {
    let mut sim = simulation(3, 20);
    sim.apply_decision(&PopulationDecision {
        population_per_type: 3,
        total_population: 6,
        delta: -14,
        reason: AdjustmentReason::Decrease,
        metrics: PerformanceMetrics::default(),
        num_types: 2,
    });
    assert_eq!(sim.population_per_type(), 3);
    // The running generation keeps its size.
    assert_eq!(sim.cars().len(), 20);

    let mut renewed = std::collections::BTreeSet::new();
    for _ in 0..60 * 60 {
        for event in sim.step().unwrap() {
            renewed.insert(event.species);
        }
        if renewed.len() == 2 {
            break;
        }
    }
    assert_eq!(renewed.len(), 2);
    assert_eq!(sim.cars().len(), 6);
}

#[test]
fn test_reset_starts_over() {
    let mut sim = simulation(5, 10);
    let events = sim.advance(60 * 20).unwrap();
    assert!(!events.is_empty());

    sim.reset().unwrap();
    assert_eq!(sim.elapsed(), 0.0);
    assert_eq!(sim.recent_dead().count(), 0);
    assert_eq!(sim.cars().len(), 10);
    assert_eq!(sim.alive_count(), 10);
    for state in sim.genetic_algorithm().states().values() {
        assert_eq!(state.generation, 0);
        assert!(state.best_weights_all_time.is_none());
    }
}

#[test]
fn test_export_survives_a_fresh_simulation() {
    let mut trained = simulation(11, 10);
    trained.advance(60 * 20).unwrap();
    let json = trained.genetic_algorithm().export_weights().unwrap();

    let mut fresh = simulation(12, 10);
    let report = fresh.genetic_algorithm_mut().import_weights(&json).unwrap();
    assert_eq!(report.species_restored.len(), 2);
    assert_eq!(fresh.genetic_algorithm().export_weights().unwrap(), json);
}

#[test]
fn test_foreign_snapshot_does_not_stall_a_species() {
    init_tracing();
    let mut sim = simulation(13, 10);
    let report = sim
        .genetic_algorithm_mut()
        .import_weights(
            r#"{"stateByConfigId":{"relu":{"bestFitnessAllTime":5000.0,
                "bestWeightsAllTime":{"layers":[{"weights":[[1.0,2.0]],"biases":[0.0]}]}}}}"#,
        )
        .unwrap();
    assert_eq!(report.skipped_fields, vec!["relu.bestWeightsAllTime".to_string()]);

    let mut rolled_over = 0;
    for _ in 0..2000 {
        let events = sim.step().unwrap();
        rolled_over += events.iter().filter(|e| e.species.as_str() == "relu").count();
    }
    assert!(rolled_over > 0);
    let state = sim.genetic_algorithm().state("relu").unwrap();
    assert!(state.generation >= 1);
    assert!(state.best_fitness_all_time < 5000.0);
}

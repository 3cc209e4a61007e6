use neurorace::{
    car::{Car, CarPhysics, DriveContext, InputModification},
    evolution::SpeciesId,
    geometry::Point,
    network::{Activation, LayerWeights, NetworkWeights, NeuralNetwork},
    rng::RandomNumberGenerator,
    sensor::{RayCaster, SensorOptions},
    track::{Track, TrackOptions},
};

fn oval() -> Track {
    Track::oval(Point::new(500.0, 400.0), 300.0, 200.0, 16, TrackOptions::default()).unwrap()
}

/// A brain that always steers with `direction`.
fn constant_brain(inputs: usize, direction: f64) -> NeuralNetwork {
    let weights = NetworkWeights {
        layers: vec![LayerWeights {
            weights: vec![vec![0.0; inputs]],
            biases: vec![direction],
        }],
    };
    NeuralNetwork::from_weights(weights, Activation::Linear).unwrap()
}

fn car(position: Point, angle: f64, brain: NeuralNetwork) -> Car {
    Car::new(position, angle, brain, SpeciesId::from("test"), InputModification::Direct)
}

#[test]
fn test_moves_forward_without_walls() {
    let track = oval();
    let sensors = RayCaster::new(SensorOptions::default()).unwrap();
    let physics = CarPhysics::default();
    let ctx = DriveContext::new(&track, &sensors, &physics).with_walls(&[]);

    let brain = NeuralNetwork::create_random(12345, &[9, 6, 1], Activation::Relu).unwrap();
    let mut car = car(Point::new(100.0, 100.0), 0.0, brain);
    car.update(1.0 / 60.0, &ctx).unwrap();

    assert_ne!(car.x, 100.0);
    assert!(car.alive);
    assert!(car.last_sensors.hit_points.iter().all(Option::is_none));
    assert!(car.last_sensors.distances.iter().all(|&d| d == 0.0));
}

#[test]
fn test_fitness_wrap_never_jumps() {
    let mut rng = RandomNumberGenerator::from_seed(8);
    for _ in 0..50 {
        let track_length = rng.gen_range(100.0..5000.0);
        let mut car = car(Point::default(), 0.0, constant_brain(9, 0.0));
        let mut distance: f64 = rng.gen_range(0.0..track_length);
        car.update_signed_fitness(distance, track_length);

        let mut previous = car.signed_fitness;
        for _ in 0..200 {
            distance = (distance + rng.gen_range(0.0..track_length * 0.2)) % track_length;
            car.update_signed_fitness(distance, track_length);
            let jump = car.signed_fitness - previous;
            assert!(jump >= 0.0 && jump < track_length / 2.0);
            previous = car.signed_fitness;
        }
        assert!(car.signed_fitness > track_length);
        assert!(car.has_completed_lap(track_length));
        assert_eq!(car.max_distance_reached, car.signed_fitness);
    }
}

#[test]
fn test_driving_along_the_track_makes_progress() {
    let track = oval();
    let sensors = RayCaster::new(SensorOptions::default()).unwrap();
    let physics = CarPhysics {
        steering_sensitivity: 0.0,
        ..CarPhysics::default()
    };
    let ctx = DriveContext::new(&track, &sensors, &physics);

    let mut car = car(track.start_position(), track.start_angle(), constant_brain(9, 0.0));
    for _ in 0..10 {
        car.update(1.0 / 60.0, &ctx).unwrap();
    }
    assert!(car.alive);
    assert!(car.signed_fitness > 0.0);
    assert!(car.last_closest_point.is_some());
    assert_eq!(car.frame_count, 10);
}

#[test]
fn test_reversing_car_is_killed_at_progress_check() {
    let track = oval();
    let sensors = RayCaster::new(SensorOptions::default()).unwrap();
    let physics = CarPhysics {
        steering_sensitivity: 0.0,
        ..CarPhysics::default()
    };
    let ctx = DriveContext::new(&track, &sensors, &physics);

    let backwards = track.start_angle() + std::f64::consts::PI;
    let mut car = car(track.start_position(), backwards, constant_brain(9, 0.0));
    let mut frames = 0;
    while car.alive && frames < physics.progress_check_interval {
        car.update(1.0 / 60.0, &ctx).unwrap();
        frames += 1;
    }
    assert!(!car.alive);
    assert!(car.signed_fitness < 0.0);
    assert_eq!(car.max_distance_reached, 0.0);
}

#[test]
fn test_circling_car_hits_a_wall() {
    let track = oval();
    let sensors = RayCaster::new(SensorOptions::default()).unwrap();
    let physics = CarPhysics::default();
    let ctx = DriveContext::new(&track, &sensors, &physics);

    // Perpendicular to the track, heading for the outer wall.
    let mut car = car(track.start_position(), track.start_angle() - std::f64::consts::FRAC_PI_2, constant_brain(9, 0.0));
    for _ in 0..120 {
        car.update(1.0 / 60.0, &ctx).unwrap();
    }
    assert!(!car.alive);
}

#[test]
fn test_differential_species_uses_narrow_input() {
    let track = oval();
    let sensors = RayCaster::new(SensorOptions::default()).unwrap();
    let physics = CarPhysics::default();
    let ctx = DriveContext::new(&track, &sensors, &physics);

    let mut car = Car::new(
        track.start_position(),
        track.start_angle(),
        constant_brain(5, 0.0),
        SpeciesId::from("diff"),
        InputModification::Differential,
    );
    car.update(1.0 / 60.0, &ctx).unwrap();
    assert!(car.alive);
    assert_eq!(car.last_sensors.distances.len(), 9);
}

#[test]
fn test_nan_steering_kills_instead_of_propagating() {
    let track = oval();
    let sensors = RayCaster::new(SensorOptions::default()).unwrap();
    let physics = CarPhysics::default();
    let ctx = DriveContext::new(&track, &sensors, &physics);

    let mut car = car(Point::new(f64::NAN, 0.0), 0.0, constant_brain(9, 0.0));
    car.update(1.0 / 60.0, &ctx).unwrap();
    assert!(!car.alive);
}

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use neurorace::{
    geometry::Point,
    rng::RandomNumberGenerator,
    sensor::{RayCaster, SensorOptions},
    track::{Track, TrackOptions},
};

fn bench_sensors(c: &mut Criterion) {
    let sensors = RayCaster::new(SensorOptions::default()).unwrap();
    let mut rng = RandomNumberGenerator::from_seed(1);

    let mut group = c.benchmark_group("sensor_rays");
    for waypoints in [8, 24, 64].iter() {
        let track = Track::oval(
            Point::new(0.0, 0.0),
            900.0,
            500.0,
            *waypoints,
            TrackOptions::default(),
        )
        .unwrap();
        let probes: Vec<(Point, f64)> = track
            .centerline()
            .iter()
            .step_by(5)
            .map(|&p| (p, rng.gen_range(-std::f64::consts::PI..std::f64::consts::PI)))
            .collect();

        group.bench_function(&format!("brute_force_{}", waypoints), |b| {
            b.iter(|| {
                for &(origin, heading) in &probes {
                    black_box(sensors.cast_rays(
                        black_box(origin),
                        black_box(heading),
                        track.wall_segments(),
                    ));
                }
            })
        });
        group.bench_function(&format!("spatial_grid_{}", waypoints), |b| {
            b.iter(|| {
                for &(origin, heading) in &probes {
                    black_box(sensors.cast_rays_indexed(
                        black_box(origin),
                        black_box(heading),
                        track.grid(),
                    ));
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sensors);
criterion_main!(benches);

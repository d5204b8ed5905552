use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fusion_core::tracker::EntityTracker;
use fusion_core::types::{EntityId, EntityKind, Measurement, Position, SensorKind, Velocity};
use nalgebra::Matrix3;
use std::time::{Duration, Instant};

fn make_measurement(t: Instant, step: u64, with_velocity: bool) -> Measurement {
    let x = step as f64 * 0.2;
    if with_velocity {
        Measurement {
            entity_id: EntityId(1),
            sensor_kind: SensorKind::Radar,
            timestamp: t,
            position: Position::new(x, 0.0, 0.0),
            velocity: Velocity::new(10.0, 0.0, 0.0),
            has_velocity: true,
            position_covariance: Matrix3::identity(),
            velocity_covariance: Matrix3::identity() * 0.01,
            confidence: 0.85,
        }
    } else {
        Measurement::position_only(
            EntityId(1),
            SensorKind::Gps,
            t,
            Position::new(x, 0.0, 0.0),
            Matrix3::identity() * 25.0,
            0.95,
        )
    }
}

fn bench_tracker(c: &mut Criterion) {
    let mut group = c.benchmark_group("tracker");

    for (label, with_velocity) in [("position_only", false), ("position_velocity", true)] {
        group.bench_function(format!("process_100_{label}"), |b| {
            b.iter(|| {
                let mut tracker = EntityTracker::new(EntityId(1), EntityKind::Vehicle);
                let t0 = Instant::now();
                for i in 0..100u64 {
                    let t = t0 + Duration::from_millis(i * 20);
                    tracker.process_measurement(&make_measurement(t, i, with_velocity));
                }
                black_box(tracker.snapshot());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tracker);
criterion_main!(benches);

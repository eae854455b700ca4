// benches/bench_control_loop_tick.rs

use criterion::{
    black_box, AxisScale, Criterion, PlotConfiguration, criterion_group, criterion_main,
};
use smart_intersection::config::ControllerConfig;
use smart_intersection::control_system::ControlLoop;
use smart_intersection::detection::VehicleTally;
use std::time::{Duration, Instant};

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("control_loop_tick");

    group.sample_size(100);
    group.measurement_time(Duration::from_secs(5));
    group.warm_up_time(Duration::from_secs(2));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Linear));

    let config = ControllerConfig::default();

    // Steady normal-mode ticks at 30 fps.
    group.bench_function("normal_mode", |b| {
        let t0 = Instant::now();
        let mut control = ControlLoop::new(&config, t0);
        let mut frame: u64 = 0;
        b.iter(|| {
            frame += 1;
            control.set_tally(VehicleTally::new((frame % 10) as u32, 0));
            black_box(control.tick(t0 + Duration::from_millis(33 * frame)));
        });
    });

    // An ambulance reappearing every few frames keeps the override latched.
    group.bench_function("emergency_mode", |b| {
        let t0 = Instant::now();
        let mut control = ControlLoop::new(&config, t0);
        let mut frame: u64 = 0;
        b.iter(|| {
            frame += 1;
            let emergency = u32::from(frame % 4 == 0);
            control.set_tally(VehicleTally::new(3, emergency));
            black_box(control.tick(t0 + Duration::from_millis(33 * frame)));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_tick);
criterion_main!(benches);

// benches/bench_lane_gate.rs

use criterion::{
    black_box, AxisScale, Criterion, PlotConfiguration, criterion_group, criterion_main,
};
use smart_intersection::control_system::LaneGatePolicy;
use std::time::Duration;

fn bench_lane_gate(c: &mut Criterion) {
    let mut group = c.benchmark_group("lane_gate_decide");

    group.sample_size(100);
    group.measurement_time(Duration::from_secs(5));
    group.warm_up_time(Duration::from_secs(2));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Linear));

    for &threshold in [0u32, 6, 50].iter() {
        group.bench_function(format!("threshold_{}", threshold), |b| {
            let policy = LaneGatePolicy::new(threshold);
            b.iter(|| {
                for total in 0..100u32 {
                    black_box(policy.decide(black_box(total)));
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_lane_gate);
criterion_main!(benches);

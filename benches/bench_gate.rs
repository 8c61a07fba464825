//! Benchmarks for the admission gate hot path.
//!
//! Every inbound request pays one `check` call, which includes the full
//! registry sweep, so the interesting axes are registry population and
//! identity churn.
//!
//! ## Run
//! ```bash
//! cargo bench --bench bench_gate
//! ```

use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use triage_lib::gate::{AdmissionGate, GatePolicy};

fn bench_check(c: &mut Criterion) {
    // Ceiling high enough that the bench never flips into the deny path.
    let policy = GatePolicy::new(Duration::from_secs(3600), u32::MAX);

    let gate = AdmissionGate::new();
    c.bench_function("gate_check_single_identity", |b| {
        b.iter(|| gate.check("192.0.2.1", &policy));
    });

    let mut group = c.benchmark_group("gate_check_populated_registry");
    for population in [10usize, 100, 1000] {
        let gate = AdmissionGate::new();
        for i in 0..population {
            gate.check(&format!("198.51.100.0-{i}"), &policy);
        }
        group.bench_with_input(BenchmarkId::from_parameter(population), &population, |b, _| {
            b.iter(|| gate.check("192.0.2.1", &policy));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_check);
criterion_main!(benches);

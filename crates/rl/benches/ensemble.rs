use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rl::{EnsembleManager, Settings};

fn bench_ensemble_tick(c: &mut Criterion) {
    let mut settings = Settings::default();
    settings.ensemble.size = 32;
    let ensemble = EnsembleManager::from_settings(settings).expect("default settings are valid");

    c.bench_function("ensemble_tick_32", |b| {
        b.iter(|| black_box(ensemble.step()));
    });
}

fn bench_evolution(c: &mut Criterion) {
    let ensemble = EnsembleManager::from_settings(Settings::default())
        .expect("default settings are valid");

    c.bench_function("ensemble_evolve_10", |b| {
        b.iter(|| ensemble.evolve());
    });
}

criterion_group!(benches, bench_ensemble_tick, bench_evolution);
criterion_main!(benches);

use std::time::{Duration, Instant};

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use lobsim_rs::config::SimConfig;
use lobsim_rs::engine::{FillEstimator, HypotheticalOrder, PriceLadderGenerator, Side};
use lobsim_rs::sim::driver::MarketState;

fn bench_estimate(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let book = PriceLadderGenerator::default().generate(45_000.0, &mut rng).unwrap();
    let estimator = FillEstimator::default();
    let market = HypotheticalOrder::market(Side::BUY, 50.0);
    let limit = HypotheticalOrder::limit(Side::SELL, 44_980.0, 25.0);

    c.bench_function("estimate_market_buy", |b| {
        b.iter(|| estimator.estimate(black_box(&market), black_box(&book), &mut rng))
    });
    c.bench_function("estimate_limit_sell", |b| {
        b.iter(|| estimator.estimate(black_box(&limit), black_box(&book), &mut rng))
    });
}

fn bench_tick(c: &mut Criterion) {
    let cfg = SimConfig { seed: Some(7), ..SimConfig::default() };
    let start = Instant::now();
    let mut state = MarketState::from_config(&cfg, start).unwrap();
    let mut step = 0u64;
    c.bench_function("driver_tick", |b| {
        b.iter(|| {
            step += 1;
            state.tick(start + Duration::from_millis(500 * step))
        })
    });
}

criterion_group!(benches, bench_estimate, bench_tick);
criterion_main!(benches);

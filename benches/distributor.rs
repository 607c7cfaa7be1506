//! Criterion benchmarks for the hot paths:
//! - Distributing one raw tick through normalization to the sinks
//! - Querying a combined trigger policy

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use realtime_risk_core::market_data::{
    DistributionContext, DistributionSpecification, ExternalId, InMemoryLkvStoreProvider, LoggingSink,
    MarketDataSink, NormalizationRuleSet, SubscriptionHandle,
};
use realtime_risk_core::trigger::{
    CombinedPolicy, CyclePolicy, RecomputationPeriodPolicy, RecomputationPeriods, SuccessiveDeltaCapPolicy,
};
use realtime_risk_core::{FieldContainer, LiveDataSpecification, MarketDataDistributor};

fn distributor(sinks: usize) -> MarketDataDistributor {
    let spec = LiveDataSpecification::new("MarketValue", ExternalId::of("TICKER", "EURUSD"));
    let distribution =
        DistributionSpecification::new(spec.clone(), Arc::new(NormalizationRuleSet::market_value("MarketValue")));
    let factory = move |_ctx: &DistributionContext| -> Vec<Arc<dyn MarketDataSink>> {
        (0..sinks)
            .map(|i| Arc::new(LoggingSink::new(format!("sink-{}", i))) as Arc<dyn MarketDataSink>)
            .collect()
    };

    MarketDataDistributor::new(
        distribution,
        SubscriptionHandle::new("bench", spec),
        &factory,
        false,
        &InMemoryLkvStoreProvider,
    )
    .expect("distributor")
}

fn bench_distribute(c: &mut Criterion) {
    let mut group = c.benchmark_group("distribute_live_data");
    group.throughput(Throughput::Elements(1));

    for sinks in [1usize, 4, 16] {
        let distributor = distributor(sinks);
        let mut pips = 0i64;
        group.bench_function(format!("{}_sinks", sinks), |b| {
            b.iter(|| {
                pips = (pips + 1) % 100;
                let mid = dec!(1.0850) + Decimal::new(pips, 4);
                let tick = FieldContainer::new()
                    .with("bid", mid - dec!(0.0001))
                    .with("ask", mid + dec!(0.0001));
                black_box(distributor.distribute_live_data(&tick))
            })
        });
    }

    group.finish();
}

fn bench_policy_query(c: &mut Criterion) {
    let periods = RecomputationPeriods {
        min_delta_period_ms: Some(100),
        max_delta_period_ms: Some(1_000),
        min_full_period_ms: Some(10_000),
        max_full_period_ms: Some(60_000),
    };
    let policy = CombinedPolicy::new()
        .with_policy(RecomputationPeriodPolicy::new(periods))
        .with_policy(SuccessiveDeltaCapPolicy::new(10));

    c.bench_function("combined_policy_query", |b| {
        let mut now = 0i64;
        b.iter(|| {
            now += 1_000_000;
            black_box(policy.query(black_box(now)))
        })
    });
}

criterion_group!(benches, bench_distribute, bench_policy_query);
criterion_main!(benches);

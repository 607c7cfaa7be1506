use realtime_risk_core::market_data::{
    ChannelSink, DistributionContext, ExternalId, FileLkvStoreProvider, InMemoryLkvStoreProvider, LoggingSink,
    MarketDataSink, NormalizationRuleSet, SenderFactory,
};
use realtime_risk_core::{
    CycleKind, CycleScheduler, EngineConfig, FieldContainer, LiveDataSpecification, SchedulerError,
    SubscriptionManager, SystemClock,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const RULE_SET: &str = "MarketValue";
const TICKERS: [(&str, Decimal); 3] = [("EURUSD", dec!(1.0850)), ("GBPUSD", dec!(1.2700)), ("USDJPY", dec!(149.50))];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "realtime_risk_core=debug,risk_core_demo=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Reads .env first
    let config = EngineConfig::from_env()?;
    tracing::info!("⚙️ Configuration loaded: {:?}", config);

    // Every distributor publishes into one engine channel, plus a debug log
    let (update_tx, mut update_rx) = mpsc::unbounded_channel();
    let factory = move |ctx: &DistributionContext| -> Vec<Arc<dyn MarketDataSink>> {
        vec![
            Arc::new(ChannelSink::from_sender("risk-engine", update_tx.clone())),
            Arc::new(LoggingSink::new(format!("log:{}", ctx.specification()))),
        ]
    };
    let factory: Arc<dyn SenderFactory> = Arc::new(factory);

    let mut manager = SubscriptionManager::new(factory, Arc::new(InMemoryLkvStoreProvider), config.default_expiry_ms);
    let persistent = match &config.lkv_directory {
        Some(dir) => {
            manager = manager.with_persistent_store(Arc::new(FileLkvStoreProvider::new(dir)?));
            tracing::info!("💾 Persistent last known values under {}", dir.display());
            true
        }
        None => false,
    };
    manager.register_normalizer(Arc::new(NormalizationRuleSet::market_value(RULE_SET)));
    let manager = Arc::new(manager);

    for (ticker, _) in TICKERS {
        manager.subscribe("demo", spec(ticker), persistent)?;
    }

    let sweeper = Arc::clone(&manager).spawn_expiry_sweeper(Duration::from_secs(5));

    let consumer = tokio::spawn(async move {
        let mut received = 0u64;
        while let Some(update) = update_rx.recv().await {
            received += 1;
            if received % 50 == 0 {
                tracing::info!("📨 {} updates received, latest {} #{}", received, update.specification, update.sequence_number);
            }
        }
    });

    let feed = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            let mut mids: Vec<Decimal> = TICKERS.iter().map(|(_, mid)| *mid).collect();
            let mut ticker = tokio::time::interval(Duration::from_millis(100));
            loop {
                ticker.tick().await;
                for (i, (name, _)) in TICKERS.iter().enumerate() {
                    let pips: i64 = rand::rng().random_range(-5..=5);
                    mids[i] += Decimal::new(pips, 4);

                    let half_spread = dec!(0.0001);
                    let tick = FieldContainer::new()
                        .with("bid", mids[i] - half_spread)
                        .with("ask", mids[i] + half_spread);

                    let spec = spec(name);
                    manager.heartbeat(&spec);
                    if let Some(outcome) = manager.distribute(&spec, &tick) {
                        tracing::trace!("{} -> {:?}", spec, outcome);
                    }
                }
            }
        })
    };

    // A cycle prices every line's current snapshot
    let executor = {
        let manager = Arc::clone(&manager);
        move |requested: CycleKind| -> Result<CycleKind, SchedulerError> {
            let snapshots = manager.snapshots();
            if snapshots.is_empty() {
                return Err(SchedulerError::Execution("no market data yet".to_string()));
            }
            tracing::info!("📊 {:?} cycle over {} data lines", requested, snapshots.len());
            Ok(requested)
        }
    };

    let scheduler = CycleScheduler::new(config.build_policy(), executor, SystemClock::new(), config.scheduler.clone())?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));

    tracing::info!("🚀 Risk core demo running, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("🛑 Received Ctrl+C, shutting down...");

    shutdown_tx.send(true)?;
    let stats = scheduler_handle.await?;
    feed.abort();
    sweeper.abort();
    consumer.abort();

    tracing::info!("Scheduler: {}", serde_json::to_string(&stats)?);
    for line in manager.stats() {
        tracing::info!("Distributor: {}", serde_json::to_string(&line)?);
    }

    Ok(())
}

fn spec(ticker: &str) -> LiveDataSpecification {
    LiveDataSpecification::new(RULE_SET, ExternalId::of("TICKER", ticker))
}

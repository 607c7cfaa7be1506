use std::collections::HashMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};

use super::distributor::{DistributionOutcome, DistributorStats, MarketDataDistributor};
use super::fields::FieldContainer;
use super::lkv::LastKnownValueStoreProvider;
use super::normalization::Normalizer;
use super::sink::SenderFactory;
use super::specification::{DistributionSpecification, LiveDataSpecification, SubscriptionHandle};
use super::update::NormalizedUpdate;
use crate::errors::SubscriptionError;

/// Registry of active distributors, one per fully-qualified data line
///
/// The manager is the only place distributors are created, so it is also
/// what guarantees a single writer per last-known-value store. Expiry is
/// advisory on the distributor; the manager is what acts on it.
pub struct SubscriptionManager {
    distributors: DashMap<LiveDataSpecification, Arc<MarketDataDistributor>>,
    normalizers: HashMap<String, Arc<dyn Normalizer>>,
    sender_factory: Arc<dyn SenderFactory>,
    transient_store: Arc<dyn LastKnownValueStoreProvider>,
    persistent_store: Option<Arc<dyn LastKnownValueStoreProvider>>,
    default_expiry_ms: i64,
}

impl SubscriptionManager {
    pub fn new(
        sender_factory: Arc<dyn SenderFactory>,
        transient_store: Arc<dyn LastKnownValueStoreProvider>,
        default_expiry_ms: i64,
    ) -> Self {
        Self {
            distributors: DashMap::new(),
            normalizers: HashMap::new(),
            sender_factory,
            transient_store,
            persistent_store: None,
            default_expiry_ms,
        }
    }

    /// Store provider used for persistent subscriptions
    pub fn with_persistent_store(mut self, provider: Arc<dyn LastKnownValueStoreProvider>) -> Self {
        self.persistent_store = Some(provider);
        self
    }

    pub fn register_normalizer(&mut self, normalizer: Arc<dyn Normalizer>) {
        tracing::info!("Normalization rule set registered: {}", normalizer.rule_set_id());
        self.normalizers.insert(normalizer.rule_set_id().to_string(), normalizer);
    }

    /// Subscribe to a data line, creating its distributor if needed
    ///
    /// Subscribing again to an active line returns the existing distributor
    /// and pushes its expiry back. A line is either persistent or transient;
    /// asking for the other mode on an active line is an error.
    ///
    /// New distributors are built with no map lock held, since building one
    /// calls the sender factory and may open a store on disk.
    pub fn subscribe(
        &self,
        subscriber: &str,
        specification: LiveDataSpecification,
        persistent: bool,
    ) -> Result<Arc<MarketDataDistributor>, SubscriptionError> {
        let normalizer = self
            .normalizers
            .get(&specification.normalization_rule_set_id)
            .cloned()
            .ok_or_else(|| SubscriptionError::UnknownRuleSet(specification.normalization_rule_set_id.clone()))?;

        if let Some(existing) = self.get(&specification) {
            tracing::debug!("{} already subscribed, reusing distributor", specification);
            return self.reuse(existing, persistent);
        }

        let store = self.store_for(persistent);
        let distribution = DistributionSpecification::new(specification.clone(), normalizer);
        let subscription = SubscriptionHandle::new(subscriber, specification.clone());
        let distributor = Arc::new(MarketDataDistributor::new(
            distribution,
            subscription,
            self.sender_factory.as_ref(),
            persistent,
            store.as_ref(),
        )?);

        match self.distributors.entry(specification) {
            Entry::Occupied(existing) => {
                // Another subscriber created the line first; theirs wins
                let existing = Arc::clone(existing.get());
                tracing::debug!("{} created concurrently, dropping duplicate distributor", existing.specification());
                self.reuse(existing, persistent)
            }
            Entry::Vacant(slot) => {
                distributor.extend_expiry(self.default_expiry_ms);
                slot.insert(Arc::clone(&distributor));
                Ok(distributor)
            }
        }
    }

    fn reuse(
        &self,
        distributor: Arc<MarketDataDistributor>,
        persistent: bool,
    ) -> Result<Arc<MarketDataDistributor>, SubscriptionError> {
        if distributor.is_persistent() != persistent {
            return Err(SubscriptionError::PersistenceMismatch {
                specification: distributor.specification().to_string(),
                existing_persistent: distributor.is_persistent(),
            });
        }
        distributor.extend_expiry(self.default_expiry_ms);
        Ok(distributor)
    }

    pub fn unsubscribe(&self, specification: &LiveDataSpecification) -> bool {
        let removed = self.distributors.remove(specification).is_some();

        if removed {
            tracing::info!("Subscription removed: {}", specification);
        } else {
            tracing::warn!("Attempted to remove unknown subscription: {}", specification);
        }

        removed
    }

    pub fn get(&self, specification: &LiveDataSpecification) -> Option<Arc<MarketDataDistributor>> {
        self.distributors.get(specification).map(|d| Arc::clone(d.value()))
    }

    /// Push a raw tick to the distributor of a data line
    ///
    /// Returns `None` if nothing is subscribed to the line.
    pub fn distribute(&self, specification: &LiveDataSpecification, raw: &FieldContainer) -> Option<DistributionOutcome> {
        // Clone out of the map so the shard lock is not held while sinks run
        let distributor = self.get(specification)?;
        Some(distributor.distribute_live_data(raw))
    }

    /// Extend a subscription's expiry by the default period
    pub fn heartbeat(&self, specification: &LiveDataSpecification) -> bool {
        match self.get(specification) {
            Some(distributor) => {
                distributor.extend_expiry(self.default_expiry_ms);
                true
            }
            None => false,
        }
    }

    /// Remove every expired, non-persistent distributor
    pub fn evict_expired(&self) -> Vec<LiveDataSpecification> {
        let expired: Vec<LiveDataSpecification> = self
            .distributors
            .iter()
            .filter(|entry| entry.value().has_expired())
            .map(|entry| entry.key().clone())
            .collect();

        for specification in &expired {
            // Re-check under the shard lock; a heartbeat may have landed in between
            if self.distributors.remove_if(specification, |_, d| d.has_expired()).is_some() {
                tracing::info!("⏱️ Subscription expired: {}", specification);
            }
        }

        expired
            .into_iter()
            .filter(|s| !self.distributors.contains_key(s))
            .collect()
    }

    /// Snapshots of every line that has last-known values
    pub fn snapshots(&self) -> Vec<NormalizedUpdate> {
        self.distributors
            .iter()
            .filter_map(|entry| entry.value().get_snapshot())
            .collect()
    }

    pub fn stats(&self) -> Vec<DistributorStats> {
        self.distributors.iter().map(|entry| entry.value().stats()).collect()
    }

    pub fn len(&self) -> usize {
        self.distributors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distributors.is_empty()
    }

    /// Periodically evict expired subscriptions on the tokio runtime
    pub fn spawn_expiry_sweeper(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                let evicted = self.evict_expired();
                if !evicted.is_empty() {
                    tracing::debug!("Expiry sweep evicted {} subscriptions", evicted.len());
                }
            }
        })
    }

    fn store_for(&self, persistent: bool) -> Arc<dyn LastKnownValueStoreProvider> {
        match (&self.persistent_store, persistent) {
            (Some(store), true) => Arc::clone(store),
            (None, true) => {
                tracing::warn!("No persistent store configured, using transient store");
                Arc::clone(&self.transient_store)
            }
            (_, false) => Arc::clone(&self.transient_store),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::lkv::InMemoryLkvStoreProvider;
    use crate::market_data::normalization::NormalizationRuleSet;
    use crate::market_data::sink::{CollectingSink, MarketDataSink};
    use crate::market_data::specification::{DistributionContext, ExternalId};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{OnceLock, Weak};

    fn manager(collector: &CollectingSink, expiry_ms: i64) -> SubscriptionManager {
        let collector = collector.clone();
        let factory = move |_ctx: &DistributionContext| -> Vec<Arc<dyn MarketDataSink>> { vec![Arc::new(collector.clone())] };

        let mut manager = SubscriptionManager::new(Arc::new(factory), Arc::new(InMemoryLkvStoreProvider), expiry_ms);
        manager.register_normalizer(Arc::new(NormalizationRuleSet::market_value("MarketValue")));
        manager
    }

    fn spec(ticker: &str) -> LiveDataSpecification {
        LiveDataSpecification::new("MarketValue", ExternalId::of("TICKER", ticker))
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let collector = CollectingSink::new("c");
        let manager = manager(&collector, 60_000);

        let first = manager.subscribe("alice", spec("EURUSD"), false).unwrap();
        let second = manager.subscribe("bob", spec("EURUSD"), false).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.len(), 1);
        assert_eq!(first.subscription().subscriber, "alice");
    }

    #[test]
    fn test_persistence_mode_mismatch_is_rejected() {
        let collector = CollectingSink::new("c");
        let manager = manager(&collector, 60_000);

        let transient = manager.subscribe("alice", spec("EURUSD"), false).unwrap();
        let result = manager.subscribe("bob", spec("EURUSD"), true);

        assert!(matches!(
            result,
            Err(SubscriptionError::PersistenceMismatch {
                existing_persistent: false,
                ..
            })
        ));
        assert!(!manager.get(&spec("EURUSD")).unwrap().is_persistent());

        // Same mode still reuses
        let again = manager.subscribe("bob", spec("EURUSD"), false).unwrap();
        assert!(Arc::ptr_eq(&transient, &again));

        manager.subscribe("alice", spec("USDJPY"), true).unwrap();
        assert!(manager.subscribe("bob", spec("USDJPY"), false).is_err());
        assert!(manager.get(&spec("USDJPY")).unwrap().is_persistent());
    }

    #[test]
    fn test_sender_factory_may_call_back_into_manager() {
        let collector = CollectingSink::new("c");
        let handle: Arc<OnceLock<Weak<SubscriptionManager>>> = Arc::new(OnceLock::new());
        let seen = Arc::new(AtomicUsize::new(usize::MAX));

        let factory = {
            let handle = Arc::clone(&handle);
            let seen = Arc::clone(&seen);
            let collector = collector.clone();
            move |ctx: &DistributionContext| -> Vec<Arc<dyn MarketDataSink>> {
                if let Some(manager) = handle.get().and_then(Weak::upgrade) {
                    assert!(manager.get(ctx.specification()).is_none());
                    seen.store(manager.len(), Ordering::SeqCst);
                }
                vec![Arc::new(collector.clone())]
            }
        };

        let mut manager = SubscriptionManager::new(Arc::new(factory), Arc::new(InMemoryLkvStoreProvider), 60_000);
        manager.register_normalizer(Arc::new(NormalizationRuleSet::market_value("MarketValue")));
        let manager = Arc::new(manager);
        handle.set(Arc::downgrade(&manager)).unwrap();

        manager.subscribe("alice", spec("EURUSD"), false).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        manager.subscribe("alice", spec("GBPUSD"), false).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_concurrently_created_line_keeps_first_distributor() {
        let collector = CollectingSink::new("c");
        let handle: Arc<OnceLock<Weak<SubscriptionManager>>> = Arc::new(OnceLock::new());
        let nested = Arc::new(AtomicBool::new(false));

        // The first build subscribes the same line from inside the factory,
        // so the outer subscribe finds the slot already taken
        let factory = {
            let handle = Arc::clone(&handle);
            let nested = Arc::clone(&nested);
            let collector = collector.clone();
            move |ctx: &DistributionContext| -> Vec<Arc<dyn MarketDataSink>> {
                if !nested.swap(true, Ordering::SeqCst) {
                    if let Some(manager) = handle.get().and_then(Weak::upgrade) {
                        manager.subscribe("bob", ctx.specification().clone(), false).unwrap();
                    }
                }
                vec![Arc::new(collector.clone())]
            }
        };

        let mut manager = SubscriptionManager::new(Arc::new(factory), Arc::new(InMemoryLkvStoreProvider), 60_000);
        manager.register_normalizer(Arc::new(NormalizationRuleSet::market_value("MarketValue")));
        let manager = Arc::new(manager);
        handle.set(Arc::downgrade(&manager)).unwrap();

        let distributor = manager.subscribe("alice", spec("EURUSD"), false).unwrap();

        assert_eq!(manager.len(), 1);
        assert_eq!(distributor.subscription().subscriber, "bob");
        assert!(Arc::ptr_eq(&distributor, &manager.get(&spec("EURUSD")).unwrap()));
    }

    #[test]
    fn test_unknown_rule_set_is_rejected() {
        let collector = CollectingSink::new("c");
        let manager = manager(&collector, 60_000);

        let result = manager.subscribe("alice", LiveDataSpecification::new("Nope", ExternalId::of("TICKER", "X")), false);
        assert!(matches!(result, Err(SubscriptionError::UnknownRuleSet(_))));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_distribute_routes_to_subscribed_line() {
        let collector = CollectingSink::new("c");
        let manager = manager(&collector, 60_000);
        manager.subscribe("alice", spec("EURUSD"), false).unwrap();

        let tick = FieldContainer::new().with("bid", dec!(1.1)).with("ask", dec!(1.2));
        assert!(manager.distribute(&spec("EURUSD"), &tick).unwrap().is_delivered());
        assert!(manager.distribute(&spec("GBPUSD"), &tick).is_none());

        assert_eq!(collector.len(), 1);
        assert_eq!(manager.snapshots().len(), 1);
    }

    #[test]
    fn test_evict_expired_keeps_persistent_lines() {
        let collector = CollectingSink::new("c");
        // Already past the deadline on creation
        let manager = manager(&collector, -1_000);

        manager.subscribe("alice", spec("EURUSD"), false).unwrap();
        manager.subscribe("alice", spec("USDJPY"), true).unwrap();

        let evicted = manager.evict_expired();

        assert_eq!(evicted, vec![spec("EURUSD")]);
        assert!(manager.get(&spec("EURUSD")).is_none());
        assert!(manager.get(&spec("USDJPY")).is_some());
    }

    #[test]
    fn test_heartbeat_and_unsubscribe() {
        let collector = CollectingSink::new("c");
        let manager = manager(&collector, 60_000);
        manager.subscribe("alice", spec("EURUSD"), false).unwrap();

        assert!(manager.heartbeat(&spec("EURUSD")));
        assert!(!manager.heartbeat(&spec("GBPUSD")));

        assert!(manager.unsubscribe(&spec("EURUSD")));
        assert!(!manager.unsubscribe(&spec("EURUSD")));
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn test_expiry_sweeper_evicts() {
        let collector = CollectingSink::new("c");
        let manager = Arc::new(manager(&collector, -1));
        manager.subscribe("alice", spec("EURUSD"), false).unwrap();

        let handle = Arc::clone(&manager).spawn_expiry_sweeper(Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert!(manager.is_empty());
    }
}

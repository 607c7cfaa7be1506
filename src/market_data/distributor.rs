use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use super::fields::FieldContainer;
use super::history::FieldHistoryStore;
use super::lkv::{LastKnownValueStore, LastKnownValueStoreProvider};
use super::sink::{MarketDataSink, SenderFactory};
use super::specification::{DistributionContext, DistributionSpecification, LiveDataSpecification, SubscriptionHandle};
use super::update::NormalizedUpdate;
use crate::errors::{DistributorError, NormalizationError, SinkError};

/// Result of pushing one raw tick into a distributor
#[derive(Debug, Clone, PartialEq)]
pub enum DistributionOutcome {
    /// Normalized, merged into last-known values and sent to every sink
    Delivered { sequence_number: u64, failed_sinks: usize },
    /// Normalized and merged into last-known values without notifying sinks
    Merged,
    /// Normalization left nothing worth delivering; no state changed
    Extinguished,
    /// Normalization failed; no state changed
    Rejected(NormalizationError),
}

impl DistributionOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DistributionOutcome::Delivered { .. })
    }
}

/// Statistics for one distributor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributorStats {
    pub specification: LiveDataSpecification,
    pub sent_count: u64,
    pub sinks: Vec<String>,
    pub sink_failures: u64,
    pub normalization_failures: u64,
    pub extinguished: u64,
    pub last_known_fields: usize,
    pub persistent: bool,
    pub expiry_epoch_millis: Option<i64>,
}

/// State touched by the live data path, guarded as one unit
struct DataPath {
    last_known_values: Box<dyn LastKnownValueStore>,
    history: FieldHistoryStore,
    sent_count: u64,
}

/// Owns one subscription's normalization, last-known values, field history
/// and fan-out to sinks
///
/// Two independent locks:
/// - the data path (`update_field_history`, `distribute_live_data`,
///   `get_snapshot`) is single-writer/multi-reader; writers are fully
///   serialized so sequence numbers follow call order
/// - the expiry deadline has its own lock so heartbeats never contend with
///   live data
///
/// # Example
/// ```ignore
/// let distributor = MarketDataDistributor::new(
///     distribution_spec,
///     subscription,
///     &sender_factory,
///     false,
///     &InMemoryLkvStoreProvider,
/// )?;
///
/// distributor.distribute_live_data(&raw_tick);
/// let snapshot = distributor.get_snapshot();
/// ```
pub struct MarketDataDistributor {
    distribution: DistributionSpecification,
    context: DistributionContext,
    sinks: Vec<Arc<dyn MarketDataSink>>,
    data: RwLock<DataPath>,
    expiry_epoch_millis: Mutex<Option<i64>>,
    sink_failures: AtomicU64,
    normalization_failures: AtomicU64,
    extinguished: AtomicU64,
}

impl MarketDataDistributor {
    /// Create the distributor for an established subscription
    ///
    /// Fails if the specification is incomplete or differs from the
    /// subscription's, if the store cannot be
    /// opened, or if the sender factory yields no sinks. Any values already in
    /// the opened store seed the field history, which is how a persistent
    /// store restores state after a restart.
    pub fn new(
        distribution: DistributionSpecification,
        subscription: SubscriptionHandle,
        sender_factory: &dyn SenderFactory,
        persistent: bool,
        lkv_provider: &dyn LastKnownValueStoreProvider,
    ) -> Result<Self, DistributorError> {
        let specification = &distribution.specification;
        if specification.identifier.is_empty() {
            return Err(DistributorError::MissingDataLine);
        }
        if specification.normalization_rule_set_id.is_empty() {
            return Err(DistributorError::MissingRuleSet);
        }
        if subscription.specification != *specification {
            return Err(DistributorError::SpecificationMismatch {
                subscription: subscription.specification.to_string(),
                distribution: specification.to_string(),
            });
        }

        let last_known_values = lkv_provider.new_instance(specification)?;
        let history = if last_known_values.is_empty() {
            FieldHistoryStore::new()
        } else {
            FieldHistoryStore::seeded(&last_known_values.get_fields())
        };

        let context = DistributionContext {
            subscription,
            persistent,
        };
        let sinks = sender_factory.create(&context);
        if sinks.is_empty() {
            return Err(DistributorError::NoSinks(specification.to_string()));
        }

        tracing::info!(
            "📡 Distributor created for {} ({} sinks, persistent={}, restored {} fields)",
            specification,
            sinks.len(),
            persistent,
            history.last_normalized().len()
        );

        Ok(Self {
            distribution,
            context,
            sinks,
            data: RwLock::new(DataPath {
                last_known_values,
                history,
                sent_count: 0,
            }),
            expiry_epoch_millis: Mutex::new(None),
            sink_failures: AtomicU64::new(0),
            normalization_failures: AtomicU64::new(0),
            extinguished: AtomicU64::new(0),
        })
    }

    pub fn specification(&self) -> &LiveDataSpecification {
        &self.distribution.specification
    }

    pub fn subscription(&self) -> &SubscriptionHandle {
        &self.context.subscription
    }

    pub fn sink_names(&self) -> Vec<String> {
        self.sinks.iter().map(|s| s.name().to_string()).collect()
    }

    /// Normalize a tick and merge it into last-known values without
    /// notifying sinks or advancing the sequence
    ///
    /// Keeps state warm before any consumer cares about updates.
    pub fn update_field_history(&self, raw: &FieldContainer) -> DistributionOutcome {
        let mut data = self.data.write();
        match self.normalize(raw, &data.history) {
            Ok(Some(normalized)) => {
                Self::commit(&mut data, raw, &normalized);
                DistributionOutcome::Merged
            }
            Ok(None) => DistributionOutcome::Extinguished,
            Err(e) => DistributionOutcome::Rejected(e),
        }
    }

    /// Normalize a tick, merge it into last-known values and send it to every sink
    ///
    /// A failing or panicking sink is logged and skipped; the remaining sinks
    /// still receive the update and the sequence still advances.
    pub fn distribute_live_data(&self, raw: &FieldContainer) -> DistributionOutcome {
        let mut data = self.data.write();

        let normalized = match self.normalize(raw, &data.history) {
            Ok(Some(normalized)) => normalized,
            Ok(None) => return DistributionOutcome::Extinguished,
            Err(e) => return DistributionOutcome::Rejected(e),
        };

        Self::commit(&mut data, raw, &normalized);

        let sequence_number = data.sent_count;
        let update = NormalizedUpdate::new(sequence_number, self.distribution.specification.clone(), normalized);

        let mut failed_sinks = 0;
        for sink in &self.sinks {
            if let Err(e) = Self::send_to(sink.as_ref(), &update) {
                failed_sinks += 1;
                self.sink_failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    "📡 Failed to send update #{} for {}: {}",
                    sequence_number,
                    self.distribution.specification,
                    e
                );
            }
        }

        data.sent_count += 1;

        DistributionOutcome::Delivered {
            sequence_number,
            failed_sinks,
        }
    }

    /// Current last-known values as an update, or `None` if nothing is known yet
    ///
    /// The sequence number is the count of updates sent so far; reading a
    /// snapshot never advances it.
    pub fn get_snapshot(&self) -> Option<NormalizedUpdate> {
        let data = self.data.read();
        if data.last_known_values.is_empty() {
            return None;
        }
        Some(NormalizedUpdate::new(
            data.sent_count,
            self.distribution.specification.clone(),
            data.last_known_values.get_fields(),
        ))
    }

    pub fn sent_count(&self) -> u64 {
        self.data.read().sent_count
    }

    pub fn last_known_values(&self) -> FieldContainer {
        self.data.read().last_known_values.get_fields()
    }

    pub fn field_history(&self) -> FieldHistoryStore {
        self.data.read().history.clone()
    }

    pub fn is_persistent(&self) -> bool {
        self.context.persistent
    }

    pub fn expiry_epoch_millis(&self) -> Option<i64> {
        *self.expiry_epoch_millis.lock()
    }

    /// Move the expiry deadline to `now + delta_millis`
    pub fn extend_expiry(&self, delta_millis: i64) {
        let deadline = Utc::now().timestamp_millis().saturating_add(delta_millis);
        *self.expiry_epoch_millis.lock() = Some(deadline);
    }

    /// Never true for a persistent distributor
    pub fn has_expired(&self) -> bool {
        self.has_expired_at(Utc::now().timestamp_millis())
    }

    pub fn has_expired_at(&self, now_epoch_millis: i64) -> bool {
        if self.context.persistent {
            return false;
        }
        match *self.expiry_epoch_millis.lock() {
            Some(deadline) => deadline < now_epoch_millis,
            None => false,
        }
    }

    pub fn stats(&self) -> DistributorStats {
        let (sent_count, last_known_fields) = {
            let data = self.data.read();
            (data.sent_count, data.last_known_values.get_fields().len())
        };

        DistributorStats {
            specification: self.distribution.specification.clone(),
            sent_count,
            sinks: self.sink_names(),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            normalization_failures: self.normalization_failures.load(Ordering::Relaxed),
            extinguished: self.extinguished.load(Ordering::Relaxed),
            last_known_fields,
            persistent: self.context.persistent,
            expiry_epoch_millis: self.expiry_epoch_millis(),
        }
    }

    fn normalize(
        &self,
        raw: &FieldContainer,
        history: &FieldHistoryStore,
    ) -> Result<Option<FieldContainer>, NormalizationError> {
        let result = self.distribution.normalizer.normalize(raw, &self.context, history);
        match &result {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.extinguished.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("Extinguished message for {}: {:?}", self.distribution.specification, raw);
            }
            Err(e) => {
                self.normalization_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Normalization failed for {}: {}", self.distribution.specification, e);
            }
        }
        result
    }

    fn commit(data: &mut DataPath, raw: &FieldContainer, normalized: &FieldContainer) {
        data.history.record_raw(raw);
        data.history.record_normalized(normalized);
        data.last_known_values.update_fields(normalized);
    }

    fn send_to(sink: &dyn MarketDataSink, update: &NormalizedUpdate) -> Result<(), SinkError> {
        match panic::catch_unwind(AssertUnwindSafe(|| sink.send(update))) {
            Ok(result) => result,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(SinkError::Panicked {
                    sink: sink.name().to_string(),
                    message,
                })
            }
        }
    }
}

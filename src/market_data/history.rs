use serde::{Deserialize, Serialize};

use super::fields::{FieldContainer, FieldValue};

/// Accumulated field history for one subscription
///
/// Normalization rules that need look-back (mid from a stale side, change
/// from the previous tick) read from here. The distributor only records into
/// it after a tick has normalized to a non-empty result, so a failed or
/// extinguished tick leaves no trace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldHistoryStore {
    last_raw: FieldContainer,
    last_normalized: FieldContainer,
    raw_messages: u64,
    normalized_messages: u64,
}

impl FieldHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from previously known normalized values, e.g. a persistent store
    /// that survived a restart
    pub fn seeded(last_known: &FieldContainer) -> Self {
        Self {
            last_normalized: last_known.clone(),
            ..Self::default()
        }
    }

    pub fn record_raw(&mut self, raw: &FieldContainer) {
        self.last_raw.merge_from(raw);
        self.raw_messages += 1;
    }

    pub fn record_normalized(&mut self, normalized: &FieldContainer) {
        self.last_normalized.merge_from(normalized);
        self.normalized_messages += 1;
    }

    pub fn last_raw_value(&self, field: &str) -> Option<&FieldValue> {
        self.last_raw.get(field)
    }

    pub fn last_normalized_value(&self, field: &str) -> Option<&FieldValue> {
        self.last_normalized.get(field)
    }

    pub fn last_normalized(&self) -> &FieldContainer {
        &self.last_normalized
    }

    pub fn raw_messages(&self) -> u64 {
        self.raw_messages
    }

    pub fn normalized_messages(&self) -> u64 {
        self.normalized_messages
    }

    pub fn is_empty(&self) -> bool {
        self.last_raw.is_empty() && self.last_normalized.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_seeded_history_exposes_previous_values() {
        let lkv = FieldContainer::new().with("BID", dec!(99.5));
        let history = FieldHistoryStore::seeded(&lkv);

        assert_eq!(history.last_normalized_value("BID"), Some(&FieldValue::from(dec!(99.5))));
        assert_eq!(history.normalized_messages(), 0);
        assert!(!history.is_empty());
    }

    #[test]
    fn test_records_accumulate_per_field() {
        let mut history = FieldHistoryStore::new();
        history.record_raw(&FieldContainer::new().with("bid", dec!(1)));
        history.record_raw(&FieldContainer::new().with("ask", dec!(2)));

        assert_eq!(history.raw_messages(), 2);
        assert_eq!(history.last_raw_value("bid"), Some(&FieldValue::from(dec!(1))));
        assert_eq!(history.last_raw_value("ask"), Some(&FieldValue::from(dec!(2))));
    }
}

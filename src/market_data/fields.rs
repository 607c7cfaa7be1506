use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single market data field value
///
/// Prices and sizes are carried as `Decimal` to avoid float rounding; anything
/// else (status flags, venue codes) stays text. Serialized with its kind as
/// the tag (`{"number":"1.25"}`, `{"text":"XLON"}`) so a text value that looks
/// numeric comes back as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldValue {
    Number(#[serde(with = "rust_decimal::serde::str")] Decimal),
    Text(String),
}

impl FieldValue {
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            FieldValue::Number(d) => Some(*d),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Number(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(d) => write!(f, "{}", d),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(Decimal::from(value))
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

/// Ordered field name to value mapping
///
/// Ordered so that logs, snapshots and persisted stores are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldContainer {
    fields: BTreeMap<String, FieldValue>,
}

impl FieldContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn get_decimal(&self, name: &str) -> Option<Decimal> {
        self.fields.get(name).and_then(FieldValue::as_decimal)
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.fields.retain(|name, _| keep(name));
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    /// Overwrite this container's values with every field of `other`
    pub fn merge_from(&mut self, other: &FieldContainer) {
        for (name, value) in &other.fields {
            self.fields.insert(name.clone(), value.clone());
        }
    }
}

impl FromIterator<(String, FieldValue)> for FieldContainer {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_merge_overwrites_and_keeps_untouched_fields() {
        let mut lkv = FieldContainer::new().with("BID", dec!(100)).with("ASK", dec!(101));
        let update = FieldContainer::new().with("BID", dec!(100.5)).with("LAST", dec!(100.7));

        lkv.merge_from(&update);

        assert_eq!(lkv.len(), 3);
        assert_eq!(lkv.get_decimal("BID"), Some(dec!(100.5)));
        assert_eq!(lkv.get_decimal("ASK"), Some(dec!(101)));
        assert_eq!(lkv.get_decimal("LAST"), Some(dec!(100.7)));
    }

    #[test]
    fn test_text_values_are_not_decimal() {
        let fields = FieldContainer::new().with("STATUS", "HALTED");
        assert_eq!(fields.get_decimal("STATUS"), None);
        assert_eq!(fields.get("STATUS").and_then(|v| v.as_text()), Some("HALTED"));
    }

    #[test]
    fn test_json_shape_is_tagged_by_kind() {
        let fields = FieldContainer::new().with("BID", dec!(1.25)).with("VENUE", "XLON");
        let json = serde_json::to_value(&fields).unwrap();

        assert_eq!(json, serde_json::json!({"BID": {"number": "1.25"}, "VENUE": {"text": "XLON"}}));
        let back: FieldContainer = serde_json::from_value(json).unwrap();
        assert_eq!(back, fields);
    }

    #[test]
    fn test_numeric_looking_text_stays_text() {
        let fields = FieldContainer::new()
            .with("STATUS", "1")
            .with("SETTLE", "2024-01-02")
            .with("LAST", dec!(1));

        let json = serde_json::to_string(&fields).unwrap();
        let back: FieldContainer = serde_json::from_str(&json).unwrap();

        assert_eq!(back.get("STATUS"), Some(&FieldValue::Text("1".to_string())));
        assert_eq!(back.get_decimal("STATUS"), None);
        assert_eq!(back.get("LAST"), Some(&FieldValue::Number(dec!(1))));
        assert_eq!(back, fields);
    }
}

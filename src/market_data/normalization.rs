//! Raw tick normalization
//!
//! A `Normalizer` turns a raw tick into the engine's canonical fields. The
//! standard implementation is a `NormalizationRuleSet`: an ordered list of
//! rules, each of which may transform the message, extinguish it (`Ok(None)`)
//! or reject it with a `NormalizationError`.

use rust_decimal::Decimal;

use super::fields::{FieldContainer, FieldValue};
use super::history::FieldHistoryStore;
use super::specification::DistributionContext;
use crate::errors::NormalizationError;

/// Turns raw ticks into normalized fields
///
/// Must not mutate anything: the distributor records into `history` itself,
/// and only once the whole tick has normalized successfully.
pub trait Normalizer: Send + Sync {
    fn rule_set_id(&self) -> &str;

    /// `Ok(None)` means the message was extinguished
    fn normalize(
        &self,
        raw: &FieldContainer,
        context: &DistributionContext,
        history: &FieldHistoryStore,
    ) -> Result<Option<FieldContainer>, NormalizationError>;
}

/// One step of a rule set
pub trait NormalizationRule: Send + Sync {
    fn name(&self) -> &str;

    fn apply(
        &self,
        message: FieldContainer,
        context: &DistributionContext,
        history: &FieldHistoryStore,
    ) -> Result<Option<FieldContainer>, NormalizationError>;
}

/// Ordered list of rules identified by a rule set id
pub struct NormalizationRuleSet {
    id: String,
    rules: Vec<Box<dyn NormalizationRule>>,
}

impl NormalizationRuleSet {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rules: Vec::new(),
        }
    }

    /// Builder-style rule registration
    pub fn with_rule(mut self, rule: impl NormalizationRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Bid/ask/last ticks with a derived mid and tick-to-tick change of the mid
    pub fn market_value(id: impl Into<String>) -> Self {
        Self::new(id)
            .with_rule(RenameField::new("bid", "BID"))
            .with_rule(RenameField::new("ask", "ASK"))
            .with_rule(RenameField::new("last", "LAST"))
            .with_rule(RequireNumeric::new(["BID", "ASK", "LAST"]))
            .with_rule(RetainFields::new(["BID", "ASK", "LAST"]))
            .with_rule(MidFromBidAsk::new("BID", "ASK", "MID"))
            .with_rule(ChangeFromPrevious::new("MID", "MID_CHANGE"))
    }
}

impl Normalizer for NormalizationRuleSet {
    fn rule_set_id(&self) -> &str {
        &self.id
    }

    fn normalize(
        &self,
        raw: &FieldContainer,
        context: &DistributionContext,
        history: &FieldHistoryStore,
    ) -> Result<Option<FieldContainer>, NormalizationError> {
        let mut message = raw.clone();
        for rule in &self.rules {
            match rule.apply(message, context, history)? {
                Some(next) => message = next,
                None => {
                    tracing::trace!("{} extinguished by rule {}", context.specification(), rule.name());
                    return Ok(None);
                }
            }
        }
        Ok(if message.is_empty() { None } else { Some(message) })
    }
}

fn numeric(message: &FieldContainer, field: &str) -> Result<Option<Decimal>, NormalizationError> {
    match message.get(field) {
        None => Ok(None),
        Some(FieldValue::Number(d)) => Ok(Some(*d)),
        Some(FieldValue::Text(s)) => Err(NormalizationError::NotNumeric {
            field: field.to_string(),
            value: s.clone(),
        }),
    }
}

/// Keeps only the listed fields; extinguishes the message if none remain
pub struct RetainFields {
    fields: Vec<String>,
}

impl RetainFields {
    pub fn new<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl NormalizationRule for RetainFields {
    fn name(&self) -> &str {
        "retain-fields"
    }

    fn apply(
        &self,
        mut message: FieldContainer,
        _context: &DistributionContext,
        _history: &FieldHistoryStore,
    ) -> Result<Option<FieldContainer>, NormalizationError> {
        message.retain(|name| self.fields.iter().any(|f| f == name));
        Ok(if message.is_empty() { None } else { Some(message) })
    }
}

/// Moves a field to a new name
pub struct RenameField {
    from: String,
    to: String,
}

impl RenameField {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl NormalizationRule for RenameField {
    fn name(&self) -> &str {
        "rename-field"
    }

    fn apply(
        &self,
        mut message: FieldContainer,
        _context: &DistributionContext,
        _history: &FieldHistoryStore,
    ) -> Result<Option<FieldContainer>, NormalizationError> {
        if let Some(value) = message.remove(&self.from) {
            message.insert(self.to.clone(), value);
        }
        Ok(Some(message))
    }
}

/// Rejects ticks that lack any of the listed fields
pub struct RequireFields {
    fields: Vec<String>,
}

impl RequireFields {
    pub fn new<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl NormalizationRule for RequireFields {
    fn name(&self) -> &str {
        "require-fields"
    }

    fn apply(
        &self,
        message: FieldContainer,
        _context: &DistributionContext,
        _history: &FieldHistoryStore,
    ) -> Result<Option<FieldContainer>, NormalizationError> {
        if let Some(missing) = self.fields.iter().find(|f| !message.contains(f)) {
            return Err(NormalizationError::MissingField(missing.clone()));
        }
        Ok(Some(message))
    }
}

/// Rejects ticks where any of the listed fields is present but not a number
pub struct RequireNumeric {
    fields: Vec<String>,
}

impl RequireNumeric {
    pub fn new<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl NormalizationRule for RequireNumeric {
    fn name(&self) -> &str {
        "require-numeric"
    }

    fn apply(
        &self,
        message: FieldContainer,
        _context: &DistributionContext,
        _history: &FieldHistoryStore,
    ) -> Result<Option<FieldContainer>, NormalizationError> {
        for field in &self.fields {
            numeric(&message, field)?;
        }
        Ok(Some(message))
    }
}

/// Multiplies a numeric field by a constant (e.g. percent quotes to decimals)
pub struct ScaleField {
    field: String,
    factor: Decimal,
}

impl ScaleField {
    pub fn new(field: impl Into<String>, factor: Decimal) -> Self {
        Self {
            field: field.into(),
            factor,
        }
    }
}

impl NormalizationRule for ScaleField {
    fn name(&self) -> &str {
        "scale-field"
    }

    fn apply(
        &self,
        mut message: FieldContainer,
        _context: &DistributionContext,
        _history: &FieldHistoryStore,
    ) -> Result<Option<FieldContainer>, NormalizationError> {
        if let Some(value) = numeric(&message, &self.field)? {
            let scaled = value
                .checked_mul(self.factor)
                .ok_or_else(|| NormalizationError::Overflow(self.field.clone()))?;
            message.insert(self.field.clone(), scaled);
        }
        Ok(Some(message))
    }
}

/// Derives a mid price from bid and ask
///
/// A side missing from this tick is taken from the last normalized value in
/// history, so a bid-only update still refreshes the mid.
pub struct MidFromBidAsk {
    bid: String,
    ask: String,
    mid: String,
}

impl MidFromBidAsk {
    pub fn new(bid: impl Into<String>, ask: impl Into<String>, mid: impl Into<String>) -> Self {
        Self {
            bid: bid.into(),
            ask: ask.into(),
            mid: mid.into(),
        }
    }

    fn side(
        &self,
        message: &FieldContainer,
        history: &FieldHistoryStore,
        field: &str,
    ) -> Result<Option<Decimal>, NormalizationError> {
        match numeric(message, field)? {
            Some(value) => Ok(Some(value)),
            None => Ok(history.last_normalized_value(field).and_then(FieldValue::as_decimal)),
        }
    }
}

impl NormalizationRule for MidFromBidAsk {
    fn name(&self) -> &str {
        "mid-from-bid-ask"
    }

    fn apply(
        &self,
        mut message: FieldContainer,
        _context: &DistributionContext,
        history: &FieldHistoryStore,
    ) -> Result<Option<FieldContainer>, NormalizationError> {
        // Nothing on this tick touches either side
        if !message.contains(&self.bid) && !message.contains(&self.ask) {
            return Ok(Some(message));
        }

        let bid = self.side(&message, history, &self.bid)?;
        let ask = self.side(&message, history, &self.ask)?;
        if let (Some(bid), Some(ask)) = (bid, ask) {
            let sum = bid
                .checked_add(ask)
                .ok_or_else(|| NormalizationError::Overflow(self.mid.clone()))?;
            message.insert(self.mid.clone(), sum / Decimal::TWO);
        }
        Ok(Some(message))
    }
}

/// Emits the change of a field against its previously normalized value
pub struct ChangeFromPrevious {
    field: String,
    output: String,
}

impl ChangeFromPrevious {
    pub fn new(field: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            output: output.into(),
        }
    }
}

impl NormalizationRule for ChangeFromPrevious {
    fn name(&self) -> &str {
        "change-from-previous"
    }

    fn apply(
        &self,
        mut message: FieldContainer,
        _context: &DistributionContext,
        history: &FieldHistoryStore,
    ) -> Result<Option<FieldContainer>, NormalizationError> {
        let current = numeric(&message, &self.field)?;
        let previous = history.last_normalized_value(&self.field).and_then(FieldValue::as_decimal);

        if let (Some(current), Some(previous)) = (current, previous) {
            let change = current
                .checked_sub(previous)
                .ok_or_else(|| NormalizationError::Overflow(self.output.clone()))?;
            message.insert(self.output.clone(), change);
        }
        Ok(Some(message))
    }
}

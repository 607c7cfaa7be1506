use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::normalization::Normalizer;

/// Identifier of a data line within a scheme, e.g. `BLOOMBERG_TICKER~AAPL US Equity`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExternalId {
    pub scheme: String,
    pub value: String,
}

impl ExternalId {
    pub fn of(scheme: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            value: value.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scheme.is_empty() || self.value.is_empty()
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}~{}", self.scheme, self.value)
    }
}

/// Fully-qualified identity of a data line: which instrument, normalized how
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LiveDataSpecification {
    pub normalization_rule_set_id: String,
    pub identifier: ExternalId,
}

impl LiveDataSpecification {
    pub fn new(normalization_rule_set_id: impl Into<String>, identifier: ExternalId) -> Self {
        Self {
            normalization_rule_set_id: normalization_rule_set_id.into(),
            identifier,
        }
    }

    /// Store key for last-known values: one store per (data line, rule set)
    ///
    /// Each component is hex-encoded, so `_` never occurs inside one and
    /// distinct specifications always get distinct keys. The key is also safe
    /// to use as a file name.
    pub fn store_key(&self) -> String {
        format!(
            "{}_{}_{}",
            hex::encode(&self.identifier.scheme),
            hex::encode(&self.identifier.value),
            hex::encode(&self.normalization_rule_set_id)
        )
    }
}

impl fmt::Display for LiveDataSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.identifier, self.normalization_rule_set_id)
    }
}

/// An established subscription to a data line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionHandle {
    pub id: Uuid,
    pub subscriber: String,
    pub specification: LiveDataSpecification,
}

impl SubscriptionHandle {
    pub fn new(subscriber: impl Into<String>, specification: LiveDataSpecification) -> Self {
        Self {
            id: Uuid::new_v4(),
            subscriber: subscriber.into(),
            specification,
        }
    }
}

/// What a normalizer and a sender factory may know about the subscription
/// they are serving
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionContext {
    pub subscription: SubscriptionHandle,
    pub persistent: bool,
}

impl DistributionContext {
    pub fn specification(&self) -> &LiveDataSpecification {
        &self.subscription.specification
    }
}

/// A fully-qualified data line together with the normalizer that produces it
#[derive(Clone)]
pub struct DistributionSpecification {
    pub specification: LiveDataSpecification,
    pub normalizer: Arc<dyn Normalizer>,
}

impl DistributionSpecification {
    pub fn new(specification: LiveDataSpecification, normalizer: Arc<dyn Normalizer>) -> Self {
        if specification.normalization_rule_set_id != normalizer.rule_set_id() {
            tracing::warn!(
                "Rule set {} used to normalize {}",
                normalizer.rule_set_id(),
                specification
            );
        }
        Self {
            specification,
            normalizer,
        }
    }
}

impl fmt::Debug for DistributionSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributionSpecification")
            .field("specification", &self.specification)
            .field("rule_set", &self.normalizer.rule_set_id())
            .finish()
    }
}

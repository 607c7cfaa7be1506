//! Error types for the recomputation core
//!
//! Expected operational conditions (extinguished messages, expired
//! subscriptions, a prevented cycle) are never errors; they are encoded in
//! return values. The enums here are reserved for contract violations and for
//! collaborators that misbehave.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while constructing a market data distributor
///
/// These are configuration errors: the constructor fails and no distributor
/// exists. They are never produced on the live data path.
#[derive(Debug, Error)]
pub enum DistributorError {
    /// The data line identifier is empty
    #[error("Missing data line identifier")]
    MissingDataLine,

    /// The normalization rule set identifier is empty
    #[error("Missing normalization rule set id")]
    MissingRuleSet,

    /// The subscription handle names a different data line than the distribution
    #[error("Subscription for {subscription} does not match distribution for {distribution}")]
    SpecificationMismatch { subscription: String, distribution: String },

    /// The sender factory produced no sinks for the subscription
    #[error("Sender factory yielded no sinks for {0}")]
    NoSinks(String),

    /// The last-known-value store could not be opened
    #[error("Last known value store unavailable: {0}")]
    Store(#[from] LkvStoreError),
}

impl DistributorError {
    /// Returns true if the error is caused by the caller's configuration
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            DistributorError::MissingDataLine
                | DistributorError::MissingRuleSet
                | DistributorError::SpecificationMismatch { .. }
                | DistributorError::NoSinks(_)
        )
    }
}

/// Errors raised by a normalization rule
///
/// Recoverable: the offending tick is dropped and distributor state is left
/// exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    /// A field required by the rule set is absent from the tick
    #[error("Required field missing: {0}")]
    MissingField(String),

    /// A field expected to carry a number holds something else
    #[error("Field {field} is not numeric: {value}")]
    NotNumeric { field: String, value: String },

    /// Arithmetic in a rule overflowed
    #[error("Arithmetic overflow normalizing field {0}")]
    Overflow(String),
}

/// Errors raised by the subscription manager
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// No normalizer is registered under the requested rule set id
    #[error("Unknown normalization rule set: {0}")]
    UnknownRuleSet(String),

    /// The line is already distributed with the other persistence mode
    #[error("{specification} is already subscribed with persistent={existing_persistent}")]
    PersistenceMismatch {
        specification: String,
        existing_persistent: bool,
    },

    #[error(transparent)]
    Distributor(#[from] DistributorError),
}

/// Errors raised by a single sink while delivering an update
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The receiving end of the sink has gone away
    #[error("Sink {0} is closed")]
    Closed(String),

    /// The sink refused the update
    #[error("Sink {sink} rejected update: {reason}")]
    Rejected { sink: String, reason: String },

    /// The sink panicked while handling the update
    #[error("Sink {sink} panicked: {message}")]
    Panicked { sink: String, message: String },
}

impl SinkError {
    /// Returns true if retrying against the same sink is pointless
    pub fn is_permanent(&self) -> bool {
        matches!(self, SinkError::Closed(_))
    }
}

/// Errors raised by a persistent last-known-value store
#[derive(Debug, Error)]
pub enum LkvStoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt store file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode store contents: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors raised by the cycle scheduler
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The cycle executor reported a failure; no policy was notified
    #[error("Cycle execution failed: {0}")]
    Execution(String),

    /// The scheduler was started with no policies at all
    #[error("No cycle policies configured")]
    NoPolicies,
}

/// Errors raised while loading configuration from the environment
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: String, value: String },
}

//! Market data distribution module
//!
//! Each subscribed data line gets its own `MarketDataDistributor`, which
//! normalizes raw ticks, keeps last-known values and field history, and fans
//! sequenced updates out to the sinks its `SenderFactory` created. The
//! `SubscriptionManager` owns the distributors and acts on their expiry.

pub mod distributor;
pub mod fields;
pub mod history;
pub mod lkv;
pub mod normalization;
pub mod sink;
pub mod specification;
pub mod subscription_manager;
pub mod update;

pub use distributor::{DistributionOutcome, DistributorStats, MarketDataDistributor};
pub use fields::{FieldContainer, FieldValue};
pub use history::FieldHistoryStore;
pub use lkv::{
    FileLkvStore, FileLkvStoreProvider, InMemoryLkvStore, InMemoryLkvStoreProvider, LastKnownValueStore,
    LastKnownValueStoreProvider,
};
pub use normalization::{
    ChangeFromPrevious, MidFromBidAsk, NormalizationRule, NormalizationRuleSet, Normalizer, RenameField,
    RequireFields, RequireNumeric, RetainFields, ScaleField,
};
pub use sink::{ChannelSink, CollectingSink, LoggingSink, MarketDataSink, SenderFactory};
pub use specification::{
    DistributionContext, DistributionSpecification, ExternalId, LiveDataSpecification, SubscriptionHandle,
};
pub use subscription_manager::SubscriptionManager;
pub use update::NormalizedUpdate;

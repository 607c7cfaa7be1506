//! Last-known-value stores
//!
//! A store holds the most recent normalized state of one data line under one
//! normalization rule set. Providers decide whether that state outlives the
//! process: `InMemoryLkvStoreProvider` is transient, `FileLkvStoreProvider`
//! persists each store as a JSON file and reloads it on the next start.

use std::fs;
use std::path::{Path, PathBuf};

use super::fields::FieldContainer;
use super::specification::LiveDataSpecification;
use crate::errors::LkvStoreError;

/// The latest normalized values for one subscription
///
/// Exactly one distributor writes to a given store at a time.
pub trait LastKnownValueStore: Send + Sync {
    fn get_fields(&self) -> FieldContainer;

    /// Merge `fields` into the stored values
    fn update_fields(&mut self, fields: &FieldContainer);

    fn is_empty(&self) -> bool;
}

/// Opens last-known-value stores keyed by (data line, rule set)
pub trait LastKnownValueStoreProvider: Send + Sync {
    fn new_instance(
        &self,
        specification: &LiveDataSpecification,
    ) -> Result<Box<dyn LastKnownValueStore>, LkvStoreError>;

    /// Whether stores from this provider survive a process restart
    fn is_persistent(&self) -> bool;
}

/// Process-local store
#[derive(Debug, Clone, Default)]
pub struct InMemoryLkvStore {
    fields: FieldContainer,
}

impl InMemoryLkvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LastKnownValueStore for InMemoryLkvStore {
    fn get_fields(&self) -> FieldContainer {
        self.fields.clone()
    }

    fn update_fields(&mut self, fields: &FieldContainer) {
        self.fields.merge_from(fields);
    }

    fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InMemoryLkvStoreProvider;

impl LastKnownValueStoreProvider for InMemoryLkvStoreProvider {
    fn new_instance(
        &self,
        _specification: &LiveDataSpecification,
    ) -> Result<Box<dyn LastKnownValueStore>, LkvStoreError> {
        Ok(Box::new(InMemoryLkvStore::new()))
    }

    fn is_persistent(&self) -> bool {
        false
    }
}

/// Store backed by a JSON file
///
/// The in-memory copy is authoritative for the running process. Every update
/// rewrites the file; a failed write is logged and the in-memory view is kept.
pub struct FileLkvStore {
    path: PathBuf,
    fields: FieldContainer,
}

impl FileLkvStore {
    /// Open the store at `path`, loading any previously persisted values
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LkvStoreError> {
        let path = path.into();
        let fields = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|source| LkvStoreError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FieldContainer::new(),
            Err(source) => return Err(LkvStoreError::Io { path, source }),
        };

        if !fields.is_empty() {
            tracing::info!("Restored {} last known values from {}", fields.len(), path.display());
        }

        Ok(Self { path, fields })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), LkvStoreError> {
        let json = serde_json::to_string(&self.fields)?;
        // Write then rename so a crash never leaves a half-written file
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| LkvStoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| LkvStoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl LastKnownValueStore for FileLkvStore {
    fn get_fields(&self) -> FieldContainer {
        self.fields.clone()
    }

    fn update_fields(&mut self, fields: &FieldContainer) {
        self.fields.merge_from(fields);
        if let Err(e) = self.persist() {
            tracing::warn!("Failed to persist last known values: {}", e);
        }
    }

    fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Opens one `FileLkvStore` per (data line, rule set) under a root directory
#[derive(Debug, Clone)]
pub struct FileLkvStoreProvider {
    root: PathBuf,
}

impl FileLkvStoreProvider {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, LkvStoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| LkvStoreError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    /// One file per store key; the key is already file-name safe
    pub fn path_for(&self, specification: &LiveDataSpecification) -> PathBuf {
        self.root.join(format!("{}.json", specification.store_key()))
    }
}

impl LastKnownValueStoreProvider for FileLkvStoreProvider {
    fn new_instance(
        &self,
        specification: &LiveDataSpecification,
    ) -> Result<Box<dyn LastKnownValueStore>, LkvStoreError> {
        Ok(Box::new(FileLkvStore::open(self.path_for(specification))?))
    }

    fn is_persistent(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::fields::FieldValue;
    use crate::market_data::specification::ExternalId;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn spec() -> LiveDataSpecification {
        LiveDataSpecification::new("MarketValue", ExternalId::of("TICKER", "AAPL US Equity"))
    }

    #[test]
    fn test_in_memory_store_starts_empty() {
        let provider = InMemoryLkvStoreProvider;
        let mut store = provider.new_instance(&spec()).unwrap();
        assert!(store.is_empty());

        store.update_fields(&FieldContainer::new().with("BID", dec!(10)));
        assert_eq!(store.get_fields().get_decimal("BID"), Some(dec!(10)));

        // A fresh instance does not see the previous one
        assert!(provider.new_instance(&spec()).unwrap().is_empty());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let provider = FileLkvStoreProvider::new(dir.path()).unwrap();

        {
            let mut store = provider.new_instance(&spec()).unwrap();
            store.update_fields(&FieldContainer::new().with("BID", dec!(10)).with("ASK", dec!(11)));
            store.update_fields(&FieldContainer::new().with("BID", dec!(10.5)).with("STATUS", "1"));
        }

        let reopened = provider.new_instance(&spec()).unwrap();
        assert!(!reopened.is_empty());
        assert_eq!(reopened.get_fields().get_decimal("BID"), Some(dec!(10.5)));
        assert_eq!(reopened.get_fields().get_decimal("ASK"), Some(dec!(11)));
        assert_eq!(reopened.get_fields().get("STATUS"), Some(&FieldValue::Text("1".to_string())));
    }

    #[test]
    fn test_similar_data_lines_get_separate_files() {
        let dir = TempDir::new().unwrap();
        let provider = FileLkvStoreProvider::new(dir.path()).unwrap();
        let spaced = LiveDataSpecification::new("MarketValue", ExternalId::of("TICKER", "AAPL US"));
        let underscored = LiveDataSpecification::new("MarketValue", ExternalId::of("TICKER", "AAPL_US"));

        assert_ne!(provider.path_for(&spaced), provider.path_for(&underscored));
        assert_eq!(provider.path_for(&spaced).parent(), Some(dir.path()));

        provider
            .new_instance(&spaced)
            .unwrap()
            .update_fields(&FieldContainer::new().with("BID", dec!(190)));

        assert!(provider.new_instance(&underscored).unwrap().is_empty());
        assert_eq!(
            provider.new_instance(&spaced).unwrap().get_fields().get_decimal("BID"),
            Some(dec!(190))
        );
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let provider = FileLkvStoreProvider::new(dir.path()).unwrap();
        fs::write(provider.path_for(&spec()), "not json").unwrap();

        let err = provider.new_instance(&spec()).err().unwrap();
        assert!(matches!(err, LkvStoreError::Corrupt { .. }));
    }
}

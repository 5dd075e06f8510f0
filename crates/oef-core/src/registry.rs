//! Versioned store of named data models.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::schema::DataModel;

/// A data model published under a key at a specific version.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedModel {
    /// Version number, unique and increasing within a key.
    pub version: u32,
    /// The data model published at this version.
    pub model: DataModel,
}

/// A concurrent map from key to the version history of a data model.
///
/// Versions under one key are kept in insertion order. Lookups resolve a
/// requested version to the first entry at or above it, falling back to
/// the latest, so a consumer pinned to version `n` keeps working after
/// later revisions are published.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: Mutex<HashMap<String, Vec<VersionedModel>>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `model` under `key`.
    ///
    /// With `version: None` the next sequential version (`history length +
    /// 1`) is assigned. Returns the version the model was stored at.
    pub fn add(&self, key: &str, model: DataModel, version: Option<u32>) -> u32 {
        let mut schemas = self.schemas.lock().unwrap();
        let history = schemas.entry(key.to_owned()).or_default();
        #[allow(clippy::cast_possible_truncation)]
        let version = version.unwrap_or(history.len() as u32 + 1);
        history.push(VersionedModel { version, model });
        version
    }

    /// Resolves `key` at `version` (`None` for the latest).
    ///
    /// Returns the first published entry with a version at or above the
    /// requested one, the latest entry if every version is below it, or
    /// `None` for an unknown key.
    #[must_use]
    pub fn get(&self, key: &str, version: Option<u32>) -> Option<VersionedModel> {
        let schemas = self.schemas.lock().unwrap();
        let history = schemas.get(key).filter(|h| !h.is_empty())?;
        match version {
            None => history.last().cloned(),
            Some(version) => history
                .iter()
                .find(|entry| entry.version >= version)
                .or_else(|| history.last())
                .cloned(),
        }
    }
}

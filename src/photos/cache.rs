use crate::error::{MapError, Result};
use crate::photos::model::CacheRecord;
use crate::source::CacheStore;
use std::collections::BTreeMap;

/// Persistent map of everything the pipeline has already processed, keyed
/// by the storage backend's file identifier.
///
/// Loaded once at the start of a run and flushed once at the end; there is
/// no incremental persistence in between. A key's presence is the only
/// signal the pipeline consults before fetching a file's bytes, so the
/// cache doubles as the cost-control mechanism. Keys are identity, not
/// content: a file replaced in place under the same id is never reprocessed.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ArtifactCache {
    records: BTreeMap<String, CacheRecord>,
}

impl ArtifactCache {
    /// Load the cache from its backing store.
    ///
    /// A missing blob (first run) yields an empty cache. A present but
    /// unparseable blob is an error: silently starting over would reprocess
    /// everything and then overwrite the old blob at flush time.
    pub fn load(store: &dyn CacheStore) -> Result<Self> {
        match store.load_blob()? {
            None => {
                tracing::debug!("cache: no existing blob, starting empty");
                Ok(Self::default())
            }
            Some(bytes) => {
                let records: BTreeMap<String, CacheRecord> = serde_json::from_slice(&bytes)
                    .map_err(|e| MapError::CacheLoad(format!("unparseable cache blob: {}", e)))?;
                tracing::debug!("cache: loaded {} record(s)", records.len());
                Ok(Self { records })
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&CacheRecord> {
        self.records.get(id)
    }

    pub fn insert(&mut self, id: String, record: CacheRecord) {
        self.records.insert(id, record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the complete merged map back to the store in one go.
    /// Failure here is fatal for the run: an unflushed cache silently turns
    /// the next run into a full re-scan.
    pub fn flush(&self, store: &dyn CacheStore) -> Result<()> {
        let bytes = serde_json::to_vec(&self.records)
            .map_err(|e| MapError::CachePersist(format!("serialize: {}", e)))?;
        store
            .save_blob(&bytes)
            .map_err(|e| MapError::CachePersist(e.to_string()))?;
        tracing::debug!("cache: flushed {} record(s)", self.records.len());
        Ok(())
    }
}

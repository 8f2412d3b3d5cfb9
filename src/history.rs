//! Identification history
//!
//! Append-only, capped log of past identification results, newest first.
//! The entire log is persisted on every mutation; absent or corrupt
//! persisted data loads as an empty log, never an error.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::result::IdentificationResult;
use crate::store::StateStore;

/// Maximum number of retained results.
pub const HISTORY_CAPACITY: usize = 50;

/// Persisted-state key for the serialized log.
pub const HISTORY_KEY: &str = "phool-history";

/// Capped, persisted identification history.
pub struct HistoryStore {
    store: Arc<dyn StateStore>,
    log: RwLock<Vec<IdentificationResult>>,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            log: RwLock::new(Vec::new()),
        }
    }

    /// Load the persisted log. Missing or corrupt data yields an empty
    /// log. Returns the number of entries loaded.
    pub async fn load(&self) -> usize {
        let raw = match self.store.get(HISTORY_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return 0,
            Err(e) => {
                warn!(error = %e, "failed to read persisted history, starting empty");
                return 0;
            }
        };

        match serde_json::from_str::<Vec<IdentificationResult>>(&raw) {
            Ok(mut entries) => {
                entries.truncate(HISTORY_CAPACITY);
                let count = entries.len();
                *self.log.write().await = entries;
                debug!(count, "history loaded");
                count
            }
            Err(e) => {
                warn!(error = %e, "persisted history is corrupt, starting empty");
                0
            }
        }
    }

    /// Prepend a result, trim to capacity, and persist the entire log.
    pub async fn append(&self, result: IdentificationResult) -> Result<()> {
        let snapshot = {
            let mut log = self.log.write().await;
            log.insert(0, result);
            log.truncate(HISTORY_CAPACITY);
            log.clone()
        };
        let raw = serde_json::to_string(&snapshot)?;
        self.store.put(HISTORY_KEY, &raw).await
    }

    /// Snapshot of the log, newest first.
    pub async fn entries(&self) -> Vec<IdentificationResult> {
        self.log.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.log.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.log.read().await.is_empty()
    }
}

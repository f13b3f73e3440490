use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use courier_core::write_text_atomic;
use serde::{Deserialize, Serialize};

use super::SOCKET_STATE_SCHEMA_VERSION;

/// On-disk form of `<state_dir>/state.json`.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedListenerState {
    schema_version: u32,
    #[serde(default)]
    processed_event_keys: Vec<String>,
}

/// Capped, persisted set of Socket Mode event keys already handled.
///
/// Keys are evicted oldest first once `cap` is exceeded.
pub(super) struct ProcessedEventStore {
    path: PathBuf,
    cap: usize,
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl ProcessedEventStore {
    pub(super) fn load(path: PathBuf, cap: usize) -> Result<Self> {
        let mut store = Self {
            path,
            cap: cap.max(1),
            order: VecDeque::new(),
            seen: HashSet::new(),
        };
        if !store.path.exists() {
            return Ok(store);
        }

        let raw = std::fs::read_to_string(&store.path)
            .with_context(|| format!("failed to read state file {}", store.path.display()))?;
        let persisted = serde_json::from_str::<PersistedListenerState>(&raw).with_context(|| {
            format!(
                "failed to parse slack listener state file {}",
                store.path.display()
            )
        })?;
        if persisted.schema_version != SOCKET_STATE_SCHEMA_VERSION {
            bail!(
                "unsupported slack listener state schema: expected {}, found {}",
                SOCKET_STATE_SCHEMA_VERSION,
                persisted.schema_version
            );
        }
        for key in persisted.processed_event_keys {
            store.insert(key);
        }
        Ok(store)
    }

    pub(super) fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    /// Records `key`; returns `false` when it was already present.
    pub(super) fn mark_processed(&mut self, key: &str) -> bool {
        if self.seen.contains(key) {
            return false;
        }
        self.insert(key.to_string());
        true
    }

    fn insert(&mut self, key: String) {
        if !self.seen.insert(key.clone()) {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > self.cap {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
    }

    pub(super) fn save(&self) -> Result<()> {
        let persisted = PersistedListenerState {
            schema_version: SOCKET_STATE_SCHEMA_VERSION,
            processed_event_keys: self.order.iter().cloned().collect(),
        };
        let mut payload = serde_json::to_string_pretty(&persisted)
            .context("failed to serialize slack listener state")?;
        payload.push('\n');
        write_text_atomic(&self.path, &payload)
            .with_context(|| format!("failed to write state file {}", self.path.display()))
    }
}

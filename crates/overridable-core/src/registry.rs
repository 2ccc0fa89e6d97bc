use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::{
    errors::Result,
    snapshot::{MethodSnapshot, Visibility},
};

/// Shadow chains of one host type: method name to the snapshots preserved
/// for it, oldest original first. Grows by one snapshot per shadowing and
/// never shrinks outside a rolled back composition.
#[derive(Debug, Default)]
pub struct OverrideChainRegistry {
    host: String,
    chains: IndexMap<String, Vec<Arc<MethodSnapshot>>>,
}

/// Serializable summary of a registry, used for inspection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainReport {
    pub host: String,
    pub chains: Vec<ChainEntry>,
}

impl ChainReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainEntry {
    pub method: String,
    pub depth: usize,
    pub visibility: Visibility,
    /// Composition events that produced each snapshot, oldest first
    pub events: Vec<u64>,
}

impl OverrideChainRegistry {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            chains: IndexMap::new(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Append a snapshot as the newest entry for its name
    pub fn record(&mut self, snapshot: MethodSnapshot) -> Arc<MethodSnapshot> {
        let snapshot = Arc::new(snapshot);
        self.chains
            .entry(snapshot.name().to_string())
            .or_default()
            .push(Arc::clone(&snapshot));
        snapshot
    }

    /// Drop the newest snapshot for `name`. Only used to undo a triple whose
    /// install step failed within the same composition event.
    pub(crate) fn discard_latest(&mut self, name: &str) -> Option<Arc<MethodSnapshot>> {
        let chain = self.chains.get_mut(name)?;
        let snapshot = chain.pop();
        if chain.is_empty() {
            self.chains.shift_remove(name);
        }
        snapshot
    }

    pub fn chain(&self, name: &str) -> &[Arc<MethodSnapshot>] {
        self.chains.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn latest(&self, name: &str) -> Option<&Arc<MethodSnapshot>> {
        self.chains.get(name).and_then(|chain| chain.last())
    }

    /// The very first implementation preserved for `name`
    pub fn original(&self, name: &str) -> Option<&Arc<MethodSnapshot>> {
        self.chains.get(name).and_then(|chain| chain.first())
    }

    pub fn depth(&self, name: &str) -> usize {
        self.chain(name).len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.chains.contains_key(name)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.chains.keys().map(String::as_str)
    }

    pub fn snapshot_count(&self) -> usize {
        self.chains.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    pub fn report(&self) -> ChainReport {
        ChainReport {
            host: self.host.clone(),
            chains: self
                .chains
                .iter()
                .map(|(method, chain)| ChainEntry {
                    method: method.clone(),
                    depth: chain.len(),
                    visibility: chain
                        .last()
                        .map(|s| s.visibility())
                        .unwrap_or_default(),
                    events: chain.iter().map(|s| s.event()).collect(),
                })
                .collect(),
        }
    }
}

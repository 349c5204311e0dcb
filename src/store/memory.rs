//! In-memory [`ItemStore`] for tests and dry runs.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::CanonicalItem;

use super::{AreaTally, ItemStore};

/// Items keyed by content hash.
#[derive(Default)]
pub struct InMemoryStore {
    items: RwLock<BTreeMap<String, CanonicalItem>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, content_hash: &str) -> Option<CanonicalItem> {
        self.items.read().ok()?.get(content_hash).cloned()
    }
}

#[async_trait]
impl ItemStore for InMemoryStore {
    async fn insert_if_absent(&self, item: &CanonicalItem) -> Result<bool> {
        let mut items = self
            .items
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        if items.contains_key(&item.content_hash) {
            return Ok(false);
        }
        items.insert(item.content_hash.clone(), item.clone());
        Ok(true)
    }

    async fn tally(&self) -> Result<Vec<AreaTally>> {
        let items = self
            .items
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        let mut counts: BTreeMap<(i32, &'static str), AreaTally> = BTreeMap::new();
        for item in items.values() {
            counts
                .entry((item.year, item.area.code()))
                .or_insert_with(|| AreaTally {
                    year: item.year,
                    area: item.area,
                    count: 0,
                })
                .count += 1;
        }
        Ok(counts.into_values().collect())
    }
}

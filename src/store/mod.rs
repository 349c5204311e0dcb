//! Storage abstraction for canonical items.
//!
//! The pipeline needs a single write primitive from its store: insert a
//! record unless one with the same `content_hash` already exists. The check
//! and the write must be one atomic step in the backend (a unique index or
//! a conditional insert), never a read followed by a write in application
//! code, so concurrent importers cannot both insert the same item.
//!
//! | Implementation | Backend |
//! |----------------|---------|
//! | [`memory::InMemoryStore`] | `BTreeMap` behind a `RwLock`; tests and dry runs |
//! | [`sqlite::SqliteStore`] | SQLite `items` table with `UNIQUE(content_hash)` |

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{Area, CanonicalItem};

/// Persisted item count for one `(year, area)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AreaTally {
    pub year: i32,
    pub area: Area,
    pub count: i64,
}

#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Inserts `item` unless an item with the same `content_hash` exists.
    ///
    /// Returns `true` if a row was written.
    async fn insert_if_absent(&self, item: &CanonicalItem) -> Result<bool>;

    /// Item counts grouped by year, then area code.
    async fn tally(&self) -> Result<Vec<AreaTally>>;
}

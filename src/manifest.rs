//! Canonical dataset layout, manifest building and writing.
//!
//! ```text
//! root/
//!   manifest.json
//!   2023/items.jsonl      one canonical record per line
//!   2023/gabarito.json    answer key for the year
//!   assets/2023/<question dir>/<image>
//! ```
//!
//! The manifest records a `sha256:<hex>` checksum for every items and answer
//! key file. [`build_dataset`] serializes each file once and keeps the
//! bytes; [`Dataset::write`] writes exactly those bytes, so the checksum
//! always describes what is on disk.

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::hash::prefixed_digest;
use crate::legacy::{AssetSource, YearBatch};
use crate::models::{
    AnswerKey, Area, CanonicalItem, Manifest, ManifestMetadata, RunStatus, ALL_BOOKLETS,
};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const ASSETS_DIR: &str = "assets";

pub fn items_path(year: i32) -> String {
    format!("{}/items.jsonl", year)
}

pub fn answer_key_path(year: i32) -> String {
    format!("{}/gabarito.json", year)
}

/// A dataset file with the exact bytes that were checksummed.
#[derive(Debug, Clone)]
pub struct DatasetFile {
    pub rel_path: String,
    pub bytes: Vec<u8>,
}

/// A built dataset, ready to be written to a root directory.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub manifest: Manifest,
    pub files: Vec<DatasetFile>,
    pub assets: Vec<(i32, AssetSource)>,
}

/// Serializes items as JSON lines, each terminated by `\n`.
pub fn serialize_items(items: &[CanonicalItem]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for item in items {
        serde_json::to_writer(&mut out, item)
            .with_context(|| format!("Failed to serialize item {}", item.item_id))?;
        out.push(b'\n');
    }
    Ok(out)
}

/// Item ids that occur more than once, in first-seen order.
///
/// Language variants of one legacy question share a sequence number and
/// therefore an item id.
pub fn colliding_item_ids(items: &[CanonicalItem]) -> Vec<String> {
    let mut seen = BTreeMap::new();
    let mut colliding = Vec::new();
    for item in items {
        let count = seen.entry(item.item_id.as_str()).or_insert(0u32);
        *count += 1;
        if *count == 2 {
            colliding.push(item.item_id.clone());
        }
    }
    colliding
}

/// One answer per item id. Where ids collide the last item's answer wins,
/// and each collision is logged.
pub fn answer_key_for(year: i32, items: &[CanonicalItem]) -> AnswerKey {
    for item_id in colliding_item_ids(items) {
        warn!(year, %item_id, "item id shared by several items; answer key keeps the last");
    }
    AnswerKey {
        year,
        booklet: ALL_BOOKLETS.to_string(),
        answers: items
            .iter()
            .map(|i| (i.item_id.clone(), i.correct_answer))
            .collect(),
    }
}

/// Builds the manifest and file contents for a set of year batches.
///
/// Statuses start as `pending`; `years_available` is ascending.
pub fn build_dataset(dataset_version: &str, batches: &[YearBatch]) -> Result<Dataset> {
    let mut checksums = BTreeMap::new();
    let mut files = Vec::new();
    let mut assets = Vec::new();
    let mut years = Vec::new();
    let mut total_items = 0;

    for batch in batches {
        let items_bytes = serialize_items(&batch.items)?;
        let key = answer_key_for(batch.year, &batch.items);
        let key_bytes = serde_json::to_vec_pretty(&key)
            .with_context(|| format!("Failed to serialize answer key for {}", batch.year))?;

        for (rel_path, bytes) in [
            (items_path(batch.year), items_bytes),
            (answer_key_path(batch.year), key_bytes),
        ] {
            checksums.insert(rel_path.clone(), prefixed_digest(&bytes));
            files.push(DatasetFile { rel_path, bytes });
        }

        assets.extend(batch.assets.iter().cloned().map(|a| (batch.year, a)));
        years.push(batch.year);
        total_items += batch.items.len();
    }

    years.sort_unstable();
    years.dedup();

    let manifest = Manifest {
        dataset_version: dataset_version.to_string(),
        years_available: years,
        areas: Area::ALL.to_vec(),
        checksums,
        metadata: ManifestMetadata {
            total_items,
            last_updated: Utc::now(),
            import_status: RunStatus::Pending,
            validation_status: RunStatus::Pending,
        },
    };

    Ok(Dataset {
        manifest,
        files,
        assets,
    })
}

impl Dataset {
    /// Writes data files, copies assets, then writes `manifest.json` last so
    /// a partially written dataset has no manifest to trust.
    pub fn write(&self, root: &Path) -> Result<()> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("Failed to create dataset root {}", root.display()))?;

        for file in &self.files {
            let path = root.join(&file.rel_path);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, &file.bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }

        for (year, asset) in &self.assets {
            let dest = root
                .join(ASSETS_DIR)
                .join(year.to_string())
                .join(&asset.rel_path);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(&asset.source, &dest).with_context(|| {
                format!(
                    "Failed to copy asset {} to {}",
                    asset.source.display(),
                    dest.display()
                )
            })?;
        }

        let manifest_path = root.join(MANIFEST_FILE);
        let manifest_json = serde_json::to_vec_pretty(&self.manifest)?;
        std::fs::write(&manifest_path, manifest_json)
            .with_context(|| format!("Failed to write {}", manifest_path.display()))?;

        info!(
            root = %root.display(),
            files = self.files.len(),
            assets = self.assets.len(),
            "dataset written"
        );
        Ok(())
    }
}

/// Reads and parses `root/manifest.json`.
pub fn load_manifest(root: &Path) -> Result<Manifest, PipelineError> {
    let path = root.join(MANIFEST_FILE);
    let raw = std::fs::read(&path).map_err(|source| PipelineError::ManifestUnreadable {
        path: path.clone(),
        source,
    })?;
    serde_json::from_slice(&raw).map_err(|source| PipelineError::ManifestInvalid { path, source })
}

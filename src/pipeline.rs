//! Run orchestration: conversion and the gated import sequence.
//!
//! An import run is:
//!
//! 1. load `manifest.json` (fatal if unreadable or invalid)
//! 2. verify every manifest checksum and that each listed year's files are
//!    covered; any failure refuses the whole run before a row is written
//! 3. for each year in `years_available`: import `{year}/items.jsonl`, then
//!    check `{year}/gabarito.json`
//! 4. tally the store by `(year, area)` into a [`RunReport`]
//!
//! Years are independent: an unreadable file or bad records in one year are
//! recorded in the report and the next year still runs. Only the integrity
//! gate and store failures stop a run.

use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::answer_key::import_answer_key;
use crate::config::LegacyConfig;
use crate::error::{PipelineError, Result};
use crate::importer::{ImportOptions, ItemImporter};
use crate::integrity;
use crate::legacy::LegacyConverter;
use crate::manifest::{answer_key_path, build_dataset, items_path, load_manifest, MANIFEST_FILE};
use crate::models::{ImportResult, Manifest};
use crate::progress::ProgressReporter;
use crate::report::RunReport;
use crate::store::ItemStore;

/// Per-year counts from a conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedYear {
    pub year: i32,
    pub items: usize,
    pub assets: usize,
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ConversionSummary {
    pub manifest: Manifest,
    pub years: Vec<ConvertedYear>,
}

/// Converts the legacy tree and writes a canonical dataset to `out`.
pub fn convert_dataset(
    legacy: &LegacyConfig,
    dataset_version: &str,
    out: &Path,
    progress: &dyn ProgressReporter,
) -> Result<ConversionSummary> {
    let batches = LegacyConverter::new(legacy, dataset_version)
        .and_then(|c| c.convert_all(progress))
        .map_err(PipelineError::Conversion)?;
    let dataset = build_dataset(dataset_version, &batches).map_err(PipelineError::Conversion)?;
    dataset.write(out).map_err(PipelineError::Conversion)?;

    let years = batches
        .iter()
        .map(|b| ConvertedYear {
            year: b.year,
            items: b.items.len(),
            assets: b.assets.len(),
            skipped: b.skipped.clone(),
        })
        .collect();
    Ok(ConversionSummary {
        manifest: dataset.manifest,
        years,
    })
}

/// True when `root` has no manifest yet and must be converted first.
pub fn needs_conversion(root: &Path) -> bool {
    !root.join(MANIFEST_FILE).is_file()
}

pub struct Orchestrator<'a> {
    dataset_root: PathBuf,
    store: &'a dyn ItemStore,
    options: ImportOptions,
    progress: &'a dyn ProgressReporter,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        dataset_root: &Path,
        store: &'a dyn ItemStore,
        options: ImportOptions,
        progress: &'a dyn ProgressReporter,
    ) -> Self {
        Self {
            dataset_root: dataset_root.to_path_buf(),
            store,
            options,
            progress,
        }
    }

    pub async fn run(&self) -> Result<RunReport> {
        let manifest = load_manifest(&self.dataset_root)?;

        let integrity = integrity::verify(&manifest, &self.dataset_root, self.progress);
        if !integrity.valid {
            error!(
                failed = integrity.failed_paths.len(),
                "integrity gate failed; nothing imported"
            );
            return Err(PipelineError::IntegrityFailed(integrity.errors));
        }

        let mut options = self.options.clone();
        if options.fallback_version.is_empty() {
            options.fallback_version = manifest.dataset_version.clone();
        }
        let importer = ItemImporter::new(self.store, &self.dataset_root, options, self.progress);

        let mut result = ImportResult::default();
        let mut answer_keys = Vec::with_capacity(manifest.years_available.len());
        for &year in &manifest.years_available {
            let items_file = self.dataset_root.join(items_path(year));
            let year_result = importer
                .import_file(&items_file, year)
                .await
                .map_err(PipelineError::Store)?;
            result.absorb(year_result);

            let key = import_answer_key(&self.dataset_root.join(answer_key_path(year)), year);
            result.errors.extend(key.errors.iter().cloned());
            answer_keys.push(key);
        }
        let result = result.finish();

        let tally = self.store.tally().await.map_err(PipelineError::Store)?;
        info!(
            version = %manifest.dataset_version,
            imported = result.imported_items,
            skipped = result.skipped_items,
            success = result.success,
            "import run finished"
        );

        Ok(RunReport {
            dataset_version: manifest.dataset_version,
            result,
            answer_keys,
            tally,
        })
    }
}

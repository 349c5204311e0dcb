//! CLI command implementations.
//!
//! Each `run_*` function backs one `exi` subcommand. They print results to
//! stdout and return whether the command succeeded, so `main` can set the
//! exit status without treating an unsuccessful import as a crash.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use tracing::info;

use crate::config::{Config, LegacyConfig};
use crate::db;
use crate::error::PipelineError;
use crate::importer::ImportOptions;
use crate::integrity;
use crate::manifest::load_manifest;
use crate::migrate;
use crate::pipeline::{convert_dataset, needs_conversion, Orchestrator};
use crate::progress::ProgressReporter;
use crate::store::sqlite::SqliteStore;

/// `exi init`: create the database and schema.
pub async fn run_init(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;
    pool.close().await;
    println!("Database initialized at {}", config.db.path.display());
    Ok(())
}

fn legacy_config(config: &Config, root_override: Option<PathBuf>) -> Result<LegacyConfig> {
    match (root_override, &config.legacy) {
        (Some(root), Some(legacy)) => Ok(LegacyConfig {
            root,
            ..legacy.clone()
        }),
        (Some(root), None) => Ok(LegacyConfig::new(root)),
        (None, Some(legacy)) => Ok(legacy.clone()),
        (None, None) => Err(anyhow!(
            "No legacy source: add a [legacy] section to the config or pass --legacy-root"
        )),
    }
}

/// `exi convert`: legacy tree → canonical dataset with manifest.
pub fn run_convert(
    config: &Config,
    legacy_root: Option<PathBuf>,
    out: Option<PathBuf>,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let legacy = legacy_config(config, legacy_root)?;
    let out = out.unwrap_or_else(|| config.dataset.root.clone());

    let summary = convert_dataset(&legacy, &config.dataset.version, &out, progress)?;

    println!("Converted {} → {}", legacy.root.display(), out.display());
    for year in &summary.years {
        println!(
            "  {}: {} items, {} assets, {} skipped",
            year.year,
            year.items,
            year.assets,
            year.skipped.len()
        );
        for dir in &year.skipped {
            println!("    skipped question {}", dir);
        }
    }
    println!(
        "  total: {} items ({})",
        summary.manifest.metadata.total_items, summary.manifest.dataset_version
    );
    Ok(())
}

/// `exi verify`: run the integrity gate without importing.
pub fn run_verify(config: &Config, progress: &dyn ProgressReporter) -> Result<bool> {
    let root = &config.dataset.root;
    let manifest = load_manifest(root)?;
    let report = integrity::verify(&manifest, root, progress);

    if report.valid {
        println!(
            "OK: {} files match manifest {}",
            manifest.checksums.len(),
            manifest.dataset_version
        );
    } else {
        println!("FAILED: {} integrity error(s)", report.errors.len());
        for error in &report.errors {
            println!("  - {}", error);
        }
    }
    Ok(report.valid)
}

/// `exi import` / `exi run`: gated import into the SQLite store.
///
/// With `convert`, or when the dataset root has no manifest and a legacy
/// source is configured, the legacy tree is converted first.
pub async fn run_import(
    config: &Config,
    convert: bool,
    json: bool,
    progress: &dyn ProgressReporter,
) -> Result<bool> {
    let root = &config.dataset.root;
    if convert || (needs_conversion(root) && config.legacy.is_some()) {
        info!(root = %root.display(), "converting legacy tree before import");
        let legacy = legacy_config(config, None)?;
        convert_dataset(&legacy, &config.dataset.version, root, progress)?;
    }

    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool)
        .await
        .context("Failed to prepare item store")?;
    let store = SqliteStore::new(pool);

    let options = ImportOptions {
        verify_content_hash: config.import.verify_content_hash,
        ..Default::default()
    };
    let outcome = Orchestrator::new(root, &store, options, progress).run().await;
    store.close().await;

    let report = match outcome {
        Ok(report) => report,
        Err(PipelineError::IntegrityFailed(errors)) => {
            println!("Import refused: integrity check failed, nothing imported.");
            for error in &errors {
                println!("  - {}", error);
            }
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report.result)?);
    } else {
        println!("{}", report);
    }
    Ok(report.result.success)
}

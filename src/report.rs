//! Run reports and store statistics.
//!
//! [`RunReport`] is what an import run hands back to the operator: persisted
//! counts by `(year, area)`, the aggregated [`ImportResult`], answer-key
//! outcomes, and the exact identifiers of every problem record. It renders
//! as plain text through `Display`; `exi import --json` prints the result
//! as JSON instead.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::models::{AnswerKeyOutcome, ImportResult};
use crate::progress::format_number;
use crate::store::sqlite::SqliteStore;
use crate::store::{AreaTally, ItemStore};

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub dataset_version: String,
    pub result: ImportResult,
    pub answer_keys: Vec<AnswerKeyOutcome>,
    /// Persisted item counts after the run, from the store.
    pub tally: Vec<AreaTally>,
}

impl RunReport {
    pub fn total_items(&self) -> i64 {
        self.tally.iter().map(|t| t.count).sum()
    }
}

fn write_tally(f: &mut fmt::Formatter<'_>, tally: &[AreaTally]) -> fmt::Result {
    writeln!(f, "  {:<6} {:<5} {:>8}", "YEAR", "AREA", "ITEMS")?;
    writeln!(f, "  {}", "-".repeat(21))?;
    for t in tally {
        writeln!(
            f,
            "  {:<6} {:<5} {:>8}",
            t.year,
            t.area.code(),
            format_number(t.count.max(0) as u64)
        )?;
    }
    let total: i64 = tally.iter().map(|t| t.count).sum();
    writeln!(f, "  {}", "-".repeat(21))?;
    writeln!(f, "  {:<12} {:>8}", "Total", format_number(total.max(0) as u64))
}

fn write_list(f: &mut fmt::Formatter<'_>, title: &str, entries: &[String]) -> fmt::Result {
    if entries.is_empty() {
        return Ok(());
    }
    writeln!(f)?;
    writeln!(f, "  {} ({}):", title, entries.len())?;
    for entry in entries {
        writeln!(f, "    - {}", entry)?;
    }
    Ok(())
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heading = format!("Import Report: {}", self.dataset_version);
        writeln!(f, "{}", heading)?;
        writeln!(f, "{}", "=".repeat(heading.chars().count()))?;
        writeln!(f)?;
        write_tally(f, &self.tally)?;

        let r = &self.result;
        let v = &r.validation_report;
        writeln!(f)?;
        writeln!(f, "  Imported:        {}", format_number(r.imported_items))?;
        writeln!(f, "  Skipped:         {}", format_number(r.skipped_items))?;
        writeln!(f, "  Invalid:         {}", v.invalid_items.len())?;
        writeln!(f, "  Missing assets:  {}", v.missing_assets.len())?;

        if !self.answer_keys.is_empty() {
            writeln!(f)?;
            writeln!(f, "  Answer keys:")?;
            for key in &self.answer_keys {
                if key.success {
                    writeln!(f, "    {}  ok ({} answers)", key.year, key.answers)?;
                } else {
                    writeln!(f, "    {}  FAILED ({} errors)", key.year, key.errors.len())?;
                }
            }
        }

        write_list(f, "Invalid items", &v.invalid_items)?;
        write_list(f, "Duplicate items", &v.duplicate_items)?;
        write_list(f, "Missing assets", &v.missing_assets)?;
        write_list(f, "Errors", &r.errors)?;

        writeln!(f)?;
        write!(
            f,
            "  Status: {}",
            if r.success { "OK" } else { "COMPLETED WITH ERRORS" }
        )
    }
}

struct Tally<'a>(&'a [AreaTally]);

impl fmt::Display for Tally<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_tally(f, self.0)
    }
}

/// `exi stats`: print the persisted `(year, area)` tally.
///
/// The schema is created if missing, so a fresh database reports no items.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool)
        .await
        .context("Failed to prepare item store")?;
    let store = SqliteStore::new(pool);
    let tally = store.tally().await?;

    println!("Exam Items: Database Stats");
    println!("==========================");
    println!();
    println!("  Database:  {}", config.db.path.display());
    println!();
    if tally.is_empty() {
        println!("  No items imported yet.");
    } else {
        print!("{}", Tally(&tally));
    }
    println!();

    store.close().await;
    Ok(())
}

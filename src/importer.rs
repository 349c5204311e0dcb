//! Streaming import of canonical items files.
//!
//! Reads a `{year}/items.jsonl` file line by line and folds every line into
//! an [`ImportResult`]:
//!
//! | Line outcome | Effect |
//! |--------------|--------|
//! | unparsable / structurally invalid | `invalid_items` + an error string |
//! | content hash already stored | `duplicate_items`, `skipped_items += 1` |
//! | written | `imported_items += 1`; unresolved asset refs go to `missing_assets` |
//!
//! A record's `year` must match the year of the file it is read from, and
//! its `content_hash` is stored in lowercase so dedup never depends on the
//! case a producer happened to write.
//!
//! Only invalid lines make the result unsuccessful. A store failure is the
//! one condition that aborts the file, since nothing further could be written.

use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

use crate::hash::{content_hash, ContentIdentity};
use crate::heuristics::{DifficultyEstimator, LengthDifficulty};
use crate::manifest::ASSETS_DIR;
use crate::models::{
    sequence_from_item_id, Alternatives, Area, CanonicalItem, Difficulty, ImportResult, Letter,
    Metadata,
};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::store::ItemStore;

/// Lines between `Importing` progress events.
const PROGRESS_EVERY: u64 = 500;

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Recompute `content_hash` from each record and reject mismatches.
    pub verify_content_hash: bool,
    /// Stamped on records that carry no `dataset_version` of their own.
    pub fallback_version: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            verify_content_hash: true,
            fallback_version: String::new(),
        }
    }
}

/// A canonical record as it appears on a line, before validation.
#[derive(Debug, Default, Deserialize)]
struct RawItem {
    item_id: Option<String>,
    year: Option<i64>,
    area: Option<String>,
    text: Option<String>,
    alternatives: Option<BTreeMap<String, String>>,
    correct_answer: Option<String>,
    topic: Option<String>,
    estimated_difficulty: Option<String>,
    #[serde(default)]
    asset_refs: Vec<String>,
    content_hash: Option<String>,
    dataset_version: Option<String>,
    #[serde(default)]
    metadata: Metadata,
}

/// What happened to one line.
#[derive(Debug)]
enum LineOutcome {
    Imported { missing_assets: Vec<String> },
    Duplicate { item_id: String },
    Invalid { item_id: String, reason: String },
}

impl ImportResult {
    fn record(&mut self, outcome: LineOutcome) {
        match outcome {
            LineOutcome::Imported { missing_assets } => {
                self.imported_items += 1;
                self.validation_report.missing_assets.extend(missing_assets);
            }
            LineOutcome::Duplicate { item_id } => {
                self.skipped_items += 1;
                self.validation_report.duplicate_items.push(item_id);
            }
            LineOutcome::Invalid { item_id, reason } => {
                self.errors.push(format!("Invalid item {}: {}", item_id, reason));
                self.validation_report.invalid_items.push(item_id);
            }
        }
    }
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false)
}

/// Checks a raw record's shape and builds the canonical item.
fn validate(raw: RawItem, options: &ImportOptions) -> Result<CanonicalItem, String> {
    let mut missing = Vec::new();
    for (name, present) in [
        ("item_id", non_empty(&raw.item_id)),
        ("year", raw.year.map(|y| y > 0).unwrap_or(false)),
        ("area", non_empty(&raw.area)),
        ("text", non_empty(&raw.text)),
        (
            "alternatives",
            raw.alternatives.as_ref().map(|a| !a.is_empty()).unwrap_or(false),
        ),
        ("correct_answer", non_empty(&raw.correct_answer)),
        ("topic", non_empty(&raw.topic)),
        ("content_hash", non_empty(&raw.content_hash)),
    ] {
        if !present {
            missing.push(name);
        }
    }
    if !missing.is_empty() {
        return Err(format!("missing or empty fields: {}", missing.join(", ")));
    }

    // All required fields are present past this point.
    let item_id = raw.item_id.unwrap_or_default();
    let year = i32::try_from(raw.year.unwrap_or_default())
        .map_err(|_| "year out of range".to_string())?;
    let area: Area = raw.area.unwrap_or_default().parse()?;
    let text = raw.text.unwrap_or_default();
    let alternatives = Alternatives::from_map(&raw.alternatives.unwrap_or_default());
    let absent = alternatives.missing();
    if !absent.is_empty() {
        let letters: Vec<_> = absent.iter().map(|l| l.as_str()).collect();
        return Err(format!("alternatives missing {}", letters.join(", ")));
    }
    let correct_answer: Letter = raw
        .correct_answer
        .unwrap_or_default()
        .parse()
        .map_err(|e| format!("correct_answer {}", e))?;

    let estimated_difficulty = match raw
        .estimated_difficulty
        .as_deref()
        .map(str::parse::<Difficulty>)
    {
        Some(Ok(d)) => d,
        _ => {
            debug!(%item_id, "no usable estimated_difficulty; estimating from text");
            LengthDifficulty::default().estimate(&text, 5)
        }
    };

    let mut item = CanonicalItem {
        item_id,
        year,
        area,
        text,
        alternatives,
        correct_answer,
        topic: raw.topic.unwrap_or_default(),
        estimated_difficulty,
        asset_refs: raw.asset_refs,
        content_hash: raw.content_hash.unwrap_or_default(),
        dataset_version: raw
            .dataset_version
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| options.fallback_version.clone()),
        metadata: raw.metadata,
    };

    if options.verify_content_hash {
        let sequence = sequence_from_item_id(&item.item_id)
            .ok_or_else(|| "item_id has no numeric sequence".to_string())?;
        let expected = content_hash(&ContentIdentity::of(&item, sequence));
        if !expected.eq_ignore_ascii_case(&item.content_hash) {
            return Err("content_hash does not match record content".to_string());
        }
    }
    item.content_hash.make_ascii_lowercase();

    Ok(item)
}

pub struct ItemImporter<'a> {
    store: &'a dyn ItemStore,
    dataset_root: PathBuf,
    options: ImportOptions,
    progress: &'a dyn ProgressReporter,
}

impl<'a> ItemImporter<'a> {
    pub fn new(
        store: &'a dyn ItemStore,
        dataset_root: &Path,
        options: ImportOptions,
        progress: &'a dyn ProgressReporter,
    ) -> Self {
        Self {
            store,
            dataset_root: dataset_root.to_path_buf(),
            options,
            progress,
        }
    }

    /// Imports one year's items file.
    ///
    /// An unreadable file yields an unsuccessful result for this year only;
    /// `Err` is reserved for store failures.
    pub async fn import_file(&self, path: &Path, year: i32) -> Result<ImportResult> {
        let mut result = ImportResult::default();
        let file = match std::fs::File::open(path) {
            Ok(f) => f,
            Err(e) => {
                result
                    .errors
                    .push(format!("Failed to read {}: {}", path.display(), e));
                return Ok(result.finish());
            }
        };

        let label = path
            .strip_prefix(&self.dataset_root)
            .unwrap_or(path)
            .display()
            .to_string();
        let mut lines_seen = 0u64;

        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    result
                        .errors
                        .push(format!("Failed to read {} at line {}: {}", label, idx + 1, e));
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let location = format!("{}:{}", label, idx + 1);
            let outcome = self.import_line(&line, &location, year).await?;
            result.record(outcome);

            lines_seen += 1;
            if lines_seen % PROGRESS_EVERY == 0 {
                self.progress.report(ProgressEvent::Importing {
                    year,
                    n: lines_seen,
                });
            }
        }

        self.progress.report(ProgressEvent::YearDone {
            year,
            imported: result.imported_items,
            skipped: result.skipped_items,
        });
        info!(
            year,
            imported = result.imported_items,
            skipped = result.skipped_items,
            invalid = result.validation_report.invalid_items.len(),
            "items file imported"
        );
        Ok(result.finish())
    }

    async fn import_line(&self, line: &str, location: &str, year: i32) -> Result<LineOutcome> {
        let value: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                return Ok(LineOutcome::Invalid {
                    item_id: location.to_string(),
                    reason: format!("unparsable line: {}", e),
                })
            }
        };
        let item_id = value
            .get("item_id")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(location)
            .to_string();

        let raw: RawItem = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                return Ok(LineOutcome::Invalid {
                    item_id,
                    reason: format!("malformed record: {}", e),
                })
            }
        };
        let item = match validate(raw, &self.options) {
            Ok(item) => item,
            Err(reason) => return Ok(LineOutcome::Invalid { item_id, reason }),
        };
        if item.year != year {
            return Ok(LineOutcome::Invalid {
                item_id,
                reason: format!(
                    "year {} does not match items file year {}",
                    item.year, year
                ),
            });
        }

        let missing_assets = self.missing_assets(&item);
        if self.store.insert_if_absent(&item).await? {
            Ok(LineOutcome::Imported { missing_assets })
        } else {
            Ok(LineOutcome::Duplicate {
                item_id: item.item_id,
            })
        }
    }

    /// Asset refs with no file under `assets/{year}/`, as `{year}/{ref}`.
    fn missing_assets(&self, item: &CanonicalItem) -> Vec<String> {
        let base = self
            .dataset_root
            .join(ASSETS_DIR)
            .join(item.year.to_string());
        item.asset_refs
            .iter()
            .filter(|r| {
                let rel = Path::new(r.as_str());
                let contained = rel
                    .components()
                    .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
                !contained || !base.join(rel).is_file()
            })
            .map(|r| format!("{}/{}", item.year, r))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use crate::store::memory::InMemoryStore;

    fn valid_item(sequence: u32, text: &str) -> CanonicalItem {
        let mut item = crate::store::test_support::item(
            &format!("2023-AZUL-{:03}", sequence),
            Area::Mathematics,
            "",
        );
        item.text = text.to_string();
        item.content_hash = content_hash(&ContentIdentity::of(&item, sequence));
        item
    }

    fn write_lines(dir: &Path, lines: &[String]) -> PathBuf {
        let path = dir.join("2023").join("items.jsonl");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, lines.join("\n") + "\n").unwrap();
        path
    }

    fn line(item: &CanonicalItem) -> String {
        serde_json::to_string(item).unwrap()
    }

    #[tokio::test]
    async fn second_import_skips_everything() {
        let dir = tempfile::tempdir().unwrap();
        let items: Vec<_> = (1..=3).map(|i| valid_item(i, &format!("q{}", i))).collect();
        let path = write_lines(dir.path(), &items.iter().map(line).collect::<Vec<_>>());
        let store = InMemoryStore::new();
        let importer = ItemImporter::new(&store, dir.path(), ImportOptions::default(), &NoProgress);

        let first = importer.import_file(&path, 2023).await.unwrap();
        assert!(first.success);
        assert_eq!(first.imported_items, 3);
        assert_eq!(first.skipped_items, 0);

        let second = importer.import_file(&path, 2023).await.unwrap();
        assert!(second.success);
        assert_eq!(second.imported_items, 0);
        assert_eq!(second.skipped_items, 3);
        assert_eq!(second.validation_report.duplicate_items.len(), 3);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn incomplete_alternatives_are_never_inserted() {
        let dir = tempfile::tempdir().unwrap();
        let good = valid_item(1, "ok");
        let mut bad = valid_item(2, "sem E");
        bad.alternatives.e = String::new();
        let path = write_lines(dir.path(), &[line(&good), line(&bad)]);
        let store = InMemoryStore::new();
        let importer = ItemImporter::new(&store, dir.path(), ImportOptions::default(), &NoProgress);

        let result = importer.import_file(&path, 2023).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.imported_items, 1);
        assert_eq!(
            result.validation_report.invalid_items,
            vec!["2023-AZUL-002".to_string()]
        );
        assert!(result.errors[0].contains("alternatives missing E"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn bad_lines_do_not_stop_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut wrong_answer = valid_item(3, "resposta F");
        wrong_answer.content_hash = "x".into();
        let mut wrong_answer = serde_json::to_value(&wrong_answer).unwrap();
        wrong_answer["correct_answer"] = serde_json::json!("F");
        let path = write_lines(
            dir.path(),
            &[
                "{ broken".to_string(),
                r#"{"item_id":"2023-AZUL-009","year":2023}"#.to_string(),
                wrong_answer.to_string(),
                line(&valid_item(4, "fim")),
            ],
        );
        let store = InMemoryStore::new();
        let importer = ItemImporter::new(&store, dir.path(), ImportOptions::default(), &NoProgress);

        let result = importer.import_file(&path, 2023).await.unwrap();
        assert_eq!(result.imported_items, 1);
        assert_eq!(
            result.validation_report.invalid_items,
            vec![
                "2023/items.jsonl:1".to_string(),
                "2023-AZUL-009".to_string(),
                "2023-AZUL-003".to_string()
            ]
        );
        assert_eq!(result.errors.len(), 3);
        assert!(result.errors[1].contains("missing or empty fields"));
        assert!(result.errors[2].contains("correct_answer"));
    }

    #[tokio::test]
    async fn tampered_hash_is_rejected_unless_verification_is_off() {
        let dir = tempfile::tempdir().unwrap();
        let mut item = valid_item(5, "original");
        item.text = "edited after hashing".into();
        let path = write_lines(dir.path(), &[line(&item)]);

        let store = InMemoryStore::new();
        let strict = ItemImporter::new(&store, dir.path(), ImportOptions::default(), &NoProgress);
        let result = strict.import_file(&path, 2023).await.unwrap();
        assert_eq!(result.imported_items, 0);
        assert!(result.errors[0].contains("content_hash does not match"));

        let lax_options = ImportOptions {
            verify_content_hash: false,
            ..Default::default()
        };
        let lax = ItemImporter::new(&store, dir.path(), lax_options, &NoProgress);
        let result = lax.import_file(&path, 2023).await.unwrap();
        assert_eq!(result.imported_items, 1);
    }

    #[tokio::test]
    async fn missing_assets_are_advisory() {
        let dir = tempfile::tempdir().unwrap();
        let asset_dir = dir.path().join("assets").join("2023").join("7");
        std::fs::create_dir_all(&asset_dir).unwrap();
        std::fs::write(asset_dir.join("present.png"), b"png").unwrap();

        let mut item = valid_item(7, "com figuras");
        item.asset_refs = vec![
            "7/present.png".into(),
            "7/absent.png".into(),
            "../outside.png".into(),
        ];
        let path = write_lines(dir.path(), &[line(&item)]);
        let store = InMemoryStore::new();
        let importer = ItemImporter::new(&store, dir.path(), ImportOptions::default(), &NoProgress);

        let result = importer.import_file(&path, 2023).await.unwrap();
        assert!(result.success);
        assert_eq!(result.imported_items, 1);
        assert_eq!(
            result.validation_report.missing_assets,
            vec!["2023/7/absent.png".to_string(), "2023/../outside.png".to_string()]
        );
    }

    #[tokio::test]
    async fn unreadable_file_is_an_error_for_that_file_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryStore::new();
        let importer = ItemImporter::new(&store, dir.path(), ImportOptions::default(), &NoProgress);
        let result = importer
            .import_file(&dir.path().join("2023/items.jsonl"), 2023)
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("Failed to read"));
    }

    #[test]
    fn missing_version_uses_fallback_and_bad_difficulty_is_estimated() {
        let mut item = valid_item(8, "curta");
        item.dataset_version = String::new();
        let mut value = serde_json::to_value(&item).unwrap();
        value["estimated_difficulty"] = serde_json::json!("IMPOSSIBLE");
        let raw: RawItem = serde_json::from_value(value).unwrap();
        let options = ImportOptions {
            fallback_version: "v-manifest".into(),
            ..Default::default()
        };
        let parsed = validate(raw, &options).unwrap();
        assert_eq!(parsed.dataset_version, "v-manifest");
        assert_eq!(parsed.estimated_difficulty, Difficulty::Easy);
    }

    #[tokio::test]
    async fn hash_case_does_not_defeat_dedup() {
        let dir = tempfile::tempdir().unwrap();
        let item = valid_item(9, "mesma questão");
        let mut shouted = item.clone();
        shouted.content_hash = item.content_hash.to_ascii_uppercase();
        let path = write_lines(dir.path(), &[line(&item), line(&shouted)]);
        let store = InMemoryStore::new();
        let importer = ItemImporter::new(&store, dir.path(), ImportOptions::default(), &NoProgress);

        let result = importer.import_file(&path, 2023).await.unwrap();
        assert_eq!(result.imported_items, 1);
        assert_eq!(result.skipped_items, 1);
        assert_eq!(store.len(), 1);
        assert!(store.get(&item.content_hash).is_some());
    }

    #[tokio::test]
    async fn record_from_another_year_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let mut item = valid_item(10, "ano trocado");
        item.year = 2022;
        item.content_hash = content_hash(&ContentIdentity::of(&item, 10));
        let path = write_lines(dir.path(), &[line(&item)]);
        let store = InMemoryStore::new();
        let importer = ItemImporter::new(&store, dir.path(), ImportOptions::default(), &NoProgress);

        let result = importer.import_file(&path, 2023).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.imported_items, 0);
        assert_eq!(
            result.validation_report.invalid_items,
            vec!["2023-AZUL-010".to_string()]
        );
        assert!(result.errors[0].contains("year 2022 does not match items file year 2023"));
        assert!(store.is_empty());
    }
}

//! Legacy dump converter.
//!
//! Walks the per-year, per-question tree of the legacy question dump and
//! produces canonical items grouped by year:
//!
//! ```text
//! root/
//!   2023/
//!     details.json              (optional exam catalog)
//!     questions/
//!       1/details.json          (one question)
//!       1/figure.png            (sibling images become asset refs)
//!       2-ingles/details.json
//! ```
//!
//! A question that cannot be read or parsed is logged and left out of its
//! year; nothing short of an unreadable root aborts the conversion.

use anyhow::{anyhow, Context, Result};
use globset::GlobSet;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::LegacyConfig;
use crate::hash::{content_hash, ContentIdentity};
use crate::heuristics::{DifficultyEstimator, KeywordTopics, LengthDifficulty, TopicClassifier};
use crate::models::{
    format_item_id, meta_keys, Alternatives, Area, Booklet, CanonicalItem, Letter, MetaValue,
    Metadata,
};
use crate::progress::{ProgressEvent, ProgressReporter};

/// One question as stored in `questions/{dir}/details.json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyQuestion {
    #[serde(default)]
    pub title: String,
    pub index: u32,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub language: Option<String>,
    pub discipline: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub files: Vec<serde_json::Value>,
    #[serde(default)]
    pub correct_alternative: String,
    #[serde(default)]
    pub alternatives_introduction: Option<String>,
    #[serde(default)]
    pub alternatives: Vec<LegacyAlternative>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyAlternative {
    pub letter: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub file: Option<serde_json::Value>,
    #[serde(default)]
    pub is_correct: bool,
}

/// Exam-level `details.json`: label catalogs for disciplines and languages.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyExamDetails {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub disciplines: Vec<CatalogEntry>,
    #[serde(default)]
    pub languages: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    pub label: String,
    pub value: String,
}

impl LegacyExamDetails {
    fn language_label(&self, value: &str) -> Option<&str> {
        self.languages
            .iter()
            .find(|l| l.value == value)
            .map(|l| l.label.as_str())
    }
}

/// An image to copy into the canonical `assets/{year}/` tree.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetSource {
    /// Path relative to `assets/{year}/`; identical to the item's asset ref.
    pub rel_path: String,
    pub source: PathBuf,
}

/// Converted items of one exam year, sorted by area code then sequence.
#[derive(Debug, Clone)]
pub struct YearBatch {
    pub year: i32,
    pub items: Vec<CanonicalItem>,
    pub assets: Vec<AssetSource>,
    /// Question directories left out because they could not be converted.
    pub skipped: Vec<String>,
}

/// Legacy language value → canonical variant code.
fn language_code(value: &str) -> Option<&'static str> {
    match value {
        "espanhol" => Some("ES"),
        "ingles" => Some("IN"),
        _ => None,
    }
}

fn is_year_dir(name: &str) -> bool {
    name.len() == 4 && name.bytes().all(|b| b.is_ascii_digit())
}

pub struct LegacyConverter {
    root: PathBuf,
    dataset_version: String,
    images: GlobSet,
    topics: Box<dyn TopicClassifier>,
    difficulty: Box<dyn DifficultyEstimator>,
}

impl LegacyConverter {
    pub fn new(config: &LegacyConfig, dataset_version: &str) -> Result<Self> {
        Ok(Self {
            root: config.root.clone(),
            dataset_version: dataset_version.to_string(),
            images: config.image_matcher()?,
            topics: Box::new(KeywordTopics),
            difficulty: Box::new(LengthDifficulty::default()),
        })
    }

    /// Replaces the topic and difficulty heuristics.
    pub fn with_heuristics(
        mut self,
        topics: Box<dyn TopicClassifier>,
        difficulty: Box<dyn DifficultyEstimator>,
    ) -> Self {
        self.topics = topics;
        self.difficulty = difficulty;
        self
    }

    /// Year directories under the root, most recent first.
    pub fn discover_years(&self) -> Result<Vec<i32>> {
        if !self.root.is_dir() {
            return Err(anyhow!(
                "Legacy root does not exist: {}",
                self.root.display()
            ));
        }
        let mut years = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry
                .with_context(|| format!("Failed to list legacy root {}", self.root.display()))?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if is_year_dir(&name) {
                if let Ok(year) = name.parse::<i32>() {
                    years.push(year);
                }
            }
        }
        years.sort_unstable_by(|a, b| b.cmp(a));
        Ok(years)
    }

    /// Converts every discovered year. A year whose `questions/` directory
    /// is missing is logged and skipped.
    pub fn convert_all(&self, progress: &dyn ProgressReporter) -> Result<Vec<YearBatch>> {
        let years = self.discover_years()?;
        let mut batches = Vec::with_capacity(years.len());
        for year in years {
            progress.report(ProgressEvent::Converting { year });
            match self.convert_year(year) {
                Ok(batch) => {
                    info!(
                        year,
                        items = batch.items.len(),
                        skipped = batch.skipped.len(),
                        "converted legacy year"
                    );
                    batches.push(batch);
                }
                Err(e) => warn!(year, error = %e, "skipping legacy year"),
            }
        }
        Ok(batches)
    }

    pub fn convert_year(&self, year: i32) -> Result<YearBatch> {
        let year_dir = self.root.join(year.to_string());
        let exam = self.load_exam_details(&year_dir, year);

        let questions_dir = year_dir.join("questions");
        if !questions_dir.is_dir() {
            return Err(anyhow!(
                "No questions directory at {}",
                questions_dir.display()
            ));
        }

        let mut batch = YearBatch {
            year,
            items: Vec::new(),
            assets: Vec::new(),
            skipped: Vec::new(),
        };

        let walker = WalkDir::new(&questions_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(year, error = %e, "unreadable entry in questions directory");
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            let dir_name = entry.file_name().to_string_lossy().to_string();
            match self.convert_question(year, entry.path(), exam.as_ref()) {
                Ok((item, assets)) => {
                    batch.items.push(item);
                    batch.assets.extend(assets);
                }
                Err(e) => {
                    warn!(year, question = %dir_name, error = %e, "skipping legacy question");
                    batch.skipped.push(dir_name);
                }
            }
        }

        batch.items.sort_by(|a, b| {
            a.area
                .code()
                .cmp(b.area.code())
                .then_with(|| legacy_index(a).cmp(&legacy_index(b)))
        });
        Ok(batch)
    }

    fn load_exam_details(&self, year_dir: &Path, year: i32) -> Option<LegacyExamDetails> {
        let path = year_dir.join("details.json");
        if !path.exists() {
            debug!(year, "no exam details file");
            return None;
        }
        let parsed = std::fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|s| serde_json::from_str(&s).map_err(anyhow::Error::from));
        match parsed {
            Ok(details) => Some(details),
            Err(e) => {
                warn!(year, error = %e, "could not read exam details");
                None
            }
        }
    }

    /// Converts one question directory into a canonical item plus the image
    /// files it depends on.
    pub fn convert_question(
        &self,
        year: i32,
        question_dir: &Path,
        exam: Option<&LegacyExamDetails>,
    ) -> Result<(CanonicalItem, Vec<AssetSource>)> {
        let details_path = question_dir.join("details.json");
        let raw = std::fs::read_to_string(&details_path)
            .with_context(|| format!("Failed to read {}", details_path.display()))?;
        let question: LegacyQuestion = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", details_path.display()))?;

        if let Some(record_year) = question.year {
            if record_year != year {
                warn!(
                    year,
                    record_year,
                    dir = %question_dir.display(),
                    "question year differs from its directory; using directory year"
                );
            }
        }

        let correct_answer = resolve_correct_letter(&question)?;
        let area = Area::from_legacy_discipline(&question.discipline);
        let sequence = question.index;
        let booklet = Booklet::from_sequence(sequence);

        let mut alternatives = Alternatives::default();
        for alt in &question.alternatives {
            if let Ok(letter) = alt.letter.parse::<Letter>() {
                *alternatives.get_mut(letter) = alt.text.clone();
            }
        }

        let dir_name = question_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let (asset_refs, assets) = self.collect_assets(&question, question_dir, &dir_name);

        let hash = content_hash(&ContentIdentity {
            text: &question.context,
            alternatives: &alternatives,
            correct_answer,
            area,
            year,
            sequence,
        });

        let mut metadata = Metadata::new();
        metadata.insert(
            meta_keys::LEGACY_INDEX.into(),
            MetaValue::Int(i64::from(sequence)),
        );
        let language = question.language.as_deref();
        metadata.insert(
            meta_keys::LANGUAGE.into(),
            language
                .map(|l| language_code(l).unwrap_or(l).to_string())
                .into(),
        );
        if let Some(label) = language.and_then(|l| exam.and_then(|e| e.language_label(l))) {
            metadata.insert(meta_keys::LANGUAGE_LABEL.into(), label.into());
        }
        metadata.insert(
            meta_keys::DISCIPLINE.into(),
            question.discipline.as_str().into(),
        );
        metadata.insert(meta_keys::BOOKLET.into(), booklet.name().into());
        metadata.insert(
            meta_keys::ORIGINAL_TITLE.into(),
            question.title.as_str().into(),
        );
        if let Some(intro) = &question.alternatives_introduction {
            metadata.insert(meta_keys::ALTERNATIVES_INTRO.into(), intro.as_str().into());
        }
        metadata.insert(
            meta_keys::CONVERTED_FROM.into(),
            meta_keys::SOURCE_LEGACY.into(),
        );

        let item = CanonicalItem {
            item_id: format_item_id(year, booklet, sequence),
            year,
            area,
            topic: self.topics.classify(&question.context, area),
            estimated_difficulty: self
                .difficulty
                .estimate(&question.context, question.alternatives.len()),
            text: question.context,
            alternatives,
            correct_answer,
            asset_refs,
            content_hash: hash,
            dataset_version: self.dataset_version.clone(),
            metadata,
        };
        Ok((item, assets))
    }

    /// Embedded file references first, then sibling images in name order.
    fn collect_assets(
        &self,
        question: &LegacyQuestion,
        question_dir: &Path,
        dir_name: &str,
    ) -> (Vec<String>, Vec<AssetSource>) {
        let mut refs: Vec<String> = question
            .files
            .iter()
            .filter_map(|f| f.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();
        let mut sources = Vec::new();

        let walker = WalkDir::new(question_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();
        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if !self.images.is_match(&name) {
                continue;
            }
            let rel_path = format!("{}/{}", dir_name, name);
            if !refs.contains(&rel_path) {
                refs.push(rel_path.clone());
            }
            sources.push(AssetSource {
                rel_path,
                source: entry.path().to_path_buf(),
            });
        }
        (refs, sources)
    }
}

/// The record's correct letter, falling back to the alternative flagged
/// `isCorrect` when the top-level field is blank.
fn resolve_correct_letter(question: &LegacyQuestion) -> Result<Letter> {
    if !question.correct_alternative.trim().is_empty() {
        return question
            .correct_alternative
            .parse::<Letter>()
            .map_err(|e| anyhow!("Invalid correct alternative: {}", e));
    }
    question
        .alternatives
        .iter()
        .find(|a| a.is_correct)
        .ok_or_else(|| anyhow!("Question {} has no correct alternative", question.index))
        .and_then(|a| {
            a.letter
                .parse::<Letter>()
                .map_err(|e| anyhow!("Invalid correct alternative: {}", e))
        })
}

fn legacy_index(item: &CanonicalItem) -> i64 {
    match item.metadata.get(meta_keys::LEGACY_INDEX) {
        Some(MetaValue::Int(i)) => *i,
        _ => 0,
    }
}

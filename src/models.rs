//! Core data models used throughout the ingestion pipeline.
//!
//! These types describe the canonical exam item, the dataset manifest that
//! guards a converted dataset, and the reports produced by an import run.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exam knowledge area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Area {
    /// Natural sciences.
    #[serde(rename = "CN")]
    NaturalSciences,
    /// Human sciences.
    #[serde(rename = "CH")]
    HumanSciences,
    /// Languages and codes.
    #[serde(rename = "LC")]
    Languages,
    /// Mathematics.
    #[serde(rename = "MT")]
    Mathematics,
}

impl Area {
    /// The canonical area set, in manifest order.
    pub const ALL: [Area; 4] = [
        Area::NaturalSciences,
        Area::HumanSciences,
        Area::Languages,
        Area::Mathematics,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Area::NaturalSciences => "CN",
            Area::HumanSciences => "CH",
            Area::Languages => "LC",
            Area::Mathematics => "MT",
        }
    }

    /// Maps a legacy discipline slug to an area.
    ///
    /// Unknown slugs fall back to [`Area::Languages`]; the legacy dump has
    /// a handful of foreign-language disciplines with ad hoc slugs.
    pub fn from_legacy_discipline(discipline: &str) -> Area {
        match discipline {
            "ciencias-natureza" => Area::NaturalSciences,
            "ciencias-humanas" => Area::HumanSciences,
            "linguagens" => Area::Languages,
            "matematica" => Area::Mathematics,
            _ => Area::Languages,
        }
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Area {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Area::ALL
            .into_iter()
            .find(|a| a.code() == s)
            .ok_or_else(|| format!("unknown area '{}'", s))
    }
}

/// Option letter. Every item has exactly these five options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Letter {
    A,
    B,
    C,
    D,
    E,
}

impl Letter {
    pub const ALL: [Letter; 5] = [Letter::A, Letter::B, Letter::C, Letter::D, Letter::E];

    pub fn as_str(self) -> &'static str {
        match self {
            Letter::A => "A",
            Letter::B => "B",
            Letter::C => "C",
            Letter::D => "D",
            Letter::E => "E",
        }
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Letter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Letter::ALL
            .into_iter()
            .find(|l| l.as_str() == s.trim())
            .ok_or_else(|| format!("'{}' is not one of A, B, C, D, E", s))
    }
}

/// The five option texts of an item, keyed by letter.
///
/// Serializes as a JSON object with keys `A`..`E` in that order. An empty
/// string marks an option the source did not provide; see
/// [`Alternatives::missing`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alternatives {
    #[serde(rename = "A", default)]
    pub a: String,
    #[serde(rename = "B", default)]
    pub b: String,
    #[serde(rename = "C", default)]
    pub c: String,
    #[serde(rename = "D", default)]
    pub d: String,
    #[serde(rename = "E", default)]
    pub e: String,
}

impl Alternatives {
    /// Builds the option set from a letter-keyed map. Keys outside A–E are
    /// ignored; letters absent from the map stay empty.
    pub fn from_map(map: &BTreeMap<String, String>) -> Self {
        let mut alts = Alternatives::default();
        for (key, text) in map {
            if let Ok(letter) = key.parse::<Letter>() {
                *alts.get_mut(letter) = text.clone();
            }
        }
        alts
    }

    pub fn get(&self, letter: Letter) -> &str {
        match letter {
            Letter::A => &self.a,
            Letter::B => &self.b,
            Letter::C => &self.c,
            Letter::D => &self.d,
            Letter::E => &self.e,
        }
    }

    pub fn get_mut(&mut self, letter: Letter) -> &mut String {
        match letter {
            Letter::A => &mut self.a,
            Letter::B => &mut self.b,
            Letter::C => &mut self.c,
            Letter::D => &mut self.d,
            Letter::E => &mut self.e,
        }
    }

    /// Letters whose option text is empty or whitespace.
    pub fn missing(&self) -> Vec<Letter> {
        Letter::ALL
            .into_iter()
            .filter(|l| self.get(*l).trim().is_empty())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }
}

/// Heuristic difficulty bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "EASY",
            Difficulty::Medium => "MEDIUM",
            Difficulty::Hard => "HARD",
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EASY" => Ok(Difficulty::Easy),
            "MEDIUM" => Ok(Difficulty::Medium),
            "HARD" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

/// Question-ordering variant of a printed exam.
///
/// Derived purely from the question's sequence number: four buckets of
/// [`Booklet::BUCKET_SIZE`] questions each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Booklet {
    Azul,
    Amarelo,
    Branco,
    Rosa,
}

impl Booklet {
    pub const BUCKET_SIZE: u32 = 45;

    pub fn from_sequence(sequence: u32) -> Booklet {
        match sequence.saturating_sub(1) / Self::BUCKET_SIZE {
            0 => Booklet::Azul,
            1 => Booklet::Amarelo,
            2 => Booklet::Branco,
            _ => Booklet::Rosa,
        }
    }

    /// 1-based booklet ordinal.
    pub fn number(self) -> u8 {
        match self {
            Booklet::Azul => 1,
            Booklet::Amarelo => 2,
            Booklet::Branco => 3,
            Booklet::Rosa => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Booklet::Azul => "AZUL",
            Booklet::Amarelo => "AMARELO",
            Booklet::Branco => "BRANCO",
            Booklet::Rosa => "ROSA",
        }
    }
}

impl fmt::Display for Booklet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Builds the display key `{year}-{booklet}-{sequence:03}`.
pub fn format_item_id(year: i32, booklet: Booklet, sequence: u32) -> String {
    format!("{}-{}-{:03}", year, booklet, sequence)
}

/// Recovers the sequence number from the trailing segment of an item id.
pub fn sequence_from_item_id(item_id: &str) -> Option<u32> {
    item_id.rsplit('-').next()?.parse().ok()
}

/// Scalar value in a record's provenance bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Text(String),
    Null,
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Text(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::Text(s)
    }
}

impl From<Option<String>> for MetaValue {
    fn from(s: Option<String>) -> Self {
        s.map(MetaValue::Text).unwrap_or(MetaValue::Null)
    }
}

/// Provenance bag attached to every item. Append-only.
pub type Metadata = BTreeMap<String, MetaValue>;

/// Well-known metadata keys.
pub mod meta_keys {
    pub const LEGACY_INDEX: &str = "legacy_index";
    pub const LANGUAGE: &str = "language";
    pub const LANGUAGE_LABEL: &str = "language_label";
    pub const DISCIPLINE: &str = "discipline";
    pub const BOOKLET: &str = "booklet";
    pub const ORIGINAL_TITLE: &str = "original_title";
    pub const ALTERNATIVES_INTRO: &str = "alternatives_intro";
    pub const CONVERTED_FROM: &str = "converted_from";
    pub const AUTHOR: &str = "author";

    /// `converted_from` value for records produced by the legacy converter.
    pub const SOURCE_LEGACY: &str = "legacy-dump";
    /// `converted_from` value for hand-authored records.
    pub const SOURCE_AUTHORED: &str = "authored";
}

/// The unit of storage: one exam question with its answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalItem {
    pub item_id: String,
    pub year: i32,
    pub area: Area,
    pub text: String,
    pub alternatives: Alternatives,
    pub correct_answer: Letter,
    pub topic: String,
    pub estimated_difficulty: Difficulty,
    #[serde(default)]
    pub asset_refs: Vec<String>,
    pub content_hash: String,
    pub dataset_version: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Lifecycle status recorded in a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub total_items: usize,
    pub last_updated: DateTime<Utc>,
    pub import_status: RunStatus,
    pub validation_status: RunStatus,
}

/// Versioned index of a canonical dataset and the checksums of its files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub dataset_version: String,
    pub years_available: Vec<i32>,
    pub areas: Vec<Area>,
    /// Relative file path → `sha256:<hex>`.
    pub checksums: BTreeMap<String, String>,
    pub metadata: ManifestMetadata,
}

/// Problem identifiers collected during an import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub missing_assets: Vec<String>,
    pub duplicate_items: Vec<String>,
    pub invalid_items: Vec<String>,
}

/// Outcome of importing one items file, or of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    pub success: bool,
    pub imported_items: u64,
    pub skipped_items: u64,
    pub errors: Vec<String>,
    pub validation_report: ValidationReport,
}

impl ImportResult {
    /// Folds another result's counters and lists into this one.
    pub fn absorb(&mut self, other: ImportResult) {
        self.imported_items += other.imported_items;
        self.skipped_items += other.skipped_items;
        self.errors.extend(other.errors);
        let report = &mut self.validation_report;
        report
            .missing_assets
            .extend(other.validation_report.missing_assets);
        report
            .duplicate_items
            .extend(other.validation_report.duplicate_items);
        report
            .invalid_items
            .extend(other.validation_report.invalid_items);
    }

    /// Sets `success` from the accumulated errors. Duplicates and missing
    /// assets do not count against it.
    pub fn finish(mut self) -> Self {
        self.success = self.errors.is_empty();
        self
    }
}

/// Per-year answer key as written to `{year}/gabarito.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerKey {
    pub year: i32,
    pub booklet: String,
    pub answers: BTreeMap<String, Letter>,
}

/// Booklet tag for answer keys that cover every booklet of a year.
pub const ALL_BOOKLETS: &str = "all";

/// Outcome of importing one answer-key file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnswerKeyOutcome {
    pub year: i32,
    pub success: bool,
    pub answers: usize,
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booklet_buckets_follow_sequence_ranges() {
        assert_eq!(Booklet::from_sequence(1).number(), 1);
        assert_eq!(Booklet::from_sequence(45).number(), 1);
        assert_eq!(Booklet::from_sequence(46).number(), 2);
        assert_eq!(Booklet::from_sequence(90).number(), 2);
        assert_eq!(Booklet::from_sequence(91).number(), 3);
        assert_eq!(Booklet::from_sequence(136).number(), 4);
        assert_eq!(Booklet::from_sequence(180).number(), 4);
    }

    #[test]
    fn item_id_round_trips_sequence() {
        let id = format_item_id(2023, Booklet::from_sequence(7), 7);
        assert_eq!(id, "2023-AZUL-007");
        assert_eq!(sequence_from_item_id(&id), Some(7));
        assert_eq!(sequence_from_item_id("2023-AZUL-abc"), None);
    }

    #[test]
    fn unknown_discipline_falls_back_to_languages() {
        assert_eq!(
            Area::from_legacy_discipline("matematica"),
            Area::Mathematics
        );
        assert_eq!(Area::from_legacy_discipline("artes"), Area::Languages);
    }

    #[test]
    fn alternatives_report_missing_letters() {
        let mut map = BTreeMap::new();
        for l in ["A", "B", "C", "D"] {
            map.insert(l.to_string(), format!("option {}", l));
        }
        map.insert("Z".to_string(), "ignored".to_string());
        let alts = Alternatives::from_map(&map);
        assert_eq!(alts.missing(), vec![Letter::E]);
        assert!(!alts.is_complete());
    }

    #[test]
    fn alternatives_serialize_with_letter_keys() {
        let alts = Alternatives {
            a: "1".into(),
            b: "2".into(),
            c: "3".into(),
            d: "4".into(),
            e: "5".into(),
        };
        let json = serde_json::to_string(&alts).unwrap();
        assert_eq!(json, r#"{"A":"1","B":"2","C":"3","D":"4","E":"5"}"#);
    }

    #[test]
    fn metadata_values_stay_scalar() {
        let json = r#"{"legacy_index":12,"language":null,"booklet":"AZUL","reviewed":true}"#;
        let meta: Metadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta["legacy_index"], MetaValue::Int(12));
        assert_eq!(meta["language"], MetaValue::Null);
        assert_eq!(meta["booklet"], MetaValue::Text("AZUL".into()));
        assert_eq!(meta["reviewed"], MetaValue::Bool(true));
    }

    #[test]
    fn absorb_accumulates_and_finish_ignores_advisories() {
        let mut total = ImportResult::default();
        let mut year = ImportResult {
            imported_items: 2,
            skipped_items: 1,
            ..Default::default()
        };
        year.validation_report.duplicate_items.push("2023-AZUL-001".into());
        year.validation_report.missing_assets.push("q1/fig.png".into());
        total.absorb(year);
        let total = total.finish();
        assert!(total.success);
        assert_eq!(total.imported_items, 2);
        assert_eq!(total.skipped_items, 1);
        assert_eq!(total.validation_report.duplicate_items.len(), 1);
    }
}

//! Answer-key (gabarito) import.
//!
//! Validates a year's `gabarito.json` on its own: year, booklet tag, and a
//! non-empty map of item id → letter. Keys are not cross-checked against the
//! item store here; that consistency check belongs to a later verification
//! step.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::models::{AnswerKeyOutcome, Letter};

#[derive(Debug, Deserialize)]
struct RawAnswerKey {
    year: Option<i64>,
    #[serde(alias = "version")]
    booklet: Option<String>,
    answers: Option<BTreeMap<String, String>>,
}

pub fn import_answer_key(path: &Path, expected_year: i32) -> AnswerKeyOutcome {
    let mut outcome = AnswerKeyOutcome {
        year: expected_year,
        ..Default::default()
    };

    let raw = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            outcome
                .errors
                .push(format!("Failed to read answer key {}: {}", path.display(), e));
            return outcome;
        }
    };
    let key: RawAnswerKey = match serde_json::from_str(&raw) {
        Ok(k) => k,
        Err(e) => {
            outcome.errors.push(format!(
                "Failed to parse answer key {}: {}",
                path.display(),
                e
            ));
            return outcome;
        }
    };

    match key.year {
        None => outcome
            .errors
            .push(format!("Answer key for {} has no year", expected_year)),
        Some(y) if y != i64::from(expected_year) => outcome.errors.push(format!(
            "Answer key year {} does not match {}",
            y, expected_year
        )),
        Some(_) => {}
    }

    if key.booklet.as_deref().map(str::trim).unwrap_or("").is_empty() {
        outcome
            .errors
            .push(format!("Answer key for {} has no booklet tag", expected_year));
    }

    let answers = key.answers.unwrap_or_default();
    if answers.is_empty() {
        outcome
            .errors
            .push(format!("Answer key for {} has no answers", expected_year));
    }
    for (item_id, letter) in &answers {
        if letter.parse::<Letter>().is_err() {
            outcome.errors.push(format!(
                "Answer key for {}: answer '{}' for {} is not A-E",
                expected_year, letter, item_id
            ));
        }
    }

    outcome.answers = answers.len();
    outcome.success = outcome.errors.is_empty();
    if outcome.success {
        info!(
            year = expected_year,
            booklet = key.booklet.as_deref().unwrap_or_default(),
            answers = outcome.answers,
            "answer key accepted"
        );
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("gabarito.json");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn accepts_well_formed_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            r#"{"year":2023,"booklet":"all","answers":{"2023-AZUL-001":"A","2023-AZUL-002":"E"}}"#,
        );
        let outcome = import_answer_key(&path, 2023);
        assert!(outcome.success, "{:?}", outcome.errors);
        assert_eq!(outcome.answers, 2);
    }

    #[test]
    fn version_is_accepted_as_the_booklet_tag() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            r#"{"year":2023,"version":"v2","answers":{"2023-AZUL-001":"B"}}"#,
        );
        assert!(import_answer_key(&path, 2023).success);
    }

    #[test]
    fn reports_every_structural_problem() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), r#"{"year":2022,"answers":{"x":"F"}}"#);
        let outcome = import_answer_key(&path, 2023);
        assert!(!outcome.success);
        assert_eq!(outcome.errors.len(), 3);
        assert!(outcome.errors[0].contains("does not match"));
        assert!(outcome.errors[1].contains("booklet"));
        assert!(outcome.errors[2].contains("not A-E"));
    }

    #[test]
    fn empty_answers_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), r#"{"year":2023,"booklet":"all","answers":{}}"#);
        let outcome = import_answer_key(&path, 2023);
        assert_eq!(outcome.errors, vec!["Answer key for 2023 has no answers"]);

        let missing = import_answer_key(&dir.path().join("nope.json"), 2023);
        assert!(!missing.success);
        assert!(missing.errors[0].starts_with("Failed to read answer key"));
    }
}

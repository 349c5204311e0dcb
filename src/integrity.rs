//! Manifest integrity validation: the trust gate in front of every import.
//!
//! Every `(path, digest)` pair in the manifest is checked against the raw
//! bytes on disk, and every year in `years_available` must have checksums
//! for both its items file and its answer key, since those are the files an
//! import reads. All problems are collected in one pass; the caller gets the
//! complete list, not the first failure.

use serde::Serialize;
use std::path::{Component, Path};
use tracing::warn;

use crate::hash::{sha256_hex, strip_digest_prefix};
use crate::manifest::{answer_key_path, items_path};
use crate::models::Manifest;
use crate::progress::{ProgressEvent, ProgressReporter};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IntegrityReport {
    pub valid: bool,
    pub errors: Vec<String>,
    /// Paths that failed a check: checksum entries in manifest order, then
    /// files of listed years that have no checksum.
    pub failed_paths: Vec<String>,
}

/// Relative paths only; no root, prefix or `..` components.
fn is_contained(rel: &str) -> bool {
    let path = Path::new(rel);
    !rel.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

pub fn verify(
    manifest: &Manifest,
    root: &Path,
    progress: &dyn ProgressReporter,
) -> IntegrityReport {
    progress.report(ProgressEvent::Verifying {
        files: manifest.checksums.len(),
    });

    let mut report = IntegrityReport::default();
    for (rel, expected) in &manifest.checksums {
        if let Some(error) = check_file(root, rel, expected) {
            warn!(path = %rel, %error, "integrity check failed");
            report.errors.push(error);
            report.failed_paths.push(rel.clone());
        }
    }
    for &year in &manifest.years_available {
        for rel in [items_path(year), answer_key_path(year)] {
            if !manifest.checksums.contains_key(&rel) {
                let error = format!("No checksum for {} (year {} is listed)", rel, year);
                warn!(path = %rel, "manifest does not cover file");
                report.errors.push(error);
                report.failed_paths.push(rel);
            }
        }
    }
    report.valid = report.errors.is_empty();
    report
}

fn check_file(root: &Path, rel: &str, expected: &str) -> Option<String> {
    if !is_contained(rel) {
        return Some(format!("Refusing path outside dataset root: {}", rel));
    }
    let Some(expected_hex) = strip_digest_prefix(expected) else {
        return Some(format!("Unsupported checksum format for {}: {}", rel, expected));
    };
    let bytes = match std::fs::read(root.join(rel)) {
        Ok(b) => b,
        Err(e) => return Some(format!("File not found or unreadable: {} ({})", rel, e)),
    };
    let actual = sha256_hex(&bytes);
    if !actual.eq_ignore_ascii_case(expected_hex) {
        return Some(format!(
            "Checksum mismatch for {}: expected {}, got {}",
            rel, expected_hex, actual
        ));
    }
    None
}

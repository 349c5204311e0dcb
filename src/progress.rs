//! Conversion and import progress reporting.
//!
//! Progress is emitted on **stderr** so stdout stays parseable for scripts
//! (the run report and `--json` output go to stdout).

use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Legacy questions of this year are being converted.
    Converting { year: i32 },
    /// Manifest checksums are being recomputed.
    Verifying { files: usize },
    /// `n` lines of this year's items file have been processed.
    Importing { year: i32, n: u64 },
    /// A year's items file is finished.
    YearDone {
        year: i32,
        imported: u64,
        skipped: u64,
    },
}

/// Receives progress events from the converter, validator and importer.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly lines on stderr: "import 2023  1,200 lines".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Converting { year } => {
                format!("convert {}  reading questions...\n", year)
            }
            ProgressEvent::Verifying { files } => {
                format!("verify  checking {} files\n", format_number(*files as u64))
            }
            ProgressEvent::Importing { year, n } => {
                format!("import {}  {} lines\n", year, format_number(*n))
            }
            ProgressEvent::YearDone {
                year,
                imported,
                skipped,
            } => format!(
                "import {}  done: {} imported, {} skipped\n",
                year,
                format_number(*imported),
                format_number(*skipped)
            ),
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Converting { year } => serde_json::json!({
                "event": "progress",
                "phase": "converting",
                "year": year
            }),
            ProgressEvent::Verifying { files } => serde_json::json!({
                "event": "progress",
                "phase": "verifying",
                "files": files
            }),
            ProgressEvent::Importing { year, n } => serde_json::json!({
                "event": "progress",
                "phase": "importing",
                "year": year,
                "n": n
            }),
            ProgressEvent::YearDone {
                year,
                imported,
                skipped,
            } => serde_json::json!({
                "event": "year_done",
                "year": year,
                "imported": imported,
                "skipped": skipped
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

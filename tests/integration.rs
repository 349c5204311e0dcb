use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn exi_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("exi");
    path
}

fn write_question(year_dir: &Path, index: u32, discipline: &str, context: &str, letters: &[&str]) {
    let qdir = year_dir.join("questions").join(index.to_string());
    fs::create_dir_all(&qdir).unwrap();
    let alternatives: Vec<_> = letters
        .iter()
        .map(|l| {
            json!({
                "letter": l,
                "text": format!("alternativa {} da questão {}", l, index),
                "file": null,
                "isCorrect": *l == "B"
            })
        })
        .collect();
    let details = json!({
        "title": format!("Questão {} - ENEM 2023", index),
        "index": index,
        "year": 2023,
        "language": null,
        "discipline": discipline,
        "context": context,
        "files": [],
        "correctAlternative": "B",
        "alternativesIntroduction": "Assinale a alternativa correta.",
        "alternatives": alternatives
    });
    fs::write(qdir.join("details.json"), details.to_string()).unwrap();
}

/// Legacy dump with three convertible questions and one whose options stop
/// at D, plus a config pointing at it.
fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let year_dir = root.join("legacy").join("2023");
    let all = ["A", "B", "C", "D", "E"];
    write_question(&year_dir, 3, "ciencias-natureza", "Sobre a célula e o DNA.", &all);
    write_question(&year_dir, 50, "matematica", "Calcule a área do triângulo.", &all);
    write_question(&year_dir, 100, "ciencias-humanas", "Sobre a história do Brasil.", &all);
    write_question(&year_dir, 101, "ciencias-humanas", "Questão sem a quinta opção.", &all[..4]);
    fs::write(
        year_dir.join("questions").join("3").join("celula.png"),
        b"\x89PNG fake",
    )
    .unwrap();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_content = format!(
        r#"[db]
path = "{root}/data/items.sqlite"

[dataset]
root = "{root}/dataset"
version = "v-it"

[legacy]
root = "{root}/legacy"
"#,
        root = root.display()
    );
    let config_path = config_dir.join("exi.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_exi(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = exi_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("--progress")
        .arg("off")
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run exi binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_exi(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));

    let (_, _, success) = run_exi(&config_path, &["init"]);
    assert!(success, "second init should succeed");
}

#[test]
fn test_convert_writes_dataset() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_exi(&config_path, &["convert"]);
    assert!(success, "convert failed: {}", stderr);
    assert!(stdout.contains("2023: 4 items, 1 assets, 0 skipped"), "{}", stdout);

    let dataset = tmp.path().join("dataset");
    assert!(dataset.join("manifest.json").is_file());
    assert!(dataset.join("2023/items.jsonl").is_file());
    assert!(dataset.join("2023/gabarito.json").is_file());
    assert!(dataset.join("assets/2023/3/celula.png").is_file());

    let (stdout, _, success) = run_exi(&config_path, &["verify"]);
    assert!(success);
    assert!(stdout.starts_with("OK: 2 files"), "{}", stdout);
}

#[test]
fn test_import_reports_invalid_and_is_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    run_exi(&config_path, &["convert"]);
    let (stdout, _, success) = run_exi(&config_path, &["import"]);
    // The four-option question makes the run unsuccessful.
    assert!(!success);
    assert!(stdout.contains("Imported:        3"), "{}", stdout);
    assert!(stdout.contains("- 2023-BRANCO-101"), "{}", stdout);

    let (stdout, _, _) = run_exi(&config_path, &["import", "--json"]);
    let result: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["imported_items"], 0);
    assert_eq!(result["skipped_items"], 3);
    assert_eq!(
        result["validation_report"]["invalid_items"],
        json!(["2023-BRANCO-101"])
    );

    let (stdout, _, success) = run_exi(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Total"), "{}", stdout);
    assert!(stdout.contains("3"), "{}", stdout);
}

#[test]
fn test_tampered_dataset_is_refused() {
    let (tmp, config_path) = setup_test_env();

    run_exi(&config_path, &["convert"]);
    let items = tmp.path().join("dataset/2023/items.jsonl");
    let mut bytes = fs::read(&items).unwrap();
    bytes[10] ^= 0x01;
    fs::write(&items, bytes).unwrap();

    let (stdout, _, success) = run_exi(&config_path, &["verify"]);
    assert!(!success);
    assert!(stdout.contains("Checksum mismatch for 2023/items.jsonl"));

    let (stdout, _, success) = run_exi(&config_path, &["import"]);
    assert!(!success);
    assert!(stdout.contains("Import refused"), "{}", stdout);

    let (stdout, _, _) = run_exi(&config_path, &["stats"]);
    assert!(stdout.contains("No items imported yet"), "{}", stdout);
}

#[test]
fn test_import_converts_when_manifest_missing() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, _) = run_exi(&config_path, &["import", "--json"]);
    let result: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["imported_items"], 3);
}

#[test]
fn test_stats_on_fresh_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_exi(&config_path, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("No items imported yet"), "{}", stdout);
    assert!(tmp.path().join("data/items.sqlite").is_file());
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_exi(&tmp.path().join("nope.toml"), &["stats"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"), "{}", stderr);
}

//! Test harness for the Parsely parser against fixture files.
//!
//! Every .prs file in test/prs/ is parsed and compared against the JSON file
//! of the same name in test/json/, then serialized and parsed again to make
//! sure the round trip is lossless. Files in test/warn/ parse with
//! diagnostics; their expected messages live in matching .diagnostics files.

use std::fs;
use std::path::{Path, PathBuf};

use libparsely::{parse_document, serialize, transcode, AppContext, Value};

/// Root test directory.
fn test_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("test")
}

/// Get all files with a given extension from a subdirectory of test/.
fn get_files_in_subdir(subdir: &str, ext: &str) -> Vec<PathBuf> {
    let pattern = test_root().join(subdir).join(format!("*.{}", ext));
    let mut files: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())
        .map(|paths| paths.flatten().collect())
        .unwrap_or_default();
    files.sort();
    files
}

/// Read the sibling file with the same stem and a different extension.
fn read_companion(path: &Path, dir: &str, ext: &str) -> Option<String> {
    let stem = path.file_stem().unwrap().to_string_lossy();
    let companion = test_root().join(dir).join(format!("{}.{}", stem, ext));
    fs::read_to_string(companion).ok()
}

fn parse_fixture(path: &Path) -> Result<libparsely::Parsed, String> {
    let input = fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    let context = AppContext::new(path.parent().unwrap());
    parse_document(&input, &context).map_err(|e| format!("{}: {}", path.display(), e))
}

fn expect_value(path: &Path, actual: &Value, expected_json: Option<String>) -> Result<(), String> {
    let name = path.display();
    let expected_json = expected_json.ok_or_else(|| format!("{}: missing expected JSON", name))?;
    let expected =
        transcode::json::decode(&expected_json).map_err(|e| format!("{}: {}", name, e))?;
    if *actual != expected {
        return Err(format!(
            "{}: value mismatch\n    expected: {:?}\n    actual:   {:?}",
            name, expected, actual
        ));
    }
    Ok(())
}

fn run_prs_test(path: &Path) -> Result<(), String> {
    let name = path.display();
    let parsed = parse_fixture(path)?;
    if !parsed.diagnostics.is_empty() {
        let messages: Vec<String> = parsed.diagnostics.iter().map(|d| d.to_string()).collect();
        return Err(format!("{}: unexpected diagnostics: {:?}", name, messages));
    }
    expect_value(path, &parsed.value, read_companion(path, "json", "json"))?;

    let text = serialize(&parsed.value).map_err(|e| format!("{}: serialize: {}", name, e))?;
    let reparsed = libparsely::parse(&text).map_err(|e| format!("{}: reparse: {}", name, e))?;
    if reparsed != parsed.value {
        return Err(format!(
            "{}: round trip changed the value\n    text:\n{}\n    got: {:?}",
            name, text, reparsed
        ));
    }

    // A second serialization must be identical to the first.
    let again = serialize(&reparsed).map_err(|e| format!("{}: serialize: {}", name, e))?;
    if again != text {
        return Err(format!("{}: serialization is not stable", name));
    }
    Ok(())
}

fn run_warn_test(path: &Path) -> Result<(), String> {
    let name = path.display();
    let parsed = parse_fixture(path)?;
    expect_value(path, &parsed.value, read_companion(path, "warn", "json"))?;

    let expected = read_companion(path, "warn", "diagnostics")
        .ok_or_else(|| format!("{}: missing .diagnostics file", name))?;
    let expected: Vec<&str> = expected.lines().filter(|l| !l.trim().is_empty()).collect();
    let actual: Vec<String> = parsed.diagnostics.iter().map(|d| d.to_string()).collect();
    if actual != expected {
        return Err(format!(
            "{}: diagnostics mismatch\n    expected: {:?}\n    actual:   {:?}",
            name, expected, actual
        ));
    }
    Ok(())
}

fn run_all(kind: &str, files: &[PathBuf], run: fn(&Path) -> Result<(), String>) {
    if files.is_empty() {
        println!("No .{} test files found!", kind);
        return;
    }

    println!("\nRunning {} {} test files:", files.len(), kind);

    let mut passed = 0;
    let mut failed = 0;
    let mut errors: Vec<String> = Vec::new();

    for file in files {
        match run(file) {
            Ok(()) => passed += 1,
            Err(e) => {
                failed += 1;
                errors.push(e);
            }
        }
    }

    println!("\nResults: {} passed, {} failed", passed, failed);

    if !errors.is_empty() {
        println!("\nErrors:");
        for error in &errors {
            println!("  - {}", error);
        }
    }

    assert!(failed == 0, "{} {} tests failed", failed, kind);
}

#[test]
fn test_all_prs_fixtures() {
    run_all("prs", &get_files_in_subdir("prs", "prs"), run_prs_test);
}

#[test]
fn test_all_warn_fixtures() {
    run_all("warn", &get_files_in_subdir("warn", "prs"), run_warn_test);
}

//! End-to-end checks of the `parsely` binary.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

fn parsely(cwd: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("parsely");
    cmd.current_dir(cwd)
        .env_remove("PARSELY_OUTPUT")
        .env_remove("PARSELY_CONTENTS")
        .env_remove("PARSELY_DATASTORE")
        .env_remove("PARSELY_TAB_WIDTH")
        .env_remove("PARSELY_MAX_FILE_SIZE")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_prs_to_json() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("page.prs"), "title: Hello\ntags:- a, b\n").unwrap();

    parsely(dir.path())
        .arg("page.prs")
        .assert()
        .success()
        .stdout("{\n  \"title\": \"Hello\",\n  \"tags\": [\n    \"a\",\n    \"b\"\n  ]\n}\n");
}

#[test]
fn test_json_to_parsely() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("data.json"),
        r#"{"name": "Ada", "server": {"port": 8000}}"#,
    )
    .unwrap();

    parsely(dir.path())
        .args(["data.json", "-t", "parsely"])
        .assert()
        .success()
        .stdout("name: Ada\nserver:\n    port: 8000\n");
}

#[test]
fn test_stdin_input() {
    let dir = tempfile::tempdir().unwrap();
    parsely(dir.path())
        .args(["-", "-t", "yaml"])
        .write_stdin("a: 1\nb:- x, y\n")
        .assert()
        .success()
        .stdout("a: 1\nb:\n- x\n- y\n");
}

#[test]
fn test_check_fails_on_malformed_lines() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("bad.prs"), "good: 1\n: no key\n").unwrap();
    fs::write(dir.path().join("fine.prs"), "good: 1\n").unwrap();

    parsely(dir.path())
        .args(["--check", "bad.prs"])
        .assert()
        .failure()
        .stdout("")
        .stderr(predicate::str::contains("bad.prs: 2 problem(s)"));

    parsely(dir.path())
        .args(["--check", "fine.prs"])
        .assert()
        .success();
}

#[test]
fn test_output_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("in.prs"), "a: 1\n").unwrap();

    parsely(dir.path())
        .args(["in.prs", "-t", "yaml", "-o", "out/result.yaml"])
        .assert()
        .success()
        .stdout("");
    let written = fs::read_to_string(dir.path().join("out/result.yaml")).unwrap();
    assert_eq!(written, "a: 1\n");
}

#[test]
fn test_write_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("docs")).unwrap();
    fs::write(dir.path().join("docs/one.prs"), "n: 1\n").unwrap();
    fs::write(dir.path().join("docs/two.md"), "n: 2\n").unwrap();
    fs::write(dir.path().join("docs/skip.txt"), "n: 3\n").unwrap();

    parsely(dir.path())
        .args(["docs", "-w", "--out-dir", "build"])
        .assert()
        .success();
    assert_eq!(
        fs::read_to_string(dir.path().join("build/one.json")).unwrap(),
        "{\n  \"n\": 1\n}\n"
    );
    assert!(dir.path().join("build/two.json").exists());
    assert!(!dir.path().join("build/skip.json").exists());
}

#[test]
fn test_missing_lookup_warns() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("data")).unwrap();
    fs::write(dir.path().join("page.prs"), "who: $data/nobody.json\n").unwrap();

    parsely(dir.path())
        .args(["page.prs", "--datastore", "data"])
        .assert()
        .success()
        .stdout("{\n  \"who\": null\n}\n")
        .stderr(predicate::str::contains("$data/nobody.json"));
}

#[test]
fn test_cbor_output() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("in.prs"), "a: 1\n").unwrap();

    let output = parsely(dir.path())
        .args(["in.prs", "-t", "cbor"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(output.stdout, vec![0xa1, 0x61, b'a', 0x01]);
}

#[test]
fn test_directory_rejects_output_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("docs")).unwrap();

    parsely(dir.path())
        .args(["docs", "-o", "out.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--output cannot be used with a directory"));
}

#[test]
fn test_stdin_size_limit() {
    let dir = tempfile::tempdir().unwrap();
    let text = "line: value\n".repeat(10);

    parsely(dir.path())
        .args(["-", "--max-file-size", "64"])
        .write_stdin(text.clone())
        .assert()
        .failure()
        .stdout("")
        .stderr(predicate::str::contains("stdin is larger than the limit of 64 bytes"));

    parsely(dir.path())
        .args(["-", "--max-file-size", "120"])
        .write_stdin(text)
        .assert()
        .success();
}

//! Integration tests for the `cereal` CLI binary.
//!
//! These drive the encode, decode, set, get, and stats subcommands through
//! the built binary with `assert_cmd`, covering stdin/stdout piping, file
//! I/O, fail-soft versus strict decoding, and query-string token extraction.

// `Command::cargo_bin` was deprecated in assert_cmd 2.1.2 in favor of
// `cargo::cargo_bin_cmd!`. Allow it until we migrate.
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};

/// Helper: path to the settings.json fixture.
fn settings_json_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/settings.json")
}

fn cereal() -> Command {
    Command::cargo_bin("cereal").unwrap()
}

/// Helper: run `cereal encode` on some JSON and return the token.
fn encode(json: &str) -> String {
    let output = cereal()
        .arg("encode")
        .write_stdin(json)
        .output()
        .expect("encode should run");
    assert!(output.status.success());
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

/// Helper: run `cereal decode` on a token and parse the JSON it prints.
fn decode(token: &str) -> Value {
    let output = cereal()
        .arg("decode")
        .write_stdin(token)
        .output()
        .expect("decode should run");
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Encode / decode
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn encode_prints_base64_token() {
    let token = encode(r#"{"one":1,"two":2,"three":3}"#);
    assert!(!token.is_empty());
    assert!(token
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'='));
}

#[test]
fn encode_decode_roundtrip() {
    let token = encode(r#"{"one":1,"two":2,"three":3}"#);
    assert_eq!(decode(&token), json!({"one": 1, "two": 2, "three": 3}));
}

#[test]
fn encode_file_to_file_and_decode_file() {
    let dir = std::env::temp_dir();
    let token_path = dir.join("cereal-test-encode-output.txt");
    let token_path = token_path.to_str().unwrap();
    let _ = std::fs::remove_file(token_path);

    cereal()
        .args(["encode", "-i", settings_json_path(), "-o", token_path])
        .assert()
        .success();

    let output = cereal()
        .args(["decode", "-i", token_path])
        .output()
        .unwrap();
    let decoded: Value = serde_json::from_slice(&output.stdout).unwrap();
    let original: Value =
        serde_json::from_str(&std::fs::read_to_string(settings_json_path()).unwrap()).unwrap();
    assert_eq!(decoded, original);

    let _ = std::fs::remove_file(token_path);
}

#[test]
fn encode_rejects_invalid_json() {
    cereal()
        .arg("encode")
        .write_stdin("this is not json {{{")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not valid JSON"));
}

#[test]
fn encode_rejects_scalar_json() {
    cereal()
        .arg("encode")
        .write_stdin("42")
        .assert()
        .failure()
        .stderr(predicate::str::contains("object or array"));
}

#[test]
fn decode_garbage_prints_empty_store() {
    assert_eq!(decode("not a valid token!!"), json!([]));
}

#[test]
fn decode_strict_reports_garbage() {
    cereal()
        .args(["decode", "--strict"])
        .write_stdin("not a valid token!!")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to decode token"));
}

#[test]
fn decode_query_uses_first_parameter_key() {
    let token = encode(r#"{"1":"a","2":"b"}"#);
    let query = format!("?{}&edit", token);
    let output = cereal()
        .args(["decode", "--query"])
        .write_stdin(query)
        .output()
        .unwrap();
    assert!(output.status.success());
    let decoded: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(decoded, json!({"1": "a", "2": "b"}));
}

// ─────────────────────────────────────────────────────────────────────────────
// Set / get
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn set_builds_token_from_scratch() {
    let output = cereal()
        .args(["set", "1=Title", "2=true", "4=two"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let token = String::from_utf8(output.stdout).unwrap();
    assert_eq!(
        decode(token.trim()),
        json!({"1": "Title", "2": true, "4": "two"})
    );
}

#[test]
fn set_overwrites_in_place_and_removes() {
    let token = encode(r#"{"a":1,"b":2,"c":3}"#);
    let output = cereal()
        .args(["set", "-t", token.as_str(), "a=10", "--remove", "b"])
        .output()
        .unwrap();
    let token = String::from_utf8(output.stdout).unwrap();
    let decoded = decode(token.trim());
    let keys: Vec<_> = decoded.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys, ["a", "c"]);
    assert_eq!(decoded["a"], json!(10));
}

#[test]
fn set_rejects_malformed_assignment() {
    cereal()
        .args(["set", "no-equals-sign"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Expected KEY=VALUE"));
}

#[test]
fn get_prints_value_by_normalized_key() {
    let token = encode(r#"{"3":"Y"}"#);
    cereal()
        .args(["get", "-t", token.as_str(), "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"Y\""));
}

#[test]
fn get_absent_key_exits_with_one() {
    let token = encode(r#"{"3":"Y"}"#);
    cereal()
        .args(["get", "-t", token.as_str(), "03"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Key not found"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Stats
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn stats_reports_sizes() {
    cereal()
        .args(["stats", "-i", settings_json_path()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Entries:    5"))
        .stdout(predicate::str::contains("JSON size:"))
        .stdout(predicate::str::contains("Token size:"));
}

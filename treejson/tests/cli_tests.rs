// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs;
use std::process::{Command, Output};

// The integration tests in this file are not part of the treejson
// crate and only drive the `treejson` binary. The test utilities are
// included directly.

#[path = "../src/test_utils.rs"]
mod test_utils;
use test_utils::{assert_contains, assert_snapshot_eq};

/// Run `treejson` with the given arguments.
fn treejson(args: &[&str]) -> Output {
    // Cargo sets `CARGO_BIN_EXE_treejson` when compiling integration
    // tests of a crate with a `treejson` binary.
    Command::new(env!("CARGO_BIN_EXE_treejson")).args(args).output().expect("treejson failed")
}

/// Run `treejson` and return its standard output.
///
/// # Panics
///
/// Panics if `treejson` returns a non-zero exit code.
#[track_caller]
fn treejson_ok(args: &[&str]) -> String {
    let output = treejson(args);
    assert!(output.status.success(), "treejson failure: {:?}", output);
    String::from_utf8(output.stdout).unwrap()
}

#[test]
fn test_python_example() {
    let actual = treejson_ok(&["--pretty", "tests/testdata/example.dump"]);
    assert_snapshot_eq("tests/testdata/example.json", &actual);
}

#[test]
fn test_python_example_with_attributes() {
    let actual =
        treejson_ok(&["--pretty", "--include-attributes", "tests/testdata/example_attributes.dump"]);
    assert_snapshot_eq("tests/testdata/example_attributes.json", &actual);
}

#[test]
fn test_compact_output_is_single_line() {
    let actual = treejson_ok(&["tests/testdata/example.dump"]);
    assert_eq!(actual.lines().count(), 1);
    assert!(actual.starts_with(r#"{"_type":"Module","body":[{"_type":"Import","names":"#));
}

#[test]
fn test_custom_grammar_and_discriminator() {
    let tempdir = tempfile::tempdir().unwrap();
    let grammar = tempdir.path().join("calc.asdl");
    let input = tempdir.path().join("input.dump");
    fs::write(
        &grammar,
        "module Calc { expr = BinOp(expr left, op op, expr right) | Num(int n) op = Add }",
    )
    .unwrap();
    fs::write(&input, "BinOp(Num(1), Add(), right=Num(n=2))").unwrap();

    let actual = treejson_ok(&[
        "--grammar",
        grammar.to_str().unwrap(),
        "--discriminator",
        "kind",
        input.to_str().unwrap(),
    ]);
    assert_eq!(
        actual,
        "{\"kind\":\"BinOp\",\"left\":{\"kind\":\"Num\",\"n\":1},\"op\":{\"kind\":\"Add\"},\
         \"right\":{\"kind\":\"Num\",\"n\":2}}\n"
    );
}

#[test]
fn test_registry_output() {
    let actual = treejson_ok(&["--output-format", "registry"]);
    let registry: serde_json::Value = serde_json::from_str(&actual).unwrap();
    assert_eq!(registry["types"][0]["kind"], "Module");
    assert_eq!(registry["types"][0]["fields"][0]["quantifier"], "sequence");
}

#[test]
fn test_grammar_output() {
    let actual = treejson_ok(&["--output-format", "grammar"]);
    let grammar: serde_json::Value = serde_json::from_str(&actual).unwrap();
    assert_eq!(grammar["module"], "Python");
}

#[test]
fn test_serialization_error() {
    let tempdir = tempfile::tempdir().unwrap();
    let input = tempdir.path().join("input.dump");
    fs::write(&input, "Expr(value=Frobnicate(level=3))").unwrap();

    let output = treejson(&[input.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert_contains(
        &String::from_utf8_lossy(&output.stderr),
        "root.value: node kind `Frobnicate` has no registered field order",
    );
}

#[test]
fn test_depth_limit() {
    let output = treejson(&["--max-depth", "3", "tests/testdata/example.dump"]);
    assert!(!output.status.success());
    assert_contains(&String::from_utf8_lossy(&output.stderr), "maximum depth of 3");
}

#[test]
fn test_invalid_dump() {
    let tempdir = tempfile::tempdir().unwrap();
    let input = tempdir.path().join("input.dump");
    fs::write(&input, "Module(body=[").unwrap();

    let output = treejson(&[input.to_str().unwrap()]);
    assert!(!output.status.success());
    assert_contains(&String::from_utf8_lossy(&output.stderr), "failed to parse input file");
}

#[test]
fn test_missing_input() {
    let output = treejson(&[]);
    assert!(!output.status.success());
    assert_contains(&String::from_utf8_lossy(&output.stderr), "No input file is specified");
}

//! Golden-file test harness for rfx.
//!
//! Discovers `.input.{ts,tsx,vue}` files under `tests/fixtures/`, runs the
//! transform with default options, and compares the output against the
//! matching `.expected.*` file. Files under `tests/fixtures/roundtrip/` have
//! no expected twin; their output only has to parse again.
//!
//! Set `RFX_UPDATE_FIXTURES=1` to overwrite expected files with actual output.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rfx_ast::{is_component_path, Lang, Options, ScriptRegion};
use rfx_parser::{contains_sigil, parse_script, script_regions};
use rfx_transform::transform;
use walkdir::WalkDir;

const INPUT_EXTENSIONS: &[&str] = &["ts", "tsx", "vue"];

fn fixtures_dir() -> PathBuf {
    // CARGO_MANIFEST_DIR is crates/rfx_test/, so go up two levels to workspace root.
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("tests")
        .join("fixtures")
}

fn is_input_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    INPUT_EXTENSIONS
        .iter()
        .any(|ext| name.ends_with(&format!(".input.{ext}")))
}

fn collect_input_files(dir: &Path, skip: Option<&Path>) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_entry(|entry| !skip.is_some_and(|skip| entry.path() == skip))
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file() && is_input_file(path))
        .collect();
    files.sort();
    files
}

fn expected_path(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap()
        .replace(".input.", ".expected.");
    input.with_file_name(name)
}

fn run_pipeline(source: &str, filename: &str) -> Result<String> {
    Ok(transform(source, filename, &Options::default())?.code)
}

/// Every script region of the output must parse as its dialect.
fn verify_valid_output(output: &str, filename: &str) -> Result<()> {
    let regions = if is_component_path(filename) {
        script_regions(output)
    } else {
        let lang = Lang::from_path(filename).context("unknown dialect")?;
        vec![ScriptRegion::whole(output, lang)]
    };
    for region in regions {
        parse_script(&output[region.start..region.end], filename, region.lang)?;
    }
    Ok(())
}

#[test]
fn golden_file_tests() {
    let fixtures = fixtures_dir();
    let input_files = collect_input_files(&fixtures, Some(&fixtures.join("roundtrip")));

    assert!(
        !input_files.is_empty(),
        "No test fixtures found in {}",
        fixtures.display()
    );

    let update_mode = std::env::var("RFX_UPDATE_FIXTURES").is_ok();
    let mut failures = Vec::new();

    for input_path in &input_files {
        let expected_path = expected_path(input_path);
        let test_name = input_path
            .strip_prefix(&fixtures)
            .unwrap()
            .display()
            .to_string();

        let source = match std::fs::read_to_string(input_path) {
            Ok(s) => s,
            Err(e) => {
                failures.push(format!("{test_name}: failed to read input: {e}"));
                continue;
            }
        };

        let filename = input_path.display().to_string();
        let actual = match run_pipeline(&source, &filename) {
            Ok(s) => s,
            Err(e) => {
                failures.push(format!("{test_name}: pipeline failed: {e:#}"));
                continue;
            }
        };

        if update_mode {
            if let Err(e) = std::fs::write(&expected_path, &actual) {
                failures.push(format!("{test_name}: failed to write expected: {e}"));
            }
            continue;
        }

        if !expected_path.exists() {
            failures.push(format!(
                "{test_name}: missing expected file: {}",
                expected_path.display()
            ));
            continue;
        }

        let expected = match std::fs::read_to_string(&expected_path) {
            Ok(s) => s,
            Err(e) => {
                failures.push(format!("{test_name}: failed to read expected: {e}"));
                continue;
            }
        };
        if actual.trim() != expected.trim() {
            failures.push(format!(
                "{test_name}: output mismatch\n--- expected ---\n{}\n--- actual ---\n{}",
                expected.trim(),
                actual.trim()
            ));
        }
    }

    if !failures.is_empty() {
        panic!(
            "\n{} golden test(s) failed:\n\n{}",
            failures.len(),
            failures.join("\n\n")
        );
    }
}

#[test]
fn roundtrip_tests() {
    let fixtures = fixtures_dir();
    // Golden outputs must parse too.
    let input_files = collect_input_files(&fixtures, None);

    let mut failures = Vec::new();

    for input_path in &input_files {
        let test_name = input_path
            .strip_prefix(&fixtures)
            .unwrap()
            .display()
            .to_string();

        let source = match std::fs::read_to_string(input_path) {
            Ok(s) => s,
            Err(e) => {
                failures.push(format!("{test_name}: failed to read: {e}"));
                continue;
            }
        };

        let filename = input_path.display().to_string();
        let output = match run_pipeline(&source, &filename) {
            Ok(s) => s,
            Err(e) => {
                failures.push(format!("{test_name}: pipeline failed: {e:#}"));
                continue;
            }
        };

        if let Err(e) = verify_valid_output(&output, &filename) {
            failures.push(format!(
                "{test_name}: output does not parse: {e}\n--- output ---\n{}",
                output.trim()
            ));
        }
    }

    if !failures.is_empty() {
        panic!(
            "\n{} roundtrip test(s) failed:\n\n{}",
            failures.len(),
            failures.join("\n\n")
        );
    }
}

#[test]
fn sigil_free_files_are_returned_verbatim() {
    let fixtures = fixtures_dir().join("roundtrip");
    for input_path in collect_input_files(&fixtures, None) {
        let source = std::fs::read_to_string(&input_path).unwrap();
        if contains_sigil(&source) {
            continue;
        }
        let filename = input_path.display().to_string();
        let output = transform(&source, &filename, &Options::default()).unwrap();
        assert_eq!(output.code, source, "{filename}");
        assert!(output.edits.is_empty(), "{filename}");
    }
}

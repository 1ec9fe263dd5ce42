use folio_common::patch::{Patch, PatchParseError, PatchParser};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
struct GoldenCase {
    name: String,
    payload: String,
    expected: Expected,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum Expected {
    Parsed {
        tier: String,
        #[serde(default)]
        skipped: usize,
        patches: Vec<Patch>,
    },
    Failed {
        error: ExpectedError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ExpectedError {
    Unparseable,
    Encoding,
}

#[test]
fn patch_payload_golden_cases() {
    let cases_dir = golden_cases_dir();
    let cases = load_cases(&cases_dir);

    assert!(!cases.is_empty(), "no golden cases found in {}", cases_dir.display());

    let parser = PatchParser::default();
    let mut failures = Vec::new();
    for case in cases {
        if let Err(message) = run_case(&parser, &case) {
            failures.push(message);
        }
    }

    if !failures.is_empty() {
        panic!("{} golden case(s) failed:\n\n{}", failures.len(), failures.join("\n\n"));
    }
}

fn golden_cases_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../tests/golden/cases")
}

fn load_cases(cases_dir: &Path) -> Vec<GoldenCase> {
    let mut case_dirs: Vec<PathBuf> = fs::read_dir(cases_dir)
        .unwrap_or_else(|error| panic!("failed to read {}: {error}", cases_dir.display()))
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            if path.is_dir() { Some(path) } else { None }
        })
        .collect();
    case_dirs.sort();
    case_dirs.into_iter().map(load_case).collect()
}

fn load_case(case_dir: PathBuf) -> GoldenCase {
    let name = case_dir
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("<unnamed-case>")
        .to_owned();

    let payload = read_required(&case_dir.join("payload.txt"));
    let expected_path = case_dir.join("expected.json");
    let expected = serde_json::from_str::<Expected>(&read_required(&expected_path))
        .unwrap_or_else(|error| {
            panic!("failed to parse expectation in {}: {error}", expected_path.display())
        });

    GoldenCase { name, payload, expected }
}

fn run_case(parser: &PatchParser, case: &GoldenCase) -> Result<(), String> {
    let outcome = parser.parse(&case.payload);

    match (&case.expected, outcome) {
        (Expected::Parsed { tier, skipped, patches }, Ok(parsed)) => {
            if parsed.tier.as_str() != tier.as_str() {
                return Err(format!(
                    "case `{}` parsed at the wrong tier.\nexpected: {tier}\nactual:   {}",
                    case.name,
                    parsed.tier.as_str()
                ));
            }
            if parsed.skipped != *skipped {
                return Err(format!(
                    "case `{}` skipped count mismatch.\nexpected: {skipped}\nactual:   {}",
                    case.name, parsed.skipped
                ));
            }
            if &parsed.patches != patches {
                return Err(format_patches_mismatch(&case.name, patches, &parsed.patches));
            }
            Ok(())
        }
        (Expected::Parsed { .. }, Err(error)) => {
            Err(format!("case `{}` should parse but failed: {error}", case.name))
        }
        (Expected::Failed { error: expected }, Ok(parsed)) => Err(format!(
            "case `{}` should fail with {expected:?} but parsed {} patch(es) at tier {}",
            case.name,
            parsed.patches.len(),
            parsed.tier.as_str()
        )),
        (Expected::Failed { error: expected }, Err(error)) => {
            let actual = match error {
                PatchParseError::Unparseable { .. } => ExpectedError::Unparseable,
                PatchParseError::Encoding { .. } => ExpectedError::Encoding,
            };
            if actual == *expected {
                Ok(())
            } else {
                Err(format!(
                    "case `{}` failed with the wrong error.\n\
                     expected: {expected:?}\nactual:   {error}",
                    case.name
                ))
            }
        }
    }
}

fn format_patches_mismatch(case_name: &str, expected: &[Patch], actual: &[Patch]) -> String {
    let expected_rendered = render_patches(expected);
    let actual_rendered = render_patches(actual);
    let max_len = expected_rendered.len().max(actual_rendered.len());

    let mut diff_lines = Vec::with_capacity(max_len);
    for index in 0..max_len {
        let expected_line = expected_rendered.get(index).map(String::as_str).unwrap_or("<none>");
        let actual_line = actual_rendered.get(index).map(String::as_str).unwrap_or("<none>");
        let marker = if expected_line == actual_line { " " } else { "!" };
        diff_lines.push(format!(
            "{marker} [{index}] expected: {expected_line}\n      actual:   {actual_line}"
        ));
    }

    format!("case `{case_name}` patches mismatch.\nDiff:\n{}", diff_lines.join("\n"))
}

fn render_patches(patches: &[Patch]) -> Vec<String> {
    patches
        .iter()
        .map(|patch| format!("[{}, {}) <- {:?}", patch.start, patch.end, patch.content))
        .collect()
}

fn read_required(path: &Path) -> String {
    fs::read_to_string(path)
        .unwrap_or_else(|error| panic!("failed to read {}: {error}", path.display()))
}

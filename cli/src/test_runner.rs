use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use blockdoc::{BlockKind, Document, ImportWarning, Importer};

use crate::resolve;

#[derive(Debug, Deserialize)]
pub struct ExpectedWarning {
    /// Substring that must appear in the warning message.
    pub contains: String,

    /// If set, the warning's span must start on this 1-based source line.
    #[serde(default)]
    pub line: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SeedVariable {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Start from the starter document instead of an empty one.
    #[serde(default)]
    pub bootstrap: bool,

    /// Variables created before anything else runs.
    #[serde(default)]
    pub variables: Vec<SeedVariable>,

    /// Commands applied in order after the body is imported.
    #[serde(default)]
    pub commands: Vec<toml::Value>,

    /// Expected exact exported Markdown (trimmed comparison).
    #[serde(default)]
    pub expect_output: Option<String>,

    /// Expected command error; its Display string must contain this substring.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// Expected block kinds in document order.
    #[serde(default)]
    pub expect_blocks: Option<Vec<BlockKind>>,

    /// Expected import warnings. If present (even empty), warning count and
    /// content are checked.
    #[serde(default)]
    pub expect_warnings: Option<Vec<ExpectedWarning>>,
}

/// Split a `.test.md` file into its TOML config and the Markdown to import.
///
/// The file opens with a `---` line, and the first later line that starts
/// with `---` ends the frontmatter.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');
    let rest = content
        .strip_prefix("---")
        .ok_or("missing opening --- frontmatter delimiter")?;
    let rest = rest.trim_start_matches('\r').strip_prefix('\n').unwrap_or(rest);

    let (frontmatter, after) = rest
        .split_once("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;
    let body = match after.split_once('\n') {
        Some((_, body)) => body,
        None => "",
    };

    let config = toml::from_str(frontmatter.trim_end_matches('\r'))
        .map_err(|e| format!("frontmatter is not valid TOML: {}", e))?;
    Ok((config, body))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

/// Build the scenario's document. Returns the import warnings and the first
/// command error, if any; a reference that cannot be resolved fails the test.
fn run_scenario(
    config: &TestConfig,
    body: &str,
) -> Result<(Document, Vec<ImportWarning>, Option<String>), String> {
    let mut doc = if config.bootstrap {
        Document::bootstrap()
    } else {
        Document::new()
    };
    for seed in &config.variables {
        doc.variables_mut().create(seed.key.clone(), seed.value.clone());
    }

    let warnings = if body.trim().is_empty() {
        Vec::new()
    } else {
        doc.import_parsed(Importer::new(body, 0).parse())
    };

    for (index, value) in config.commands.iter().enumerate() {
        let command = resolve::command(&doc, value.clone())
            .map_err(|e| format!("command {}: {:#}", index, e))?;
        if let Err(err) = doc.apply(command) {
            return Ok((doc, warnings, Some(err.to_string())));
        }
    }
    Ok((doc, warnings, None))
}

fn run_single_test(path: &Path) -> TestResult {
    let fail = |description: Option<String>, reason: String| TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Fail(reason),
    };

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return fail(None, format!("cannot read file: {}", e)),
    };

    let (config, body) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => return fail(None, format!("frontmatter error: {}", e)),
    };
    let description = config.description.clone();

    let (doc, warnings, error) = match run_scenario(&config, body) {
        Ok(result) => result,
        Err(reason) => return fail(description, reason),
    };

    let reason = match (&config.expect_error, error) {
        (Some(expected), Some(actual)) if !actual.contains(expected.as_str()) => Some(format!(
            "expected error containing \"{}\", got: {}",
            expected, actual
        )),
        (Some(expected), None) => Some(format!(
            "expected error containing \"{}\", but every command succeeded",
            expected
        )),
        (None, Some(actual)) => Some(format!("unexpected command error: {}", actual)),
        _ => None,
    };
    if let Some(reason) = reason {
        return fail(description, reason);
    }

    if let Some(expected) = &config.expect_output {
        let actual = doc.generate();
        if actual.trim() != expected.trim() {
            return fail(
                description,
                format!(
                    "output mismatch\n  expected:\n{}\n  actual:\n{}",
                    indent(expected.trim()),
                    indent(actual.trim())
                ),
            );
        }
    }

    if let Some(expected) = &config.expect_blocks {
        let actual: Vec<BlockKind> = doc.flattened().iter().map(|b| b.kind()).collect();
        if &actual != expected {
            return fail(
                description,
                format!("block kinds mismatch\n  expected: {:?}\n  actual:   {:?}", expected, actual),
            );
        }
    }

    if let Some(expected) = &config.expect_warnings {
        if let Some(reason) = check_warnings(body, &warnings, expected) {
            return fail(description, reason);
        }
    }

    TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Pass,
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn line_of(source: &str, offset: usize) -> usize {
    let offset = offset.min(source.len());
    1 + source.as_bytes()[..offset].iter().filter(|b| **b == b'\n').count()
}

/// Compare import warnings with the expected ones, pairwise and in order.
fn check_warnings(
    source: &str,
    actual: &[ImportWarning],
    expected: &[ExpectedWarning],
) -> Option<String> {
    if actual.len() != expected.len() {
        let listed: String = if actual.is_empty() {
            "    (none)".into()
        } else {
            actual
                .iter()
                .map(|w| format!("  - {}", w.message))
                .collect::<Vec<_>>()
                .join("\n")
        };
        return Some(format!(
            "wanted {} warning(s) but import produced {}:\n{}",
            expected.len(),
            actual.len(),
            listed
        ));
    }

    actual
        .iter()
        .zip(expected)
        .enumerate()
        .find_map(|(i, (warning, want))| {
            if !warning.message.contains(&want.contains) {
                return Some(format!(
                    "warning {}: \"{}\" does not contain \"{}\"",
                    i, warning.message, want.contains
                ));
            }
            let line = line_of(source, warning.span.start);
            match want.line {
                Some(wanted) if wanted != line => Some(format!(
                    "warning {}: reported on line {}, wanted line {}",
                    i, line, wanted
                )),
                _ => None,
            }
        })
}

/// `.test.md` files under `root`, keyed by their directory relative to
/// `root` ("" for files directly inside it), each list sorted.
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut found: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for path in entries.filter_map(|e| e.ok()).map(|e| e.path()) {
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            let is_test = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".test.md"));
            if is_test {
                let category = dir
                    .strip_prefix(root)
                    .map(|rel| rel.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_default();
                found.entry(category).or_default().push(path);
            }
        }
    }
    found.values_mut().for_each(|files| files.sort());
    found
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

/// Print the categories under `path` with their test counts.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("{} is a single test file", path.display());
        return;
    }
    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no .test.md files under {}", path.display());
        return;
    }
    for (category, files) in &categories {
        eprintln!("{:<24} {} test(s)", category_label(category), files.len());
    }
}

struct Palette {
    no_color: bool,
}

impl Palette {
    fn paint(&self, code: &str, text: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        }
    }

    fn pass(&self) -> String {
        self.paint("32", "PASS")
    }

    fn fail(&self) -> String {
        self.paint("31", "FAIL")
    }

    fn bold(&self, text: &str) -> String {
        self.paint("1", text)
    }
}

fn label_for(result: &TestResult) -> &str {
    result.description.as_deref().unwrap_or_else(|| {
        result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_suffix(".test.md"))
            .unwrap_or("?")
    })
}

fn select_categories<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a Vec<PathBuf>> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v)).collect();
    }
    let mut filtered = BTreeMap::new();
    for requested in requested {
        let req = requested.trim_matches('/');
        let mut found = false;
        for (cat, files) in all {
            if cat == req || cat.starts_with(&format!("{}/", req)) {
                filtered.insert(cat.as_str(), files);
                found = true;
            }
        }
        if !found {
            eprintln!(
                "warning: category '{}' not found (available: {})",
                req,
                all.keys()
                    .map(|k| category_label(k))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
    filtered
}

/// Pass/fail tally for one run; failures are kept for the final report.
#[derive(Default)]
struct Summary {
    passed: usize,
    failures: Vec<TestResult>,
}

impl Summary {
    fn record(&mut self, palette: &Palette, result: TestResult) {
        let mark = match result.outcome {
            TestOutcome::Pass => palette.pass(),
            TestOutcome::Fail(_) => palette.fail(),
        };
        eprintln!("  {}  {}", mark, label_for(&result));
        match result.outcome {
            TestOutcome::Pass => self.passed += 1,
            TestOutcome::Fail(_) => self.failures.push(result),
        }
    }

    fn report(&self, palette: &Palette) -> i32 {
        for failure in &self.failures {
            let TestOutcome::Fail(reason) = &failure.outcome else {
                continue;
            };
            eprintln!("\n{} {}", palette.fail(), failure.path.display());
            eprintln!("{}", indent(reason));
        }

        let failed = self.failures.len();
        let verdict = if failed == 0 {
            palette.paint("32", "ok")
        } else {
            palette.paint("31", "FAILED")
        };
        eprintln!(
            "\nscenarios: {}. {} passed, {} failed",
            verdict, self.passed, failed
        );
        i32::from(failed > 0)
    }
}

/// Run every `.test.md` file under `path` (or just `path` if it is a file),
/// restricted to `categories` when any are given. Returns the process exit
/// code: 0 if everything passed, 1 otherwise.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let palette = Palette { no_color };

    let selected: Vec<(String, Vec<PathBuf>)> = if path.is_file() {
        vec![(String::new(), vec![path.to_path_buf()])]
    } else {
        let all = discover_categorized(path);
        if all.is_empty() {
            eprintln!("no .test.md files found in {}", path.display());
            return 1;
        }
        let chosen = select_categories(&all, categories);
        if chosen.is_empty() {
            eprintln!("no matching categories found");
            return 1;
        }
        chosen
            .into_iter()
            .map(|(cat, files)| (cat.to_string(), files.clone()))
            .collect()
    };

    let mut summary = Summary::default();
    for (cat, files) in selected {
        if !path.is_file() {
            eprintln!("\n{}", palette.bold(category_label(&cat)));
        }
        for file in &files {
            summary.record(&palette, run_single_test(file));
        }
    }
    summary.report(&palette)
}

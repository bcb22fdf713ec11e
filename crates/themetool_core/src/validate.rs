use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::catalog::{AddonRecord, Keyed, MODE_DARK, MODE_LIGHT, ThemeRecord, is_valid_repo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub field: String,
    pub severity: Severity,
    pub message: String,
}

impl Violation {
    fn error(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            severity: Severity::Error,
            message: message.into(),
        }
    }

    fn warning(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

/// Tag count bounds, resolved from configuration.
#[derive(Debug, Clone, Copy)]
pub struct TagRules {
    pub min_tags: usize,
    pub max_tags: usize,
}

impl Default for TagRules {
    fn default() -> Self {
        Self {
            min_tags: 1,
            max_tags: 10,
        }
    }
}

/// Outcome of probing one URL. 404 is the only status treated as
/// definitely broken; everything else short of 2xx is merely
/// unverifiable (403s and timeouts are common for hotlinked images).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    Ok,
    NotFound,
    Unreachable(String),
}

/// Seam for URL reachability checks; tests substitute a scripted probe.
pub trait UrlProbe: Sync {
    fn probe(&self, url: &str) -> ProbeStatus;
}

/// Real probe: blocking HEAD with a GET fallback for servers that reject
/// HEAD outright.
pub struct HttpProbe {
    client: reqwest::blocking::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent.to_string())
            .build()
            .context("failed to build http client")?;
        Ok(Self { client })
    }
}

impl UrlProbe for HttpProbe {
    fn probe(&self, url: &str) -> ProbeStatus {
        let response = match self.client.head(url).send() {
            Ok(response)
                if response.status() == reqwest::StatusCode::METHOD_NOT_ALLOWED
                    || response.status() == reqwest::StatusCode::NOT_IMPLEMENTED =>
            {
                self.client.get(url).send()
            }
            other => other,
        };
        match response {
            Ok(response) if response.status().is_success() => ProbeStatus::Ok,
            Ok(response) if response.status() == reqwest::StatusCode::NOT_FOUND => {
                ProbeStatus::NotFound
            }
            Ok(response) => ProbeStatus::Unreachable(format!("HTTP {}", response.status())),
            Err(error) => ProbeStatus::Unreachable(error.to_string()),
        }
    }
}

fn require(field: &str, value: Option<&str>, violations: &mut Vec<Violation>) -> bool {
    match value {
        Some(value) if !value.trim().is_empty() => true,
        _ => {
            violations.push(Violation::error(field, "required field is missing or empty"));
            false
        }
    }
}

fn is_well_formed_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Tag list checks: count bounds, syntax, duplicates, and (when a known
/// vocabulary is supplied) unknown-tag warnings.
pub fn validate_tags(
    tags: &[String],
    rules: &TagRules,
    known_tags: Option<&BTreeSet<String>>,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    if tags.len() < rules.min_tags {
        violations.push(Violation::error(
            "tags",
            format!("expected at least {} tag(s), found {}", rules.min_tags, tags.len()),
        ));
    }
    if tags.len() > rules.max_tags {
        violations.push(Violation::error(
            "tags",
            format!("expected at most {} tag(s), found {}", rules.max_tags, tags.len()),
        ));
    }

    let mut seen = BTreeSet::new();
    for tag in tags {
        if !is_well_formed_tag(tag) {
            violations.push(Violation::error(
                "tags",
                format!("malformed tag '{tag}' (lowercase letters, digits and '_' only)"),
            ));
        }
        if !seen.insert(tag.as_str()) {
            violations.push(Violation::warning("tags", format!("duplicate tag '{tag}'")));
        }
        if let Some(known) = known_tags
            && !known.contains(tag)
        {
            violations.push(Violation::warning("tags", format!("unknown tag '{tag}'")));
        }
    }
    violations
}

pub fn validate_repo_format(repo: &str) -> Option<Violation> {
    if is_valid_repo(repo) {
        None
    } else {
        Some(Violation::error(
            "repo",
            format!("'{repo}' is not an owner/name repo string"),
        ))
    }
}

/// Schema checks for one official record: required fields, repo shape and
/// the dark/light mode vocabulary.
pub fn validate_official_record(record: &ThemeRecord) -> Vec<Violation> {
    let mut violations = Vec::new();
    require("name", record.name.as_deref(), &mut violations);
    require("author", record.author.as_deref(), &mut violations);
    if require("repo", record.repo.as_deref(), &mut violations)
        && let Some(violation) = validate_repo_format(record.repo.as_deref().unwrap_or_default())
    {
        violations.push(violation);
    }
    require("screenshot", record.screenshot.as_deref(), &mut violations);

    if record.modes.is_empty() {
        violations.push(Violation::error("modes", "required field is missing or empty"));
    }
    for mode in &record.modes {
        if mode != MODE_DARK && mode != MODE_LIGHT {
            violations.push(Violation::error(
                "modes",
                format!("unknown mode '{mode}' (expected 'dark' or 'light')"),
            ));
        }
    }
    violations
}

/// Schema checks for one addon record.
pub fn validate_addon_record(
    record: &AddonRecord,
    rules: &TagRules,
    max_side_screenshots: usize,
    known_tags: Option<&BTreeSet<String>>,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    if require("repo", record.repo.as_deref(), &mut violations)
        && let Some(violation) = validate_repo_format(record.repo.as_deref().unwrap_or_default())
    {
        violations.push(violation);
    }
    require(
        "screenshot-main",
        Some(record.screenshot_main.as_str()),
        &mut violations,
    );
    if record.screenshots_side.len() > max_side_screenshots {
        violations.push(Violation::error(
            "screenshots-side",
            format!(
                "expected at most {} side screenshot(s), found {}",
                max_side_screenshots,
                record.screenshots_side.len()
            ),
        ));
    }
    violations.extend(validate_tags(&record.tags, rules, known_tags));
    violations
}

fn probe_field(field: &str, url: &str, probe: &dyn UrlProbe, violations: &mut Vec<Violation>) {
    // Relative paths and bare file names are not probeable.
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return;
    }
    match probe.probe(url) {
        ProbeStatus::Ok => {}
        ProbeStatus::NotFound => {
            violations.push(Violation::error(field, format!("{url} returned 404")));
        }
        ProbeStatus::Unreachable(reason) => {
            violations.push(Violation::warning(field, format!("{url} unverifiable: {reason}")));
        }
    }
}

/// Probe every URL-valued field of one addon record.
pub fn validate_urls(record: &AddonRecord, probe: &dyn UrlProbe) -> Vec<Violation> {
    let mut violations = Vec::new();
    probe_field(
        "screenshot-main",
        &record.screenshot_main,
        probe,
        &mut violations,
    );
    for (index, url) in record.screenshots_side.iter().enumerate() {
        probe_field(
            &format!("screenshots-side[{index}]"),
            url,
            probe,
            &mut violations,
        );
    }
    violations
}

/// Shared settings for a batch run; `probe` is None when URL checks are
/// switched off.
pub struct BatchOptions<'a> {
    pub rules: TagRules,
    pub max_side_screenshots: usize,
    pub known_tags: Option<&'a BTreeSet<String>>,
    pub probe: Option<&'a dyn UrlProbe>,
}

fn validate_one(record: &AddonRecord, options: &BatchOptions<'_>) -> Vec<Violation> {
    let mut violations = validate_addon_record(
        record,
        &options.rules,
        options.max_side_screenshots,
        options.known_tags,
    );
    if let Some(probe) = options.probe {
        violations.extend(validate_urls(record, probe));
    }
    violations
}

/// Validate every record over a fixed pool of scoped worker threads
/// pulling from a shared queue. Only records with violations appear in
/// the result, keyed by repo (or `entry_{i}` when unkeyable). A panic in
/// one task becomes a synthetic violation for that record alone.
pub fn validate_batch(
    records: &[AddonRecord],
    options: &BatchOptions<'_>,
    workers: usize,
) -> BTreeMap<String, Vec<Violation>> {
    let queue: Mutex<VecDeque<(usize, &AddonRecord)>> =
        Mutex::new(records.iter().enumerate().collect());
    let results: Mutex<BTreeMap<String, Vec<Violation>>> = Mutex::new(BTreeMap::new());
    let workers = workers.max(1).min(records.len().max(1));

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                loop {
                    let job = queue.lock().ok().and_then(|mut queue| queue.pop_front());
                    let Some((index, record)) = job else {
                        break;
                    };
                    let key = record
                        .key()
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("entry_{index}"));
                    let violations =
                        match catch_unwind(AssertUnwindSafe(|| validate_one(record, options))) {
                            Ok(violations) => violations,
                            Err(_) => vec![Violation::error(
                                "record",
                                "validation task panicked; record not fully checked",
                            )],
                        };
                    if violations.is_empty() {
                        continue;
                    }
                    if let Ok(mut results) = results.lock() {
                        results.insert(key, violations);
                    }
                }
            });
        }
    });

    results.into_inner().unwrap_or_default()
}

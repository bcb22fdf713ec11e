use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const MODE_DARK: &str = "dark";
pub const MODE_LIGHT: &str = "light";

/// One entry of the official community theme list.
///
/// Every field tolerates absence on load; unknown fields are carried in
/// `extra` so a load/save cycle reproduces the on-disk document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThemeRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modes: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of the locally maintained addon list (tags and extra
/// screenshots layered on top of an official record).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddonRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(rename = "screenshot-main", default)]
    pub screenshot_main: String,
    #[serde(rename = "screenshots-side", default)]
    pub screenshots_side: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A record that can be identified by its `owner/name` repo string.
/// Records with a missing or blank repo are unkeyable and excluded from
/// set operations.
pub trait Keyed {
    fn key(&self) -> Option<&str>;
}

impl Keyed for ThemeRecord {
    fn key(&self) -> Option<&str> {
        non_blank(self.repo.as_deref())
    }
}

impl Keyed for AddonRecord {
    fn key(&self) -> Option<&str> {
        non_blank(self.repo.as_deref())
    }
}

impl ThemeRecord {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }

    pub fn display_author(&self) -> &str {
        self.author.as_deref().unwrap_or("Unknown")
    }

    pub fn screenshot_or_empty(&self) -> &str {
        self.screenshot.as_deref().unwrap_or("")
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    match value {
        Some(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

/// Validate the `owner/name` repo shape: exactly two non-empty segments,
/// each limited to alphanumerics, `.`, `_` and `-`.
pub fn is_valid_repo(repo: &str) -> bool {
    let mut parts = repo.trim().split('/');
    let (Some(owner), Some(name), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    !owner.is_empty() && !name.is_empty() && [owner, name].iter().all(|part| {
        part.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    })
}

/// Extract `owner/name` from the GitHub URL formats operators paste in:
/// `https://github.com/owner/name`, `git@github.com:owner/name.git`, or a
/// bare `owner/name`.
pub fn extract_repo_from_url(url: &str) -> Option<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }

    let tail = trimmed
        .find("github.com")
        .map(|at| &trimmed[at + "github.com".len()..])
        .map(|rest| rest.trim_start_matches([':', '/']))
        .unwrap_or(trimmed);

    let mut segments = tail.split('/');
    let owner = segments.next()?;
    let name = segments.next()?.trim_end_matches(".git");
    let candidate = format!("{owner}/{name}");
    if is_valid_repo(&candidate) {
        Some(candidate)
    } else {
        None
    }
}

pub fn repo_url(repo: &str) -> String {
    format!("https://github.com/{repo}")
}

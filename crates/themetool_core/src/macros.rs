use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Shorthand-to-tag expansion table used while entering tags. Loaded once
/// per session; mutated only through explicit edit operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMacros {
    table: BTreeMap<String, String>,
}

impl Default for TagMacros {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TagMacros {
    pub fn builtin() -> Self {
        let table = [
            ("m", "minimalistic"),
            ("d", "dark"),
            ("l", "light"),
            ("p", "productivity"),
            ("g", "gaming"),
            ("c", "colorful"),
            ("s", "simple"),
            ("md", "modern"),
            ("ret", "retro"),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
        Self { table }
    }

    /// Load the table from a flat string-to-string JSON object. An absent
    /// file is not an error and falls back to the built-in table.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::builtin());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let table: BTreeMap<String, String> = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Self { table })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let rendered =
            serde_json::to_string_pretty(&self.table).context("failed to serialize tag macros")?;
        fs::write(path, rendered).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Expand one operator token; unmatched tokens pass through unchanged.
    pub fn expand<'a>(&'a self, token: &'a str) -> &'a str {
        self.table.get(token).map(String::as_str).unwrap_or(token)
    }

    pub fn set(&mut self, key: &str, expansion: &str) {
        self.table.insert(key.to_string(), expansion.to_string());
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.table.remove(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.table
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn builtin_table_expands_known_shorthand() {
        let macros = TagMacros::builtin();
        assert_eq!(macros.expand("m"), "minimalistic");
        assert_eq!(macros.expand("ret"), "retro");
        assert_eq!(macros.expand("unmatched"), "unmatched");
    }

    #[test]
    fn load_falls_back_to_builtin_for_missing_file() {
        let macros = TagMacros::load(Path::new("/nonexistent/tag_macros.json")).expect("load");
        assert_eq!(macros, TagMacros::builtin());
    }

    #[test]
    fn load_fails_for_malformed_table() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("tag_macros.json");
        fs::write(&path, r#"["not", "a", "map"]"#).expect("write");
        assert!(TagMacros::load(&path).is_err());
    }

    #[test]
    fn save_and_reload_preserves_edits() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("tag_macros.json");

        let mut macros = TagMacros::builtin();
        macros.set("cj", "cozy");
        assert!(macros.remove("g"));
        assert!(!macros.remove("g"));
        macros.save(&path).expect("save");

        let reloaded = TagMacros::load(&path).expect("load");
        assert_eq!(reloaded.expand("cj"), "cozy");
        assert_eq!(reloaded.expand("g"), "g");
    }
}

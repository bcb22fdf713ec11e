use std::collections::BTreeSet;

use anyhow::Result;

use crate::catalog::{AddonRecord, Keyed, MODE_DARK, MODE_LIGHT, ThemeRecord};
use crate::macros::TagMacros;

/// Literal token that suppresses the `minimalistic` default; it is a
/// control signal, never stored as a tag.
pub const NO_MINIMALISTIC_TOKEN: &str = "notm";

pub const TAG_DARK_AND_LIGHT: &str = "dark_and_light";
pub const TAG_MINIMALISTIC: &str = "minimalistic";

/// Session-scoped tag defaults, resolved once from configuration.
#[derive(Debug, Clone, Copy)]
pub struct TagPolicy {
    pub add_minimalistic: bool,
}

impl Default for TagPolicy {
    fn default() -> Self {
        Self {
            add_minimalistic: true,
        }
    }
}

/// Outcome of building one addon entry. Skipped and Aborted are
/// intentional operator decisions, distinct from errors.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    Built(AddonRecord),
    Skipped,
    Aborted,
}

/// Transport for the interactive prompt sequence. The CLI backs this with
/// stdin; tests use a scripted implementation. `ask` returns `None` on
/// end of input, which aborts the build cleanly.
pub trait Prompter {
    fn say(&mut self, line: &str);
    fn ask(&mut self, prompt: &str) -> Result<Option<String>>;
}

/// Tags implied by an official record's `modes` list, plus the
/// `minimalistic` default when the policy asks for it.
pub fn default_tags(modes: &[String], policy: &TagPolicy) -> Vec<String> {
    let dark = modes.iter().any(|mode| mode == MODE_DARK);
    let light = modes.iter().any(|mode| mode == MODE_LIGHT);

    let mut tags = Vec::new();
    if dark {
        tags.push(MODE_DARK.to_string());
    }
    if light {
        tags.push(MODE_LIGHT.to_string());
    }
    if dark && light {
        tags.push(TAG_DARK_AND_LIGHT.to_string());
    }
    if policy.add_minimalistic {
        tags.push(TAG_MINIMALISTIC.to_string());
    }
    tags
}

fn normalize_tags(tags: impl IntoIterator<Item = String>) -> Vec<String> {
    let unique: BTreeSet<String> = tags
        .into_iter()
        .map(|tag| tag.trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect();
    unique.into_iter().collect()
}

/// Non-interactive build: derived default tags, official screenshot as
/// main, no side screenshots. An unkeyable record produces nothing.
pub fn auto_entry(official: &ThemeRecord, policy: &TagPolicy) -> Option<AddonRecord> {
    let repo = official.key()?.to_string();
    Some(AddonRecord {
        repo: Some(repo),
        screenshot_main: official.screenshot_or_empty().to_string(),
        screenshots_side: Vec::new(),
        tags: normalize_tags(default_tags(&official.modes, policy)),
        ..AddonRecord::default()
    })
}

enum Answer {
    Text(String),
    Skip,
    Abort,
}

fn classify(input: Option<String>) -> Answer {
    let Some(input) = input else {
        return Answer::Abort;
    };
    let trimmed = input.trim();
    match trimmed.to_lowercase().as_str() {
        "exit" | "quit" => Answer::Abort,
        "skip" => Answer::Skip,
        _ => Answer::Text(trimmed.to_string()),
    }
}

macro_rules! prompt {
    ($prompter:expr, $text:expr) => {
        match classify($prompter.ask($text)?) {
            Answer::Text(value) => value,
            Answer::Skip => return Ok(BuildOutcome::Skipped),
            Answer::Abort => return Ok(BuildOutcome::Aborted),
        }
    };
}

/// Operator-driven build for one missing official record. `skip` at any
/// prompt skips the record, `exit`/`quit` or end of input aborts the
/// whole session; both are reported through BuildOutcome, not as errors.
pub fn interactive_entry(
    official: &ThemeRecord,
    macros: &TagMacros,
    policy: &TagPolicy,
    prompter: &mut dyn Prompter,
) -> Result<BuildOutcome> {
    let Some(repo) = official.key().map(str::to_string) else {
        return Ok(BuildOutcome::Skipped);
    };
    let official_screenshot = official.screenshot_or_empty().to_string();

    // Mode-derived defaults; minimalistic is decided after tag input.
    let base_policy = TagPolicy {
        add_minimalistic: false,
    };
    let mut defaults = default_tags(&official.modes, &base_policy);

    prompter.say(&format!(
        "Creating addon entry for: {} by {}",
        official.display_name(),
        official.display_author()
    ));
    prompter.say(&format!("repo: {repo}"));
    prompter.say(&format!("official screenshot: {official_screenshot}"));
    prompter.say(&format!(
        "default tags from modes {:?}: {}",
        official.modes,
        defaults.join(", ")
    ));

    let tags_input = prompt!(
        prompter,
        "Tags (comma-separated, macros expand, 'notm' drops the minimalistic default): "
    );
    let mut operator_tags = Vec::new();
    let mut suppress_minimalistic = false;
    for token in tags_input.split(',') {
        let token = token.trim().to_lowercase();
        if token.is_empty() {
            continue;
        }
        let expanded = macros.expand(&token);
        if expanded == NO_MINIMALISTIC_TOKEN {
            suppress_minimalistic = true;
            continue;
        }
        operator_tags.push(expanded.to_string());
    }
    if policy.add_minimalistic && !suppress_minimalistic {
        defaults.push(TAG_MINIMALISTIC.to_string());
    }
    let tags = normalize_tags(operator_tags.into_iter().chain(defaults));

    let main_input = prompt!(prompter, "Main screenshot ([enter] keeps official): ");
    let screenshot_main = if main_input.is_empty() {
        official_screenshot
    } else {
        main_input
    };

    let mut screenshots_side = Vec::new();
    loop {
        let url = prompt!(prompter, "Additional screenshot URL (empty to finish): ");
        if url.is_empty() {
            break;
        }
        screenshots_side.push(url);
    }

    let entry = AddonRecord {
        repo: Some(repo),
        screenshot_main,
        screenshots_side,
        tags,
        ..AddonRecord::default()
    };

    prompter.say("entry preview:");
    prompter.say(&serde_json::to_string_pretty(&entry)?);
    let confirm = prompt!(prompter, "Save this entry? (y/n): ");
    if confirm.eq_ignore_ascii_case("y") || confirm.eq_ignore_ascii_case("yes") {
        Ok(BuildOutcome::Built(entry))
    } else {
        Ok(BuildOutcome::Skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn theme(repo: &str, modes: &[&str]) -> ThemeRecord {
        ThemeRecord {
            name: Some("Theme B".to_string()),
            author: Some("X".to_string()),
            repo: Some(repo.to_string()),
            screenshot: Some("s.png".to_string()),
            modes: modes.iter().map(|mode| mode.to_string()).collect(),
            ..ThemeRecord::default()
        }
    }

    struct Scripted {
        answers: Vec<&'static str>,
        cursor: usize,
    }

    impl Scripted {
        fn new(answers: &[&'static str]) -> Self {
            Self {
                answers: answers.to_vec(),
                cursor: 0,
            }
        }
    }

    impl Prompter for Scripted {
        fn say(&mut self, _line: &str) {}

        fn ask(&mut self, _prompt: &str) -> Result<Option<String>> {
            let answer = self.answers.get(self.cursor).map(|s| s.to_string());
            self.cursor += 1;
            Ok(answer)
        }
    }

    #[test]
    fn default_tags_cover_both_modes() {
        let tags = default_tags(
            &["dark".to_string(), "light".to_string()],
            &TagPolicy::default(),
        );
        assert_eq!(tags, vec!["dark", "light", "dark_and_light", "minimalistic"]);
    }

    #[test]
    fn auto_entry_uses_official_screenshot_and_default_tags() {
        let entry = auto_entry(&theme("a/b", &["dark"]), &TagPolicy::default()).expect("entry");
        assert_eq!(entry.repo.as_deref(), Some("a/b"));
        assert_eq!(entry.screenshot_main, "s.png");
        assert!(entry.screenshots_side.is_empty());
        assert_eq!(entry.tags, vec!["dark", "minimalistic"]);
    }

    #[test]
    fn auto_entry_without_minimalistic_policy() {
        let policy = TagPolicy {
            add_minimalistic: false,
        };
        let entry = auto_entry(&theme("a/b", &["dark", "light"]), &policy).expect("entry");
        assert_eq!(entry.tags, vec!["dark", "dark_and_light", "light"]);
    }

    #[test]
    fn auto_entry_skips_unkeyable_records() {
        let record = ThemeRecord {
            modes: vec!["dark".to_string()],
            ..ThemeRecord::default()
        };
        assert!(auto_entry(&record, &TagPolicy::default()).is_none());
    }

    #[test]
    fn interactive_build_expands_macros_and_merges_defaults() {
        // tags, main screenshot, one side URL, terminator, confirm
        let mut prompter = Scripted::new(&["m, ret", "", "https://x/1.png", "", "y"]);
        let outcome = interactive_entry(
            &theme("a/b", &["dark"]),
            &TagMacros::builtin(),
            &TagPolicy::default(),
            &mut prompter,
        )
        .expect("build");

        let BuildOutcome::Built(entry) = outcome else {
            panic!("expected built entry");
        };
        assert_eq!(entry.tags, vec!["dark", "minimalistic", "retro"]);
        assert_eq!(entry.screenshot_main, "s.png");
        assert_eq!(entry.screenshots_side, vec!["https://x/1.png"]);
    }

    #[test]
    fn notm_suppresses_minimalistic_and_is_not_stored() {
        let mut prompter = Scripted::new(&["notm, retro", "", "", "y"]);
        let outcome = interactive_entry(
            &theme("a/b", &["dark"]),
            &TagMacros::builtin(),
            &TagPolicy::default(),
            &mut prompter,
        )
        .expect("build");

        let BuildOutcome::Built(entry) = outcome else {
            panic!("expected built entry");
        };
        assert!(!entry.tags.contains(&"minimalistic".to_string()));
        assert!(!entry.tags.contains(&"notm".to_string()));
        assert_eq!(entry.tags, vec!["dark", "retro"]);
    }

    #[test]
    fn main_screenshot_override_replaces_official_value() {
        let mut prompter = Scripted::new(&["", "https://x/main.png", "", "y"]);
        let outcome = interactive_entry(
            &theme("a/b", &["dark"]),
            &TagMacros::builtin(),
            &TagPolicy::default(),
            &mut prompter,
        )
        .expect("build");

        let BuildOutcome::Built(entry) = outcome else {
            panic!("expected built entry");
        };
        assert_eq!(entry.screenshot_main, "https://x/main.png");
    }

    #[test]
    fn negative_confirmation_skips_the_record() {
        let mut prompter = Scripted::new(&["", "", "", "n"]);
        let outcome = interactive_entry(
            &theme("a/b", &["dark"]),
            &TagMacros::builtin(),
            &TagPolicy::default(),
            &mut prompter,
        )
        .expect("build");
        assert_eq!(outcome, BuildOutcome::Skipped);
    }

    #[test]
    fn skip_sentinel_skips_and_exit_aborts() {
        let mut prompter = Scripted::new(&["skip"]);
        let outcome = interactive_entry(
            &theme("a/b", &["dark"]),
            &TagMacros::builtin(),
            &TagPolicy::default(),
            &mut prompter,
        )
        .expect("build");
        assert_eq!(outcome, BuildOutcome::Skipped);

        let mut prompter = Scripted::new(&["exit"]);
        let outcome = interactive_entry(
            &theme("a/b", &["dark"]),
            &TagMacros::builtin(),
            &TagPolicy::default(),
            &mut prompter,
        )
        .expect("build");
        assert_eq!(outcome, BuildOutcome::Aborted);
    }

    #[test]
    fn end_of_input_aborts_cleanly() {
        let mut prompter = Scripted::new(&[]);
        let outcome = interactive_entry(
            &theme("a/b", &["dark"]),
            &TagMacros::builtin(),
            &TagPolicy::default(),
            &mut prompter,
        )
        .expect("build");
        assert_eq!(outcome, BuildOutcome::Aborted);
    }
}

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::builder::{BuildOutcome, Prompter, TagPolicy, auto_entry, interactive_entry};
use crate::catalog::{AddonRecord, Keyed, ThemeRecord};
use crate::macros::TagMacros;
use crate::reconcile::find_missing;
use crate::store::RecordStore;

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub auto: bool,
    pub limit: Option<usize>,
    pub policy: TagPolicy,
    /// Set from a signal handler; the session checks it between records
    /// and aborts with a clean tally instead of dying mid-loop.
    pub interrupted: Option<Arc<AtomicBool>>,
}

impl SessionOptions {
    fn is_interrupted(&self) -> bool {
        self.interrupted
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

/// Tally of one processing session. `aborted` means the operator stopped
/// early; everything processed before that point is already saved.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionReport {
    pub missing: usize,
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub aborted: bool,
    pub error_details: Vec<String>,
}

/// Work through every official record without an addon counterpart. Each
/// built entry is appended and saved immediately, so an abort or crash
/// loses at most the record in flight. Per-record failures are tallied
/// and the session moves on.
pub fn run_session(
    official_store: &RecordStore,
    addon_store: &RecordStore,
    macros: &TagMacros,
    options: &SessionOptions,
    prompter: &mut dyn Prompter,
) -> Result<SessionReport> {
    let official: Vec<ThemeRecord> = official_store
        .load()
        .context("failed to load official theme list")?;
    let mut addon: Vec<AddonRecord> = addon_store
        .load()
        .context("failed to load addon theme list")?;

    let mut missing = find_missing(&official, &addon);
    if let Some(limit) = options.limit {
        missing.truncate(limit);
    }

    let mut report = SessionReport {
        missing: missing.len(),
        ..SessionReport::default()
    };
    if missing.is_empty() {
        return Ok(report);
    }

    for (index, record) in missing.iter().enumerate() {
        if options.is_interrupted() {
            report.aborted = true;
            break;
        }
        prompter.say(&format!(
            "[{}/{}] {}",
            index + 1,
            report.missing,
            record.key().unwrap_or("<no repo>")
        ));

        let outcome = if options.auto {
            match auto_entry(record, &options.policy) {
                Some(entry) => BuildOutcome::Built(entry),
                None => BuildOutcome::Skipped,
            }
        } else {
            match interactive_entry(record, macros, &options.policy, prompter) {
                Ok(outcome) => outcome,
                Err(error) => {
                    report.errors += 1;
                    report.error_details.push(format!(
                        "{}: {error:#}",
                        record.key().unwrap_or("<no repo>")
                    ));
                    continue;
                }
            }
        };

        match outcome {
            BuildOutcome::Built(entry) => {
                addon.push(entry);
                match addon_store.save(&addon, true) {
                    Ok(_) => report.processed += 1,
                    Err(error) => {
                        report.errors += 1;
                        report.error_details.push(format!(
                            "{}: save failed: {error:#}",
                            record.key().unwrap_or("<no repo>")
                        ));
                    }
                }
            }
            BuildOutcome::Skipped => report.skipped += 1,
            BuildOutcome::Aborted => {
                report.aborted = true;
                break;
            }
        }
    }
    Ok(report)
}

use std::collections::BTreeSet;

use serde::Serialize;

use crate::catalog::{AddonRecord, Keyed, ThemeRecord};

/// Counts comparing the official and addon lists. Duplicate and unkeyable
/// records are surfaced as informational counts rather than failures.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub total_official: usize,
    pub total_addon: usize,
    pub missing: usize,
    pub orphaned: usize,
    pub unkeyable_official: usize,
    pub unkeyable_addon: usize,
    pub duplicate_official: usize,
    pub duplicate_addon: usize,
    pub sync_percentage: f64,
}

fn key_set<T: Keyed>(records: &[T]) -> (BTreeSet<&str>, usize, usize) {
    let mut keys = BTreeSet::new();
    let mut unkeyable = 0;
    let mut duplicates = 0;
    for record in records {
        match record.key() {
            Some(key) => {
                if !keys.insert(key) {
                    duplicates += 1;
                }
            }
            None => unkeyable += 1,
        }
    }
    (keys, unkeyable, duplicates)
}

/// Official records without an addon counterpart, in original official
/// order. Unkeyable records on either side are excluded.
pub fn find_missing(official: &[ThemeRecord], addon: &[AddonRecord]) -> Vec<ThemeRecord> {
    let (addon_keys, _, _) = key_set(addon);
    let mut seen = BTreeSet::new();
    official
        .iter()
        .filter(|record| match record.key() {
            Some(key) => !addon_keys.contains(key) && seen.insert(key),
            None => false,
        })
        .cloned()
        .collect()
}

/// Addon records whose repo no longer appears in the official list. These
/// are reported, never rejected.
pub fn find_orphaned(official: &[ThemeRecord], addon: &[AddonRecord]) -> Vec<AddonRecord> {
    let (official_keys, _, _) = key_set(official);
    let mut seen = BTreeSet::new();
    addon
        .iter()
        .filter(|record| match record.key() {
            Some(key) => !official_keys.contains(key) && seen.insert(key),
            None => false,
        })
        .cloned()
        .collect()
}

pub fn sync_summary(official: &[ThemeRecord], addon: &[AddonRecord]) -> SyncSummary {
    let (official_keys, unkeyable_official, duplicate_official) = key_set(official);
    let (addon_keys, unkeyable_addon, duplicate_addon) = key_set(addon);

    let overlap = official_keys.intersection(&addon_keys).count();
    let sync_percentage = if official_keys.is_empty() {
        0.0
    } else {
        overlap as f64 / official_keys.len() as f64 * 100.0
    };

    SyncSummary {
        total_official: official.len(),
        total_addon: addon.len(),
        missing: official_keys.difference(&addon_keys).count(),
        orphaned: addon_keys.difference(&official_keys).count(),
        unkeyable_official,
        unkeyable_addon,
        duplicate_official,
        duplicate_addon,
        sync_percentage,
    }
}

//! Pure prune planning: snapshots in, ordered deletions out.
//!
//! Rules, in order:
//! - the newest replication marker per (dataset, tag) is protected and never
//!   considered at all;
//! - for every tier and every offset `k` in `start..end`, the window
//!   `[horizon - (k+1)*unit, horizon - k*unit]` keeps only its newest
//!   surviving snapshot;
//! - with `delete_before`, survivors older than `horizon - delete_before` go too.
//!
//! Tiers are independent: a snapshot kept by an hourly window can still be
//! dropped by a weekly one. Snapshots already scheduled for deletion are not
//! candidates in later windows.

use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::replicate::MARKER_PREFIX;
use crate::zfs::{Snapshot, SnapshotSet};

use super::scenario::Scenario;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeleteReason {
    /// Superseded by a newer snapshot in the same tier window.
    Window { tier: &'static str, offset: u32 },
    /// Older than the `delete_before` limit.
    TooOld,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deletion {
    pub snapshot: Snapshot,
    pub reason: DeleteReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrunePlan {
    pub scenario: String,
    pub horizon: DateTime<Utc>,
    /// Marker snapshots excluded from pruning.
    pub protected: Vec<String>,
    pub deletions: Vec<Deletion>,
    /// Snapshots that survive the plan (protected ones included).
    pub kept: usize,
}

impl PrunePlan {
    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty()
    }

    pub fn deleted_names(&self) -> impl Iterator<Item = &str> {
        self.deletions.iter().map(|d| d.snapshot.name.as_str())
    }
}

/// Newest marker per (dataset, prefix + tag char); `snaps` must be sorted.
pub fn latest_markers(snaps: &[Snapshot]) -> HashSet<(String, String)> {
    let key_len = MARKER_PREFIX.chars().count() + 1;
    let mut latest: HashMap<(String, String), &Snapshot> = HashMap::new();
    for s in snaps.iter().filter(|s| s.name.starts_with(MARKER_PREFIX)) {
        let tag: String = s.name.chars().take(key_len).collect();
        latest.insert((s.dataset.clone(), tag), s);
    }
    latest
        .into_values()
        .map(|s| (s.dataset.clone(), s.name.clone()))
        .collect()
}

pub fn plan_prune(
    set: &SnapshotSet,
    scenario: &Scenario,
    now: DateTime<Utc>,
    delete_before: Option<Duration>,
) -> PrunePlan {
    let horizon = scenario.horizon(now);
    let protected = latest_markers(set.as_slice());

    let candidates: Vec<&Snapshot> = set
        .iter()
        .filter(|s| !protected.contains(&(s.dataset.clone(), s.name.clone())))
        .collect();
    let mut doomed = vec![false; candidates.len()];
    let mut deletions = Vec::new();

    for tier in &scenario.tiers {
        debug!("prune: {} windows [{}, {})", tier.label(), tier.start, tier.end);
        for k in tier.start..tier.end {
            let Some((lo, hi)) = tier.window(horizon, k) else {
                debug!("prune: {} windows stop at offset {}", tier.label(), k);
                break;
            };
            let from = candidates.partition_point(|s| s.creation < lo);
            let to = candidates.partition_point(|s| s.creation <= hi);
            let inside: Vec<usize> = (from..to).filter(|&i| !doomed[i]).collect();
            if let Some((_newest, older)) = inside.split_last() {
                for &i in older {
                    doomed[i] = true;
                    deletions.push(Deletion {
                        snapshot: candidates[i].clone(),
                        reason: DeleteReason::Window {
                            tier: tier.label(),
                            offset: k,
                        },
                    });
                }
            }
        }
    }

    // An age limit reaching before the representable range deletes nothing.
    if let Some(limit) = delete_before.and_then(|age| horizon.checked_sub_signed(age)) {
        debug!("prune: dropping everything before {}", limit);
        for (i, s) in candidates.iter().enumerate() {
            if !doomed[i] && s.creation < limit {
                doomed[i] = true;
                deletions.push(Deletion {
                    snapshot: (*s).clone(),
                    reason: DeleteReason::TooOld,
                });
            }
        }
    }

    let mut protected: Vec<String> = set
        .iter()
        .filter(|s| protected.contains(&(s.dataset.clone(), s.name.clone())))
        .map(Snapshot::full_name)
        .collect();
    protected.sort();

    PrunePlan {
        scenario: scenario.name.clone(),
        horizon,
        protected,
        kept: set.len() - deletions.len(),
        deletions,
    }
}

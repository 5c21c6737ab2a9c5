//! Retention scheduler: tiered, decaying-density pruning of one dataset.
//!
//! `prune` lists, plans with [`plan_prune`], then deletes in plan order. The first failed
//! deletion aborts the run; a half-applied schedule must never pass silently.

use chrono::Duration;
use log::info;
use serde::Serialize;

use crate::error::Result;
use crate::exec::Executor;
use crate::zfs::Zfs;

pub mod plan;
pub mod scenario;

pub use plan::{latest_markers, plan_prune, DeleteReason, Deletion, PrunePlan};
pub use scenario::{Scenario, ScenarioSpec, ScenarioTable, Tier, TierUnit, STANDARD};

#[derive(Debug, Clone)]
pub struct PruneOptions {
    pub scenario: String,
    pub delete_before_days: Option<u32>,
    pub host: Option<String>,
    /// Plan only, delete nothing.
    pub dry_run: bool,
}

impl Default for PruneOptions {
    fn default() -> Self {
        Self {
            scenario: STANDARD.to_string(),
            delete_before_days: None,
            host: None,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PruneReport {
    pub dataset: String,
    pub dry_run: bool,
    /// None when the dataset had no snapshots or does not exist.
    pub plan: Option<PrunePlan>,
    /// Full names actually destroyed, in order.
    pub deleted: Vec<String>,
}

pub fn prune<E: Executor>(
    zfs: &Zfs<E>,
    scenarios: &ScenarioTable,
    dataset: &str,
    opts: &PruneOptions,
) -> Result<PruneReport> {
    let scenario = scenarios.get(&opts.scenario)?;
    let host = opts.host.as_deref();

    let set = zfs
        .list_snapshots_or_empty(Some(dataset), host)?
        .for_dataset(dataset);
    let mut report = PruneReport {
        dataset: dataset.to_string(),
        dry_run: opts.dry_run,
        plan: None,
        deleted: Vec::new(),
    };
    if set.is_empty() {
        info!("prune: no snapshot found for {}", dataset);
        return Ok(report);
    }

    let delete_before = opts.delete_before_days.map(|d| Duration::days(i64::from(d)));
    let plan = plan_prune(&set, scenario, zfs.now(), delete_before);
    info!(
        "prune: {} with '{}': {} snapshot(s), {} to delete, {} protected",
        dataset,
        scenario.name,
        set.len(),
        plan.deletions.len(),
        plan.protected.len()
    );

    for d in &plan.deletions {
        let full = d.snapshot.full_name();
        if opts.dry_run {
            info!("Would delete {}", full);
            continue;
        }
        info!("Deleting {}", full);
        zfs.delete_snapshot(&d.snapshot.dataset, &d.snapshot.name, host)?;
        report.deleted.push(full);
    }

    report.plan = Some(plan);
    Ok(report)
}

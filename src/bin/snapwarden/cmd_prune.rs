use anyhow::Result;

use snapwarden::retention::DeleteReason;
use snapwarden::{prune, Config, PruneOptions};

use crate::util::{lock_datasets, print_json};

pub fn exec(
    cfg: &Config,
    dataset: String,
    scenario: Option<String>,
    delete_before_days: Option<u32>,
    host: Option<String>,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let opts = PruneOptions {
        scenario: scenario.unwrap_or_else(|| cfg.default_scenario.clone()),
        delete_before_days,
        host,
        dry_run,
    };

    let _locks = lock_datasets(cfg, &[dataset.as_str()])?;
    let report = prune(&cfg.zfs(), &cfg.scenarios, &dataset, &opts)?;

    if json {
        return print_json(&report);
    }

    let Some(plan) = &report.plan else {
        println!("{}: no snapshots", dataset);
        return Ok(());
    };
    let verb = if dry_run { "would delete" } else { "deleted" };
    for d in &plan.deletions {
        let why = match &d.reason {
            DeleteReason::Window { tier, offset } => format!("{} #{}", tier, offset),
            DeleteReason::TooOld => "too old".to_string(),
        };
        println!("{} {}  ({})", verb, d.snapshot.full_name(), why);
    }
    println!(
        "{}: scenario={} {} {} snapshot(s), kept {}, protected {}",
        dataset,
        plan.scenario,
        verb,
        plan.deletions.len(),
        plan.kept,
        plan.protected.len()
    );
    Ok(())
}

use anyhow::Result;

use snapwarden::Config;

use crate::util::{human_bytes, print_json};

pub fn exec(cfg: &Config, dataset: Option<String>, host: Option<String>, json: bool) -> Result<()> {
    let zfs = cfg.zfs();
    let set = zfs.list_snapshots(dataset.as_deref(), host.as_deref())?;

    if json {
        return print_json(&set);
    }

    if set.is_empty() {
        println!("no snapshots");
        return Ok(());
    }
    for s in &set {
        println!(
            "{:<60} {}  {:>8}",
            s.full_name(),
            s.creation_local().format("%Y-%m-%d %H:%M:%S"),
            human_bytes(s.used)
        );
    }
    println!("{} snapshot(s)", set.len());
    Ok(())
}

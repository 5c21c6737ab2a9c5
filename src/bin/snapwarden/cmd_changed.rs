use anyhow::Result;

use snapwarden::Config;

/// Prints "changed" or "unchanged". Exit status is 0 either way.
pub fn exec(
    cfg: &Config,
    dataset: String,
    since: Option<String>,
    host: Option<String>,
) -> Result<()> {
    let zfs = cfg.zfs();
    let changed = zfs.has_changed(&dataset, since.as_deref(), host.as_deref())?;
    println!("{}", if changed { "changed" } else { "unchanged" });
    Ok(())
}

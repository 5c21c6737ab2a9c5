use anyhow::Result;
use log::info;

use snapwarden::Config;

pub fn exec_create(
    cfg: &Config,
    dataset: String,
    name: Option<String>,
    timestamp: bool,
    host: Option<String>,
) -> Result<()> {
    let zfs = cfg.zfs();
    let created = zfs.create_snapshot(&dataset, name.as_deref(), timestamp, host.as_deref())?;
    info!("created {}@{}", dataset, created);
    println!("{}@{}", dataset, created);
    Ok(())
}

pub fn exec_destroy(
    cfg: &Config,
    dataset: String,
    name: String,
    host: Option<String>,
) -> Result<()> {
    let zfs = cfg.zfs();
    zfs.delete_snapshot(&dataset, &name, host.as_deref())?;
    println!("destroyed {}@{}", dataset, name);
    Ok(())
}

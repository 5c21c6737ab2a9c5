use anyhow::Result;
use serde::Serialize;

use snapwarden::lock::{try_lock_datasets, LockGuard};
use snapwarden::Config;

pub fn print_json<T: Serialize>(v: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(v)?);
    Ok(())
}

/// Hold the configured per-dataset locks for the rest of the command.
/// Empty when no lock directory is configured.
pub fn lock_datasets(cfg: &Config, datasets: &[&str]) -> Result<Vec<LockGuard>> {
    match &cfg.lock_dir {
        Some(dir) => try_lock_datasets(dir, datasets),
        None => Ok(Vec::new()),
    }
}

pub fn human_bytes(n: u64) -> String {
    const UNITS: [&str; 5] = ["B", "K", "M", "G", "T"];
    let mut v = n as f64;
    let mut i = 0;
    while v >= 1024.0 && i + 1 < UNITS.len() {
        v /= 1024.0;
        i += 1;
    }
    if i == 0 {
        format!("{}{}", n, UNITS[0])
    } else {
        format!("{:.1}{}", v, UNITS[i])
    }
}

//! Change detection via `zfs diff <dataset>@<snap> <dataset>`.
//!
//! Any output means changed. A failing diff is an error, never "unchanged".

use log::debug;

use crate::error::{Error, Result};
use crate::exec::Executor;

use super::Zfs;

impl<E: Executor> Zfs<E> {
    /// Has `dataset` changed since `since` (default: its newest snapshot)?
    pub fn has_changed(
        &self,
        dataset: &str,
        since: Option<&str>,
        host: Option<&str>,
    ) -> Result<bool> {
        let since = match since {
            Some(s) => s.to_string(),
            None => self
                .list_snapshots(Some(dataset), host)?
                .for_dataset(dataset)
                .latest()
                .map(|s| s.name.clone())
                .ok_or_else(|| Error::NoSnapshotAvailable(dataset.to_string()))?,
        };

        let inv = self
            .command(host)
            .arg("diff")
            .arg(format!("{}@{}", dataset, since))
            .arg(dataset);
        let out = self.run_checked(&inv)?;

        let changed = !out.stdout.is_empty();
        debug!(
            "diff: {} since {}: {}",
            dataset,
            since,
            if changed { "changed" } else { "unchanged" }
        );
        Ok(changed)
    }
}

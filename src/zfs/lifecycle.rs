//! Create / delete a single snapshot.

use chrono::{DateTime, Local, Utc};
use log::info;

use crate::error::{Error, Result};
use crate::exec::Executor;
use crate::metrics::{record_snapshot_created, record_snapshot_deleted};

use super::Zfs;

pub const DEFAULT_SNAPSHOT_NAME: &str = "snapshot";

/// `<base>_<UTC YYYYMMDDHHMMSS>Z_<local YYYYMMDDHHMMSS>` for one instant.
///
/// Both renderings are embedded so a reader can cross-check either clock.
pub fn timestamped_name(base: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}_{}Z_{}",
        base,
        at.format("%Y%m%d%H%M%S"),
        at.with_timezone(&Local).format("%Y%m%d%H%M%S")
    )
}

impl<E: Executor> Zfs<E> {
    /// Take `dataset@name` and return the final snapshot name.
    pub fn create_snapshot(
        &self,
        dataset: &str,
        name: Option<&str>,
        timestamped: bool,
        host: Option<&str>,
    ) -> Result<String> {
        let base = name.unwrap_or(DEFAULT_SNAPSHOT_NAME);
        let name = if timestamped {
            timestamped_name(base, self.now())
        } else {
            base.to_string()
        };

        let inv = self
            .command(host)
            .arg("snapshot")
            .arg(format!("{}@{}", dataset, name));
        self.run_checked(&inv)?;

        info!("snapshot: created {}@{}", dataset, name);
        record_snapshot_created();
        Ok(name)
    }

    pub fn delete_snapshot(&self, dataset: &str, name: &str, host: Option<&str>) -> Result<()> {
        let full = format!("{}@{}", dataset, name);
        let inv = self.command(host).arg("destroy").arg(full.clone());
        let out = self.executor().run(&inv)?;
        if !out.success() {
            return Err(Error::DeleteFailed {
                snapshot: full,
                code: out.code,
                stderr: out.stderr,
            });
        }
        record_snapshot_deleted();
        Ok(())
    }
}

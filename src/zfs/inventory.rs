//! Snapshot inventory: `zfs list -t snapshot -H -p -o name,creation,used`.
//!
//! Listing is fail-fast: one unparsable line fails the whole call, because
//! retention must never reason about a partial inventory.

use chrono::{DateTime, Local, Utc};
use log::debug;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::exec::Executor;
use crate::metrics::record_snapshots_listed;

use super::Zfs;

/// Point-in-time capture of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub dataset: String,
    pub name: String,
    /// Creation instant. The local rendering is derived from it, so both always agree.
    pub creation: DateTime<Utc>,
    /// Bytes used exclusively by this snapshot, as reported by the tool.
    pub used: u64,
}

impl Snapshot {
    pub fn full_name(&self) -> String {
        format!("{}@{}", self.dataset, self.name)
    }

    pub fn creation_local(&self) -> DateTime<Local> {
        self.creation.with_timezone(&Local)
    }
}

/// Parse one tab-separated listing line: `dataset@name \t epoch \t used`.
pub fn parse_listing_line(line: &str) -> Result<Snapshot> {
    let bad = || Error::ParseFailed(line.to_string());

    let mut fields = line.split('\t');
    let (id, epoch, used) = match (fields.next(), fields.next(), fields.next()) {
        (Some(a), Some(b), Some(c)) => (a, b, c),
        _ => return Err(bad()),
    };
    let (dataset, name) = id.split_once('@').ok_or_else(bad)?;
    if dataset.is_empty() || name.is_empty() {
        return Err(bad());
    }
    let epoch: i64 = epoch.trim().parse().map_err(|_| bad())?;
    let used: u64 = used.trim().parse().map_err(|_| bad())?;
    let creation = DateTime::<Utc>::from_timestamp(epoch, 0).ok_or_else(bad)?;

    Ok(Snapshot {
        dataset: dataset.to_string(),
        name: name.to_string(),
        creation,
        used,
    })
}

/// Snapshots ordered by creation time, oldest first.
///
/// Rebuilt from a fresh listing on every query; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SnapshotSet(Vec<Snapshot>);

impl SnapshotSet {
    /// Stable sort: snapshots with equal timestamps keep listing order.
    pub fn from_unsorted(mut v: Vec<Snapshot>) -> Self {
        v.sort_by_key(|s| s.creation);
        Self(v)
    }

    /// Only the snapshots of exactly `dataset` (listing is recursive).
    pub fn for_dataset(&self, dataset: &str) -> SnapshotSet {
        Self(
            self.0
                .iter()
                .filter(|s| s.dataset == dataset)
                .cloned()
                .collect(),
        )
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.0.last()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.0.iter().any(|s| s.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.iter().map(|s| s.name.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Snapshot> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Snapshot] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<Snapshot> {
        self.0
    }
}

impl<'a> IntoIterator for &'a SnapshotSet {
    type Item = &'a Snapshot;
    type IntoIter = std::slice::Iter<'a, Snapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<E: Executor> Zfs<E> {
    /// List snapshots, optionally restricted (recursively, tool-side) to `dataset`.
    pub fn list_snapshots(&self, dataset: Option<&str>, host: Option<&str>) -> Result<SnapshotSet> {
        let mut inv = self
            .command(host)
            .args(["list", "-t", "snapshot", "-H", "-p", "-o", "name,creation,used"]);
        if let Some(ds) = dataset {
            inv = inv.args(["-r", ds]);
        }
        let out = self.run_checked(&inv)?;

        let snaps = out
            .stdout
            .lines()
            .filter(|l| !l.is_empty())
            .map(parse_listing_line)
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "list: {} snapshot(s) for {} on {}",
            snaps.len(),
            dataset.unwrap_or("(all)"),
            host.unwrap_or("localhost")
        );
        record_snapshots_listed(snaps.len());
        Ok(SnapshotSet::from_unsorted(snaps))
    }

    /// Like [`list_snapshots`](Self::list_snapshots), but a missing dataset is
    /// an empty history instead of an error.
    pub fn list_snapshots_or_empty(
        &self,
        dataset: Option<&str>,
        host: Option<&str>,
    ) -> Result<SnapshotSet> {
        match self.list_snapshots(dataset, host) {
            Err(e) if e.is_missing_dataset() => {
                debug!(
                    "list: {} does not exist yet, treating as empty",
                    dataset.unwrap_or("(all)")
                );
                Ok(SnapshotSet::default())
            }
            other => other,
        }
    }
}

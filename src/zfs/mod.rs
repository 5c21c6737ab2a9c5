//! `Zfs` handle: the storage tool binary plus an [`Executor`].
//!
//! Operations are split by concern across submodules, each adding an
//! `impl<E: Executor> Zfs<E>` block:
//! - inventory: listing and parsing snapshots
//! - lifecycle: create / delete one snapshot
//! - changes:   diff-based change detection
//!
//! Every operation takes an optional SSH host so local and remote calls look
//! the same at the call site.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::exec::{CmdOutput, Executor, Invocation, SystemExecutor};

pub mod changes;
pub mod inventory;
pub mod lifecycle;

pub use inventory::{parse_listing_line, Snapshot, SnapshotSet};
pub use lifecycle::{timestamped_name, DEFAULT_SNAPSHOT_NAME};

pub struct Zfs<E = SystemExecutor> {
    exec: E,
    bin: String,
    clock: fn() -> DateTime<Utc>,
}

impl<E: Executor> Zfs<E> {
    pub fn new(exec: E, bin: impl Into<String>) -> Self {
        Self {
            exec,
            bin: bin.into(),
            clock: Utc::now,
        }
    }

    /// Replace the wall clock used for timestamped names and retention horizons.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn executor(&self) -> &E {
        &self.exec
    }

    pub fn bin(&self) -> &str {
        &self.bin
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// `zfs` invocation skeleton, remote when `host` is set.
    pub(crate) fn command(&self, host: Option<&str>) -> Invocation {
        Invocation::new(self.bin.clone()).on_host(host)
    }

    /// Run and map a non-zero exit to [`Error::CommandFailed`].
    pub(crate) fn run_checked(&self, inv: &Invocation) -> Result<CmdOutput> {
        let out = self.exec.run(inv)?;
        if !out.success() {
            return Err(Error::CommandFailed {
                code: out.code,
                stderr: out.stderr,
            });
        }
        Ok(out)
    }
}

impl<E> std::fmt::Debug for Zfs<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Zfs").field("bin", &self.bin).finish_non_exhaustive()
    }
}

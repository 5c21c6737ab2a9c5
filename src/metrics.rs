//! Lightweight process-wide counters.
//!
//! Thread-safe atomics grouped by subsystem:
//! - command boundary (runs / failures)
//! - inventory and lifecycle
//! - replication (full / incremental / skipped)

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

// ----- Command boundary -----
static COMMANDS_RUN: AtomicU64 = AtomicU64::new(0);
static COMMAND_FAILURES: AtomicU64 = AtomicU64::new(0);

// ----- Inventory / lifecycle -----
static SNAPSHOTS_LISTED: AtomicU64 = AtomicU64::new(0);
static SNAPSHOTS_CREATED: AtomicU64 = AtomicU64::new(0);
static SNAPSHOTS_DELETED: AtomicU64 = AtomicU64::new(0);

// ----- Replication -----
static TRANSFERS_FULL: AtomicU64 = AtomicU64::new(0);
static TRANSFERS_INCREMENTAL: AtomicU64 = AtomicU64::new(0);
static TRANSFERS_SKIPPED: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub commands_run: u64,
    pub command_failures: u64,

    pub snapshots_listed: u64,
    pub snapshots_created: u64,
    pub snapshots_deleted: u64,

    pub transfers_full: u64,
    pub transfers_incremental: u64,
    pub transfers_skipped: u64,
}

impl MetricsSnapshot {
    pub fn transfers_total(&self) -> u64 {
        self.transfers_full + self.transfers_incremental
    }

    pub fn command_failure_ratio(&self) -> f64 {
        if self.commands_run == 0 {
            0.0
        } else {
            self.command_failures as f64 / self.commands_run as f64
        }
    }
}

// ----- Recorders (command boundary) -----
pub fn record_command(ok: bool) {
    COMMANDS_RUN.fetch_add(1, Ordering::Relaxed);
    if !ok {
        COMMAND_FAILURES.fetch_add(1, Ordering::Relaxed);
    }
}

// ----- Recorders (inventory / lifecycle) -----
pub fn record_snapshots_listed(n: usize) {
    SNAPSHOTS_LISTED.fetch_add(n as u64, Ordering::Relaxed);
}

pub fn record_snapshot_created() {
    SNAPSHOTS_CREATED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_snapshot_deleted() {
    SNAPSHOTS_DELETED.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (replication) -----
pub fn record_transfer(incremental: bool) {
    if incremental {
        TRANSFERS_INCREMENTAL.fetch_add(1, Ordering::Relaxed);
    } else {
        TRANSFERS_FULL.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn record_transfer_skipped() {
    TRANSFERS_SKIPPED.fetch_add(1, Ordering::Relaxed);
}

// ----- Snapshot / Reset -----
pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        commands_run: COMMANDS_RUN.load(Ordering::Relaxed),
        command_failures: COMMAND_FAILURES.load(Ordering::Relaxed),

        snapshots_listed: SNAPSHOTS_LISTED.load(Ordering::Relaxed),
        snapshots_created: SNAPSHOTS_CREATED.load(Ordering::Relaxed),
        snapshots_deleted: SNAPSHOTS_DELETED.load(Ordering::Relaxed),

        transfers_full: TRANSFERS_FULL.load(Ordering::Relaxed),
        transfers_incremental: TRANSFERS_INCREMENTAL.load(Ordering::Relaxed),
        transfers_skipped: TRANSFERS_SKIPPED.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    COMMANDS_RUN.store(0, Ordering::Relaxed);
    COMMAND_FAILURES.store(0, Ordering::Relaxed);

    SNAPSHOTS_LISTED.store(0, Ordering::Relaxed);
    SNAPSHOTS_CREATED.store(0, Ordering::Relaxed);
    SNAPSHOTS_DELETED.store(0, Ordering::Relaxed);

    TRANSFERS_FULL.store(0, Ordering::Relaxed);
    TRANSFERS_INCREMENTAL.store(0, Ordering::Relaxed);
    TRANSFERS_SKIPPED.store(0, Ordering::Relaxed);
}

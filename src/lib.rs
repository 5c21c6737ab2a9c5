//! snapwarden: ZFS snapshot retention and incremental replication.

// Command boundary and errors
pub mod error;
pub mod exec;

// Ambient: configuration, counters, locks
pub mod config;
pub mod lock;
pub mod metrics;

// Snapshot inventory / lifecycle / change detection (src/zfs/{mod,inventory,lifecycle,changes}.rs)
pub mod zfs;

// Replication and retention
pub mod replicate;
pub mod retention; // src/retention/{mod,scenario,plan}.rs

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use exec::{CmdOutput, Executor, Invocation, PipeOutput, SystemExecutor};
pub use replicate::{send_recv, Endpoint, Outcome, SendRecv};
pub use retention::{prune, PruneOptions, PruneReport, Scenario, ScenarioTable};
pub use zfs::{Snapshot, SnapshotSet, Zfs};

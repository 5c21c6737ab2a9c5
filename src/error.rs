//! Typed errors for every operation that crosses the command boundary.
//!
//! Non-zero exits from the storage tool are surfaced as data-carrying
//! variants so callers can match on the failure kind. The one stderr
//! substring we deliberately recognize is "dataset does not exist"
//! (see [`Error::is_missing_dataset`]).

use thiserror::Error;

/// Substring printed by `zfs` when the requested dataset is absent.
pub const MISSING_DATASET_MARKER: &str = "dataset does not exist";

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The process could not be started at all (missing binary, EPERM, ...).
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command failed with exit code {code}: {}", .stderr.trim())]
    CommandFailed { code: i32, stderr: String },

    #[error("cannot parse listing line: {0:?}")]
    ParseFailed(String),

    #[error("unknown retention scenario '{0}'")]
    UnknownScenario(String),

    #[error("no snapshot available for {0}")]
    NoSnapshotAvailable(String),

    #[error("transfer of {snapshot} failed with exit code {code}: {}", .stderr.trim())]
    TransferFailed {
        snapshot: String,
        code: i32,
        stderr: String,
    },

    #[error("cannot delete {snapshot} (exit code {code}): {}", .stderr.trim())]
    DeleteFailed {
        snapshot: String,
        code: i32,
        stderr: String,
    },
}

impl Error {
    /// True when a listing failed only because the dataset is not there yet.
    ///
    /// Replication treats this as an empty history; everything else stays a
    /// hard failure.
    pub fn is_missing_dataset(&self) -> bool {
        matches!(
            self,
            Error::CommandFailed { stderr, .. } if stderr.contains(MISSING_DATASET_MARKER)
        )
    }
}

//! Incremental send/recv replication.
//!
//! One call synchronizes a receive-side mirror with a send-side dataset:
//! 1) list both histories (a missing dataset on either side is an empty history),
//! 2) pick the incremental base,
//! 3) optionally skip when nothing changed since the base,
//! 4) take a fresh `sendrecv<tag>_...` marker snapshot (or reuse the newest one),
//! 5) `zfs send [-i base] snap | zfs recv -F mirror`, each side optionally over ssh.
//!
//! The receive side is a mirror: `recv -F` may roll back whatever diverged there.
//! A snapshot created in step 4 is left in place when the transfer fails.

use log::{debug, info};
use serde::Serialize;
use std::fmt;

use crate::error::{Error, Result};
use crate::exec::{Executor, Invocation};
use crate::metrics::{record_transfer, record_transfer_skipped};
use crate::zfs::{SnapshotSet, Zfs};

/// Name prefix of replication markers; the tag character follows it.
pub const MARKER_PREFIX: &str = "sendrecv";

pub fn marker_base(tag: char) -> String {
    format!("{}{}", MARKER_PREFIX, tag)
}

/// One side of a replication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub dataset: String,
    pub host: Option<String>,
}

impl Endpoint {
    pub fn local(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            host: None,
        }
    }

    pub fn remote(dataset: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            host: Some(host.into()),
        }
    }

    pub fn new(dataset: impl Into<String>, host: Option<String>) -> Self {
        Self {
            dataset: dataset.into(),
            host,
        }
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            Some(h) => write!(f, "{}:{}", h, self.dataset),
            None => f.write_str(&self.dataset),
        }
    }
}

/// A single synchronization attempt.
#[derive(Debug, Clone)]
pub struct SendRecv {
    pub send: Endpoint,
    pub recv: Endpoint,
    /// Skip the transfer when the send side did not change since the base.
    pub if_changed: bool,
    /// Send the newest existing snapshot instead of taking a new one.
    /// Needed when the send dataset is itself a receive target elsewhere.
    pub reuse_latest_send: bool,
    /// Disambiguates concurrent flows targeting the same dataset.
    pub tag: char,
    /// Use the newest shared snapshot even when the mirror has newer ones of its own.
    pub allow_diverged_base: bool,
}

impl SendRecv {
    pub fn new(send: Endpoint, recv: Endpoint) -> Self {
        Self {
            send,
            recv,
            if_changed: false,
            reuse_latest_send: false,
            tag: '0',
            allow_diverged_base: false,
        }
    }

    pub fn with_if_changed(mut self, on: bool) -> Self {
        self.if_changed = on;
        self
    }

    pub fn with_reuse_latest_send(mut self, on: bool) -> Self {
        self.reuse_latest_send = on;
        self
    }

    pub fn with_tag(mut self, tag: char) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_allow_diverged_base(mut self, on: bool) -> Self {
        self.allow_diverged_base = on;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Nothing to send; the mirror already holds `base` and the source is unchanged.
    Unchanged { base: String },
    /// `snapshot` was sent, incrementally from `base` when set.
    Transferred { snapshot: String, base: Option<String> },
}

impl Outcome {
    pub fn transferred(&self) -> Option<&str> {
        match self {
            Outcome::Transferred { snapshot, .. } => Some(snapshot),
            Outcome::Unchanged { .. } => None,
        }
    }
}

/// Newest receive-side snapshot name that also exists on the send side.
pub fn last_common<'a>(send: &SnapshotSet, recv: &'a SnapshotSet) -> Option<&'a str> {
    recv.iter()
        .rev()
        .map(|s| s.name.as_str())
        .find(|n| send.contains_name(n))
}

/// The receive side's newest snapshot, if the send side has it too.
///
/// A mirror whose head is unknown to the sender has no valid incremental base.
pub fn incremental_base<'a>(send: &SnapshotSet, recv: &'a SnapshotSet) -> Option<&'a str> {
    let head = recv.latest()?;
    if send.contains_name(&head.name) {
        Some(head.name.as_str())
    } else {
        None
    }
}

/// `zfs send [-i ds@base] ds@snap`
pub fn send_invocation<E: Executor>(
    zfs: &Zfs<E>,
    send: &Endpoint,
    base: Option<&str>,
    snapshot: &str,
) -> Invocation {
    let mut inv = zfs.command(send.host()).arg("send");
    if let Some(b) = base {
        inv = inv.arg("-i").arg(format!("{}@{}", send.dataset, b));
    }
    inv.arg(format!("{}@{}", send.dataset, snapshot))
}

/// `zfs recv -F ds`
pub fn recv_invocation<E: Executor>(zfs: &Zfs<E>, recv: &Endpoint) -> Invocation {
    zfs.command(recv.host())
        .args(["recv", "-F"])
        .arg(recv.dataset.clone())
}

pub fn send_recv<E: Executor>(zfs: &Zfs<E>, req: &SendRecv) -> Result<Outcome> {
    let send_snaps = zfs
        .list_snapshots_or_empty(Some(&req.send.dataset), req.send.host())?
        .for_dataset(&req.send.dataset);
    let recv_snaps = zfs
        .list_snapshots_or_empty(Some(&req.recv.dataset), req.recv.host())?
        .for_dataset(&req.recv.dataset);

    let base = if req.allow_diverged_base {
        last_common(&send_snaps, &recv_snaps)
    } else {
        incremental_base(&send_snaps, &recv_snaps)
    }
    .map(str::to_string);
    debug!(
        "send-recv: {} -> {}: {} send / {} recv snapshot(s), base={}",
        req.send,
        req.recv,
        send_snaps.len(),
        recv_snaps.len(),
        base.as_deref().unwrap_or("(none)")
    );

    if let Some(b) = &base {
        if req.if_changed && !zfs.has_changed(&req.send.dataset, Some(b), req.send.host())? {
            info!("send-recv: {} unchanged since {}, nothing to send", req.send, b);
            record_transfer_skipped();
            return Ok(Outcome::Unchanged { base: b.clone() });
        }
    }

    let snapshot = if req.reuse_latest_send {
        send_snaps
            .latest()
            .map(|s| s.name.clone())
            .ok_or_else(|| Error::NoSnapshotAvailable(req.send.to_string()))?
    } else {
        zfs.create_snapshot(&req.send.dataset, Some(&marker_base(req.tag)), true, req.send.host())?
    };

    if base.as_deref() == Some(snapshot.as_str()) {
        info!("send-recv: {} already holds {}", req.recv, snapshot);
        record_transfer_skipped();
        return Ok(Outcome::Unchanged { base: snapshot });
    }

    let producer = send_invocation(zfs, &req.send, base.as_deref(), &snapshot);
    let consumer = recv_invocation(zfs, &req.recv);
    info!("send-recv: {} | {}", producer, consumer);

    let out = zfs.executor().pipe(&producer, &consumer)?;
    if !out.success() {
        return Err(Error::TransferFailed {
            snapshot: format!("{}@{}", req.send.dataset, snapshot),
            code: out.code(),
            stderr: out.stderr(),
        });
    }

    record_transfer(base.is_some());
    info!(
        "send-recv: {}@{} -> {} ({})",
        req.send.dataset,
        snapshot,
        req.recv,
        if base.is_some() { "incremental" } else { "full" }
    );
    Ok(Outcome::Transferred { snapshot, base })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zfs::Snapshot;
    use chrono::{DateTime, Utc};

    fn set(names: &[&str]) -> SnapshotSet {
        SnapshotSet::from_unsorted(
            names
                .iter()
                .enumerate()
                .map(|(i, n)| Snapshot {
                    dataset: "pool/ds".to_string(),
                    name: n.to_string(),
                    creation: DateTime::<Utc>::from_timestamp(1_000 + i as i64, 0).unwrap(),
                    used: 0,
                })
                .collect(),
        )
    }

    #[test]
    fn common_base_follows_shared_history() {
        let send = set(&["A", "B", "C"]);
        assert_eq!(last_common(&send, &set(&["A", "B"])), Some("B"));
        assert_eq!(incremental_base(&send, &set(&["A", "B"])), Some("B"));
    }

    #[test]
    fn diverged_mirror_has_no_strict_base() {
        let send = set(&["A", "B", "C"]);
        let recv = set(&["A", "X"]);
        assert_eq!(last_common(&send, &recv), Some("A"), "newest shared name");
        assert_eq!(incremental_base(&send, &recv), None, "mirror head X is unknown to sender");
    }

    #[test]
    fn empty_histories_have_no_base() {
        let send = set(&["A"]);
        let empty = SnapshotSet::default();
        assert_eq!(last_common(&send, &empty), None);
        assert_eq!(incremental_base(&send, &empty), None);
        assert_eq!(incremental_base(&empty, &send), None);
    }

    #[test]
    fn marker_and_endpoint_rendering() {
        assert_eq!(marker_base('7'), "sendrecv7");
        assert_eq!(Endpoint::remote("tank/bk", "nas").to_string(), "nas:tank/bk");
        assert_eq!(Endpoint::local("tank/a").to_string(), "tank/a");
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let o = Outcome::Transferred {
            snapshot: "s".to_string(),
            base: None,
        };
        let v = serde_json::to_value(&o).unwrap();
        assert_eq!(v["outcome"], "transferred");
        assert_eq!(v["snapshot"], "s");
        assert!(v["base"].is_null());
    }
}

#![allow(dead_code)]

//! In-memory stand-in for the `zfs` binary on any number of hosts.
//!
//! Understands exactly the argv shapes snapwarden emits: list, snapshot,
//! destroy, diff, and the send | recv pipe. Each dataset carries a write
//! generation; `touch` bumps it and `diff` compares it with the generation
//! recorded when the snapshot was taken.

use chrono::{DateTime, Utc};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use snapwarden::exec::{CmdOutput, Executor, Invocation, PipeOutput};
use snapwarden::Zfs;

pub const ZFS_BIN: &str = "zfs";

#[derive(Debug, Clone)]
struct FakeSnap {
    name: String,
    creation: i64,
    used: u64,
    gen: u64,
}

#[derive(Debug, Clone, Default)]
struct FakeDataset {
    gen: u64,
    snaps: Vec<FakeSnap>,
}

impl FakeDataset {
    fn find(&self, name: &str) -> Option<&FakeSnap> {
        self.snaps.iter().find(|s| s.name == name)
    }
}

type Key = (Option<String>, String);

#[derive(Default)]
struct State {
    datasets: BTreeMap<Key, FakeDataset>,
    log: Vec<Invocation>,
    fail_destroy: HashSet<String>,
    fail_recv: Option<String>,
}

pub struct FakeZfs {
    clock: fn() -> DateTime<Utc>,
    state: RefCell<State>,
}

fn key(host: Option<&str>, dataset: &str) -> Key {
    (host.map(str::to_string), dataset.to_string())
}

fn split_full(full: &str) -> Option<(&str, &str)> {
    full.split_once('@')
}

fn missing(dataset: &str) -> CmdOutput {
    CmdOutput::failed(1, format!("cannot open '{}': dataset does not exist\n", dataset))
}

impl FakeZfs {
    pub fn new(clock: fn() -> DateTime<Utc>) -> Self {
        Self {
            clock,
            state: RefCell::new(State::default()),
        }
    }

    /// `Zfs` handle over this fake sharing `clock`.
    pub fn into_zfs(self) -> Zfs<FakeZfs> {
        let clock = self.clock;
        Zfs::new(self, ZFS_BIN).with_clock(clock)
    }

    pub fn add_dataset(&self, host: Option<&str>, dataset: &str) {
        self.state
            .borrow_mut()
            .datasets
            .entry(key(host, dataset))
            .or_default();
    }

    /// Seed a snapshot with an explicit creation time; creates the dataset if needed.
    pub fn add_snapshot(
        &self,
        host: Option<&str>,
        dataset: &str,
        name: &str,
        creation: DateTime<Utc>,
    ) {
        let mut st = self.state.borrow_mut();
        let ds = st.datasets.entry(key(host, dataset)).or_default();
        let gen = ds.gen;
        ds.snaps.push(FakeSnap {
            name: name.to_string(),
            creation: creation.timestamp(),
            used: 4096,
            gen,
        });
        ds.snaps.sort_by_key(|s| s.creation);
    }

    /// Simulate a write to the live dataset.
    pub fn touch(&self, host: Option<&str>, dataset: &str) {
        if let Some(ds) = self.state.borrow_mut().datasets.get_mut(&key(host, dataset)) {
            ds.gen += 1;
        }
    }

    pub fn exists(&self, host: Option<&str>, dataset: &str) -> bool {
        self.state.borrow().datasets.contains_key(&key(host, dataset))
    }

    /// Snapshot names, oldest first.
    pub fn snapshots(&self, host: Option<&str>, dataset: &str) -> Vec<String> {
        self.state
            .borrow()
            .datasets
            .get(&key(host, dataset))
            .map(|ds| ds.snaps.iter().map(|s| s.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn fail_destroy(&self, full_name: &str) {
        self.state.borrow_mut().fail_destroy.insert(full_name.to_string());
    }

    pub fn fail_recv(&self, stderr: &str) {
        self.state.borrow_mut().fail_recv = Some(stderr.to_string());
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.state.borrow().log.clone()
    }

    /// Number of logged invocations whose first argument is `verb`.
    pub fn count(&self, verb: &str) -> usize {
        self.state
            .borrow()
            .log
            .iter()
            .filter(|i| i.args.first().map(String::as_str) == Some(verb))
            .count()
    }

    fn list(&self, st: &State, host: Option<&str>, args: &[String]) -> CmdOutput {
        let root = args.iter().position(|a| a == "-r").and_then(|i| args.get(i + 1));
        if let Some(r) = root {
            if !st.datasets.contains_key(&key(host, r)) {
                return missing(r);
            }
        }
        let mut out = String::new();
        for ((h, name), ds) in &st.datasets {
            if h.as_deref() != host {
                continue;
            }
            if let Some(r) = root {
                if name != r && !name.starts_with(&format!("{}/", r)) {
                    continue;
                }
            }
            for s in &ds.snaps {
                out.push_str(&format!("{}@{}\t{}\t{}\n", name, s.name, s.creation, s.used));
            }
        }
        CmdOutput::ok(out)
    }

    fn snapshot(&self, st: &mut State, host: Option<&str>, full: &str) -> CmdOutput {
        let Some((dataset, name)) = split_full(full) else {
            return CmdOutput::failed(2, "invalid snapshot name");
        };
        let creation = (self.clock)().timestamp();
        let Some(ds) = st.datasets.get_mut(&key(host, dataset)) else {
            return missing(dataset);
        };
        if ds.find(name).is_some() {
            return CmdOutput::failed(
                1,
                format!("cannot create snapshot '{}': dataset already exists", full),
            );
        }
        let gen = ds.gen;
        ds.snaps.push(FakeSnap {
            name: name.to_string(),
            creation,
            used: 0,
            gen,
        });
        ds.snaps.sort_by_key(|s| s.creation);
        CmdOutput::ok("")
    }

    fn destroy(&self, st: &mut State, host: Option<&str>, full: &str) -> CmdOutput {
        if st.fail_destroy.contains(full) {
            return CmdOutput::failed(1, format!("cannot destroy '{}': snapshot is busy", full));
        }
        let Some((dataset, name)) = split_full(full) else {
            return CmdOutput::failed(2, "invalid snapshot name");
        };
        let Some(ds) = st.datasets.get_mut(&key(host, dataset)) else {
            return missing(dataset);
        };
        let before = ds.snaps.len();
        ds.snaps.retain(|s| s.name != name);
        if ds.snaps.len() == before {
            return CmdOutput::failed(
                1,
                "could not find any snapshots to destroy; check snapshot names.",
            );
        }
        CmdOutput::ok("")
    }

    fn diff(&self, st: &State, host: Option<&str>, args: &[String]) -> CmdOutput {
        let Some((dataset, since)) = args.get(1).and_then(|a| split_full(a)) else {
            return CmdOutput::failed(2, "usage: diff snapshot [snapshot|filesystem]");
        };
        let Some(ds) = st.datasets.get(&key(host, dataset)) else {
            return missing(dataset);
        };
        match ds.find(since) {
            Some(s) if s.gen < ds.gen => CmdOutput::ok(format!("M\t/{}/file\n", dataset)),
            Some(_) => CmdOutput::ok(""),
            None => CmdOutput::failed(
                1,
                format!("Unable to obtain diffs: cannot open '{}@{}'", dataset, since),
            ),
        }
    }

    fn transfer(&self, st: &mut State, producer: &Invocation, consumer: &Invocation) -> PipeOutput {
        // producer: send [-i ds@base] ds@snap
        let (base, full) = match producer.args.as_slice() {
            [send, full] if send == "send" => (None, full),
            [send, i, base, full] if send == "send" && i == "-i" => (Some(base.as_str()), full),
            _ => {
                return PipeOutput {
                    send: CmdOutput::failed(2, "bad send arguments"),
                    recv: CmdOutput::failed(1, "cannot receive: failed to read from stream"),
                }
            }
        };
        let src_host = producer.host.as_deref();
        let Some((src_name, snap_name)) = split_full(full) else {
            return broken_pipe(CmdOutput::failed(2, "invalid snapshot name"));
        };
        let Some(src) = st.datasets.get(&key(src_host, src_name)) else {
            return broken_pipe(missing(src_name));
        };
        let Some(snap) = src.find(snap_name).cloned() else {
            return broken_pipe(CmdOutput::failed(
                1,
                format!("cannot open '{}': dataset does not exist", full),
            ));
        };
        let base_name = match base.map(split_full) {
            None => None,
            Some(Some((_, b))) if src.find(b).is_some() => Some(b.to_string()),
            Some(_) => {
                return broken_pipe(CmdOutput::failed(1, "incremental source does not exist"))
            }
        };

        // consumer: recv -F ds
        let dst_name = match consumer.args.as_slice() {
            [recv, f, ds] if recv == "recv" && f == "-F" => ds.clone(),
            _ => return broken_pipe(CmdOutput::failed(2, "bad recv arguments")),
        };
        let send_ok = CmdOutput::ok("");
        if let Some(err) = st.fail_recv.take() {
            return PipeOutput {
                send: send_ok,
                recv: CmdOutput::failed(1, err),
            };
        }

        let dst_key = key(consumer.host.as_deref(), &dst_name);
        let received = FakeSnap { gen: 0, ..snap };
        match base_name {
            None => {
                if let Some(dst) = st.datasets.get(&dst_key) {
                    if let Some(first) = dst.snaps.first() {
                        return PipeOutput {
                            send: send_ok,
                            recv: CmdOutput::failed(
                                1,
                                format!(
                                    concat!(
                                        "cannot receive new filesystem stream: ",
                                        "destination has snapshots (eg. {}@{})"
                                    ),
                                    dst_name, first.name
                                ),
                            ),
                        };
                    }
                }
                st.datasets.insert(
                    dst_key,
                    FakeDataset {
                        gen: 0,
                        snaps: vec![received],
                    },
                );
            }
            Some(b) => {
                let Some(dst) = st.datasets.get_mut(&dst_key) else {
                    return PipeOutput {
                        send: send_ok,
                        recv: missing(&dst_name),
                    };
                };
                let Some(pos) = dst.snaps.iter().position(|s| s.name == b) else {
                    return PipeOutput {
                        send: send_ok,
                        recv: CmdOutput::failed(
                            1,
                            format!(
                                concat!(
                                    "cannot receive incremental stream: ",
                                    "most recent snapshot of {} does not match incremental source"
                                ),
                                dst_name
                            ),
                        ),
                    };
                };
                // -F rolls the mirror back to the base first.
                dst.snaps.truncate(pos + 1);
                dst.gen = 0;
                for s in dst.snaps.iter_mut() {
                    s.gen = 0;
                }
                dst.snaps.push(received);
            }
        }
        PipeOutput {
            send: send_ok,
            recv: CmdOutput::ok(""),
        }
    }
}

fn broken_pipe(send: CmdOutput) -> PipeOutput {
    PipeOutput {
        send,
        recv: CmdOutput::failed(1, "cannot receive: failed to read from stream"),
    }
}

impl Executor for FakeZfs {
    fn run(&self, inv: &Invocation) -> snapwarden::Result<CmdOutput> {
        let mut st = self.state.borrow_mut();
        st.log.push(inv.clone());
        let host = inv.host.as_deref();
        let out = match inv.args.first().map(String::as_str) {
            Some("list") => self.list(&st, host, &inv.args),
            Some("snapshot") => match inv.args.get(1) {
                Some(full) => self.snapshot(&mut st, host, full),
                None => CmdOutput::failed(2, "missing snapshot argument"),
            },
            Some("destroy") => match inv.args.get(1) {
                Some(full) => self.destroy(&mut st, host, full),
                None => CmdOutput::failed(2, "missing dataset argument"),
            },
            Some("diff") => self.diff(&st, host, &inv.args),
            other => {
                CmdOutput::failed(2, format!("unrecognized command '{}'", other.unwrap_or("")))
            }
        };
        Ok(out)
    }

    fn pipe(&self, producer: &Invocation, consumer: &Invocation) -> snapwarden::Result<PipeOutput> {
        let mut st = self.state.borrow_mut();
        st.log.push(producer.clone());
        st.log.push(consumer.clone());
        Ok(self.transfer(&mut st, producer, consumer))
    }
}

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

pub fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("snapwarden-{prefix}-{pid}-{t}-{id}"))
}

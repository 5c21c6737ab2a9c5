use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ZFS snapshot retention and send/recv replication
#[derive(Parser, Debug)]
#[command(name = "snapwarden", version, about = "snapwarden CLI")]
pub struct Cli {
    /// TOML config file (CLI flags override it, env overrides the file)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// zfs binary (overrides config and SNAPWARDEN_ZFS)
    #[arg(long, global = true)]
    pub zfs_bin: Option<String>,

    /// ssh binary used for remote hosts
    #[arg(long, global = true)]
    pub ssh_bin: Option<String>,

    /// Directory for per-dataset lock files
    #[arg(long, global = true)]
    pub lock_dir: Option<PathBuf>,

    /// Log process counters when the command finishes
    #[arg(long, global = true, default_value_t = false)]
    pub stats: bool,

    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// List snapshots (optionally of one dataset, recursively)
    List {
        #[arg(long)]
        dataset: Option<String>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Take a snapshot
    ///
    /// Example:
    ///   snapwarden snapshot --dataset tank/home --name manual --timestamp
    Snapshot {
        #[arg(long)]
        dataset: String,
        /// Base name (default "snapshot")
        #[arg(long)]
        name: Option<String>,
        /// Append _<UTC>Z_<local> timestamps to the name
        #[arg(long, default_value_t = false)]
        timestamp: bool,
        #[arg(long)]
        host: Option<String>,
    },
    /// Destroy one snapshot
    Destroy {
        #[arg(long)]
        dataset: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        host: Option<String>,
    },
    /// Report whether a dataset changed since a snapshot (default: its newest)
    Changed {
        #[arg(long)]
        dataset: String,
        #[arg(long)]
        since: Option<String>,
        #[arg(long)]
        host: Option<String>,
    },
    /// Replicate a dataset: zfs send [-i base] | zfs recv -F
    ///
    /// Examples:
    ///   snapwarden send-recv --send tank/home --recv backup/home --recv-host nas --if-changed
    ///   snapwarden send-recv --send backup/home --recv cold/home --reuse-latest --tag 1
    SendRecv {
        #[arg(long)]
        send: String,
        #[arg(long)]
        recv: String,
        #[arg(long)]
        send_host: Option<String>,
        #[arg(long)]
        recv_host: Option<String>,
        /// Skip when the source did not change since the common snapshot
        #[arg(long, default_value_t = false)]
        if_changed: bool,
        /// Send the newest existing source snapshot instead of taking one
        #[arg(long, default_value_t = false)]
        reuse_latest: bool,
        /// Marker tag: snapshots are named sendrecv<TAG>_...
        #[arg(long, default_value_t = '0')]
        tag: char,
        /// Use the newest shared snapshot even if the mirror has newer ones
        #[arg(long, default_value_t = false)]
        allow_diverged_base: bool,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Prune snapshots with a retention scenario
    ///
    /// Example:
    ///   snapwarden prune --dataset tank/home --delete-before-days 400 --dry-run
    Prune {
        #[arg(long)]
        dataset: String,
        /// Scenario name (default from config, "standard")
        #[arg(long)]
        scenario: Option<String>,
        /// Also delete anything older than N days past the grace period
        #[arg(long)]
        delete_before_days: Option<u32>,
        #[arg(long)]
        host: Option<String>,
        /// Print the plan, delete nothing
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Show known retention scenarios
    Scenarios {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Cli as Parser>::parse()
    }
}

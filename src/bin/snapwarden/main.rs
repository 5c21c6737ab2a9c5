use anyhow::Result;
use env_logger::Env;
use log::info;

use snapwarden::{metrics, Config};

mod cli;
mod util;
mod cmd_list;
mod cmd_snapshot;
mod cmd_changed;
mod cmd_send_recv;
mod cmd_prune;
mod cmd_scenarios;

fn main() {
    init_logger();

    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    let mut cfg = Config::load(cli.config.as_deref())?;
    if let Some(bin) = cli.zfs_bin {
        cfg = cfg.with_zfs_bin(bin);
    }
    if let Some(bin) = cli.ssh_bin {
        cfg = cfg.with_ssh_bin(bin);
    }
    if cli.lock_dir.is_some() {
        cfg = cfg.with_lock_dir(cli.lock_dir);
    }
    log::debug!("{}", cfg);

    let res = match cli.cmd {
        cli::Cmd::List { dataset, host, json } =>
            cmd_list::exec(&cfg, dataset, host, json),

        cli::Cmd::Snapshot { dataset, name, timestamp, host } =>
            cmd_snapshot::exec_create(&cfg, dataset, name, timestamp, host),

        cli::Cmd::Destroy { dataset, name, host } =>
            cmd_snapshot::exec_destroy(&cfg, dataset, name, host),

        cli::Cmd::Changed { dataset, since, host } =>
            cmd_changed::exec(&cfg, dataset, since, host),

        cli::Cmd::SendRecv {
            send,
            recv,
            send_host,
            recv_host,
            if_changed,
            reuse_latest,
            tag,
            allow_diverged_base,
            json,
        } => cmd_send_recv::exec(
            &cfg,
            cmd_send_recv::Args {
                send,
                recv,
                send_host,
                recv_host,
                if_changed,
                reuse_latest,
                tag,
                allow_diverged_base,
                json,
            },
        ),

        cli::Cmd::Prune { dataset, scenario, delete_before_days, host, dry_run, json } =>
            cmd_prune::exec(&cfg, dataset, scenario, delete_before_days, host, dry_run, json),

        cli::Cmd::Scenarios { json } =>
            cmd_scenarios::exec(&cfg, json),
    };

    if cli.stats {
        let m = metrics::snapshot();
        info!(
            concat!(
                "stats: commands={} failures={} ({:.1}%) listed={} created={} deleted={} ",
                "transfers={} (full={} incr={} skipped={})"
            ),
            m.commands_run,
            m.command_failures,
            m.command_failure_ratio() * 100.0,
            m.snapshots_listed,
            m.snapshots_created,
            m.snapshots_deleted,
            m.transfers_total(),
            m.transfers_full,
            m.transfers_incremental,
            m.transfers_skipped
        );
    }
    res
}

fn init_logger() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

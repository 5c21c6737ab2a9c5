// Counters are process-wide: keep this the only test in the binary.

use anyhow::Result;
use chrono::{DateTime, Utc};

use snapwarden::{metrics, send_recv, Endpoint, SendRecv};
#[cfg(unix)]
use snapwarden::{Executor, Invocation, SystemExecutor};

mod common;
use common::FakeZfs;

fn fixed() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_720_000_000, 0).unwrap_or_default()
}

#[test]
fn metrics_snapshot_and_reset() -> Result<()> {
    metrics::reset();

    let zfs = FakeZfs::new(fixed).into_zfs();
    zfs.executor().add_dataset(None, "tank/a");

    let req = SendRecv::new(Endpoint::local("tank/a"), Endpoint::local("backup/a"))
        .with_if_changed(true);
    send_recv(&zfs, &req)?;
    send_recv(&zfs, &req)?;
    let _ = zfs.delete_snapshot("tank/a", "nope", None);

    let m = metrics::snapshot();
    assert_eq!(m.transfers_full, 1);
    assert_eq!(m.transfers_incremental, 0);
    assert_eq!(m.transfers_skipped, 1);
    assert_eq!(m.transfers_total(), 1);
    assert_eq!(m.snapshots_created, 1);
    assert_eq!(m.snapshots_deleted, 0);
    assert!(m.snapshots_listed >= 2);

    // Only the real executor counts commands.
    #[cfg(unix)]
    {
        let ex = SystemExecutor::default();
        let ok = ex.run(&Invocation::new("sh").args(["-c", "exit 0"]))?;
        let failed = ex.run(&Invocation::new("sh").args(["-c", "exit 3"]))?;
        assert!(ok.success());
        assert_eq!(failed.code, 3);
        let m = metrics::snapshot();
        assert_eq!(m.commands_run, 2);
        assert_eq!(m.command_failures, 1);
        assert_eq!(m.command_failure_ratio(), 0.5);
    }

    metrics::reset();
    let z = metrics::snapshot();
    assert_eq!(z.transfers_total(), 0);
    assert_eq!(z.command_failure_ratio(), 0.0);
    Ok(())
}

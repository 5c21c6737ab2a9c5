use anyhow::Result;

use snapwarden::{send_recv, Config, Endpoint, Outcome, SendRecv};

use crate::util::{lock_datasets, print_json};

pub struct Args {
    pub send: String,
    pub recv: String,
    pub send_host: Option<String>,
    pub recv_host: Option<String>,
    pub if_changed: bool,
    pub reuse_latest: bool,
    pub tag: char,
    pub allow_diverged_base: bool,
    pub json: bool,
}

pub fn exec(cfg: &Config, a: Args) -> Result<()> {
    let req = SendRecv::new(Endpoint::new(a.send, a.send_host), Endpoint::new(a.recv, a.recv_host))
        .with_if_changed(a.if_changed)
        .with_reuse_latest_send(a.reuse_latest)
        .with_tag(a.tag)
        .with_allow_diverged_base(a.allow_diverged_base || cfg.allow_diverged_base);

    let _locks = lock_datasets(cfg, &[req.send.dataset.as_str(), req.recv.dataset.as_str()])?;
    let outcome = send_recv(&cfg.zfs(), &req)?;

    if a.json {
        return print_json(&outcome);
    }
    match &outcome {
        Outcome::Unchanged { base } => {
            println!("{} -> {}: up to date at {}", req.send, req.recv, base);
        }
        Outcome::Transferred { snapshot, base: Some(b) } => {
            println!("{} -> {}: sent {} (incremental from {})", req.send, req.recv, snapshot, b);
        }
        Outcome::Transferred { snapshot, base: None } => {
            println!("{} -> {}: sent {} (full)", req.send, req.recv, snapshot);
        }
    }
    Ok(())
}

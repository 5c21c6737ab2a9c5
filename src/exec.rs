//! Command execution boundary.
//!
//! Everything that touches the host goes through [`Executor`]: a single
//! command (`run`) or a producer|consumer pipe (`pipe`). An [`Invocation`]
//! carries an argv and an optional remote host; the executor decides how the
//! remote hop is made. The storage logic above never spawns processes
//! directly, which keeps it testable with an in-memory executor.
//!
//! Non-zero exits are data ([`CmdOutput::code`]), not errors. Only a failure
//! to start a process is reported as [`Error::Spawn`].

use log::{debug, warn};
use std::fmt;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;

use crate::error::{Error, Result};
use crate::metrics::record_command;

/// One command, optionally executed on a remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub host: Option<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            host: None,
        }
    }

    pub fn arg(mut self, a: impl Into<String>) -> Self {
        self.args.push(a.into());
        self
    }

    pub fn args<I, S>(mut self, it: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(it.into_iter().map(Into::into));
        self
    }

    /// Route the command through a remote shell when `host` is set.
    pub fn on_host(mut self, host: Option<&str>) -> Self {
        self.host = host.map(str::to_string);
        self
    }

    pub fn is_remote(&self) -> bool {
        self.host.is_some()
    }

    /// Shell-quoted `program args...`, without any remote prefix.
    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|s| shell_quote(s))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            Some(h) => write!(f, "ssh {} {}", shell_quote(h), self.command_line()),
            None => f.write_str(&self.command_line()),
        }
    }
}

/// Captured result of one process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmdOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CmdOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Result of a producer|consumer pipe. Producer stdout is consumed by the pipe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipeOutput {
    pub send: CmdOutput,
    pub recv: CmdOutput,
}

impl PipeOutput {
    /// Both sides must exit 0 (pipefail).
    pub fn success(&self) -> bool {
        self.send.success() && self.recv.success()
    }

    /// First non-zero exit code, producer first.
    pub fn code(&self) -> i32 {
        if !self.send.success() {
            self.send.code
        } else {
            self.recv.code
        }
    }

    /// Combined stderr of both sides, labelled.
    pub fn stderr(&self) -> String {
        let mut out = String::new();
        for (label, side) in [("send", &self.send), ("recv", &self.recv)] {
            let s = side.stderr.trim();
            if !s.is_empty() {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(label);
                out.push_str(": ");
                out.push_str(s);
            }
        }
        out
    }
}

pub trait Executor {
    fn run(&self, inv: &Invocation) -> Result<CmdOutput>;
    fn pipe(&self, producer: &Invocation, consumer: &Invocation) -> Result<PipeOutput>;
}

/// Real executor based on `std::process`, remote hops via ssh.
#[derive(Debug, Clone)]
pub struct SystemExecutor {
    ssh_bin: String,
    ssh_options: Vec<String>,
}

impl Default for SystemExecutor {
    fn default() -> Self {
        Self::new("ssh", Vec::new())
    }
}

impl SystemExecutor {
    pub fn new(ssh_bin: impl Into<String>, ssh_options: Vec<String>) -> Self {
        Self {
            ssh_bin: ssh_bin.into(),
            ssh_options,
        }
    }

    /// Build the local `Command` for an invocation.
    /// Remote: `ssh [opts] host '<quoted command line>'`.
    fn command(&self, inv: &Invocation) -> Command {
        match &inv.host {
            None => {
                let mut c = Command::new(&inv.program);
                c.args(&inv.args);
                c
            }
            Some(host) => {
                let mut c = Command::new(&self.ssh_bin);
                c.args(&self.ssh_options).arg(host).arg(inv.command_line());
                c
            }
        }
    }

    fn spawn_program(&self, inv: &Invocation) -> String {
        if inv.is_remote() {
            self.ssh_bin.clone()
        } else {
            inv.program.clone()
        }
    }
}

impl Executor for SystemExecutor {
    fn run(&self, inv: &Invocation) -> Result<CmdOutput> {
        debug!("exec: {}", inv);
        let out = self
            .command(inv)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| Error::Spawn {
                program: self.spawn_program(inv),
                source,
            })?;

        let res = CmdOutput {
            code: out.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        };
        record_command(res.success());
        if !res.success() {
            warn!("exec: '{}' exited with {}: {}", inv, res.code, res.stderr.trim());
        }
        Ok(res)
    }

    fn pipe(&self, producer: &Invocation, consumer: &Invocation) -> Result<PipeOutput> {
        debug!("pipe: {} | {}", producer, consumer);

        let mut send = self
            .command(producer)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                program: self.spawn_program(producer),
                source,
            })?;

        // Drain producer stderr on the side so a chatty producer cannot block.
        let send_err = drain_stderr(&mut send);

        let stream = match send.stdout.take() {
            Some(s) => s,
            None => {
                let _ = send.kill();
                let _ = send.wait();
                return Err(Error::Spawn {
                    program: self.spawn_program(producer),
                    source: std::io::Error::new(
                        std::io::ErrorKind::Other,
                        "producer stdout not captured",
                    ),
                });
            }
        };

        let recv = self
            .command(consumer)
            .stdin(Stdio::from(stream))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let recv = match recv {
            Ok(c) => c,
            Err(source) => {
                let _ = send.kill();
                let _ = send.wait();
                return Err(Error::Spawn {
                    program: self.spawn_program(consumer),
                    source,
                });
            }
        };

        let recv_out = recv.wait_with_output().map_err(|source| Error::Spawn {
            program: self.spawn_program(consumer),
            source,
        })?;
        let send_status = send.wait().map_err(|source| Error::Spawn {
            program: self.spawn_program(producer),
            source,
        })?;
        let send_stderr = send_err.join().unwrap_or_default();

        let res = PipeOutput {
            send: CmdOutput {
                code: send_status.code().unwrap_or(-1),
                stdout: String::new(),
                stderr: send_stderr,
            },
            recv: CmdOutput {
                code: recv_out.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&recv_out.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&recv_out.stderr).into_owned(),
            },
        };
        record_command(res.send.success());
        record_command(res.recv.success());
        if !res.success() {
            warn!("pipe: '{} | {}' failed: {}", producer, consumer, res.stderr());
        }
        Ok(res)
    }
}

fn drain_stderr(child: &mut Child) -> thread::JoinHandle<String> {
    let pipe = child.stderr.take();
    thread::spawn(move || {
        let mut s = String::new();
        if let Some(mut p) = pipe {
            let mut buf = Vec::new();
            if p.read_to_end(&mut buf).is_ok() {
                s = String::from_utf8_lossy(&buf).into_owned();
            }
        }
        s
    })
}

/// Quote a word for a POSIX shell; plain words are left untouched.
pub fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s.chars().all(|c| {
            c.is_ascii_alphanumeric()
                || matches!(c, '_' | '-' | '.' | '/' | '@' | ':' | ',' | '+' | '=' | '%')
        });
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

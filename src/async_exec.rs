//! Short-lived, per-host one-shot command execution for `:async` jobs.
//!
//! Bypasses the broker and the sentinel protocol entirely: each host gets a
//! fresh dial and a fresh exec channel, run once, in parallel.

use std::io::Read;
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::thread;

use log::warn;

use crate::demux::{emit_system, ProxyWriter};
use crate::dial;
use crate::host::{Host, OutputEvent};
use crate::jobs::Manager;

/// Spawns one thread per host running `command` via a fresh session, marking
/// the job's per-host status on completion. Does not block the caller.
pub fn run_async(
    jobs: Arc<Manager>,
    job_id: u64,
    command: String,
    hosts: Vec<Arc<Host>>,
    events: SyncSender<OutputEvent>,
    known_hosts: Option<std::path::PathBuf>,
) {
    for host in hosts {
        let jobs = Arc::clone(&jobs);
        let command = command.clone();
        let events = events.clone();
        let known_hosts = known_hosts.clone();
        let display_name = host.display_name.clone();
        thread::Builder::new()
            .name(format!("async-{}-{job_id}", display_name))
            .spawn(move || run_one(&jobs, job_id, &command, &host, &events, known_hosts.as_deref()))
            .unwrap_or_else(|err| {
                warn!("failed to spawn async thread for {}: {err}", display_name);
                thread::spawn(|| {})
            });
    }
}

fn run_one(
    jobs: &Manager,
    job_id: u64,
    command: &str,
    host: &Host,
    events: &SyncSender<OutputEvent>,
    known_hosts: Option<&std::path::Path>,
) {
    let (exit_code, success) = match execute(command, host, events, known_hosts) {
        Ok(code) => (code, code == 0),
        Err(err) => {
            emit_system(Some(events), &host.display_name, format!("async exec failed: {err}"));
            (1, false)
        }
    };
    jobs.mark_host_done(job_id, &host.display_name, exit_code, success);
}

fn execute(
    command: &str,
    host: &Host,
    events: &SyncSender<OutputEvent>,
    known_hosts: Option<&std::path::Path>,
) -> anyhow::Result<i32> {
    let session = dial::dial(&host.resolved, &host.proxy_chain, known_hosts)?;
    let mut channel = session.channel_session()?;
    channel.exec(command)?;

    let mut stdout_writer = ProxyWriter::new(Some(events.clone()), host.display_name.clone(), false);
    let mut stderr_writer = ProxyWriter::new(Some(events.clone()), host.display_name.clone(), true);

    let mut buf = [0u8; 8192];
    loop {
        match channel.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                use std::io::Write as _;
                let _ = stdout_writer.write_all(&buf[..n]);
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(e) => return Err(e.into()),
        }
    }
    let mut stderr = channel.stderr();
    loop {
        match stderr.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                use std::io::Write as _;
                let _ = stderr_writer.write_all(&buf[..n]);
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(_) => break,
        }
    }

    channel.wait_close()?;
    Ok(channel.exit_status()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobType;
    use crate::sshconfig::ResolvedHost;
    use std::sync::mpsc::sync_channel;

    #[test]
    fn dial_failure_marks_host_failed() {
        let resolved = ResolvedHost {
            alias: "h1".into(),
            host: "203.0.113.1".into(),
            port: 22,
            user: "nobody".into(),
            identity_files: Vec::new(),
            proxy_jump: Vec::new(),
        };
        let host = Host::new(resolved, Vec::new(), 0);

        let jobs = Arc::new(Manager::new());
        let job_id = jobs.create_job(JobType::Async, "uptime".into(), &[host.display_name.clone()]);
        let (tx, _rx) = sync_channel(8);

        run_one(&jobs, job_id, "uptime", &host, &tx, None);

        let job = jobs.job(job_id).unwrap();
        let status = &job.hosts[&host.display_name];
        assert_eq!(status.exit_code, 1);
        assert_eq!(status.state, crate::jobs::HostState::Failed);
    }
}

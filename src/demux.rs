//! Assembles arbitrary byte chunks into lines and emits [`OutputEvent`]s.
//!
//! One demuxer is owned by exactly one session direction (stdout or stderr)
//! for the life of a worker; its `job_id` is retagged before each request is
//! written rather than being reconstructed per job.

use std::io::{self, Write};
use std::sync::mpsc::SyncSender;

use crate::host::OutputEvent;

/// Line-oriented demultiplexer: buffers bytes, emits one [`OutputEvent`] per
/// complete line, and preserves any trailing partial line across writes.
#[derive(Debug)]
pub struct ProxyWriter {
    events: Option<SyncSender<OutputEvent>>,
    hostname: String,
    job_id: u64,
    system: bool,
    buf: Vec<u8>,
}

impl ProxyWriter {
    /// Creates a demuxer for `hostname`. `system` is fixed for the lifetime
    /// of this writer (set for stderr, clear for stdout).
    pub fn new(events: Option<SyncSender<OutputEvent>>, hostname: impl Into<String>, system: bool) -> Self {
        Self { events, hostname: hostname.into(), job_id: 0, system, buf: Vec::new() }
    }

    /// Retags subsequent output as belonging to `job_id`.
    pub fn set_job_id(&mut self, job_id: u64) {
        self.job_id = job_id;
    }
}

impl Write for ProxyWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line_bytes: Vec<u8> = self.buf.drain(..=pos).collect();
            line_bytes.pop(); // drop '\n'
            if line_bytes.last() == Some(&b'\r') {
                line_bytes.pop();
            }
            let line = String::from_utf8_lossy(&line_bytes).into_owned();

            if let Some(sender) = &self.events {
                // A full channel means the UI is behind; block rather than
                // drop, per the spec's backpressure policy.
                let _ = sender.send(OutputEvent {
                    job_id: self.job_id,
                    hostname: self.hostname.clone(),
                    line,
                    system: self.system,
                });
            }
        }

        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Emits a system diagnostic line, falling back to stderr println when there
/// is no event channel to route through (e.g. headless early startup).
pub fn emit_system(events: Option<&SyncSender<OutputEvent>>, hostname: &str, line: impl Into<String>) {
    let line = line.into();
    match events {
        Some(sender) => {
            let _ = sender.send(OutputEvent { job_id: 0, hostname: hostname.to_string(), line, system: true });
        }
        None => eprintln!("{line}"),
    }
}

//! Runtime host state shared between the broker, workers, and UI.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};

use crate::sshconfig::ResolvedHost;

/// A single request delivered to a host's worker.
#[derive(Debug, Clone)]
pub enum CommandRequest {
    /// Run a command; `command` is already sentinel-wrapped for Normal jobs.
    Run { job_id: u64, command: String },
    /// Inject a single raw byte into the session's stdin (e.g. 0x03, 0x1a).
    Control { byte: u8 },
}

/// One line of output (or a system diagnostic) attributed to a host and job.
#[derive(Debug, Clone)]
pub struct OutputEvent {
    /// Job the line belongs to (0 for pre-job diagnostics).
    pub job_id: u64,
    /// Originating host's display name.
    pub hostname: String,
    /// The line, newline and trailing `\r` already stripped.
    pub line: String,
    /// True for broker diagnostics and stderr chunks.
    pub system: bool,
}

/// Long-lived per-host runtime state, constructed once before the broker starts.
#[derive(Debug)]
pub struct Host {
    /// Display name shown in the UI (`user@host:port` form).
    pub display_name: String,
    /// Resolved dial target and credentials.
    pub resolved: ResolvedHost,
    /// Proxy-jump chain, each already resolved.
    pub proxy_chain: Vec<ResolvedHost>,
    /// Assigned UI colour index.
    pub color: usize,
    is_connected: AtomicU32,
    is_waiting: AtomicU32,
    current_job: AtomicU64,
    /// Sender half of this host's inbound request queue (unbuffered: a
    /// rendezvous channel, mirroring the original's unbuffered goroutine
    /// channel semantics).
    pub sender: SyncSender<CommandRequest>,
    receiver: std::sync::Mutex<Option<Receiver<CommandRequest>>>,
}

impl Host {
    /// Builds a runtime host from its resolved config, assigning `color`.
    pub fn new(resolved: ResolvedHost, proxy_chain: Vec<ResolvedHost>, color: usize) -> Self {
        let display_name = format!("{}@{}:{}", resolved.user, resolved.host, resolved.port);
        let (sender, receiver) = mpsc::sync_channel(0);
        Self {
            display_name,
            resolved,
            proxy_chain,
            color,
            is_connected: AtomicU32::new(0),
            is_waiting: AtomicU32::new(0),
            current_job: AtomicU64::new(0),
            sender,
            receiver: std::sync::Mutex::new(Some(receiver)),
        }
    }

    /// Takes ownership of the receiver half; callable exactly once (by the worker).
    pub fn take_receiver(&self) -> Option<Receiver<CommandRequest>> {
        self.receiver.lock().expect("host receiver mutex poisoned").take()
    }

    /// Whether the worker currently has an open session.
    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::SeqCst) == 1
    }

    /// Sets the connected flag.
    pub fn set_connected(&self, connected: bool) {
        self.is_connected.store(connected as u32, Ordering::SeqCst);
    }

    /// Whether the worker is currently blocked writing a request to stdin.
    pub fn is_waiting(&self) -> bool {
        self.is_waiting.load(Ordering::SeqCst) == 1
    }

    /// Sets the waiting flag.
    pub fn set_waiting(&self, waiting: bool) {
        self.is_waiting.store(waiting as u32, Ordering::SeqCst);
    }

    /// The job id output should currently be attributed to.
    pub fn current_job_id(&self) -> u64 {
        self.current_job.load(Ordering::SeqCst)
    }

    /// Retags subsequent output as belonging to `job_id`.
    pub fn set_current_job(&self, job_id: u64) {
        self.current_job.store(job_id, Ordering::SeqCst);
    }
}

/// A fixed round-robin colour palette, doubled until it covers every host,
/// matching the original tool's per-host colour assignment.
pub const COLOR_PALETTE_LEN: usize = 15;

/// Returns the palette index assigned to the `position`-th host.
pub fn color_for_position(position: usize) -> usize {
    position % COLOR_PALETTE_LEN
}

/// Computes the bounded event-channel capacity: `128 + 16 * host_count`.
pub fn event_channel_capacity(host_count: usize) -> usize {
    128 + 16 * host_count
}

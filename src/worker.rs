//! One long-lived thread per host, owning its shell session's stdin, plus a
//! paired reader thread pumping stdout/stderr through the line demuxer.

use std::io::{Read, Write as _};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{info, warn};

use crate::demux::{emit_system, ProxyWriter};
use crate::dial;
use crate::host::{CommandRequest, Host, OutputEvent};

/// Handle to a spawned worker thread; joins on drop, matching the teacher's
/// worker-thread lifecycle pattern.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Spawns the worker thread for `host`. The host's channel is consumed here;
/// `events` receives output and system diagnostics.
pub fn spawn(host: Arc<Host>, events: SyncSender<OutputEvent>, known_hosts: Option<std::path::PathBuf>) -> WorkerHandle {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = Arc::clone(&shutdown);

    let join_handle = thread::Builder::new()
        .name(format!("worker-{}", host.display_name))
        .spawn(move || worker_loop(host, events, known_hosts.as_deref(), &shutdown_clone))
        .expect("failed to spawn worker thread");

    WorkerHandle { shutdown, join_handle: Some(join_handle) }
}

fn worker_loop(host: Arc<Host>, events: SyncSender<OutputEvent>, known_hosts: Option<&std::path::Path>, shutdown: &AtomicBool) {
    let Some(receiver) = host.take_receiver() else {
        warn!("worker for {} started with no receiver (already taken)", host.display_name);
        return;
    };

    let session = match dial::dial(&host.resolved, &host.proxy_chain, known_hosts) {
        Ok(session) => session,
        Err(err) => {
            emit_system(Some(&events), &host.display_name, format!("dial failed: {err}"));
            return;
        }
    };

    let mut channel = match dial::open_shell(&session) {
        Ok(channel) => channel,
        Err(err) => {
            emit_system(Some(&events), &host.display_name, format!("session failed: {err}"));
            return;
        }
    };
    channel.handle_extended_data(ssh2::ExtendedData::Normal).ok();
    session.set_blocking(false);
    host.set_connected(true);
    info!("worker connected: {}", host.display_name);

    let channel = Arc::new(Mutex::new(channel));
    let reader_shutdown = Arc::new(AtomicBool::new(false));
    let reader = spawn_reader(
        Arc::clone(&channel),
        Arc::clone(&host),
        events.clone(),
        Arc::clone(&reader_shutdown),
    );

    for request in receiver.iter() {
        if shutdown.load(Ordering::SeqCst) || !host.is_connected() {
            break;
        }

        host.set_waiting(true);
        let write_result = {
            let mut guard = channel.lock().expect("worker channel mutex poisoned");
            match &request {
                CommandRequest::Run { job_id, command } => {
                    host.set_current_job(*job_id);
                    dial::write_stdin(&mut guard, format!("{command}\n").as_bytes())
                }
                CommandRequest::Control { byte } => {
                    if *byte == 0 {
                        Ok(())
                    } else {
                        dial::write_stdin(&mut guard, &[*byte])
                    }
                }
            }
        };
        host.set_waiting(false);

        if let Err(err) = write_result {
            emit_system(Some(&events), &host.display_name, format!("stdin write failed: {err}"));
            host.set_connected(false);
            break;
        }
    }

    reader_shutdown.store(true, Ordering::SeqCst);
    let _ = reader.join();
}

/// Background thread copying the session's stdout/stderr into line demuxers,
/// retagging them with whichever job is currently attributed via `host`.
///
/// Job attribution for output is approximate by construction: output is
/// tagged with the job most recently dispatched to this host, matching the
/// source's persistent-demuxer-retag behavior (see `ProxyWriter`).
fn spawn_reader(
    channel: Arc<Mutex<ssh2::Channel>>,
    host: Arc<Host>,
    events: SyncSender<OutputEvent>,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name(format!("reader-{}", host.display_name))
        .spawn(move || {
            let mut stdout_writer = ProxyWriter::new(Some(events.clone()), host.display_name.clone(), false);
            let mut stderr_writer = ProxyWriter::new(Some(events.clone()), host.display_name.clone(), true);
            let mut buf = [0u8; 8192];

            while !shutdown.load(Ordering::SeqCst) {
                let mut progressed = false;
                {
                    let mut guard = channel.lock().expect("worker channel mutex poisoned");
                    stdout_writer.set_job_id(host.current_job_id());
                    stderr_writer.set_job_id(host.current_job_id());

                    match guard.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            let _ = stdout_writer.write_all(&buf[..n]);
                            progressed = true;
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                        Err(_) => break,
                    }
                    match guard.stderr().read(&mut buf) {
                        Ok(0) => {}
                        Ok(n) => {
                            let _ = stderr_writer.write_all(&buf[..n]);
                            progressed = true;
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                        Err(_) => {}
                    }
                    if guard.eof() {
                        break;
                    }
                }
                if !progressed {
                    thread::sleep(Duration::from_millis(10));
                }
            }
            host.set_connected(false);
        })
        .expect("failed to spawn reader thread")
}

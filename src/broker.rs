//! Fans out one shared input stream of requests to every connected worker.

use std::sync::mpsc::Receiver;
use std::sync::Arc;

use crate::host::{CommandRequest, Host};

/// Reads requests from `input` and forwards each to every host whose
/// `is_connected` flag is set at the instant of its per-host send. Hosts are
/// visited sequentially and the send blocks on each host's unbuffered
/// channel before moving to the next, matching the spec's fan-out ordering.
///
/// Workers must already be spawned against `hosts` before calling this; the
/// broker itself only dispatches, it does not own connection lifecycles.
pub fn run(hosts: &[Arc<Host>], input: &Receiver<CommandRequest>) {
    for request in input.iter() {
        for host in hosts {
            if !host.is_connected() {
                continue;
            }
            // A disconnect that races with this send is simply a best-effort
            // delivery to a worker that is about to stop reading; the worker
            // drains its receiver before exiting.
            let _ = host.sender.send(request.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sshconfig::ResolvedHost;
    use std::sync::mpsc::sync_channel;
    use std::thread;

    fn test_host(alias: &str) -> Arc<Host> {
        let resolved = ResolvedHost {
            alias: alias.to_string(),
            host: alias.to_string(),
            port: 22,
            user: "u".into(),
            identity_files: Vec::new(),
            proxy_jump: Vec::new(),
        };
        Arc::new(Host::new(resolved, Vec::new(), 0))
    }

    #[test]
    fn property_skips_disconnected_hosts() {
        let connected = test_host("connected");
        connected.set_connected(true);
        let disconnected = test_host("disconnected");
        // disconnected stays false

        let hosts = vec![Arc::clone(&connected), Arc::clone(&disconnected)];
        let (input_tx, input_rx) = sync_channel::<CommandRequest>(1);

        let connected_recv = connected.take_receiver().unwrap();
        let _disconnected_recv = disconnected.take_receiver().unwrap();

        let broker = thread::spawn(move || run(&hosts, &input_rx));

        input_tx
            .send(CommandRequest::Run { job_id: 1, command: "echo hi".into() })
            .unwrap();

        let received = connected_recv.recv_timeout(std::time::Duration::from_secs(1)).unwrap();
        matches!(received, CommandRequest::Run { job_id: 1, .. });

        drop(input_tx);
        broker.join().unwrap();
    }

    #[test]
    fn no_host_receives_when_none_connected() {
        let host = test_host("h");
        let receiver = host.take_receiver().unwrap();
        let hosts = vec![host];
        let (input_tx, input_rx) = sync_channel::<CommandRequest>(1);

        let broker = thread::spawn(move || run(&hosts, &input_rx));
        input_tx.send(CommandRequest::Control { byte: 3 }).unwrap();
        drop(input_tx);
        broker.join().unwrap();

        assert!(receiver.try_recv().is_err());
    }
}

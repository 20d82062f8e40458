//! TCP dialing and SSH handshake, including proxy-jump tunnelling.
//!
//! This is the "treated as a library" boundary named in the spec: a thin
//! wrapper over `ssh2`'s blocking `Session`/`Channel` API providing the
//! `Dial`/`Session.Shell`/`Session.Run`/`StdinPipe` semantics the core needs.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use ssh2::Session;

use crate::sshconfig::ResolvedHost;

const DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Dials `target`, tunnelling through `jumps` in order when non-empty, and
/// authenticates. Returns a handshaked, authenticated session.
pub fn dial(target: &ResolvedHost, jumps: &[ResolvedHost], known_hosts: Option<&std::path::Path>) -> Result<Session> {
    if jumps.is_empty() {
        let stream = TcpStream::connect_timeout(&resolve_addr(target)?, DIAL_TIMEOUT)
            .with_context(|| format!("tcp connect to {}:{}", target.host, target.port))?;
        return handshake(stream, target, known_hosts);
    }

    let mut session = dial(&jumps[0], &[], known_hosts)?;
    for next in jumps[1..].iter().chain(std::iter::once(target)) {
        let forwarded = forward_local(session, &next.host, next.port)?;
        let stream = TcpStream::connect_timeout(&forwarded, DIAL_TIMEOUT)
            .context("tcp connect to forwarded local port")?;
        session = handshake(stream, next, known_hosts)?;
    }
    Ok(session)
}

fn resolve_addr(host: &ResolvedHost) -> Result<std::net::SocketAddr> {
    use std::net::ToSocketAddrs;
    (host.host.as_str(), host.port)
        .to_socket_addrs()
        .with_context(|| format!("resolve address for {}", host.host))?
        .next()
        .ok_or_else(|| anyhow!("no addresses for {}", host.host))
}

fn handshake(stream: TcpStream, target: &ResolvedHost, known_hosts: Option<&std::path::Path>) -> Result<Session> {
    let mut session = Session::new().context("create ssh session")?;
    session.set_tcp_stream(stream);
    session.handshake().context("ssh handshake")?;

    verify_host_key(&session, target, known_hosts)?;
    authenticate(&session, target)?;

    Ok(session)
}

fn verify_host_key(session: &Session, target: &ResolvedHost, known_hosts: Option<&std::path::Path>) -> Result<()> {
    let Some(path) = known_hosts.map(std::path::Path::to_path_buf).or_else(default_known_hosts) else {
        // No known_hosts file resolvable anywhere: insecure-accept fallback.
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }
    let mut hosts = session.known_hosts().context("load known_hosts support")?;
    let _ = hosts.read_file(&path, ssh2::KnownHostFileKind::OpenSSH);
    let Some((key, _key_type)) = session.host_key() else {
        return Ok(());
    };
    match hosts.check(&target.host, key) {
        ssh2::CheckResult::Mismatch => Err(anyhow!("host key mismatch for {}", target.host)),
        _ => Ok(()),
    }
}

fn default_known_hosts() -> Option<std::path::PathBuf> {
    dirs::home_dir().map(|h| h.join(".ssh").join("known_hosts"))
}

fn authenticate(session: &Session, target: &ResolvedHost) -> Result<()> {
    if std::env::var_os("SSH_AUTH_SOCK").is_some() && session.userauth_agent(&target.user).is_ok() {
        return Ok(());
    }
    for identity in &target.identity_files {
        if session.userauth_pubkey_file(&target.user, None, identity, None).is_ok() {
            return Ok(());
        }
    }
    Err(anyhow!("no authentication method succeeded for {}", target.alias))
}

/// Opens a direct-tcpip channel through `session` to `(host, port)`, pumps it
/// to a freshly bound loopback listener in a background thread, and returns
/// the loopback address to dial for the next hop.
///
/// The channel is shared under a mutex and polled non-blocking from one
/// thread, since `ssh2::Channel` offers no owned read/write split.
fn forward_local(session: Session, host: &str, port: u16) -> Result<std::net::SocketAddr> {
    let listener = TcpListener::bind(("127.0.0.1", 0)).context("bind local forward listener")?;
    let local_addr = listener.local_addr()?;

    session.set_blocking(false);
    let channel = session
        .channel_direct_tcpip(host, port, None)
        .with_context(|| format!("open direct-tcpip channel to {host}:{port}"))?;
    let channel = Arc::new(Mutex::new(channel));

    // Keep `session` alive for the life of the forward; `ssh2::Channel` keeps
    // an internal reference-counted handle to its owning session.
    thread::spawn(move || {
        let _session = session;
        let Ok((mut local, _)) = listener.accept() else { return };
        local.set_nonblocking(true).ok();
        let mut buf = [0u8; 8192];
        loop {
            let mut progressed = false;

            match channel.lock().expect("forward channel mutex poisoned").read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if local.write_all(&buf[..n]).is_err() {
                        break;
                    }
                    progressed = true;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(_) => break,
            }

            match local.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if channel.lock().expect("forward channel mutex poisoned").write_all(&buf[..n]).is_err() {
                        break;
                    }
                    progressed = true;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(_) => break,
            }

            if !progressed {
                thread::sleep(Duration::from_millis(5));
            }
        }
    });

    Ok(local_addr)
}

/// Opens a shell channel on an already-authenticated session.
pub fn open_shell(session: &Session) -> Result<ssh2::Channel> {
    let mut channel = session.channel_session().context("open channel")?;
    channel.shell().context("request shell")?;
    Ok(channel)
}

/// Writes `data` to the channel's stdin.
pub fn write_stdin(channel: &mut ssh2::Channel, data: &[u8]) -> Result<()> {
    channel.write_all(data).context("write to remote stdin")?;
    channel.flush().context("flush remote stdin")?;
    Ok(())
}

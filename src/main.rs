//! Entry point: wires CLI parsing, config, host resolution, workers, the
//! broker, and the interactive UI together.

mod async_exec;
mod broker;
mod cli;
mod config;
mod demux;
mod dial;
mod errors;
mod fleet;
mod history;
mod host;
mod hostspec;
mod interactive;
mod jobs;
mod outputbuf;
mod sentinel;
mod sshconfig;
mod status;
mod tui;
mod worker;
mod wrap;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use crossterm::event::{DisableMouseCapture, PopKeyboardEnhancementFlags};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, LeaveAlternateScreen};
use mimalloc::MiMalloc;

use cli::Cli;
use config::Config;
use host::{event_channel_capacity, Host};
use jobs::Manager;
use sshconfig::SshConfig;

/// mimalloc gives better multi-threaded performance than the system
/// allocator, which matters here given the per-host worker thread fan-out.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Flag flipped by signal handlers; polled by the UI loop each frame.
static SHUTDOWN_FLAG: std::sync::LazyLock<Arc<AtomicBool>> =
    std::sync::LazyLock::new(|| Arc::new(AtomicBool::new(false)));

fn main() -> anyhow::Result<()> {
    init_logging()?;
    install_panic_hook();
    install_signal_handlers()?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref())?;

    if let Err(err) = run(&cli, &config) {
        log::error!("fatal: {err}");
        eprintln!("fleetsh: {err}");
        std::process::exit(1);
    }
    Ok(())
}

fn run(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    let specs = cli::collect_host_specs(cli, config)?;

    let user_config = SshConfig::load(&dirs::home_dir().unwrap_or_default().join(".ssh/config"))?;
    let system_config = SshConfig::load(&PathBuf::from("/etc/ssh/ssh_config"))?;

    let hosts: Vec<Arc<Host>> = fleet::build_hosts(
        &specs,
        user_config.as_ref(),
        system_config.as_ref(),
        config.username.as_deref(),
    )?;

    let known_hosts = config.known_hosts.clone();
    let (input_tx, input_rx) = std::sync::mpsc::sync_channel(0);
    let capacity = event_channel_capacity(hosts.len());
    let (events_tx, events_rx) = std::sync::mpsc::sync_channel(capacity);

    let mut worker_handles = Vec::with_capacity(hosts.len());
    for host in &hosts {
        worker_handles.push(worker::spawn(Arc::clone(host), events_tx.clone(), known_hosts.clone()));
    }

    let broker_hosts = hosts.clone();
    let broker_handle = std::thread::Builder::new()
        .name("broker".to_string())
        .spawn(move || broker::run(&broker_hosts, &input_rx))
        .expect("failed to spawn broker thread");

    let jobs = Arc::new(Manager::new());
    let prompt = config.prompt_or_default().to_string();
    let history_path = config.history_file_path();

    let result = tui::run(
        hosts,
        jobs,
        input_tx,
        events_rx,
        events_tx,
        prompt,
        history_path,
        known_hosts,
        Arc::clone(&SHUTDOWN_FLAG),
    );

    SHUTDOWN_FLAG.store(true, Ordering::SeqCst);
    let _ = broker_handle.join(); // exits once input_tx, dropped by tui::run's return, closes its channel
    worker_handles.clear(); // each handle joins its worker thread on drop

    result
}

fn init_logging() -> anyhow::Result<()> {
    let log_dir = Config::log_dir();
    std::fs::create_dir_all(&log_dir).ok();
    let log_path = std::env::var("FLEETSH_LOG_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| log_dir.join("fleetsh.log"));

    let log_file = std::fs::File::create(&log_path)
        .unwrap_or_else(|err| panic!("failed to create log file {}: {err}", log_path.display()));

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .format_timestamp_secs()
        .init();
    Ok(())
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        log::error!("PANIC: {panic_info:?}");
        let _ = disable_raw_mode();
        let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
        let _ = execute!(std::io::stdout(), LeaveAlternateScreen, DisableMouseCapture, crossterm::cursor::Show);
        default_hook(panic_info);
    }));
}

fn install_signal_handlers() -> anyhow::Result<()> {
    let flag = Arc::clone(&SHUTDOWN_FLAG);
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&flag))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&flag))?;
    signal_hook::flag::register(signal_hook::consts::SIGHUP, flag)?;
    Ok(())
}

//! Interactive terminal UI: prompt input, scrolling output viewport, and the
//! `:`-command dispatch loop.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, SyncSender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;
use tui_input::{Input, InputRequest};

use crate::async_exec;
use crate::host::{CommandRequest, Host, OutputEvent};
use crate::interactive::{self, Command};
use crate::jobs::{JobType, Manager};
use crate::outputbuf::OutputBuffer;
use crate::sentinel;
use crate::status;
use crate::wrap;
use crate::{history, history::HistoryState};

const CTRL_C_DOUBLE_TAP_WINDOW: Duration = Duration::from_millis(500);
const VIEWPORT_CAPACITY: usize = 5000;

/// One host's assigned display colour, resolved once for the lifetime of the
/// UI since the palette index never changes after startup.
fn palette_color(index: usize) -> Color {
    const PALETTE: [Color; 15] = [
        Color::Cyan,
        Color::Yellow,
        Color::Green,
        Color::Magenta,
        Color::Blue,
        Color::Red,
        Color::LightCyan,
        Color::LightYellow,
        Color::LightGreen,
        Color::LightMagenta,
        Color::LightBlue,
        Color::LightRed,
        Color::White,
        Color::Gray,
        Color::DarkGray,
    ];
    PALETTE[index % PALETTE.len()]
}

/// Everything the render loop needs, owned by the UI thread.
struct App {
    hosts: Vec<Arc<Host>>,
    jobs: Arc<Manager>,
    input: Input,
    history: HistoryState,
    history_path: PathBuf,
    viewport: OutputBuffer,
    prompt: String,
    last_ctrl_c: Option<Instant>,
    should_quit: bool,
}

impl App {
    fn host_color(&self, hostname: &str) -> Color {
        self.hosts
            .iter()
            .find(|h| h.display_name == hostname)
            .map(|h| palette_color(h.color))
            .unwrap_or(Color::White)
    }

    fn push_line(&mut self, hostname: &str, line: &str, system: bool) {
        let marker = if system { "!" } else { "|" };
        self.viewport.push(format!("{hostname} {marker} {line}"));
    }

    fn push_plain(&mut self, line: String) {
        self.viewport.push(line);
    }
}

/// Runs the interactive event loop until the user quits. `input_tx` feeds the
/// broker; `events_rx` delivers output and system diagnostics.
pub fn run(
    hosts: Vec<Arc<Host>>,
    jobs: Arc<Manager>,
    input_tx: SyncSender<CommandRequest>,
    events_rx: Receiver<OutputEvent>,
    events_tx: SyncSender<OutputEvent>,
    prompt: String,
    history_path: PathBuf,
    known_hosts: Option<PathBuf>,
    shutdown: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let history_entries = history::load_history(&history_path).unwrap_or_default();

    let mut terminal = setup_terminal()?;
    let mut app = App {
        hosts,
        jobs,
        input: Input::default(),
        history: HistoryState::new(history_entries),
        history_path,
        viewport: OutputBuffer::new(VIEWPORT_CAPACITY),
        prompt,
        last_ctrl_c: None,
        should_quit: false,
    };

    while !app.should_quit && !shutdown.load(Ordering::SeqCst) {
        drain_events(&mut app, &events_rx);
        terminal.draw(|frame| draw(frame, &app))?;
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(&mut app, key.code, key.modifiers, &input_tx, &events_tx, known_hosts.as_deref());
                }
            }
        }
    }

    teardown_terminal(&mut terminal)
}

fn drain_events(app: &mut App, events_rx: &Receiver<OutputEvent>) {
    while let Ok(event) = events_rx.try_recv() {
        if let Some((prefix, exit_code)) = try_sentinel_completion(app, &event) {
            if !prefix.is_empty() {
                app.push_line(&event.hostname, &prefix, event.system);
            }
            app.jobs.mark_host_done(event.job_id, &event.hostname, exit_code, exit_code == 0);
            continue;
        }
        app.push_line(&event.hostname, &event.line, event.system);
    }
}

fn try_sentinel_completion(app: &App, event: &OutputEvent) -> Option<(String, i32)> {
    let extracted = sentinel::extract_sentinel(&event.line)?;
    if extracted.job_id != event.job_id {
        return None;
    }
    let _ = app; // kept for symmetry with other dispatch helpers; no state needed here
    Some((extracted.prefix, extracted.exit_code))
}

fn handle_key(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    input_tx: &SyncSender<CommandRequest>,
    events_tx: &SyncSender<OutputEvent>,
    known_hosts: Option<&std::path::Path>,
) {
    if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
        let now = Instant::now();
        let double_tap = app.last_ctrl_c.is_some_and(|prev| now.duration_since(prev) < CTRL_C_DOUBLE_TAP_WINDOW);
        if double_tap {
            app.should_quit = true;
        } else {
            app.last_ctrl_c = Some(now);
            for host in &app.hosts {
                let _ = host.sender.send(CommandRequest::Control { byte: 0x03 });
            }
        }
        return;
    }
    if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('z') {
        for host in &app.hosts {
            let _ = host.sender.send(CommandRequest::Control { byte: 0x1a });
        }
        return;
    }

    match code {
        KeyCode::Enter => {
            let line = app.input.value().to_string();
            app.input.reset();
            if !line.trim().is_empty() {
                let _ = history::append_history(&app.history_path, &line);
                app.history.push(&line);
                dispatch(app, &line, input_tx, events_tx, known_hosts);
            }
        }
        KeyCode::Up => {
            if let Some(entry) = app.history.up(app.input.value()).map(str::to_string) {
                app.input = Input::new(entry);
            }
        }
        KeyCode::Down => {
            if let Some(entry) = app.history.down().map(str::to_string) {
                app.input = Input::new(entry);
            }
        }
        _ => {
            if let Some(request) = key_to_input_request(code) {
                app.input.handle(request);
            }
        }
    }
}

fn key_to_input_request(code: KeyCode) -> Option<InputRequest> {
    match code {
        KeyCode::Char(c) => Some(InputRequest::InsertChar(c)),
        KeyCode::Backspace => Some(InputRequest::DeletePrevChar),
        KeyCode::Delete => Some(InputRequest::DeleteNextChar),
        KeyCode::Left => Some(InputRequest::GoToPrevChar),
        KeyCode::Right => Some(InputRequest::GoToNextChar),
        KeyCode::Home => Some(InputRequest::GoToStart),
        KeyCode::End => Some(InputRequest::GoToEnd),
        _ => None,
    }
}

fn dispatch(
    app: &mut App,
    line: &str,
    input_tx: &SyncSender<CommandRequest>,
    events_tx: &SyncSender<OutputEvent>,
    known_hosts: Option<&std::path::Path>,
) {
    match interactive::parse_command(line) {
        Command::Exit => app.should_quit = true,
        Command::Help => app.push_plain(
            "commands: <text> run, :async <text>, :status [id], :list, :scroll, :help, :bye".to_string(),
        ),
        Command::Scroll => app.push_plain("scroll mode is handled by your terminal's scrollback".to_string()),
        Command::List => {
            let lines: Vec<String> = app
                .hosts
                .iter()
                .map(|host| {
                    let state = if host.is_connected() { "connected" } else { "disconnected" };
                    format!("{}: {}", host.display_name, state)
                })
                .collect();
            for line in lines {
                app.push_plain(line);
            }
        }
        Command::Status { job_id } => {
            for line in status::status_lines(&app.jobs, job_id, None) {
                app.push_plain(line);
            }
        }
        Command::Run { command } => {
            if command.is_empty() {
                return;
            }
            let names: Vec<String> = app.hosts.iter().filter(|h| h.is_connected()).map(|h| h.display_name.clone()).collect();
            if names.is_empty() {
                app.push_plain("no connected hosts".to_string());
                return;
            }
            let job_id = app.jobs.create_job(JobType::Normal, command.clone(), &names);
            let wrapped = wrap::wrap_command(&command, job_id);
            for host in &app.hosts {
                if host.is_connected() {
                    app.jobs.mark_host_running(job_id, &host.display_name);
                }
            }
            let _ = input_tx.send(CommandRequest::Run { job_id, command: wrapped });
        }
        Command::Async { command } => {
            if command.is_empty() {
                return;
            }
            let connected: Vec<Arc<Host>> = app.hosts.iter().filter(|h| h.is_connected()).cloned().collect();
            if connected.is_empty() {
                app.push_plain("no connected hosts".to_string());
                return;
            }
            let names: Vec<String> = connected.iter().map(|h| h.display_name.clone()).collect();
            let job_id = app.jobs.create_job(JobType::Async, command.clone(), &names);
            for host in &connected {
                app.jobs.mark_host_running(job_id, &host.display_name);
            }
            async_exec::run_async(
                Arc::clone(&app.jobs),
                job_id,
                command,
                connected,
                events_tx.clone(),
                known_hosts.map(std::path::Path::to_path_buf),
            );
        }
    }
}

fn draw(frame: &mut Frame, app: &App) {
    let layout = Layout::vertical([Constraint::Min(1), Constraint::Length(3)]).split(frame.area());

    let viewport_height = layout[0].height.saturating_sub(2) as usize;
    let lines = app.viewport.lines();
    let visible = lines.iter().rev().take(viewport_height).rev();
    let rendered: Vec<Line> = visible
        .map(|line| {
            if let Some((host, rest)) = line.split_once(' ') {
                Line::from(vec![
                    Span::styled(host.to_string(), Style::default().fg(app.host_color(host))),
                    Span::raw(format!(" {rest}")),
                ])
            } else {
                Line::from(line.to_string())
            }
        })
        .collect();
    frame.render_widget(Paragraph::new(rendered).block(Block::default().borders(Borders::ALL).title("output")), layout[0]);

    let input_line = Paragraph::new(app.input.value())
        .block(Block::default().borders(Borders::ALL).title(app.prompt.as_str()));
    frame.render_widget(input_line, layout[1]);
}

fn setup_terminal() -> anyhow::Result<ratatui::Terminal<ratatui::backend::CrosstermBackend<io::Stdout>>> {
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen, crossterm::event::EnableMouseCapture)?;
    Ok(ratatui::Terminal::new(ratatui::backend::CrosstermBackend::new(stdout))?)
}

fn teardown_terminal(terminal: &mut ratatui::Terminal<ratatui::backend::CrosstermBackend<io::Stdout>>) -> anyhow::Result<()> {
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::event::DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sshconfig::ResolvedHost;

    fn test_host(alias: &str, color: usize) -> Arc<Host> {
        let resolved = ResolvedHost {
            alias: alias.into(),
            host: alias.into(),
            port: 22,
            user: "u".into(),
            identity_files: Vec::new(),
            proxy_jump: Vec::new(),
        };
        Arc::new(Host::new(resolved, Vec::new(), color))
    }

    fn test_app(hosts: Vec<Arc<Host>>) -> App {
        App {
            hosts,
            jobs: Arc::new(Manager::new()),
            input: Input::default(),
            history: HistoryState::new(Vec::new()),
            history_path: std::env::temp_dir().join("fleetsh-tui-test-history"),
            viewport: OutputBuffer::new(100),
            prompt: "fleetsh> ".into(),
            last_ctrl_c: None,
            should_quit: false,
        }
    }

    #[test]
    fn sentinel_completion_extracts_prefix_and_exit_code() {
        let app = test_app(vec![test_host("h1", 0)]);
        let event = OutputEvent { job_id: 3, hostname: "h1".into(), line: "done__PRETTY_EXIT__3:0".into(), system: false };
        let (prefix, exit_code) = try_sentinel_completion(&app, &event).unwrap();
        assert_eq!(prefix, "done");
        assert_eq!(exit_code, 0);
    }

    #[test]
    fn sentinel_for_a_different_job_is_ignored() {
        let app = test_app(vec![test_host("h1", 0)]);
        let event = OutputEvent { job_id: 3, hostname: "h1".into(), line: "__PRETTY_EXIT__4:0".into(), system: false };
        assert!(try_sentinel_completion(&app, &event).is_none());
    }

    #[test]
    fn host_color_falls_back_to_white_for_unknown_host() {
        let app = test_app(vec![test_host("h1", 2)]);
        assert_eq!(app.host_color("unknown"), Color::White);
        assert_eq!(app.host_color("u@h1:22"), palette_color(2));
    }

    #[test]
    fn dispatch_run_with_no_connected_hosts_reports_and_does_not_panic() {
        let mut app = test_app(vec![test_host("h1", 0)]);
        let (tx, _rx) = std::sync::mpsc::sync_channel(1);
        let (etx, _erx) = std::sync::mpsc::sync_channel(1);
        dispatch(&mut app, "uptime", &tx, &etx, None);
        assert!(app.viewport.lines().iter().any(|l| l.contains("no connected hosts")));
    }
}

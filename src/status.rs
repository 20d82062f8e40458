//! Renders job state as the text shown by the `:status` and `:list` commands.

use std::time::Duration;

use crate::jobs::{HostState, HostStatus, Job, JobType, Manager};

/// Colorizes one rendered host-status line for `hostname`; returns it unchanged
/// when no colour is associated.
pub type Colorize<'a> = dyn Fn(&str, &str) -> String + 'a;

/// Renders `:status` output: a single job when `job_id` is given, otherwise
/// every retained Normal and Async job.
pub fn status_lines(manager: &Manager, job_id: Option<u64>, colorize: Option<&Colorize<'_>>) -> Vec<String> {
    if let Some(id) = job_id {
        return match manager.job(id) {
            Some(job) => format_job(&job, colorize),
            None => vec![format!("job {id} not found")],
        };
    }

    let mut lines = Vec::new();
    for job in manager.normal_jobs() {
        lines.extend(format_job(&job, colorize));
    }
    for job in manager.async_jobs() {
        lines.extend(format_job(&job, colorize));
    }
    if lines.is_empty() {
        lines.push("no jobs recorded".to_string());
    }
    lines
}

fn format_job(job: &Job, colorize: Option<&Colorize<'_>>) -> Vec<String> {
    let type_label = match job.job_type {
        JobType::Normal => "normal",
        JobType::Async => "async",
    };
    let mut lines = vec![format!("job {} [{}] {}", job.id, type_label, job.command)];
    for host in &job.hosts_order {
        if let Some(status) = job.hosts.get(host) {
            lines.push(format_host_status(status, colorize));
        }
    }
    lines
}

fn format_host_status(status: &HostStatus, colorize: Option<&Colorize<'_>>) -> String {
    let state_label = match status.state {
        HostState::Queued => "queued",
        HostState::Running => "running",
        HostState::Succeeded => "succeeded",
        HostState::Failed => "failed",
    };

    let exit = match status.state {
        HostState::Succeeded | HostState::Failed => status.exit_code.to_string(),
        _ => "-".to_string(),
    };

    let elapsed = status.elapsed();
    let duration = if elapsed > Duration::ZERO {
        format_duration(elapsed)
    } else {
        "-".to_string()
    };

    let line = format!("  {}: {} exit={} duration={}", status.host, state_label, exit, duration);
    match colorize {
        Some(f) => f(&status.host, &line),
        None => line,
    }
}

fn format_duration(d: Duration) -> String {
    format!("{}ms", d.as_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobType;

    #[test]
    fn no_jobs_recorded_message() {
        let manager = Manager::new();
        assert_eq!(status_lines(&manager, None, None), vec!["no jobs recorded".to_string()]);
    }

    #[test]
    fn unknown_job_id_reports_not_found() {
        let manager = Manager::new();
        assert_eq!(status_lines(&manager, Some(42), None), vec!["job 42 not found".to_string()]);
    }

    #[test]
    fn formats_job_header_and_host_lines() {
        let manager = Manager::new();
        let id = manager.create_job(JobType::Normal, "uptime".into(), &["h1".into()]);
        manager.mark_host_running(id, "h1");
        manager.mark_host_done(id, "h1", 0, true);
        let lines = status_lines(&manager, Some(id), None);
        assert_eq!(lines[0], format!("job {id} [normal] uptime"));
        assert!(lines[1].contains("h1: succeeded exit=0"));
    }

    #[test]
    fn colorize_callback_is_applied() {
        let manager = Manager::new();
        let id = manager.create_job(JobType::Normal, "cmd".into(), &["h1".into()]);
        let colorize: &Colorize = &|host, line| format!("[{host}] {line}");
        let lines = status_lines(&manager, Some(id), Some(colorize));
        assert!(lines[1].starts_with("[h1]"));
    }
}

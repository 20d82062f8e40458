//! Job state manager: tracks per-host queued/running/succeeded/failed
//! transitions under concurrent updates, with deep-copy snapshot reads.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Whether a job runs through the broker's shared shell or standalone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobType {
    /// Runs on the broker's persistent per-host shell, sentinel-terminated.
    Normal,
    /// Runs a fresh one-shot session per host, bypassing the broker.
    Async,
}

/// Per-host lifecycle state for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    /// Accepted but not yet dispatched to the remote shell.
    Queued,
    /// Dispatched; awaiting completion.
    Running,
    /// Completed with exit code 0.
    Succeeded,
    /// Completed with a nonzero exit code, or failed to dial/run.
    Failed,
}

/// One host's status within a job.
#[derive(Debug, Clone)]
pub struct HostStatus {
    /// Host display name.
    pub host: String,
    /// Current lifecycle state.
    pub state: HostState,
    /// Exit code once completed.
    pub exit_code: i32,
    /// Duration once completed (or live elapsed time while Running).
    pub duration: Duration,
    started_at: Option<Instant>,
}

impl HostStatus {
    fn new(host: String) -> Self {
        Self { host, state: HostState::Queued, exit_code: 0, duration: Duration::ZERO, started_at: None }
    }

    /// Live elapsed time: ticking while Running, frozen once completed.
    pub fn elapsed(&self) -> Duration {
        match (self.state, self.started_at) {
            (HostState::Running, Some(started)) => started.elapsed(),
            _ => self.duration,
        }
    }
}

/// A unit of work dispatched to some set of hosts.
#[derive(Debug, Clone)]
pub struct Job {
    /// Monotonic id, starting at 1, never reused.
    pub id: u64,
    /// Normal or Async.
    pub job_type: JobType,
    /// The (possibly wrapped) command text.
    pub command: String,
    /// Creation time.
    pub created_at: Instant,
    /// Per-host status, keyed by host display name.
    pub hosts: HashMap<String, HostStatus>,
    /// Host display names in dispatch order.
    pub hosts_order: Vec<String>,
}

#[derive(Debug)]
struct Inner {
    next_id: u64,
    current_normal: Option<Job>,
    async_jobs: Vec<Job>,
    dirty: bool,
    normal_snapshot: Option<Arc<Job>>,
    async_snapshot: Vec<Arc<Job>>,
}

impl Inner {
    fn ensure_snapshots(&mut self) {
        if !self.dirty {
            return;
        }
        self.normal_snapshot = self.current_normal.clone().map(Arc::new);
        self.async_snapshot = self.async_jobs.iter().cloned().map(Arc::new).collect();
        self.dirty = false;
    }
}

/// Thread-safe job manager: one mutex guards creation and all transitions.
#[derive(Debug)]
pub struct Manager {
    inner: Mutex<Inner>,
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl Manager {
    /// Creates an empty manager; the first job created will have id 1.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                current_normal: None,
                async_jobs: Vec::new(),
                dirty: false,
                normal_snapshot: None,
                async_snapshot: Vec::new(),
            }),
        }
    }

    /// Creates a job for `hosts`, replacing the current Normal job or
    /// appending to (and trimming) the Async retention list.
    pub fn create_job(&self, job_type: JobType, command: String, hosts: &[String]) -> u64 {
        let mut inner = self.inner.lock().expect("job manager mutex poisoned");
        let id = inner.next_id;
        inner.next_id += 1;

        let host_statuses = hosts.iter().cloned().map(|h| (h.clone(), HostStatus::new(h))).collect();
        let job = Job {
            id,
            job_type,
            command,
            created_at: Instant::now(),
            hosts: host_statuses,
            hosts_order: hosts.to_vec(),
        };

        match job_type {
            JobType::Normal => inner.current_normal = Some(job),
            JobType::Async => {
                inner.async_jobs.push(job);
                let len = inner.async_jobs.len();
                if len > 2 {
                    inner.async_jobs.drain(..len - 2);
                }
            }
        }
        inner.dirty = true;
        id
    }

    /// Transitions `host` in job `job_id` from Queued to Running; no-op otherwise.
    pub fn mark_host_running(&self, job_id: u64, host: &str) {
        let mut inner = self.inner.lock().expect("job manager mutex poisoned");
        if let Some(status) = Self::find_mut(&mut inner, job_id, host) {
            if status.state == HostState::Queued {
                status.state = HostState::Running;
                status.started_at = Some(Instant::now());
            }
        }
        inner.dirty = true;
    }

    /// Records completion for `host` in job `job_id`.
    pub fn mark_host_done(&self, job_id: u64, host: &str, exit_code: i32, success: bool) {
        let mut inner = self.inner.lock().expect("job manager mutex poisoned");
        if let Some(status) = Self::find_mut(&mut inner, job_id, host) {
            let started = *status.started_at.get_or_insert_with(Instant::now);
            status.duration = started.elapsed();
            status.exit_code = exit_code;
            status.state = if success { HostState::Succeeded } else { HostState::Failed };
        }
        inner.dirty = true;
    }

    fn find_mut<'a>(inner: &'a mut Inner, job_id: u64, host: &str) -> Option<&'a mut HostStatus> {
        if let Some(job) = inner.current_normal.as_mut() {
            if job.id == job_id {
                return job.hosts.get_mut(host);
            }
        }
        for job in &mut inner.async_jobs {
            if job.id == job_id {
                return job.hosts.get_mut(host);
            }
        }
        None
    }

    /// Returns a snapshot of the job with id `job_id`, if it is still retained.
    pub fn job(&self, job_id: u64) -> Option<Arc<Job>> {
        let mut inner = self.inner.lock().expect("job manager mutex poisoned");
        inner.ensure_snapshots();
        if inner.normal_snapshot.as_ref().is_some_and(|j| j.id == job_id) {
            return inner.normal_snapshot.clone();
        }
        inner.async_snapshot.iter().find(|j| j.id == job_id).cloned()
    }

    /// Returns the current Normal job snapshot, if any.
    pub fn normal_jobs(&self) -> Vec<Arc<Job>> {
        let mut inner = self.inner.lock().expect("job manager mutex poisoned");
        inner.ensure_snapshots();
        inner.normal_snapshot.iter().cloned().collect()
    }

    /// Returns retained Async job snapshots, oldest first (at most two).
    pub fn async_jobs(&self) -> Vec<Arc<Job>> {
        let mut inner = self.inner.lock().expect("job manager mutex poisoned");
        inner.ensure_snapshots();
        inner.async_snapshot.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s6_normal_job_replaces_previous() {
        let manager = Manager::new();
        manager.create_job(JobType::Normal, "a".into(), &["h1".into()]);
        manager.create_job(JobType::Normal, "b".into(), &["h1".into()]);
        let jobs = manager.normal_jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].command, "b");
    }

    #[test]
    fn s6_async_retains_last_two() {
        let manager = Manager::new();
        manager.create_job(JobType::Async, "x".into(), &["h1".into()]);
        manager.create_job(JobType::Async, "y".into(), &["h1".into()]);
        manager.create_job(JobType::Async, "z".into(), &["h1".into()]);
        let jobs = manager.async_jobs();
        let commands: Vec<&str> = jobs.iter().map(|j| j.command.as_str()).collect();
        assert_eq!(commands, vec!["y", "z"]);
    }

    #[test]
    fn state_machine_never_regresses() {
        let manager = Manager::new();
        let id = manager.create_job(JobType::Normal, "cmd".into(), &["h1".into()]);
        manager.mark_host_running(id, "h1");
        manager.mark_host_running(id, "h1"); // no-op, already Running
        manager.mark_host_done(id, "h1", 0, true);
        let job = manager.job(id).unwrap();
        assert_eq!(job.hosts["h1"].state, HostState::Succeeded);
    }

    #[test]
    fn mark_done_without_running_sets_near_zero_duration() {
        let manager = Manager::new();
        let id = manager.create_job(JobType::Normal, "cmd".into(), &["h1".into()]);
        manager.mark_host_done(id, "h1", 0, true);
        let job = manager.job(id).unwrap();
        assert_eq!(job.hosts["h1"].state, HostState::Succeeded);
        assert!(job.hosts["h1"].duration < Duration::from_millis(50));
    }

    #[test]
    fn snapshot_identity_stable_without_writes() {
        let manager = Manager::new();
        manager.create_job(JobType::Normal, "cmd".into(), &["h1".into()]);
        let first = manager.normal_jobs();
        let second = manager.normal_jobs();
        assert!(Arc::ptr_eq(&first[0], &second[0]));
    }

    #[test]
    fn snapshot_changes_after_write() {
        let manager = Manager::new();
        let id = manager.create_job(JobType::Normal, "cmd".into(), &["h1".into()]);
        let first = manager.normal_jobs();
        manager.mark_host_running(id, "h1");
        let second = manager.normal_jobs();
        assert!(!Arc::ptr_eq(&first[0], &second[0]));
    }

    #[test]
    fn unknown_job_id_is_none() {
        let manager = Manager::new();
        assert!(manager.job(999).is_none());
    }
}

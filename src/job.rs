//! Job tracking for background pipelines
//!
//! The [`JobTable`] is the only owner of [`Job`] records. Status is computed
//! on demand from a job's final stage with a non-blocking poll, so listing
//! jobs never stalls the shell. Ids start at 1, only ever grow, and are never
//! handed out twice.

use crate::pipeline::{exit_code, PipelineHandle};
use crate::signals::signal_name;
use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::fmt;
use std::process::{Child, ExitStatus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("{command}: invalid argument: {arg}")]
    InvalidArgument { command: &'static str, arg: String },
    #[error("{command}: job {id} not found")]
    JobNotFound { command: &'static str, id: usize },
    #[error("fg: no current job")]
    NoCurrentJob,
    #[error("kill: ({0}) - No such process")]
    ProcessNotFound(u32),
    #[error("kill: ({0}) - Operation not permitted")]
    PermissionDenied(u32),
    #[error("kill: ({pid}) - signal failed (errno {errno})")]
    Signal { pid: u32, errno: i32 },
    #[error("kill: usage: kill <job-id | pid>")]
    Usage,
    #[error("{command}: wait failed: {source}")]
    Wait {
        command: &'static str,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Exited(i32),
    Terminated(i32),
}

impl JobStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, JobStatus::Running)
    }

    /// Shell-style exit code of a finished job
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            JobStatus::Running => None,
            JobStatus::Exited(code) => Some(*code),
            JobStatus::Terminated(signal) => Some(128 + signal),
        }
    }
}

impl From<ExitStatus> for JobStatus {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return JobStatus::Terminated(signal);
            }
        }
        JobStatus::Exited(exit_code(status))
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Running => write!(f, "Running"),
            JobStatus::Exited(0) => write!(f, "Done"),
            JobStatus::Exited(code) => write!(f, "Exit {}", code),
            JobStatus::Terminated(signal) => write!(f, "Terminated ({})", signal_name(*signal)),
        }
    }
}

/// A background pipeline
#[derive(Debug)]
pub struct Job {
    pub(crate) id: usize,
    pub(crate) label: String,
    /// Every stage but the last, in stage order. Never polled for status.
    pub(crate) upstream: Vec<Child>,
    /// The final stage, which decides the job's status
    pub(crate) terminal: Child,
    pub(crate) started_at: DateTime<Local>,
}

impl Job {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Pid of the final stage
    pub fn pid(&self) -> u32 {
        self.terminal.id()
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Number of stage processes
    pub fn process_count(&self) -> usize {
        self.upstream.len() + 1
    }

    /// Poll the final stage without blocking
    pub fn status(&mut self) -> JobStatus {
        match self.terminal.try_wait() {
            Ok(Some(status)) => JobStatus::from(status),
            Ok(None) => JobStatus::Running,
            Err(e) => {
                // Unknown is not finished; the next poll tries again
                tracing::warn!(job = self.id, error = %e, "status poll failed");
                JobStatus::Running
            }
        }
    }

    pub(crate) fn terminal_mut(&mut self) -> &mut Child {
        &mut self.terminal
    }

    fn snapshot(&mut self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            pid: self.pid(),
            label: self.label.clone(),
            status: self.status(),
            started_at: self.started_at,
        }
    }
}

/// Read-only view of a job at one point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub id: usize,
    pub pid: u32,
    pub label: String,
    pub status: JobStatus,
    pub started_at: DateTime<Local>,
}

/// Id -> job, ascending by id
#[derive(Debug)]
pub struct JobTable {
    jobs: BTreeMap<usize, Job>,
    next_id: usize,
    /// Processes of removed jobs that had not exited yet
    stragglers: Vec<Child>,
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTable {
    pub fn new() -> Self {
        JobTable {
            jobs: BTreeMap::new(),
            next_id: 1,
            stragglers: Vec::new(),
        }
    }

    /// Allocate the next job id
    pub fn next_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Track a spawned pipeline as a job
    pub fn register(&mut self, label: impl Into<String>, handle: PipelineHandle) -> &Job {
        let id = self.next_id();
        let (upstream, terminal) = handle.into_parts();
        let job = Job {
            id,
            label: label.into(),
            upstream,
            terminal,
            started_at: Local::now(),
        };
        tracing::debug!(job = id, pid = job.pid(), label = %job.label, "registered job");
        self.jobs.entry(id).or_insert(job)
    }

    pub fn get(&self, id: usize) -> Option<&Job> {
        self.jobs.get(&id)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut Job> {
        self.jobs.get_mut(&id)
    }

    pub fn contains(&self, id: usize) -> bool {
        self.jobs.contains_key(&id)
    }

    /// The most recently created job still in the table
    pub fn current_id(&self) -> Option<usize> {
        self.jobs.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Status of every job, ascending by id. Never blocks.
    pub fn snapshot(&mut self) -> Vec<JobSnapshot> {
        self.jobs.values_mut().map(Job::snapshot).collect()
    }

    /// Drop a job from the table, returning its last observed state.
    ///
    /// Any of its processes that have not exited yet (upstream stages, or the
    /// final stage right after `kill`) are kept and reaped by later
    /// [`JobTable::reap_finished`] calls, so removal never blocks.
    pub fn remove(&mut self, id: usize) -> Option<JobSnapshot> {
        let mut job = self.jobs.remove(&id)?;
        let snapshot = job.snapshot();
        let Job { upstream, terminal, .. } = job;
        for mut child in upstream.into_iter().chain(std::iter::once(terminal)) {
            if !matches!(child.try_wait(), Ok(Some(_))) {
                self.stragglers.push(child);
            }
        }
        tracing::debug!(job = id, stragglers = self.stragglers.len(), "removed job");
        Some(snapshot)
    }

    /// Remove and return every job that is no longer running
    pub fn reap_finished(&mut self) -> Vec<JobSnapshot> {
        let finished: Vec<JobSnapshot> = self
            .snapshot()
            .into_iter()
            .filter(|job| !job.status.is_running())
            .collect();

        for job in &finished {
            self.remove(job.id);
        }

        self.sweep_stragglers();
        finished
    }

    /// Number of stage processes from removed jobs still awaiting exit
    pub fn straggler_count(&self) -> usize {
        self.stragglers.len()
    }

    fn sweep_stragglers(&mut self) {
        self.stragglers
            .retain_mut(|child| matches!(child.try_wait(), Ok(None)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::pipeline::spawn;
    use std::thread;
    use std::time::{Duration, Instant};

    fn background(line: &str) -> PipelineHandle {
        let env = std::env::vars().collect();
        let cwd = std::env::temp_dir();
        spawn(&parse(line), &cwd, &env).unwrap()
    }

    fn wait_until_done(table: &mut JobTable, id: usize) -> JobStatus {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let status = table.get_mut(id).unwrap().status();
            if !status.is_running() || Instant::now() > deadline {
                return status;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    fn kill_all(table: &mut JobTable) {
        for job in table.jobs.values_mut() {
            let _ = job.terminal.kill();
        }
        let ids: Vec<usize> = table.jobs.keys().copied().collect();
        for id in ids {
            table.remove(id);
        }
        for mut child in table.stragglers.drain(..) {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let mut table = JobTable::new();
        assert_eq!(table.next_id(), 1);
        assert_eq!(table.next_id(), 2);
        assert_eq!(table.next_id(), 3);
    }

    #[test]
    fn ids_are_never_reused_after_removal() {
        let mut table = JobTable::new();
        let mut seen = Vec::new();
        for round in 0..4 {
            let id = table.register("true", background("true &")).id();
            seen.push(id);
            if round % 2 == 0 {
                wait_until_done(&mut table, id);
                table.remove(id);
            }
        }
        assert_eq!(seen, [1, 2, 3, 4]);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        kill_all(&mut table);
    }

    #[test]
    fn register_keeps_label_and_pid() {
        let mut table = JobTable::new();
        let handle = background("sleep 5 &");
        let pid = handle.pid();
        let job = table.register("sleep 5", handle);
        assert_eq!(job.id(), 1);
        assert_eq!(job.label(), "sleep 5");
        assert_eq!(job.pid(), pid);
        assert_eq!(job.process_count(), 1);
        kill_all(&mut table);
    }

    #[test]
    fn current_id_is_the_highest() {
        let mut table = JobTable::new();
        assert_eq!(table.current_id(), None);
        table.register("a", background("sleep 5 &"));
        table.register("b", background("sleep 5 &"));
        assert_eq!(table.current_id(), Some(2));
        let removed = table.remove(2).unwrap();
        assert_eq!(removed.label, "b");
        assert_eq!(table.current_id(), Some(1));
        assert_eq!(table.straggler_count(), 1);
        kill_all(&mut table);
    }

    #[test]
    fn snapshot_does_not_block() {
        let mut table = JobTable::new();
        for _ in 0..5 {
            table.register("sleep 30", background("sleep 30 &"));
        }
        let started = Instant::now();
        let snapshot = table.snapshot();
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(snapshot.len(), 5);
        assert!(snapshot.iter().all(|job| job.status == JobStatus::Running));
        let ids: Vec<usize> = snapshot.iter().map(|job| job.id).collect();
        assert_eq!(ids, [1, 2, 3, 4, 5]);
        kill_all(&mut table);
    }

    #[test]
    fn status_comes_from_final_stage() {
        let mut table = JobTable::new();
        let id = table.register("true | false", background("true | false &")).id();
        assert_eq!(wait_until_done(&mut table, id), JobStatus::Exited(1));
        let id = table.register("false | true", background("false | true &")).id();
        assert_eq!(wait_until_done(&mut table, id), JobStatus::Exited(0));
        kill_all(&mut table);
    }

    #[cfg(unix)]
    #[test]
    fn failed_poll_reports_running() {
        use nix::sys::wait::waitpid;
        use nix::unistd::Pid;

        let mut table = JobTable::new();
        let id = table.register("true", background("true &")).id();
        let pid = table.get(id).unwrap().pid();
        // Reaped behind the handle's back, so try_wait fails with ECHILD
        waitpid(Pid::from_raw(pid as i32), None).unwrap();
        assert_eq!(table.get_mut(id).unwrap().status(), JobStatus::Running);
        assert_eq!(table.get_mut(id).unwrap().status(), JobStatus::Running);
    }

    #[test]
    fn reap_finished_removes_only_finished_jobs() {
        let mut table = JobTable::new();
        let done = table.register("true", background("true &")).id();
        let running = table.register("sleep 30", background("sleep 30 &")).id();
        wait_until_done(&mut table, done);

        let reaped = table.reap_finished();
        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].id, done);
        assert_eq!(reaped[0].status, JobStatus::Exited(0));
        assert!(!table.contains(done));
        assert!(table.contains(running));
        kill_all(&mut table);
    }

    #[test]
    fn removing_a_pipeline_keeps_unfinished_upstream_for_later() {
        let mut table = JobTable::new();
        let id = table.register("sleep 1 | true", background("sleep 1 | true &")).id();
        assert_eq!(table.get(id).unwrap().process_count(), 2);
        wait_until_done(&mut table, id);

        table.reap_finished();
        assert!(table.is_empty());
        assert_eq!(table.straggler_count(), 1);

        thread::sleep(Duration::from_millis(1300));
        table.reap_finished();
        assert_eq!(table.straggler_count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn killed_job_reports_terminated() {
        let mut table = JobTable::new();
        let id = table.register("sleep 30", background("sleep 30 &")).id();
        let pid = table.get(id).unwrap().pid();
        crate::signals::terminate_process(pid).unwrap();
        assert_eq!(wait_until_done(&mut table, id), JobStatus::Terminated(15));
        kill_all(&mut table);
    }

    #[test]
    fn status_display() {
        assert_eq!(JobStatus::Running.to_string(), "Running");
        assert_eq!(JobStatus::Exited(0).to_string(), "Done");
        assert_eq!(JobStatus::Exited(2).to_string(), "Exit 2");
        #[cfg(unix)]
        assert_eq!(JobStatus::Terminated(15).to_string(), "Terminated (SIGTERM)");
        assert_eq!(JobStatus::Terminated(9).exit_code(), Some(137));
        assert_eq!(JobStatus::Running.exit_code(), None);
    }
}

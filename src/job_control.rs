//! Job control built-ins: `jobs`, `fg`, `bg`, `kill`

use crate::job::{JobError, JobStatus};
use crate::pipeline::CommandOutput;
use crate::shell::{Shell, ShellError};
use crate::signals::{self, SignalFailure};

impl Shell {
    /// List every job, then drop the ones that have finished
    pub(crate) fn builtin_jobs(&mut self, args: &[String]) -> CommandOutput {
        let long = args.iter().any(|arg| arg == "-l");
        let snapshot = self.jobs.snapshot();

        let mut listing = String::new();
        for job in &snapshot {
            if long {
                listing.push_str(&format!(
                    "[{}]\t{}\t{}\t{}\t{}\n",
                    job.id,
                    job.pid,
                    job.started_at.format("%H:%M:%S"),
                    job.status,
                    job.label
                ));
            } else {
                listing.push_str(&format!(
                    "[{}]\t{}\t{}\t{}\n",
                    job.id, job.pid, job.status, job.label
                ));
            }
        }

        for job in snapshot.iter().filter(|job| !job.status.is_running()) {
            self.jobs.remove(job.id);
        }

        CommandOutput::text(listing)
    }

    /// Wait for a job in the foreground
    pub(crate) fn builtin_fg(&mut self, args: &[String]) -> Result<CommandOutput, ShellError> {
        let id = match args.first() {
            Some(arg) => parse_job_id("fg", arg)?,
            None => self.jobs.current_id().ok_or(JobError::NoCurrentJob)?,
        };

        let interrupt = self.interrupt.clone();
        interrupt.reset();

        let job = self
            .jobs
            .get_mut(id)
            .ok_or(JobError::JobNotFound { command: "fg", id })?;
        let label = job.label().to_string();

        let status = match job.status() {
            JobStatus::Running => {
                tracing::debug!(job = id, pid = job.pid(), "waiting for job in foreground");
                let finished = interrupt
                    .wait(job.terminal_mut())
                    .map_err(|source| JobError::Wait { command: "fg", source })?;
                match finished {
                    Some(status) => JobStatus::from(status),
                    None => {
                        interrupt.take();
                        return Err(ShellError::Interrupted);
                    }
                }
            }
            finished => finished,
        };

        self.jobs.remove(id);
        Ok(CommandOutput {
            exit_code: status.exit_code().unwrap_or(0),
            ..CommandOutput::text(format!("{}\n", label))
        })
    }

    pub(crate) fn builtin_bg(&mut self, _args: &[String]) -> CommandOutput {
        CommandOutput::error_text("bg: job control not fully implemented\n", 1)
    }

    /// Terminate a job by id, or any process by pid
    pub(crate) fn builtin_kill(&mut self, args: &[String]) -> Result<CommandOutput, ShellError> {
        let target = match args {
            [target] => target,
            _ => return Err(JobError::Usage.into()),
        };
        let number: u32 = target
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| JobError::InvalidArgument {
                command: "kill",
                arg: target.clone(),
            })?;

        let id = number as usize;
        if let Some(job) = self.jobs.get_mut(id) {
            // A finished job's pid may already belong to someone else
            if job.status().is_running() {
                let pid = job.pid();
                signals::terminate_process(pid).map_err(|failure| signal_error(pid, failure))?;
            }
            let label = job.label().to_string();
            self.jobs.remove(id);
            return Ok(CommandOutput::text(format!("[{}] Terminated: {}\n", id, label)));
        }

        signals::terminate_process(number).map_err(|failure| signal_error(number, failure))?;
        Ok(CommandOutput::text(format!("Process {} terminated\n", number)))
    }
}

fn parse_job_id(command: &'static str, arg: &str) -> Result<usize, JobError> {
    arg.strip_prefix('%')
        .unwrap_or(arg)
        .parse::<usize>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| JobError::InvalidArgument {
            command,
            arg: arg.to_string(),
        })
}

fn signal_error(pid: u32, failure: SignalFailure) -> JobError {
    match failure {
        SignalFailure::NoSuchProcess => JobError::ProcessNotFound(pid),
        SignalFailure::PermissionDenied => JobError::PermissionDenied(pid),
        SignalFailure::Other(errno) => JobError::Signal { pid, errno },
    }
}

//! Shell - the central coordinator for jobsh
//!
//! The Shell owns all state (jobs, aliases, environment, working directory,
//! history) and runs one command line at a time:
//! 1. Parse into pipeline stages (parser)
//! 2. Expand aliases in every stage (alias)
//! 3. Dispatch a built-in, for single-stage lines only (builtin)
//! 4. Otherwise spawn the pipeline (pipeline) and either wait for it or
//!    register it as a background job (job)
//!
//! Child processes get the shell's `cwd` and `env` explicitly; the process
//! working directory and environment are never modified.

use crate::alias::AliasTable;
use crate::builtin::Builtin;
use crate::config::Config;
use crate::history::History;
use crate::job::{JobError, JobTable};
use crate::parser::{self, PipelineSpec};
use crate::pipeline::{self, CommandOutput, PipelineError};
use crate::signals::Interrupt;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShellError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error("cd: {}: {reason}", .path.display())]
    Cd { path: PathBuf, reason: String },
    #[error("alias: {0}: not found")]
    AliasNotFound(String),
    #[error("{0}")]
    Usage(&'static str),
    #[error("interrupted")]
    Interrupted,
}

impl ShellError {
    /// The user interrupted a foreground wait
    pub fn is_interrupt(&self) -> bool {
        matches!(
            self,
            ShellError::Interrupted | ShellError::Pipeline(PipelineError::Interrupted)
        )
    }

    /// Exit status recorded for a line that failed this way
    pub fn exit_code(&self) -> i32 {
        match self {
            ShellError::Pipeline(PipelineError::CommandNotFound(_)) => 127,
            _ if self.is_interrupt() => 130,
            _ => 1,
        }
    }
}

/// What the loop should do after a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue(CommandOutput),
    Exit,
}

/// All state of one interactive session
#[derive(Debug)]
pub struct Shell {
    pub(crate) jobs: JobTable,
    pub(crate) aliases: AliasTable,
    pub(crate) env: BTreeMap<String, String>,
    pub(crate) cwd: PathBuf,
    pub(crate) home: PathBuf,
    pub(crate) history: History,
    pub(crate) interrupt: Interrupt,
    pub(crate) last_exit_code: i32,
}

impl Default for Shell {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl Shell {
    pub fn new(config: &Config) -> Self {
        let env: BTreeMap<String, String> = std::env::vars_os()
            .map(|(k, v)| (k.to_string_lossy().into_owned(), v.to_string_lossy().into_owned()))
            .collect();
        let home = PathBuf::from(env.get("HOME").map(String::as_str).unwrap_or("/"));
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));

        Shell {
            jobs: JobTable::new(),
            aliases: AliasTable::default(),
            env,
            cwd,
            home,
            history: History::with_limit(config.history_size),
            interrupt: Interrupt::default(),
            last_exit_code: 0,
        }
    }

    /// Use `interrupt` (normally the installed SIGINT flag) for blocking waits
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Start in `cwd` instead of the process working directory
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn env_var(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(String::as_str)
    }

    pub fn jobs(&self) -> &JobTable {
        &self.jobs
    }

    pub fn jobs_mut(&mut self) -> &mut JobTable {
        &mut self.jobs
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn aliases_mut(&mut self) -> &mut AliasTable {
        &mut self.aliases
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    pub fn last_exit_code(&self) -> i32 {
        self.last_exit_code
    }

    pub fn record_history(&mut self, line: &str) {
        self.history.push(line);
    }

    /// Remove finished background jobs, returning one notice per job
    pub fn reap_finished(&mut self) -> Vec<String> {
        self.jobs
            .reap_finished()
            .into_iter()
            .map(|job| {
                tracing::debug!(job = job.id, status = %job.status, "reaped job");
                format!("[{}] {}: {}", job.id, job.status, job.label)
            })
            .collect()
    }

    /// Parse and run one command line
    pub fn execute_line(&mut self, line: &str) -> Result<Flow, ShellError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Flow::Continue(CommandOutput::default()));
        }

        let aliases = &self.aliases;
        let spec = parser::parse(line).map_stages(|stage| aliases.expand(stage));

        let result = match single_stage_builtin(&spec) {
            Some((builtin, args)) => self.run_builtin(builtin, &args),
            None => self.run_pipeline(&spec).map(Flow::Continue),
        };

        match &result {
            Ok(Flow::Continue(output)) => self.last_exit_code = output.exit_code,
            Ok(Flow::Exit) => self.last_exit_code = 0,
            Err(e) => self.last_exit_code = e.exit_code(),
        }
        result
    }

    fn run_pipeline(&mut self, spec: &PipelineSpec) -> Result<CommandOutput, ShellError> {
        self.interrupt.reset();
        let handle = pipeline::spawn(spec, &self.cwd, &self.env)?;

        if spec.background {
            let pid = handle.pid();
            let job = self.jobs.register(spec.label(), handle);
            return Ok(CommandOutput::text(format!("[{}] {}\n", job.id(), pid)));
        }

        Ok(handle.wait(&self.interrupt)?)
    }

    /// Resolve `~` and relative paths against the shell's home and cwd
    pub(crate) fn resolve_path(&self, arg: &str) -> PathBuf {
        let expanded = if arg == "~" {
            self.home.clone()
        } else if let Some(rest) = arg.strip_prefix("~/") {
            self.home.join(rest)
        } else {
            PathBuf::from(arg)
        };

        if expanded.is_absolute() {
            expanded
        } else {
            self.cwd.join(expanded)
        }
    }
}

/// Built-ins are only recognized when they are the whole command line
fn single_stage_builtin(spec: &PipelineSpec) -> Option<(Builtin, Vec<String>)> {
    if !spec.is_single_stage() {
        return None;
    }
    let stage = spec.stages.first()?;
    let builtin = Builtin::from_name(stage.program()?)?;
    Some((builtin, stage.args().to_vec()))
}

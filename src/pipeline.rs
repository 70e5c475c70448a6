//! Pipeline executor: spawns one process per stage and wires them together
//!
//! Stage i's stdin is stage i-1's stdout. The final stage writes to the
//! redirect file when there is one, otherwise to a captured pipe (foreground)
//! or the terminal (background).
//!
//! Spawning is all-or-nothing: if any stage fails to start, the stages already
//! started by the same call are killed and reaped before the error is returned.

use crate::parser::{PipelineSpec, StageSpec};
use crate::signals::Interrupt;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0}: command not found")]
    CommandNotFound(String),
    #[error("syntax error: empty command in pipeline stage {}", .0 + 1)]
    EmptyStage(usize),
    #[error("{}: {source}", .path.display())]
    Redirect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("wait failed: {0}")]
    Wait(#[source] io::Error),
    #[error("interrupted")]
    Interrupted,
}

/// Captured result of a foreground command line.
///
/// Output is kept as raw bytes so binary data from a program reaches the
/// terminal unchanged; the `*_text` accessors decode lossily for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

impl CommandOutput {
    /// Output of a built-in that only prints text
    pub fn text(stdout: impl Into<String>) -> Self {
        CommandOutput {
            stdout: stdout.into().into_bytes(),
            ..Default::default()
        }
    }

    /// Output of a built-in that only reports on stderr
    pub fn error_text(stderr: impl Into<String>, exit_code: i32) -> Self {
        CommandOutput {
            stderr: stderr.into().into_bytes(),
            exit_code,
            ..Default::default()
        }
    }

    pub fn stdout_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    pub fn stderr_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Shell-style exit code: the process's code, or 128 + signal
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// The processes of one successfully spawned pipeline
#[derive(Debug)]
pub struct PipelineHandle {
    /// Stages 0..n-1, in spawn order
    pub(crate) upstream: Vec<Child>,
    /// Stage n-1; its status is the pipeline's status
    pub(crate) terminal: Child,
}

impl PipelineHandle {
    /// Pid of the final stage
    pub fn pid(&self) -> u32 {
        self.terminal.id()
    }

    /// All pids in stage order
    pub fn pids(&self) -> Vec<u32> {
        self.upstream
            .iter()
            .chain(std::iter::once(&self.terminal))
            .map(Child::id)
            .collect()
    }

    /// Wait for a foreground pipeline and collect the final stage's output.
    ///
    /// The final stage's pipes are drained on reader threads while it runs,
    /// so a full pipe can't stall it and the wait itself stays interruptible.
    /// Upstream stages are then reaped in spawn order. On interrupt every
    /// stage still running is killed and reaped.
    pub fn wait(self, interrupt: &Interrupt) -> Result<CommandOutput, PipelineError> {
        let PipelineHandle {
            upstream,
            mut terminal,
        } = self;

        let stdout = drain(terminal.stdout.take());
        let stderr = drain(terminal.stderr.take());

        let status = match interrupt.wait(&mut terminal) {
            Ok(Some(status)) => status,
            Ok(None) => {
                tracing::debug!(pid = terminal.id(), "foreground wait interrupted");
                interrupt.take();
                kill_and_reap(upstream.into_iter().chain(std::iter::once(terminal)));
                return Err(PipelineError::Interrupted);
            }
            Err(e) => {
                kill_and_reap(upstream.into_iter().chain(std::iter::once(terminal)));
                return Err(PipelineError::Wait(e));
            }
        };

        let stdout = collect(stdout).map_err(PipelineError::Wait);
        let stderr = collect(stderr).map_err(PipelineError::Wait);

        let mut remaining = upstream.into_iter();
        while let Some(mut child) = remaining.next() {
            match interrupt.wait(&mut child) {
                Ok(Some(_)) => {}
                Ok(None) => {
                    interrupt.take();
                    kill_and_reap(std::iter::once(child).chain(remaining));
                    return Err(PipelineError::Interrupted);
                }
                Err(e) => {
                    kill_and_reap(std::iter::once(child).chain(remaining));
                    return Err(PipelineError::Wait(e));
                }
            }
        }

        Ok(CommandOutput {
            stdout: stdout?,
            stderr: stderr?,
            exit_code: exit_code(status),
        })
    }

    pub(crate) fn into_parts(self) -> (Vec<Child>, Child) {
        (self.upstream, self.terminal)
    }
}

/// Spawn every stage of `spec` with the given working directory and environment
pub fn spawn(
    spec: &PipelineSpec,
    cwd: &Path,
    env: &BTreeMap<String, String>,
) -> Result<PipelineHandle, PipelineError> {
    let (last, upstream_stages) = spec
        .stages
        .split_last()
        .ok_or(PipelineError::EmptyStage(0))?;

    // Opened before anything runs so a bad target never strands a stage
    let mut redirect = match &spec.redirect {
        Some(target) => Some(open_redirect(&cwd.join(target))?),
        None => None,
    };

    let mut upstream: Vec<Child> = Vec::with_capacity(upstream_stages.len());
    let mut feed: Option<ChildStdout> = None;

    for (index, stage) in upstream_stages.iter().enumerate() {
        let stdin = stdin_for(feed.take(), spec.background);
        let stderr = Stdio::inherit();
        match spawn_stage(index, stage, cwd, env, stdin, Stdio::piped(), stderr) {
            Ok(mut child) => {
                feed = child.stdout.take();
                upstream.push(child);
            }
            Err(e) => {
                kill_and_reap(upstream);
                return Err(e);
            }
        }
    }

    let stdin = stdin_for(feed.take(), spec.background);
    let stdout = match redirect.take() {
        Some(file) => Stdio::from(file),
        None if spec.background => Stdio::inherit(),
        None => Stdio::piped(),
    };
    let stderr = if spec.background {
        Stdio::inherit()
    } else {
        Stdio::piped()
    };

    match spawn_stage(upstream_stages.len(), last, cwd, env, stdin, stdout, stderr) {
        Ok(terminal) => Ok(PipelineHandle { upstream, terminal }),
        Err(e) => {
            kill_and_reap(upstream);
            Err(e)
        }
    }
}

/// Where a stage reads from: the previous stage, or the shell's own stdin
fn stdin_for(feed: Option<ChildStdout>, background: bool) -> Stdio {
    match feed {
        Some(out) => Stdio::from(out),
        None if background => Stdio::null(),
        None => Stdio::inherit(),
    }
}

/// Read a captured pipe to the end on its own thread
fn drain<R>(pipe: Option<R>) -> Option<JoinHandle<io::Result<Vec<u8>>>>
where
    R: Read + Send + 'static,
{
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

/// Join a drain thread started by [`drain`]
fn collect(reader: Option<JoinHandle<io::Result<Vec<u8>>>>) -> io::Result<Vec<u8>> {
    match reader {
        Some(handle) => handle
            .join()
            .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::Other, "output reader panicked"))),
        None => Ok(Vec::new()),
    }
}

fn open_redirect(path: &Path) -> Result<File, PipelineError> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|source| PipelineError::Redirect {
            path: path.to_path_buf(),
            source,
        })
}

fn spawn_stage(
    index: usize,
    stage: &StageSpec,
    cwd: &Path,
    env: &BTreeMap<String, String>,
    stdin: Stdio,
    stdout: Stdio,
    stderr: Stdio,
) -> Result<Child, PipelineError> {
    let program = stage.program().ok_or(PipelineError::EmptyStage(index))?;

    let mut command = Command::new(program);
    command
        .args(stage.args())
        .current_dir(cwd)
        .env_clear()
        .envs(env)
        .stdin(stdin)
        .stdout(stdout)
        .stderr(stderr);

    let result = command.spawn();
    // Dropping the command closes the parent's copy of the upstream read end
    drop(command);

    match result {
        Ok(child) => {
            tracing::debug!(stage = index, pid = child.id(), argv = ?stage.argv, "spawned stage");
            Ok(child)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(PipelineError::CommandNotFound(program.to_string()))
        }
        Err(source) => Err(PipelineError::Spawn {
            program: program.to_string(),
            source,
        }),
    }
}

/// Kill and wait for every child, ignoring ones that already exited
pub(crate) fn kill_and_reap<I>(children: I)
where
    I: IntoIterator<Item = Child>,
{
    for mut child in children {
        let pid = child.id();
        if let Err(e) = child.kill() {
            if e.kind() != io::ErrorKind::InvalidInput {
                tracing::warn!(pid, error = %e, "failed to kill stage");
            }
        }
        if let Err(e) = child.wait() {
            tracing::warn!(pid, error = %e, "failed to reap stage");
        } else {
            tracing::debug!(pid, "reaped abandoned stage");
        }
    }
}

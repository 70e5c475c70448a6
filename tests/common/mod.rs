//! Common test utilities for jobsh integration tests

pub use jobsh::{CommandOutput, Config, Flow, Shell, ShellError};
use jobsh::session::{self, LineReader, ReadOutcome};
use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;

/// A shell whose working directory is `dir`
pub fn shell_in(dir: &Path) -> Shell {
    Shell::new(&Config::default()).with_cwd(dir)
}

/// Run one line and return its output, failing the test on `exit`
pub fn run(shell: &mut Shell, line: &str) -> Result<CommandOutput, ShellError> {
    match shell.execute_line(line)? {
        Flow::Continue(output) => Ok(output),
        Flow::Exit => panic!("unexpected exit from {:?}", line),
    }
}

/// Feeds fixed lines to the session loop, optionally pausing before some
pub struct ScriptedReader {
    steps: VecDeque<Step>,
}

enum Step {
    Line(String),
    Pause(Duration),
}

#[allow(dead_code)]
impl ScriptedReader {
    pub fn new(lines: &[&str]) -> Self {
        ScriptedReader {
            steps: lines.iter().map(|line| Step::Line(line.to_string())).collect(),
        }
    }

    pub fn line(mut self, line: &str) -> Self {
        self.steps.push_back(Step::Line(line.to_string()));
        self
    }

    pub fn pause(mut self, duration: Duration) -> Self {
        self.steps.push_back(Step::Pause(duration));
        self
    }
}

impl LineReader for ScriptedReader {
    fn read_line(&mut self, _prompt: &str) -> io::Result<ReadOutcome> {
        loop {
            match self.steps.pop_front() {
                Some(Step::Line(line)) => return Ok(ReadOutcome::Line(line)),
                Some(Step::Pause(duration)) => thread::sleep(duration),
                None => return Ok(ReadOutcome::Eof),
            }
        }
    }
}

/// What a whole session printed
#[allow(dead_code)]
pub struct Transcript {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Run a scripted session in `dir`
#[allow(dead_code)]
pub fn session_in(dir: &Path, reader: &mut ScriptedReader) -> Transcript {
    let mut shell = shell_in(dir);
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let code = session::run(&mut shell, reader, &mut stdout, &mut stderr).unwrap();
    Transcript {
        code,
        stdout: String::from_utf8(stdout).unwrap(),
        stderr: String::from_utf8(stderr).unwrap(),
    }
}

/// Kill and forget every job still in the table
#[allow(dead_code)]
pub fn kill_all_jobs(shell: &mut Shell) {
    let ids: Vec<usize> = shell.jobs_mut().snapshot().iter().map(|job| job.id).collect();
    for id in ids {
        let _ = run(shell, &format!("kill {}", id));
    }
}

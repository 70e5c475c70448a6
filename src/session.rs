//! The read-eval loop, independent of where lines come from
//!
//! The binary drives it with a rustyline editor; tests drive it with a
//! scripted [`LineReader`].

use crate::prompt;
use crate::shell::{Flow, Shell};
use std::io::{self, Write};

pub const FAREWELL: &str = "Goodbye!";

/// Result of asking for one line of input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    /// Ctrl-C at the prompt
    Interrupted,
    Eof,
}

/// A source of command lines
pub trait LineReader {
    fn read_line(&mut self, prompt: &str) -> io::Result<ReadOutcome>;

    /// Offered every non-blank line, for editor-side recall
    fn add_history_entry(&mut self, _line: &str) {}
}

/// Run the shell until `exit` or end of input, returning the exit status
pub fn run<R, O, E>(shell: &mut Shell, reader: &mut R, out: &mut O, err: &mut E) -> io::Result<i32>
where
    R: LineReader + ?Sized,
    O: Write,
    E: Write,
{
    loop {
        for notice in shell.reap_finished() {
            writeln!(out, "{}", notice)?;
        }
        out.flush()?;

        let prompt = prompt::render(shell);
        let line = match reader.read_line(&prompt)? {
            ReadOutcome::Line(line) => line,
            ReadOutcome::Interrupted => {
                shell.interrupt().reset();
                continue;
            }
            ReadOutcome::Eof => {
                writeln!(out)?;
                writeln!(out, "{}", FAREWELL)?;
                return Ok(0);
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        shell.record_history(line);
        reader.add_history_entry(line);

        match shell.execute_line(line) {
            Ok(Flow::Continue(output)) => {
                out.write_all(&output.stdout)?;
                err.write_all(&output.stderr)?;
            }
            Ok(Flow::Exit) => {
                writeln!(out, "{}", FAREWELL)?;
                return Ok(0);
            }
            Err(e) if e.is_interrupt() => {
                writeln!(err, "^C")?;
            }
            Err(e) => {
                tracing::debug!(error = ?e, "command failed");
                writeln!(err, "jobsh: {}", e)?;
            }
        }
        err.flush()?;
    }
}

use jobsh::session::{self, LineReader, ReadOutcome};
use jobsh::{Config, Interrupt, Shell};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::{self, IsTerminal};
use std::process::ExitCode;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Line editing and in-session recall through rustyline
struct EditorReader {
    editor: DefaultEditor,
}

impl LineReader for EditorReader {
    fn read_line(&mut self, prompt: &str) -> io::Result<ReadOutcome> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(ReadOutcome::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadOutcome::Eof),
            Err(ReadlineError::Io(e)) => Err(e),
            Err(e) => Err(io::Error::new(io::ErrorKind::Other, e.to_string())),
        }
    }

    fn add_history_entry(&mut self, line: &str) {
        if let Err(e) = self.editor.add_history_entry(line) {
            tracing::warn!(error = %e, "could not add line to editor history");
        }
    }
}

/// Run the interactive shell until `exit` or end of input
pub(crate) fn run_repl(config: &Config) -> ExitCode {
    // SIGINT only raises a flag; the shell itself never dies from Ctrl-C
    let interrupt = match Interrupt::install() {
        Ok(interrupt) => interrupt,
        Err(e) => {
            eprintln!("jobsh: cannot install SIGINT handler: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("jobsh: cannot start line editor: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if config.banner || io::stdin().is_terminal() {
        println!("jobsh {} - pipelines and job control", VERSION);
        println!("  Type 'exit' or Ctrl-D to quit, 'jobsh --help' for usage");
    }

    let mut shell = Shell::new(config).with_interrupt(interrupt);
    let mut reader = EditorReader { editor };

    match session::run(&mut shell, &mut reader, &mut io::stdout(), &mut io::stderr()) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("jobsh: {}", e);
            ExitCode::FAILURE
        }
    }
}

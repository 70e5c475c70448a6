use jobsh::session;
use jobsh::{Config, Flow, Shell};
use std::io::{self, Write};
use std::process::ExitCode;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parsed command-line arguments
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct CliArgs {
    pub(crate) command: Option<String>,
    pub(crate) help: bool,
    pub(crate) version: bool,
    pub(crate) unknown: Option<String>,
}

/// Parse command-line arguments
pub(crate) fn parse_args(args: &[String]) -> CliArgs {
    let mut cli = CliArgs::default();

    let mut i = 1; // Skip program name
    while i < args.len() {
        match args[i].as_str() {
            "-c" => {
                // Everything after -c is the command
                if i + 1 < args.len() {
                    cli.command = Some(args[i + 1..].join(" "));
                    break;
                }
            }
            "--help" | "-h" => {
                cli.help = true;
            }
            "--version" | "-V" => {
                cli.version = true;
            }
            other => {
                if cli.unknown.is_none() {
                    cli.unknown = Some(other.to_string());
                }
            }
        }
        i += 1;
    }

    cli
}

pub(crate) fn print_help() {
    println!(
        r#"jobsh {} - an interactive shell with pipelines and job control

USAGE:
    jobsh                   Start interactive shell
    jobsh -c <command>      Execute a single command line
    jobsh --help            Show this help message
    jobsh --version         Show version

SYNTAX:
    cmd [args]              Run a program
    cmd1 | cmd2 | ...       Pipe each stage's stdout into the next
    cmd > file              Write the final stage's stdout to file (truncates)
    cmd &                   Run in the background as a job

BUILT-INS:
    cd [dir]                Change directory (default: home, ~ expands)
    pwd                     Print working directory
    jobs [-l]               List jobs (-l adds start time)
    fg [id]                 Wait for a job (default: most recent)
    bg [id]                 Not implemented
    kill <id|pid>           Terminate a job, or any process by pid
    history                 Show command history
    alias [name[=value]]    List, show or define aliases
    export [NAME=value]     Set or show environment variables
    exit                    Leave the shell

ENVIRONMENT:
    JOBSH_HISTSIZE          History entries kept (default 1000)
    JOBSH_BANNER=1          Show the startup banner even when not on a terminal
    JOBSH_LOG               Log filter, e.g. debug or jobsh=trace (default warn)"#,
        VERSION
    );
}

pub(crate) fn print_version() {
    println!("jobsh {}", VERSION);
}

/// Run one command line and exit with its status
pub(crate) fn execute_command(cmd: &str, config: &Config) -> ExitCode {
    let mut shell = Shell::new(config);

    match shell.execute_line(cmd) {
        Ok(Flow::Continue(output)) => {
            let _ = io::stdout().write_all(&output.stdout);
            let _ = io::stderr().write_all(&output.stderr);
            let _ = io::stdout().flush();
            exit_code(output.exit_code)
        }
        Ok(Flow::Exit) => {
            println!("{}", session::FAREWELL);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("jobsh: {}", e);
            exit_code(e.exit_code())
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    if code == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(u8::try_from(code).unwrap_or(1))
    }
}

//! jobsh - an interactive shell with pipelines and job control
//!
//! Usage:
//!   jobsh              Start interactive shell
//!   jobsh -c "cmd"     Execute a single command line

mod cli;
mod repl;

use cli::{execute_command, parse_args, print_help, print_version};
use jobsh::config::Config;
use std::env;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Diagnostics go to stderr so they never mix with command output
fn init_logging(config: &Config) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let cli = parse_args(&args);

    if cli.help {
        print_help();
        return ExitCode::SUCCESS;
    }

    if cli.version {
        print_version();
        return ExitCode::SUCCESS;
    }

    if let Some(arg) = cli.unknown {
        eprintln!("jobsh: unsupported argument: {} (script files are not supported)", arg);
        return ExitCode::from(2);
    }

    let config = Config::from_env();
    init_logging(&config);
    tracing::debug!(?config, "starting");

    if let Some(cmd) = cli.command {
        return execute_command(&cmd, &config);
    }

    repl::run_repl(&config)
}

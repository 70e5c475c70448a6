//! jobsh - an interactive shell with pipelines and job control
//!
//! # Overview
//!
//! jobsh reads one command line at a time, runs it as a pipeline of external
//! programs, and keeps a table of background jobs that can be listed, waited
//! for and terminated.
//!
//! ```text
//! cat log.txt | grep ERROR | wc -l      # three stages, connected by pipes
//! ls -la > listing.txt                  # final stage's stdout to a file
//! sleep 30 &                            # background job: prints [1] <pid>
//! jobs                                  # [1]  <pid>  Running  sleep 30
//! fg 1                                  # wait for it in the foreground
//! kill 1                                # SIGTERM a job (or a raw pid)
//! ```
//!
//! Arguments are plain whitespace-separated tokens: no quoting, globbing or
//! variable expansion. Built-ins (`cd`, `pwd`, `jobs`, `fg`, `bg`, `kill`,
//! `history`, `alias`, `export`, `exit`) are only recognized when they are the
//! whole command line.
//!
//! # Example
//!
//! ```no_run
//! use jobsh::{Config, Flow, Shell};
//!
//! let mut shell = Shell::new(&Config::default());
//! if let Ok(Flow::Continue(output)) = shell.execute_line("echo hello | tr a-z A-Z") {
//!     assert_eq!(output.stdout_text(), "HELLO\n");
//! }
//! ```

pub mod alias;
pub mod builtin;
pub mod config;
pub mod history;
pub mod job;
pub mod job_control;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod session;
pub mod shell;
pub mod signals;

// Re-export commonly used items
pub use alias::AliasTable;
pub use builtin::Builtin;
pub use config::Config;
pub use history::History;
pub use job::{Job, JobError, JobSnapshot, JobStatus, JobTable};
pub use parser::{parse, PipelineSpec, StageSpec};
pub use pipeline::{CommandOutput, PipelineError, PipelineHandle};
pub use session::{LineReader, ReadOutcome};
pub use shell::{Flow, Shell, ShellError};
pub use signals::Interrupt;

//! Parser for jobsh command lines
//!
//! Turns `cmd1 args | cmd2 args > file &` into a [`PipelineSpec`].
//! Parsing never fails: malformed input (an empty stage, an empty redirect
//! target) produces a pipeline that is rejected later, at spawn time.
//!
//! Arguments are exactly the whitespace-delimited tokens. There is no quoting,
//! escaping or glob expansion, and at most one redirection, which always binds
//! to the final stage's stdout.

use std::fmt;
use std::path::PathBuf;

/// One program invocation within a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StageSpec {
    /// Program name followed by its arguments. Empty for `a || b` style input.
    pub argv: Vec<String>,
}

impl StageSpec {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StageSpec {
            argv: argv.into_iter().map(Into::into).collect(),
        }
    }

    /// The program to run, if the stage has any tokens
    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.argv.is_empty()
    }
}

impl fmt::Display for StageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.argv.join(" "))
    }
}

/// A parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSpec {
    /// Always at least one stage
    pub stages: Vec<StageSpec>,
    /// Trailing `&`
    pub background: bool,
    /// Target of `>` for the final stage's stdout
    pub redirect: Option<PathBuf>,
}

impl PipelineSpec {
    pub fn is_single_stage(&self) -> bool {
        self.stages.len() == 1
    }

    /// Rewrite every stage's argv
    pub fn map_stages<F>(self, mut f: F) -> Self
    where
        F: FnMut(StageSpec) -> StageSpec,
    {
        PipelineSpec {
            stages: self.stages.into_iter().map(&mut f).collect(),
            ..self
        }
    }

    /// Command text shown for jobs: stage argv lists joined with ` | `
    pub fn label(&self) -> String {
        self.stages
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

/// Parse a command line into a pipeline description
pub fn parse(line: &str) -> PipelineSpec {
    let mut line = line.trim();

    let background = line.ends_with('&');
    if background {
        line = line[..line.len() - 1].trim_end();
    }

    let (commands, redirect) = match line.split_once('>') {
        Some((commands, target)) => (commands, Some(PathBuf::from(target.trim()))),
        None => (line, None),
    };

    let stages = commands
        .split('|')
        .map(|stage| StageSpec::new(stage.split_whitespace()))
        .collect();

    PipelineSpec {
        stages,
        background,
        redirect,
    }
}

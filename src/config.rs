//! Startup configuration read from the environment
//!
//! - `JOBSH_HISTSIZE` - number of lines the `history` built-in keeps (default 1000)
//! - `JOBSH_BANNER`   - show the startup banner even when stdin is not a terminal
//! - `JOBSH_LOG`      - tracing filter for diagnostics on stderr (default `warn`)

use crate::history::DEFAULT_HISTORY_SIZE;

pub const LOG_ENV: &str = "JOBSH_LOG";
pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub history_size: usize,
    pub banner: bool,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            history_size: DEFAULT_HISTORY_SIZE,
            banner: false,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults for
    /// missing or unparsable values
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        Config {
            history_size: lookup("JOBSH_HISTSIZE")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.history_size),
            banner: lookup("JOBSH_BANNER").is_some(),
            log_filter: lookup(LOG_ENV)
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.log_filter),
        }
    }
}

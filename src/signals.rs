//! Signal handling for jobsh
//!
//! - SIGINT: never terminates the shell. The handler only raises a flag that
//!   the active blocking wait (foreground pipeline, `fg`) observes and unwinds on.
//! - SIGTERM: delivered to job processes and raw pids by `kill`.

use std::io;
use std::process::{Child, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{kill, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// How often an interruptible wait re-checks the child and the flag
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Cancellation flag raised by SIGINT
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    /// Install a SIGINT handler that raises the returned flag
    #[cfg(unix)]
    pub fn install() -> io::Result<Self> {
        let interrupt = Interrupt::default();
        signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&interrupt.flag))?;
        Ok(interrupt)
    }

    #[cfg(not(unix))]
    pub fn install() -> io::Result<Self> {
        Ok(Interrupt::default())
    }

    /// Raise the flag by hand (what the handler does)
    pub fn raise(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Check the flag and clear it
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }

    /// Drop an interrupt that arrived while nothing was waiting
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// Wait for `child` to exit unless the flag is raised first.
    ///
    /// Returns `Ok(None)` when interrupted; the child is left untouched and
    /// the flag stays raised for the caller to `take()`.
    pub fn wait(&self, child: &mut Child) -> io::Result<Option<ExitStatus>> {
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Some(status));
            }
            if self.is_raised() {
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Why a signal could not be delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalFailure {
    NoSuchProcess,
    PermissionDenied,
    Other(i32),
}

/// Send SIGTERM to a process
#[cfg(unix)]
pub fn terminate_process(pid: u32) -> Result<(), SignalFailure> {
    let target = i32::try_from(pid).map_err(|_| SignalFailure::NoSuchProcess)?;
    tracing::debug!(pid, "sending SIGTERM");
    kill(Pid::from_raw(target), Signal::SIGTERM).map_err(|errno| match errno {
        Errno::ESRCH => SignalFailure::NoSuchProcess,
        Errno::EPERM => SignalFailure::PermissionDenied,
        other => SignalFailure::Other(other as i32),
    })
}

#[cfg(not(unix))]
pub fn terminate_process(_pid: u32) -> Result<(), SignalFailure> {
    Err(SignalFailure::Other(0))
}

/// Name of a signal number, e.g. `SIGTERM`
#[cfg(unix)]
pub fn signal_name(signal: i32) -> String {
    Signal::try_from(signal)
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|_| format!("signal {}", signal))
}

#[cfg(not(unix))]
pub fn signal_name(signal: i32) -> String {
    format!("signal {}", signal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn take_clears_the_flag() {
        let interrupt = Interrupt::default();
        assert!(!interrupt.take());
        interrupt.raise();
        assert!(interrupt.is_raised());
        assert!(interrupt.take());
        assert!(!interrupt.is_raised());
    }

    #[test]
    fn clones_share_the_flag() {
        let interrupt = Interrupt::default();
        let handler_side = interrupt.clone();
        handler_side.raise();
        assert!(interrupt.take());
    }

    #[test]
    fn wait_returns_exit_status() {
        let interrupt = Interrupt::default();
        let mut child = Command::new("true").spawn().unwrap();
        let status = interrupt.wait(&mut child).unwrap();
        assert!(status.unwrap().success());
    }

    #[test]
    fn wait_unwinds_when_interrupted() {
        let interrupt = Interrupt::default();
        let mut child = Command::new("sleep").arg("5").spawn().unwrap();
        interrupt.raise();
        assert!(interrupt.wait(&mut child).unwrap().is_none());
        child.kill().unwrap();
        child.wait().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn terminate_missing_process() {
        assert_eq!(
            terminate_process(i32::MAX as u32),
            Err(SignalFailure::NoSuchProcess)
        );
    }

    #[cfg(unix)]
    #[test]
    fn names_common_signals() {
        assert_eq!(signal_name(15), "SIGTERM");
        assert_eq!(signal_name(9), "SIGKILL");
    }
}

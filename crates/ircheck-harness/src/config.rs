//! Subject configuration.
//!
//! Everything a scenario needs to know about the subject binary is passed
//! in here at session construction; there is no process-wide mutable state.

use std::path::PathBuf;
use std::time::Duration;

/// Default bounded wait for a single reply.
pub const DEFAULT_MSG_TIMEOUT: Duration = Duration::from_millis(100);

/// Log verbosity forwarded to the subject on its command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    #[default]
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl LogLevel {
    /// The subject CLI flag for this level, if any. `Normal` is the
    /// subject's default and needs no flag.
    pub fn flag(self) -> Option<&'static str> {
        match self {
            LogLevel::Quiet => Some("-q"),
            LogLevel::Normal => None,
            LogLevel::Verbose => Some("-v"),
            LogLevel::VeryVerbose => Some("-vv"),
        }
    }
}

/// How listening ports are assigned to spawned subjects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortPolicy {
    Fixed(u16),
    /// A fresh port in 10000..60000 per attempt; bind failures get a
    /// bounded number of respawns with a regenerated port.
    Random,
}

/// Configuration for one subject process (or one federation of them).
#[derive(Debug, Clone)]
pub struct SubjectConfig {
    /// Path to the subject server binary.
    pub exe: PathBuf,
    pub port: PortPolicy,
    pub loglevel: LogLevel,
    /// Bounded wait applied to every `read_message`.
    pub msg_timeout: Duration,
    /// Attach to an already-running server on this port instead of
    /// spawning; start/stop become no-ops.
    pub external_port: Option<u16>,
    /// Let the subject inherit stdout/stderr instead of discarding them.
    pub show_output: bool,
}

impl SubjectConfig {
    pub fn new(exe: impl Into<PathBuf>) -> SubjectConfig {
        SubjectConfig {
            exe: exe.into(),
            port: PortPolicy::Random,
            loglevel: LogLevel::Quiet,
            msg_timeout: DEFAULT_MSG_TIMEOUT,
            external_port: None,
            show_output: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loglevel_flags() {
        assert_eq!(LogLevel::Quiet.flag(), Some("-q"));
        assert_eq!(LogLevel::Normal.flag(), None);
        assert_eq!(LogLevel::Verbose.flag(), Some("-v"));
        assert_eq!(LogLevel::VeryVerbose.flag(), Some("-vv"));
    }
}

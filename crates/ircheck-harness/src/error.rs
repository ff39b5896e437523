//! Harness error taxonomy.
//!
//! Codec and transport failures abort the current scenario. Assertion
//! failures carry the raw offending line so the report shows exactly what
//! arrived on the wire. A subject process that exits outside an explicit
//! stop is always a failure, even when every assertion already passed.

use core::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;

use ircheck_proto::MalformedMessage;

pub type Result<T> = std::result::Result<T, HarnessError>;

#[derive(Debug)]
pub enum HarnessError {
    /// A line arrived that the codec could not decode.
    Malformed(MalformedMessage),
    /// Connect retries exhausted without reaching the subject.
    ConnectionFailure {
        host: String,
        port: u16,
        attempts: u32,
        last: std::io::Error,
    },
    /// The subject closed the connection when the harness still expected
    /// traffic. Kept distinct from [`HarnessError::ReplyTimeout`]: EOF means
    /// the subject acted, a timeout means it stayed silent.
    ConnectionClosed,
    /// The bounded wait elapsed. `partial` holds whatever unterminated
    /// bytes were received, so a report can distinguish "sent nothing"
    /// from "sent a fragment".
    ReplyTimeout { partial: Vec<u8> },
    /// The subject process could not be started.
    CouldNotStart { exe: PathBuf, detail: String },
    /// The subject process exited outside an explicit stop.
    UnexpectedProcessExit {
        status: ExitStatus,
        scratch: Option<PathBuf>,
    },
    /// An expectation did not hold against an observed message.
    Assertion {
        detail: String,
        raw: Option<String>,
    },
    Io(std::io::Error),
}

impl HarnessError {
    /// Assertion failure with the offending message's raw wire text.
    pub fn assertion(detail: impl Into<String>, raw: Option<&str>) -> HarnessError {
        HarnessError::Assertion {
            detail: detail.into(),
            raw: raw.map(str::to_string),
        }
    }
}

impl fmt::Display for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(e) => write!(f, "malformed message: {e}"),
            Self::ConnectionFailure {
                host,
                port,
                attempts,
                last,
            } => write!(
                f,
                "could not connect to {host}:{port} after {attempts} attempts: {last}"
            ),
            Self::ConnectionClosed => write!(
                f,
                "server closed connection unexpectedly (possible crash in subject?)"
            ),
            Self::ReplyTimeout { partial } => {
                if partial.is_empty() {
                    write!(f, "expected a reply but got none (no bytes received)")
                } else {
                    write!(
                        f,
                        "expected a reply but got an unterminated fragment: |||{}|||",
                        String::from_utf8_lossy(partial)
                    )
                }
            }
            Self::CouldNotStart { exe, detail } => {
                write!(f, "subject {} failed to start: {detail}", exe.display())
            }
            Self::UnexpectedProcessExit { status, scratch } => {
                write!(f, "subject process exited during test ({status})")?;
                if let Some(dir) = scratch {
                    write!(f, "; scratch directory preserved at {}", dir.display())?;
                }
                Ok(())
            }
            Self::Assertion { detail, raw } => {
                write!(f, "{detail}")?;
                if let Some(raw) = raw {
                    write!(f, "\n\nMESSAGE: |||{raw}|||")?;
                }
                Ok(())
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for HarnessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Malformed(e) => Some(e),
            Self::ConnectionFailure { last, .. } => Some(last),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MalformedMessage> for HarnessError {
    fn from(e: MalformedMessage) -> Self {
        Self::Malformed(e)
    }
}

impl From<std::io::Error> for HarnessError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

//! Conformance scenario suite for IRC server implementations.
//!
//! Scenarios drive a subject server binary through real socket traffic and
//! assert on every reply. Each scenario is registered via the [`scenario!`]
//! macro and collected through inventory, so the binary can enumerate and
//! run them by name:
//!
//! ```bash
//! ircheck-conformance --exe ./ircd --list
//! ircheck-conformance --exe ./ircd --case connection.welcome_basic
//! ```
//!
//! The binary exits with:
//! - 0: scenario passed
//! - 1: scenario failed (subject violated an expectation, or crashed)
//! - 2: usage or internal error

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use ircheck_harness::{Network, Result, ServerSession, SubjectConfig};

pub mod scenarios;

/// Everything a scenario needs to build sessions and topologies.
pub struct ScenarioCtx {
    pub subject: SubjectConfig,
}

impl ScenarioCtx {
    pub fn new(subject: SubjectConfig) -> ScenarioCtx {
        ScenarioCtx { subject }
    }

    /// A session for this subject, not yet started (so a scenario can still
    /// stage a MOTD file).
    pub fn session(&self) -> ServerSession {
        ServerSession::new(self.subject.clone())
    }

    /// A session for this subject, started.
    pub fn start_session(&self) -> Result<ServerSession> {
        let mut session = self.session();
        session.start()?;
        Ok(session)
    }

    /// An N-server federation sharing one network descriptor. Members are
    /// laid out but not started.
    pub fn network(&self, num_servers: usize) -> Network {
        Network::new(&self.subject, num_servers)
    }
}

/// The boxed future a scenario function returns.
pub type ScenarioFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + 'a>>;

/// A registered conformance scenario.
pub struct Scenario {
    pub name: &'static str,
    pub category: &'static str,
    pub func: for<'a> fn(&'a ScenarioCtx) -> ScenarioFuture<'a>,
}

inventory::collect!(Scenario);

/// Register an async scenario function under a dotted name and a rubric
/// category.
#[macro_export]
macro_rules! scenario {
    ($name:literal, $category:literal, $func:ident) => {
        inventory::submit! {
            $crate::Scenario {
                name: $name,
                category: $category,
                func: {
                    fn wrapper(ctx: &$crate::ScenarioCtx) -> $crate::ScenarioFuture<'_> {
                        Box::pin($func(ctx))
                    }
                    wrapper
                },
            }
        }
    };
}

/// Outcome of one scenario run, as reported by the binary.
#[derive(Debug, Serialize)]
pub struct TestResult {
    pub test: String,
    pub passed: bool,
    pub error: Option<String>,
}

impl TestResult {
    pub fn pass(test: &str) -> TestResult {
        TestResult {
            test: test.to_string(),
            passed: true,
            error: None,
        }
    }

    pub fn fail(test: &str, error: impl Into<String>) -> TestResult {
        TestResult {
            test: test.to_string(),
            passed: false,
            error: Some(error.into()),
        }
    }
}

//! Process session: owns one spawned subject server.
//!
//! A session allocates the port and scratch directory, builds the subject's
//! command line, spawns it, and guarantees teardown in the right order:
//! clients first (enforced by the borrow checker, since clients borrow the
//! session), then the process, then the scratch directory. The scratch
//! directory is preserved when a crash is detected, as postmortem evidence.

use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rand::Rng;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::config::{PortPolicy, SubjectConfig};
use crate::error::{HarnessError, Result};
use crate::network::{self, NetworkMember};

const HOST: &str = "127.0.0.1";

/// How long to wait before polling a freshly spawned subject for an
/// immediate exit.
const STARTUP_GRACE: Duration = Duration::from_millis(10);

/// Spawn retries when ports are randomized (a bind failure gets a fresh
/// port). Fixed ports get exactly one attempt.
const RANDOM_PORT_TRIES: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Created,
    Running,
    Stopped,
}

/// Federation identity of a session: its own server name plus the full
/// network it belongs to, written out as the descriptor file at start.
struct Federation {
    servername: String,
    members: Vec<NetworkMember>,
}

/// One subject server process and the resources it owns.
pub struct ServerSession {
    config: SubjectConfig,
    port: u16,
    oper_password: String,
    motd: Option<String>,
    federation: Option<Federation>,
    scratch: Option<TempDir>,
    child: Option<Child>,
    live_clients: AtomicUsize,
    state: State,
}

impl ServerSession {
    /// Session for a standalone (non-federated) subject.
    pub fn new(config: SubjectConfig) -> ServerSession {
        let port = match config.port {
            PortPolicy::Fixed(p) => p,
            PortPolicy::Random => 0, // chosen at start, regenerated per retry
        };
        ServerSession {
            config,
            port,
            oper_password: random_oper_password(),
            motd: None,
            federation: None,
            scratch: None,
            child: None,
            live_clients: AtomicUsize::new(0),
            state: State::Created,
        }
    }

    /// Session for one member of a federation. The port comes from the
    /// shared network descriptor, which every member reads at startup.
    pub fn for_network(
        config: SubjectConfig,
        members: Vec<NetworkMember>,
        index: usize,
    ) -> ServerSession {
        let member = &members[index];
        let port = member.port;
        let servername = member.servername.clone();
        ServerSession {
            config,
            port,
            oper_password: random_oper_password(),
            motd: None,
            federation: Some(Federation {
                servername,
                members,
            }),
            scratch: None,
            child: None,
            live_clients: AtomicUsize::new(0),
            state: State::Created,
        }
    }

    /// Stage a message-of-the-day file; written into the scratch directory
    /// before the subject is spawned.
    pub fn set_motd(&mut self, motd: impl Into<String>) {
        self.motd = Some(motd.into());
    }

    /// Spawn the subject and verify it survives its startup grace period.
    pub fn start(&mut self) -> Result<()> {
        if self.state == State::Running {
            return Ok(());
        }

        if let Some(port) = self.config.external_port {
            self.port = port;
            self.state = State::Running;
            info!(port, "attached to external subject");
            return Ok(());
        }

        let exe = std::path::absolute(&self.config.exe).map_err(|e| {
            HarnessError::CouldNotStart {
                exe: self.config.exe.clone(),
                detail: e.to_string(),
            }
        })?;

        let tries = if self.federation.is_none() && self.config.port == PortPolicy::Random {
            RANDOM_PORT_TRIES
        } else {
            1
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            if self.federation.is_none() && self.config.port == PortPolicy::Random {
                self.port = random_port();
            }

            let scratch = TempDir::new()?;
            if let Some(motd) = &self.motd {
                std::fs::write(scratch.path().join("motd.txt"), motd)?;
            }
            let args = self.build_args(scratch.path())?;

            debug!(exe = %exe.display(), ?args, "spawning subject");
            let mut cmd = Command::new(&exe);
            cmd.args(&args).current_dir(scratch.path());
            if !self.config.show_output {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }

            let mut child = cmd.spawn().map_err(|e| HarnessError::CouldNotStart {
                exe: exe.clone(),
                detail: e.to_string(),
            })?;

            std::thread::sleep(STARTUP_GRACE);
            match child.try_wait()? {
                Some(status) => {
                    warn!(%status, attempt, "subject exited immediately after spawn");
                    if attempt >= tries {
                        return Err(HarnessError::CouldNotStart {
                            exe,
                            detail: format!("exited with {status} before accepting connections"),
                        });
                    }
                }
                None => {
                    info!(port = self.port, "subject running");
                    self.child = Some(child);
                    self.scratch = Some(scratch);
                    self.state = State::Running;
                    return Ok(());
                }
            }
        }
    }

    /// Tear the session down. Idempotent: repeated calls are no-ops.
    ///
    /// If the subject already exited with a nonzero status, that is a
    /// failure in its own right and the scratch directory is preserved.
    pub fn stop(&mut self) -> Result<()> {
        match self.state {
            State::Stopped => return Ok(()),
            State::Created => {
                self.state = State::Stopped;
                return Ok(());
            }
            State::Running => {}
        }
        self.state = State::Stopped;

        let leaked = self.live_clients.load(Ordering::SeqCst);
        if leaked > 0 {
            warn!(leaked, "clients still registered at stop");
        }

        let Some(mut child) = self.child.take() else {
            // External subject; nothing to reap.
            return Ok(());
        };

        match child.try_wait() {
            Ok(Some(status)) if !status.success() => {
                let scratch = self.scratch.take().map(TempDir::keep);
                if let Some(dir) = &scratch {
                    warn!(dir = %dir.display(), "scratch directory preserved for postmortem");
                }
                Err(HarnessError::UnexpectedProcessExit { status, scratch })
            }
            Ok(Some(_)) => {
                self.scratch = None;
                Ok(())
            }
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                self.scratch = None;
                Ok(())
            }
        }
    }

    /// Run the teardown after a scenario body, reporting the scenario's own
    /// outcome first when both fail.
    pub fn finish(mut self, outcome: Result<()>) -> Result<()> {
        let teardown = self.stop();
        outcome.and(teardown)
    }

    /// Open a client connection to this session's server.
    pub async fn client(&self) -> Result<Client<'_>> {
        Client::connect(self, false).await
    }

    /// Like [`ServerSession::client`], but with Nagle's algorithm disabled
    /// so fragmented sends hit the wire as written.
    pub async fn client_nodelay(&self) -> Result<Client<'_>> {
        Client::connect(self, true).await
    }

    pub fn host(&self) -> &'static str {
        HOST
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn oper_password(&self) -> &str {
        &self.oper_password
    }

    /// This session's server name, when part of a federation.
    pub fn servername(&self) -> Option<&str> {
        self.federation.as_ref().map(|f| f.servername.as_str())
    }

    pub fn msg_timeout(&self) -> Duration {
        self.config.msg_timeout
    }

    pub(crate) fn client_connected(&self) {
        self.live_clients.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn client_dropped(&self) {
        self.live_clients.fetch_sub(1, Ordering::SeqCst);
    }

    /// Subject argument list per the CLI contract: listening port (or
    /// network descriptor plus own identity), operator password, verbosity.
    fn build_args(&self, scratch: &Path) -> Result<Vec<String>> {
        let mut args = Vec::new();

        if let Some(federation) = &self.federation {
            let descriptor = scratch.join("network.txt");
            network::write_descriptor(&federation.members, &descriptor)?;
            args.push("-n".to_string());
            args.push(descriptor.to_string_lossy().into_owned());
            args.push("-s".to_string());
            args.push(federation.servername.clone());
        } else {
            args.push("-p".to_string());
            args.push(self.port.to_string());
        }

        args.push("-o".to_string());
        args.push(self.oper_password.clone());

        if let Some(flag) = self.config.loglevel.flag() {
            args.push(flag.to_string());
        }

        Ok(args)
    }
}

impl Drop for ServerSession {
    fn drop(&mut self) {
        // Backstop for panic and early-return paths; stop() is the normal
        // route and reports crashes properly.
        if self.state != State::Running {
            return;
        }
        if let Some(mut child) = self.child.take() {
            match child.try_wait() {
                Ok(Some(status)) if !status.success() => {
                    if let Some(dir) = self.scratch.take() {
                        let path = dir.keep();
                        warn!(
                            %status,
                            dir = %path.display(),
                            "subject crashed; scratch directory preserved"
                        );
                    }
                }
                Ok(Some(_)) => {}
                _ => {
                    let _ = child.kill();
                    let _ = child.wait();
                }
            }
        }
    }
}

fn random_port() -> u16 {
    rand::rng().random_range(10000..60000)
}

fn random_oper_password() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("oper-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    fn config(port: PortPolicy) -> SubjectConfig {
        let mut config = SubjectConfig::new("/bin/false");
        config.port = port;
        config
    }

    #[test]
    fn oper_password_is_randomized() {
        let a = ServerSession::new(config(PortPolicy::Fixed(7776)));
        let b = ServerSession::new(config(PortPolicy::Fixed(7776)));
        assert!(a.oper_password().starts_with("oper-"));
        assert_eq!(a.oper_password().len(), "oper-".len() + 8);
        assert_ne!(a.oper_password(), b.oper_password());
    }

    #[test]
    fn standalone_args() {
        let mut config = config(PortPolicy::Fixed(7776));
        config.loglevel = LogLevel::VeryVerbose;
        let session = ServerSession::new(config);

        let scratch = TempDir::new().unwrap();
        let args = session.build_args(scratch.path()).unwrap();
        assert_eq!(
            args,
            vec![
                "-p".to_string(),
                "7776".to_string(),
                "-o".to_string(),
                session.oper_password().to_string(),
                "-vv".to_string(),
            ]
        );
    }

    #[test]
    fn federation_args_write_descriptor() {
        let members = vec![
            NetworkMember {
                servername: "irc-1.example.net".to_string(),
                hostname: "127.0.0.1".to_string(),
                port: 7776,
                passwd: "passwd1".to_string(),
            },
            NetworkMember {
                servername: "irc-2.example.net".to_string(),
                hostname: "127.0.0.1".to_string(),
                port: 7777,
                passwd: "passwd2".to_string(),
            },
        ];
        let session = ServerSession::for_network(config(PortPolicy::Fixed(7776)), members, 1);
        assert_eq!(session.port(), 7777);
        assert_eq!(session.servername(), Some("irc-2.example.net"));

        let scratch = TempDir::new().unwrap();
        let args = session.build_args(scratch.path()).unwrap();
        assert_eq!(args[0], "-n");
        assert_eq!(args[2], "-s");
        assert_eq!(args[3], "irc-2.example.net");

        let descriptor = std::fs::read_to_string(scratch.path().join("network.txt")).unwrap();
        assert_eq!(
            descriptor,
            "irc-1.example.net,127.0.0.1,7776,passwd1\nirc-2.example.net,127.0.0.1,7777,passwd2\n"
        );
    }

    #[test]
    fn start_with_missing_exe_fails() {
        let mut session = ServerSession::new(config(PortPolicy::Fixed(7776)));
        session.config.exe = "/nonexistent/ircd".into();
        let err = session.start().unwrap_err();
        assert!(matches!(err, HarnessError::CouldNotStart { .. }));
    }

    #[test]
    fn stop_before_start_is_a_noop() {
        let mut session = ServerSession::new(config(PortPolicy::Fixed(7776)));
        session.stop().unwrap();
        session.stop().unwrap();
    }
}

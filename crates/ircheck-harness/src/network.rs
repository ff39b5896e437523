//! Topology orchestration: multi-server federations and the dummy peer.
//!
//! A federation is N sessions sharing one network descriptor. Starting a
//! session never links it to anything; linking is a protocol-level action a
//! scenario performs explicitly, either through a real CONNECT issued by an
//! operator client, or through a [`DummyPeer`] that speaks the
//! server-to-server handshake over a raw client connection.
//!
//! Link establishment has no synchronous acknowledgment, so scenarios must
//! [`Network::settle`] after such actions before asserting on relayed
//! results.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info};

use crate::client::Client;
use crate::config::{PortPolicy, SubjectConfig};
use crate::error::Result;
use crate::expect;
use crate::session::ServerSession;

/// Wait inserted after actions whose effects are asynchronous and
/// unacknowledged (CONNECT, dummy-peer announcements).
pub const SETTLE_DELAY: Duration = Duration::from_millis(200);

/// One row of the shared network descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkMember {
    pub servername: String,
    pub hostname: String,
    pub port: u16,
    pub passwd: String,
}

/// Write the descriptor file: one `servername,hostname,port,password` line
/// per federation member. Written once, read by every spawned subject.
pub fn write_descriptor(members: &[NetworkMember], path: &Path) -> std::io::Result<()> {
    let mut f = std::fs::File::create(path)?;
    for m in members {
        writeln!(f, "{},{},{},{}", m.servername, m.hostname, m.port, m.passwd)?;
    }
    Ok(())
}

/// A federation of subject servers sharing one network descriptor.
pub struct Network {
    members: Vec<NetworkMember>,
    sessions: Vec<ServerSession>,
}

impl Network {
    /// Lay out an N-server network. Ports are contiguous from the base
    /// (the configured fixed port, or one random base per network);
    /// member `i` is named `irc-<i+1>.example.net`.
    pub fn new(config: &SubjectConfig, num_servers: usize) -> Network {
        let base_port = match config.port {
            PortPolicy::Fixed(p) => p,
            PortPolicy::Random => rand::rng().random_range(10000..60000),
        };

        let members: Vec<NetworkMember> = (0..num_servers)
            .map(|i| NetworkMember {
                servername: format!("irc-{}.example.net", i + 1),
                hostname: "127.0.0.1".to_string(),
                port: base_port + i as u16,
                passwd: format!("passwd{}", i + 1),
            })
            .collect();

        let sessions = (0..num_servers)
            .map(|i| ServerSession::for_network(config.clone(), members.clone(), i))
            .collect();

        Network { members, sessions }
    }

    /// Start one member's subject process. Does not link it to anyone.
    pub fn start(&mut self, index: usize) -> Result<()> {
        info!(index, server = %self.members[index].servername, "starting federation member");
        self.sessions[index].start()
    }

    pub fn session(&self, index: usize) -> &ServerSession {
        &self.sessions[index]
    }

    pub fn member(&self, index: usize) -> &NetworkMember {
        &self.members[index]
    }

    pub fn num_servers(&self) -> usize {
        self.members.len()
    }

    /// Wait out [`SETTLE_DELAY`] before asserting on asynchronous fan-out.
    pub async fn settle(&self) {
        tokio::time::sleep(SETTLE_DELAY).await;
    }

    /// Stop every member. All sessions are torn down even when one fails;
    /// the first failure is reported.
    pub fn stop_all(&mut self) -> Result<()> {
        let mut first_err = None;
        for session in &mut self.sessions {
            if let Err(e) = session.stop() {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Teardown companion to a scenario body, like [`ServerSession::finish`].
    pub fn finish(mut self, outcome: Result<()>) -> Result<()> {
        let teardown = self.stop_all();
        outcome.and(teardown)
    }
}

/// An emulated peer server: a single client connection that has performed
/// the server-to-server handshake and can inject hand-crafted frames a real
/// peer would send.
///
/// This lets federation behavior be verified against a single subject
/// binary, instead of two cooperating (and possibly independently buggy)
/// subject processes.
pub struct DummyPeer<'s> {
    client: Client<'s>,
    servername: String,
}

impl<'s> DummyPeer<'s> {
    /// Register against `passive`'s subject, claiming `identity`: send PASS
    /// (no synchronous reply) then SERVER, and verify the subject's own
    /// PASS/SERVER registration burst.
    pub async fn register(
        session: &'s ServerSession,
        passive: &NetworkMember,
        identity: &NetworkMember,
    ) -> Result<DummyPeer<'s>> {
        let mut client = session.client().await?;

        client
            .send_line(&format!("PASS {} 0210 ircheck|test", passive.passwd))
            .await?;
        expect::silence(&mut client).await?;

        client
            .send_line(&format!("SERVER {} 1 1 :Test Server", identity.servername))
            .await?;
        expect::server_registration(&mut client, passive, identity).await?;

        debug!(server = %identity.servername, "dummy peer registered");
        Ok(DummyPeer {
            client,
            servername: identity.servername.clone(),
        })
    }

    /// Announce a user connected to the emulated server, the way a real
    /// peer propagates a registration.
    pub async fn announce_user(&mut self, nick: &str) -> Result<()> {
        let line = format!(
            ":{} NICK {nick} 1 {nick} 127.0.0.1 1 + :{nick}",
            self.servername
        );
        self.client.send_line(&line).await
    }

    /// Inject a PRIVMSG originating from a user on the emulated server.
    pub async fn privmsg_from(&mut self, from_nick: &str, to: &str, text: &str) -> Result<()> {
        self.client
            .send_line(&format!(":{from_nick} PRIVMSG {to} :{text}"))
            .await
    }

    /// Expect the subject to forward a local registration to this peer.
    pub async fn expect_announced(&mut self, passive: &NetworkMember, nick: &str) -> Result<()> {
        expect::network_nick(&mut self.client, &passive.servername, nick, "1", nick)
            .await
            .map(|_| ())
    }

    /// The underlying connection, for direct expectations (relays arriving
    /// at the peer, or silence when nothing must be forwarded).
    pub fn client_mut(&mut self) -> &mut Client<'s> {
        &mut self.client
    }

    pub fn servername(&self) -> &str {
        &self.servername
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_layout_is_contiguous() {
        let mut config = SubjectConfig::new("/bin/false");
        config.port = PortPolicy::Fixed(7776);
        let network = Network::new(&config, 3);

        assert_eq!(network.num_servers(), 3);
        assert_eq!(network.member(0).servername, "irc-1.example.net");
        assert_eq!(network.member(2).servername, "irc-3.example.net");
        assert_eq!(network.member(0).port, 7776);
        assert_eq!(network.member(1).port, 7777);
        assert_eq!(network.member(2).port, 7778);
        assert_eq!(network.member(1).passwd, "passwd2");
        assert_eq!(network.session(1).servername(), Some("irc-2.example.net"));
    }

    #[test]
    fn descriptor_rendering() {
        let members = vec![NetworkMember {
            servername: "irc-1.example.net".to_string(),
            hostname: "127.0.0.1".to_string(),
            port: 10001,
            passwd: "passwd1".to_string(),
        }];
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("network.txt");
        write_descriptor(&members, &path).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "irc-1.example.net,127.0.0.1,10001,passwd1\n"
        );
    }
}

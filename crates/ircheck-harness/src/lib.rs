//! Harness runtime for black-box IRC server conformance testing.
//!
//! The harness does not implement the protocol server; it drives an
//! externally supplied server binary as the subject under test, emulates
//! protocol peers (clients and, in federation scenarios, other servers),
//! and verifies that observed wire traffic matches the protocol.
//!
//! Layering, leaves first:
//!
//! - [`client`] — one logical connection: connect with retry, send raw
//!   bytes, read one decoded message under a bounded wait.
//! - [`session`] — one spawned subject process: port and scratch-directory
//!   allocation, startup retry, liveness, guaranteed teardown.
//! - [`network`] — composes sessions into a topology (single server or a
//!   federation sharing one network descriptor) and provides the dummy-peer
//!   emulation of a second server.
//! - [`expect`] — declarative expectations over decoded messages, including
//!   multi-message bursts, unordered reply groups, and "nothing arrives"
//!   assertions.
//! - [`flows`] — common action-and-verify sequences (user registration,
//!   channel population) built from the layers above.
//!
//! Scenario code talks to sessions, networks, `expect`, and `flows` only.

pub mod client;
pub mod config;
pub mod error;
pub mod expect;
pub mod flows;
pub mod network;
pub mod session;

pub use client::Client;
pub use config::{LogLevel, PortPolicy, SubjectConfig};
pub use error::{HarnessError, Result};
pub use expect::Expect;
pub use network::{DummyPeer, Network, NetworkMember};
pub use session::ServerSession;

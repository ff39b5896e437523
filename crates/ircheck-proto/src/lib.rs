//! Wire-format types for the IRC client protocol.
//!
//! This crate knows how to take a single CRLF-terminated line off the wire
//! and turn it into a structured [`Message`] (prefix, command, parameters).
//! It deliberately knows nothing about sockets, processes, or expectations;
//! those live in `ircheck-harness`.

pub mod message;
pub mod replies;

pub use message::{MalformedMessage, Message, Prefix};

/// Maximum length of a protocol line, terminator included.
pub const MAX_LINE_LEN: usize = 512;

/// Maximum length of a line's payload, i.e. everything before the CRLF.
///
/// A subject relaying a longer line must truncate it to this many bytes and
/// re-append the terminator.
pub const MAX_PAYLOAD_LEN: usize = MAX_LINE_LEN - 2;

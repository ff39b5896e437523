//! Message decoding.
//!
//! A message is one line of the form:
//!
//! ```text
//! [:<prefix> ]<command>[ <param> ...][ :<trailing param>]\r\n
//! ```
//!
//! Parameters are split on single spaces. The first parameter that starts
//! with `:` consumes the remainder of the line, embedded spaces included;
//! the leading `:` is kept, so expectation code can anchor patterns against
//! the raw wire form.

use core::fmt;

/// The sender prefix of a message.
///
/// Either a bare server/host identifier, or a full `nick!user@host` origin.
/// A prefix containing exactly one of `@`/`!` is malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prefix {
    Server(String),
    User {
        nick: String,
        user: String,
        host: String,
    },
}

impl Prefix {
    fn parse(s: &str) -> Result<Prefix, MalformedMessage> {
        let has_bang = s.contains('!');
        let has_at = s.contains('@');

        match (has_bang, has_at) {
            (false, false) => Ok(Prefix::Server(s.to_string())),
            (true, true) => {
                let bad = || MalformedMessage::BadPrefix {
                    prefix: s.to_string(),
                };
                let (nick, rest) = s.split_once('!').ok_or_else(bad)?;
                let (user, host) = rest.split_once('@').ok_or_else(bad)?;
                if nick.is_empty()
                    || user.is_empty()
                    || host.is_empty()
                    || nick.contains('@')
                    || user.contains('!')
                    || host.contains('!')
                    || host.contains('@')
                {
                    return Err(bad());
                }
                Ok(Prefix::User {
                    nick: nick.to_string(),
                    user: user.to_string(),
                    host: host.to_string(),
                })
            }
            _ => Err(MalformedMessage::BadPrefix {
                prefix: s.to_string(),
            }),
        }
    }

    /// Nick of the originating user, if this is a user prefix.
    pub fn nick(&self) -> Option<&str> {
        match self {
            Prefix::Server(_) => None,
            Prefix::User { nick, .. } => Some(nick),
        }
    }

    /// Host part of the prefix: the server name for a bare prefix, the
    /// user's host otherwise.
    pub fn host(&self) -> &str {
        match self {
            Prefix::Server(name) => name,
            Prefix::User { host, .. } => host,
        }
    }
}

/// One decoded protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub prefix: Option<Prefix>,
    pub command: String,
    pub params: Vec<String>,
    raw: String,
}

impl Message {
    /// Decode a raw line (terminator included) into a [`Message`].
    pub fn parse(raw: &str) -> Result<Message, MalformedMessage> {
        let line = raw
            .strip_suffix("\r\n")
            .ok_or_else(|| MalformedMessage::MissingTerminator {
                line: raw.to_string(),
            })?;

        if line.is_empty() {
            return Err(MalformedMessage::Empty);
        }

        let fields: Vec<&str> = line.split(' ').collect();

        let (prefix, command_idx) = if let Some(stripped) = fields[0].strip_prefix(':') {
            if fields.len() == 1 {
                return Err(MalformedMessage::PrefixWithoutCommand {
                    line: line.to_string(),
                });
            }
            (Some(Prefix::parse(stripped)?), 1)
        } else {
            (None, 0)
        };

        let command = fields[command_idx].to_string();

        let mut params = Vec::new();
        let mut p = command_idx + 1;
        while p < fields.len() {
            if fields[p].starts_with(':') {
                params.push(fields[p..].join(" "));
                break;
            }
            params.push(fields[p].to_string());
            p += 1;
        }

        Ok(Message {
            prefix,
            command,
            params,
            raw: line.to_string(),
        })
    }

    /// The line as received, without the terminator.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The raw line set off with `|||` bookends, for failure messages.
    pub fn bookended(&self) -> String {
        format!("|||{}|||", self.raw)
    }

    /// The trailing parameter with its leading `:` stripped, if any.
    pub fn trailing(&self) -> Option<&str> {
        self.params
            .last()
            .map(|p| p.strip_prefix(':').unwrap_or(p))
    }
}

/// Decode failure for a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedMessage {
    MissingTerminator { line: String },
    Empty,
    PrefixWithoutCommand { line: String },
    BadPrefix { prefix: String },
}

impl fmt::Display for MalformedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTerminator { line } => {
                write!(f, "message does not end in \\r\\n: |||{line}|||")
            }
            Self::Empty => write!(f, "entire message is just \\r\\n"),
            Self::PrefixWithoutCommand { line } => {
                write!(f, "message contains a prefix but no command: |||{line}|||")
            }
            Self::BadPrefix { prefix } => write!(f, "prefix is not well formed: |||{prefix}|||"),
        }
    }
}

impl std::error::Error for MalformedMessage {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_command_only() {
        let msg = Message::parse("PING\r\n").unwrap();
        assert!(msg.prefix.is_none());
        assert_eq!(msg.command, "PING");
        assert!(msg.params.is_empty());
    }

    #[test]
    fn parse_short_params() {
        let msg = Message::parse("MODE #test +o user1\r\n").unwrap();
        assert_eq!(msg.command, "MODE");
        assert_eq!(msg.params, vec!["#test", "+o", "user1"]);
    }

    #[test]
    fn parse_trailing_keeps_spaces_and_colon() {
        let msg = Message::parse("PRIVMSG user2 :Hello there, friend\r\n").unwrap();
        assert_eq!(msg.params.len(), 2);
        assert_eq!(msg.params[1], ":Hello there, friend");
        assert_eq!(msg.trailing(), Some("Hello there, friend"));
    }

    #[test]
    fn parse_server_prefix() {
        let msg = Message::parse(":irc.example.net 001 user1 :Welcome\r\n").unwrap();
        let prefix = msg.prefix.unwrap();
        assert_eq!(prefix, Prefix::Server("irc.example.net".to_string()));
        assert_eq!(prefix.host(), "irc.example.net");
        assert_eq!(prefix.nick(), None);
        assert_eq!(msg.command, "001");
    }

    #[test]
    fn parse_user_prefix() {
        let msg = Message::parse(":user1!usr@host.example.net JOIN #test\r\n").unwrap();
        let prefix = msg.prefix.unwrap();
        assert_eq!(prefix.nick(), Some("user1"));
        assert_eq!(prefix.host(), "host.example.net");
    }

    #[test]
    fn prefix_with_only_bang_is_malformed() {
        let err = Message::parse(":user1!usr JOIN #test\r\n").unwrap_err();
        assert!(matches!(err, MalformedMessage::BadPrefix { .. }));
    }

    #[test]
    fn prefix_with_only_at_is_malformed() {
        let err = Message::parse(":usr@host JOIN #test\r\n").unwrap_err();
        assert!(matches!(err, MalformedMessage::BadPrefix { .. }));
    }

    #[test]
    fn prefix_with_empty_component_is_malformed() {
        let err = Message::parse(":!usr@host JOIN #test\r\n").unwrap_err();
        assert!(matches!(err, MalformedMessage::BadPrefix { .. }));
    }

    #[test]
    fn missing_terminator_rejected() {
        let err = Message::parse("PING").unwrap_err();
        assert!(matches!(err, MalformedMessage::MissingTerminator { .. }));
    }

    #[test]
    fn terminator_only_rejected() {
        assert_eq!(Message::parse("\r\n").unwrap_err(), MalformedMessage::Empty);
    }

    #[test]
    fn prefix_without_command_rejected() {
        let err = Message::parse(":irc.example.net\r\n").unwrap_err();
        assert!(matches!(err, MalformedMessage::PrefixWithoutCommand { .. }));
    }

    #[test]
    fn reparse_is_stable() {
        // Decoding and re-deriving command/parameters is idempotent; parameter
        // order is never altered.
        let raw = ":irc.example.net 322 user1 #test2 3 :A topic with spaces\r\n";
        let msg = Message::parse(raw).unwrap();
        let again = Message::parse(&format!("{}\r\n", msg.raw())).unwrap();
        assert_eq!(msg, again);
        assert_eq!(
            again.params,
            vec!["user1", "#test2", "3", ":A topic with spaces"]
        );
    }

    #[test]
    fn raw_strips_terminator_only() {
        let msg = Message::parse("PONG :irc.example.net\r\n").unwrap();
        assert_eq!(msg.raw(), "PONG :irc.example.net");
        assert_eq!(msg.bookended(), "|||PONG :irc.example.net|||");
    }
}

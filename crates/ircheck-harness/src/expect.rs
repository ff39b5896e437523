//! Expectation engine.
//!
//! An [`Expect`] is an immutable description of one message: command,
//! prefix presence, parameter count, positional literals, and a
//! trailing-parameter pattern with named captures. It is built once and
//! consumed by a single assertion call.
//!
//! On top of the primitive live the composite verifiers: fixed-order bursts
//! (welcome, LUSERS, MOTD), set-valued groups whose members may arrive in
//! any order but whose closing sentinel must come last (LIST, WHO), relay
//! verifiers, and the absence assertion [`silence`], which passes only by
//! waiting out the full timeout.

use std::collections::HashSet;

use regex::Regex;

use ircheck_proto::{MAX_PAYLOAD_LEN, Message, replies};

use crate::client::Client;
use crate::error::{HarnessError, Result};
use crate::network::NetworkMember;

/// Declarative expectations for one message.
///
/// For numeric replies built with [`Expect::reply`], the target nick is an
/// implicit leading parameter: `nparams` counts and `param` indexes the
/// parameters *after* it, mirroring how reply expectations are written.
#[derive(Debug, Clone, Default)]
pub struct Expect {
    command: Option<String>,
    require_prefix: bool,
    leading: Option<String>,
    nparams: Option<usize>,
    params: Vec<(usize, String)>,
    trailing: Option<String>,
    captures: Vec<(String, String)>,
}

impl Expect {
    /// Expect a message with the given command.
    pub fn cmd(command: &str) -> Expect {
        Expect {
            command: Some(command.to_string()),
            ..Expect::default()
        }
    }

    /// Expect a numeric reply: prefixed, with `code` as the command and the
    /// target nick as the implicit first parameter.
    pub fn reply(code: &str, nick: &str) -> Expect {
        Expect {
            command: Some(code.to_string()),
            require_prefix: true,
            leading: Some(nick.to_string()),
            ..Expect::default()
        }
    }

    /// Require the message to carry a prefix.
    pub fn prefixed(mut self) -> Expect {
        self.require_prefix = true;
        self
    }

    /// Expected parameter count (not counting the implicit nick of a reply).
    pub fn nparams(mut self, n: usize) -> Expect {
        self.nparams = Some(n);
        self
    }

    /// Expect a literal at parameter position `index`. Unmentioned
    /// positions are unconstrained.
    pub fn param(mut self, index: usize, literal: impl Into<String>) -> Expect {
        self.params.push((index, literal.into()));
        self
    }

    /// Pattern the trailing parameter must match, anchored as `^:<re>$`.
    pub fn trailing(mut self, pattern: &str) -> Expect {
        self.trailing = Some(pattern.to_string());
        self
    }

    /// Expected value of a named capture in the trailing pattern.
    pub fn capture(mut self, name: &str, value: impl ToString) -> Expect {
        self.captures.push((name.to_string(), value.to_string()));
        self
    }

    /// Check every configured expectation against `msg`.
    pub fn check(&self, msg: &Message) -> Result<()> {
        let shift = usize::from(self.leading.is_some());

        if self.require_prefix && msg.prefix.is_none() {
            return Err(HarnessError::assertion(
                "Expected a prefix, but got none",
                Some(msg.raw()),
            ));
        }

        if let Some(command) = &self.command
            && msg.command != *command
        {
            return Err(HarnessError::assertion(
                format!("Expected command {}, got {} instead", command, msg.command),
                Some(msg.raw()),
            ));
        }

        if let Some(nparams) = self.nparams {
            let expected = nparams + shift;
            if msg.params.len() != expected {
                return Err(HarnessError::assertion(
                    format!(
                        "Expected {} parameters, got {} instead",
                        expected,
                        msg.params.len()
                    ),
                    Some(msg.raw()),
                ));
            }
        }

        if let Some(nick) = &self.leading {
            self.check_param(msg, 0, nick)?;
        }
        for (index, literal) in &self.params {
            self.check_param(msg, index + shift, literal)?;
        }

        if let Some(pattern) = &self.trailing {
            let anchored = format!("^:{pattern}$");
            let re = Regex::new(&anchored).map_err(|e| {
                HarnessError::assertion(format!("invalid trailing pattern {anchored:?}: {e}"), None)
            })?;
            let trailing = msg.params.last().ok_or_else(|| {
                HarnessError::assertion(
                    "Expected a trailing parameter, but message has no parameters",
                    Some(msg.raw()),
                )
            })?;
            let caps = re.captures(trailing).ok_or_else(|| {
                HarnessError::assertion(
                    format!(
                        "|||{trailing}||| <-- Trailing parameter does not match regular expression: {anchored}"
                    ),
                    Some(msg.raw()),
                )
            })?;
            for (name, expected) in &self.captures {
                let got = caps.name(name).map(|m| m.as_str()).ok_or_else(|| {
                    HarnessError::assertion(
                        format!("Trailing pattern has no capture <{name}>: {anchored}"),
                        Some(msg.raw()),
                    )
                })?;
                if got != expected {
                    return Err(HarnessError::assertion(
                        format!(
                            "Expected <{name}> in trailing parameter to be {expected}, not {got} (pattern: {anchored})"
                        ),
                        Some(msg.raw()),
                    ));
                }
            }
        }

        Ok(())
    }

    fn check_param(&self, msg: &Message, index: usize, literal: &str) -> Result<()> {
        match msg.params.get(index) {
            Some(p) if p == literal => Ok(()),
            Some(p) => Err(HarnessError::assertion(
                format!(
                    "Expected parameter #{} to be {}, got {} instead",
                    index + 1,
                    literal,
                    p
                ),
                Some(msg.raw()),
            )),
            None => Err(HarnessError::assertion(
                format!(
                    "Expected parameter #{} to be {}, but message has only {}",
                    index + 1,
                    literal,
                    msg.params.len()
                ),
                Some(msg.raw()),
            )),
        }
    }
}

/// Read one message and check it against `expect`.
pub async fn message(client: &mut Client<'_>, expect: Expect) -> Result<Message> {
    let msg = client.read_message().await?;
    expect.check(&msg)?;
    Ok(msg)
}

/// Assert that nothing arrives within the full timeout window.
///
/// Passing requires waiting the timeout out; there is no cheaper way to
/// prove a negative. A decoded message fails the assertion, an EOF
/// propagates as `ConnectionClosed`.
pub async fn silence(client: &mut Client<'_>) -> Result<()> {
    match client.read_message().await {
        Ok(msg) => Err(HarnessError::assertion(
            "Was not expecting a reply, but got one",
            Some(msg.raw()),
        )),
        Err(HarnessError::ReplyTimeout { .. }) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Assert that the subject closes this connection.
pub async fn disconnected(client: &mut Client<'_>) -> Result<()> {
    match client.read_message().await {
        Err(HarnessError::ConnectionClosed) => Ok(()),
        Ok(msg) => Err(HarnessError::assertion(
            "Expected the server to close the connection, but it sent a message",
            Some(msg.raw()),
        )),
        Err(HarnessError::ReplyTimeout { .. }) => Err(HarnessError::assertion(
            "Expected the server to close the connection, but it did not",
            None,
        )),
        Err(e) => Err(e),
    }
}

/// Assert that a relayed line was truncated to the protocol's payload
/// bound: exactly 510 bytes before the terminator, the trailing text a
/// prefix of what was originally sent.
pub fn truncated(msg: &Message, original_text: &str) -> Result<()> {
    if msg.raw().len() != MAX_PAYLOAD_LEN {
        return Err(HarnessError::assertion(
            format!(
                "Expected relayed line to be truncated to {} bytes, got {}",
                MAX_PAYLOAD_LEN,
                msg.raw().len()
            ),
            Some(msg.raw()),
        ));
    }
    let last = msg.params.last().map(String::as_str).unwrap_or("");
    let Some(text) = last.strip_prefix(':') else {
        return Err(HarnessError::assertion(
            "Expected the truncated payload to be a trailing parameter",
            Some(msg.raw()),
        ));
    };
    if !original_text.starts_with(text) {
        return Err(HarnessError::assertion(
            "Truncated payload is not a prefix of the original text",
            Some(msg.raw()),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Composite bursts
// ---------------------------------------------------------------------------

/// The four-message registration burst, in its fixed order:
/// identity confirmation, host info, creation info, server info.
pub async fn welcome_burst(
    client: &mut Client<'_>,
    nick: &str,
    user: Option<&str>,
) -> Result<Vec<Message>> {
    let user = user.unwrap_or(nick);
    let mut burst = Vec::new();

    burst.push(
        message(
            client,
            Expect::reply(replies::RPL_WELCOME, nick)
                .nparams(1)
                .trailing(&format!(
                    "Welcome to the Internet Relay Network {nick}!{user}.*"
                )),
        )
        .await?,
    );
    burst.push(message(client, Expect::reply(replies::RPL_YOURHOST, nick).nparams(1)).await?);
    burst.push(message(client, Expect::reply(replies::RPL_CREATED, nick).nparams(1)).await?);
    burst.push(message(client, Expect::reply(replies::RPL_MYINFO, nick).nparams(4)).await?);

    Ok(burst)
}

/// Optional count checks for the LUSERS burst. Unset fields are not
/// checked.
#[derive(Debug, Clone, Copy, Default)]
pub struct LusersExpect {
    pub users: Option<u32>,
    pub servers: Option<u32>,
    pub ops: Option<u32>,
    pub unknown: Option<u32>,
    pub channels: Option<u32>,
    pub clients: Option<u32>,
    pub direct_servers: Option<u32>,
}

/// The five-message LUSERS burst (251..255), with counts cross-checked via
/// named captures where the caller pinned them down.
pub async fn lusers(
    client: &mut Client<'_>,
    nick: &str,
    counts: &LusersExpect,
) -> Result<Vec<Message>> {
    let mut burst = Vec::new();

    let mut expect = Expect::reply(replies::RPL_LUSERCLIENT, nick).nparams(1);
    if counts.users.is_some() || counts.servers.is_some() {
        expect = expect
            .trailing(r"There are (?P<users>\d+) users and 0 services on (?P<servers>\d+) servers");
        if let Some(users) = counts.users {
            expect = expect.capture("users", users);
        }
        if let Some(servers) = counts.servers {
            expect = expect.capture("servers", servers);
        }
    }
    burst.push(message(client, expect).await?);

    let mut expect = Expect::reply(replies::RPL_LUSEROP, nick)
        .nparams(2)
        .trailing(r"operator\(s\) online");
    if let Some(ops) = counts.ops {
        expect = expect.param(0, ops.to_string());
    }
    burst.push(message(client, expect).await?);

    let mut expect = Expect::reply(replies::RPL_LUSERUNKNOWN, nick)
        .nparams(2)
        .trailing(r"unknown connection\(s\)");
    if let Some(unknown) = counts.unknown {
        expect = expect.param(0, unknown.to_string());
    }
    burst.push(message(client, expect).await?);

    let mut expect = Expect::reply(replies::RPL_LUSERCHANNELS, nick)
        .nparams(2)
        .trailing("channels formed");
    if let Some(channels) = counts.channels {
        expect = expect.param(0, channels.to_string());
    }
    burst.push(message(client, expect).await?);

    let mut expect = Expect::reply(replies::RPL_LUSERME, nick).nparams(1);
    if counts.clients.is_some() || counts.direct_servers.is_some() {
        expect = expect.trailing(r"I have (?P<clients>\d+) clients and (?P<servers>\d+) servers");
        if let Some(clients) = counts.clients {
            expect = expect.capture("clients", clients);
        }
        if let Some(servers) = counts.direct_servers {
            expect = expect.capture("servers", servers);
        }
    }
    burst.push(message(client, expect).await?);

    Ok(burst)
}

/// The MOTD sequence for the expected file body, or the missing-MOTD error
/// when no file was staged.
pub async fn motd(
    client: &mut Client<'_>,
    nick: &str,
    expect_motd: Option<&str>,
) -> Result<Vec<Message>> {
    let mut msgs = Vec::new();

    match expect_motd {
        None => {
            msgs.push(
                message(
                    client,
                    Expect::reply(replies::ERR_NOMOTD, nick)
                        .nparams(1)
                        .trailing("MOTD File is missing"),
                )
                .await?,
            );
        }
        Some(body) => {
            msgs.push(
                message(
                    client,
                    Expect::reply(replies::RPL_MOTDSTART, nick)
                        .nparams(1)
                        .trailing("- .* Message of the day - "),
                )
                .await?,
            );
            for line in body.trim().split('\n') {
                msgs.push(
                    message(
                        client,
                        Expect::reply(replies::RPL_MOTD, nick)
                            .nparams(1)
                            .trailing(&format!("- {}", regex::escape(line))),
                    )
                    .await?,
                );
            }
            msgs.push(
                message(
                    client,
                    Expect::reply(replies::RPL_ENDOFMOTD, nick)
                        .nparams(1)
                        .trailing("End of MOTD command"),
                )
                .await?,
            );
        }
    }

    Ok(msgs)
}

/// The NAMES reply pair. When `expect_names` is given, the name list of the
/// single 353 row is compared as a set.
pub async fn names(
    client: &mut Client<'_>,
    nick: &str,
    expect_channel: Option<&str>,
    expect_names: Option<&[&str]>,
) -> Result<()> {
    let reply = message(
        client,
        Expect::reply(replies::RPL_NAMREPLY, nick).nparams(3),
    )
    .await?;

    if let Some(channel) = expect_channel {
        if channel == "*" {
            Expect::default().param(1, "*").param(2, "*").check(&reply)?;
        } else {
            Expect::default().param(1, "=").param(2, channel).check(&reply)?;
        }
    }

    if let Some(expect_names) = expect_names {
        let listed: Vec<&str> = reply.params[3]
            .strip_prefix(':')
            .unwrap_or(reply.params[3].as_str())
            .split(' ')
            .collect();
        if listed.len() != expect_names.len() {
            return Err(HarnessError::assertion(
                format!(
                    "Expected list of names to have {} entries, got {}",
                    expect_names.len(),
                    listed.len()
                ),
                Some(reply.raw()),
            ));
        }
        for name in expect_names {
            if !listed.contains(name) {
                return Err(HarnessError::assertion(
                    format!("Expected {name} in NAMES"),
                    Some(reply.raw()),
                ));
            }
        }
    }

    let mut end = Expect::reply(replies::RPL_ENDOFNAMES, nick).nparams(2);
    if let Some(channel) = expect_channel
        && channel != "*"
    {
        end = end.param(0, channel);
    }
    message(client, end).await?;
    Ok(())
}

/// The LIST reply group: exactly one 322 row per expected channel, in any
/// order, then the 323 sentinel. Row keys (channel names) are compared as a
/// set; member counts and, optionally, topics are checked per row.
pub async fn list(
    client: &mut Client<'_>,
    nick: &str,
    channels: &[(&str, usize)],
    topics: Option<&[(&str, &str)]>,
) -> Result<()> {
    let mut remaining: HashSet<&str> = channels.iter().map(|(name, _)| *name).collect();

    for _ in 0..channels.len() {
        let reply = message(client, Expect::reply(replies::RPL_LIST, nick).nparams(3)).await?;

        let channel = reply.params[1].as_str();
        let Some((_, expect_users)) = channels.iter().find(|(name, _)| *name == channel) else {
            return Err(HarnessError::assertion(
                format!("Received unexpected LIST row for {channel}"),
                Some(reply.raw()),
            ));
        };
        if !remaining.remove(channel) {
            return Err(HarnessError::assertion(
                format!("Received duplicate LIST row for {channel}"),
                Some(reply.raw()),
            ));
        }

        let users: usize = reply.params[2].parse().map_err(|_| {
            HarnessError::assertion(
                format!("LIST row user count is not a number: {}", reply.params[2]),
                Some(reply.raw()),
            )
        })?;
        if users != *expect_users {
            return Err(HarnessError::assertion(
                format!("Expected {expect_users} users in {channel}, got {users}"),
                Some(reply.raw()),
            ));
        }

        if let Some(topics) = topics
            && let Some((_, expect_topic)) = topics.iter().find(|(name, _)| *name == channel)
        {
            let topic = reply.params[3]
                .strip_prefix(':')
                .unwrap_or(reply.params[3].as_str());
            if topic != *expect_topic {
                return Err(HarnessError::assertion(
                    format!(
                        "Expected topic for {channel} to be '{expect_topic}', got '{topic}' instead"
                    ),
                    Some(reply.raw()),
                ));
            }
        }
    }

    if !remaining.is_empty() {
        let mut missing: Vec<&str> = remaining.into_iter().collect();
        missing.sort_unstable();
        return Err(HarnessError::assertion(
            format!("Did not receive LIST rows for: {}", missing.join(", ")),
            None,
        ));
    }

    message(
        client,
        Expect::reply(replies::RPL_LISTEND, nick)
            .nparams(1)
            .trailing("End of LIST"),
    )
    .await?;
    Ok(())
}

/// The WHO reply group for a channel: one 352 row per expected nick, in any
/// order, then the 315 sentinel.
pub async fn who(
    client: &mut Client<'_>,
    nick: &str,
    channel: &str,
    expect_nicks: &[&str],
) -> Result<()> {
    let mut remaining: HashSet<&str> = expect_nicks.iter().copied().collect();

    for _ in 0..expect_nicks.len() {
        let reply = message(
            client,
            Expect::reply(replies::RPL_WHOREPLY, nick)
                .nparams(7)
                .param(0, channel),
        )
        .await?;

        let who_nick = reply.params[5].as_str();
        if !remaining.remove(who_nick) {
            return Err(HarnessError::assertion(
                format!("Received unexpected or duplicate WHO row for {who_nick}"),
                Some(reply.raw()),
            ));
        }
    }

    if !remaining.is_empty() {
        let mut missing: Vec<&str> = remaining.into_iter().collect();
        missing.sort_unstable();
        return Err(HarnessError::assertion(
            format!("Did not receive WHO rows for: {}", missing.join(", ")),
            None,
        ));
    }

    message(
        client,
        Expect::reply(replies::RPL_ENDOFWHO, nick)
            .nparams(2)
            .param(0, channel),
    )
    .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Relay verifiers
// ---------------------------------------------------------------------------

fn check_prefix_nick(msg: &Message, from_nick: &str, what: &str) -> Result<()> {
    let nick = msg.prefix.as_ref().and_then(|p| p.nick());
    if nick != Some(from_nick) {
        return Err(HarnessError::assertion(
            format!("Expected {what}'s prefix to have nick '{from_nick}'"),
            Some(msg.raw()),
        ));
    }
    Ok(())
}

fn check_prefix_host(msg: &Message, host: &str, what: &str) -> Result<()> {
    let got = msg.prefix.as_ref().map(|p| p.host());
    if got != Some(host) {
        return Err(HarnessError::assertion(
            format!("Expected {what}'s prefix to be '{host}'"),
            Some(msg.raw()),
        ));
    }
    Ok(())
}

/// A JOIN relayed to `client`. `from_nick` is checked when known; a user's
/// own JOIN echo passes `Some(nick)` too.
pub async fn relayed_join(
    client: &mut Client<'_>,
    from_nick: Option<&str>,
    channel: &str,
) -> Result<Message> {
    let msg = message(
        client,
        Expect::cmd("JOIN").prefixed().nparams(1).param(0, channel),
    )
    .await?;
    if let Some(from) = from_nick {
        check_prefix_nick(&msg, from, "JOIN")?;
    }
    Ok(msg)
}

pub async fn relayed_part(
    client: &mut Client<'_>,
    from_nick: &str,
    channel: &str,
    part_msg: Option<&str>,
) -> Result<Message> {
    let mut expect = Expect::cmd("PART").prefixed().param(0, channel);
    expect = match part_msg {
        Some(text) => expect.nparams(2).trailing(&regex::escape(text)),
        None => expect.nparams(1),
    };
    let msg = message(client, expect).await?;
    check_prefix_nick(&msg, from_nick, "PART")?;
    Ok(msg)
}

pub async fn relayed_quit(
    client: &mut Client<'_>,
    from_nick: &str,
    quit_msg: &str,
) -> Result<Message> {
    let msg = message(
        client,
        Expect::cmd("QUIT")
            .prefixed()
            .nparams(1)
            .trailing(&regex::escape(quit_msg)),
    )
    .await?;
    check_prefix_nick(&msg, from_nick, "QUIT")?;
    Ok(msg)
}

pub async fn relayed_nick(
    client: &mut Client<'_>,
    from_nick: &str,
    new_nick: &str,
) -> Result<Message> {
    let msg = message(
        client,
        Expect::cmd("NICK").prefixed().nparams(1).trailing(new_nick),
    )
    .await?;
    check_prefix_nick(&msg, from_nick, "NICK")?;
    Ok(msg)
}

pub async fn relayed_privmsg(
    client: &mut Client<'_>,
    from_nick: &str,
    recipient: &str,
    text: &str,
) -> Result<Message> {
    let msg = message(
        client,
        Expect::cmd("PRIVMSG")
            .prefixed()
            .nparams(2)
            .param(0, recipient)
            .trailing(&regex::escape(text)),
    )
    .await?;
    check_prefix_nick(&msg, from_nick, "PRIVMSG")?;
    Ok(msg)
}

pub async fn relayed_notice(
    client: &mut Client<'_>,
    from_nick: &str,
    recipient: &str,
    text: &str,
) -> Result<Message> {
    let msg = message(
        client,
        Expect::cmd("NOTICE")
            .prefixed()
            .nparams(2)
            .param(0, recipient)
            .trailing(&regex::escape(text)),
    )
    .await?;
    check_prefix_nick(&msg, from_nick, "NOTICE")?;
    Ok(msg)
}

pub async fn relayed_topic(
    client: &mut Client<'_>,
    from_nick: &str,
    channel: &str,
    topic: &str,
) -> Result<Message> {
    let msg = message(
        client,
        Expect::cmd("TOPIC")
            .prefixed()
            .nparams(2)
            .param(0, channel)
            .trailing(&regex::escape(topic)),
    )
    .await?;
    check_prefix_nick(&msg, from_nick, "TOPIC")?;
    Ok(msg)
}

pub async fn relayed_mode(
    client: &mut Client<'_>,
    from_nick: &str,
    channel: &str,
    mode: &str,
    mode_nick: Option<&str>,
) -> Result<Message> {
    let mut expect = Expect::cmd("MODE")
        .prefixed()
        .param(0, channel)
        .param(1, mode);
    expect = match mode_nick {
        Some(nick) => expect.nparams(3).param(2, nick),
        None => expect.nparams(2),
    };
    let msg = message(client, expect).await?;
    check_prefix_nick(&msg, from_nick, "MODE")?;
    Ok(msg)
}

// ---------------------------------------------------------------------------
// Federation verifiers
// ---------------------------------------------------------------------------

/// The subject's own server-registration burst after a peer registered
/// with it: PASS (carrying the peer's password and protocol version), then
/// SERVER, both prefixed with the subject's server name.
pub async fn server_registration(
    client: &mut Client<'_>,
    passive: &NetworkMember,
    active: &NetworkMember,
) -> Result<()> {
    let msg = message(
        client,
        Expect::cmd("PASS")
            .prefixed()
            .nparams(3)
            .param(0, &active.passwd)
            .param(1, "0210"),
    )
    .await?;
    check_prefix_host(&msg, &passive.servername, "PASS")?;

    let msg = message(
        client,
        Expect::cmd("SERVER")
            .prefixed()
            .nparams(4)
            .param(0, &passive.servername),
    )
    .await?;
    check_prefix_host(&msg, &passive.servername, "SERVER")?;
    Ok(())
}

/// A user registration propagated across a server link: a NICK with the
/// seven server-to-server parameters, prefixed with the announcing server.
pub async fn network_nick(
    client: &mut Client<'_>,
    from_server: &str,
    nick: &str,
    hopcount: &str,
    username: &str,
) -> Result<Message> {
    let msg = message(
        client,
        Expect::cmd("NICK")
            .prefixed()
            .nparams(7)
            .param(0, nick)
            .param(1, hopcount)
            .param(2, username),
    )
    .await?;
    check_prefix_host(&msg, from_server, "NICK")?;
    Ok(msg)
}

/// The standard not-enough-parameters error for `cmd`.
pub async fn need_more_params(client: &mut Client<'_>, nick: &str, cmd: &str) -> Result<Message> {
    message(
        client,
        Expect::reply(replies::ERR_NEEDMOREPARAMS, nick)
            .nparams(2)
            .param(0, cmd)
            .trailing("Not enough parameters"),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(raw: &str) -> Message {
        Message::parse(&format!("{raw}\r\n")).unwrap()
    }

    #[test]
    fn command_mismatch_fails_with_raw_text() {
        let err = Expect::cmd("PART")
            .check(&msg(":user1!u@h JOIN #test"))
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("Expected command PART"));
        assert!(text.contains("|||:user1!u@h JOIN #test|||"));
    }

    #[test]
    fn reply_counts_implicit_nick() {
        // 2 visible parameters plus the implicit target nick.
        let m = msg(":irc.example.net 433 * user1 :Nickname is already in use");
        Expect::reply(replies::ERR_NICKNAMEINUSE, "*")
            .nparams(2)
            .param(0, "user1")
            .check(&m)
            .unwrap();
    }

    #[test]
    fn reply_checks_target_nick() {
        let m = msg(":irc.example.net 001 user2 :Welcome");
        let err = Expect::reply(replies::RPL_WELCOME, "user1")
            .check(&m)
            .unwrap_err();
        assert!(err.to_string().contains("parameter #1"));
    }

    #[test]
    fn reply_requires_prefix() {
        let m = msg("001 user1 :Welcome");
        let err = Expect::reply(replies::RPL_WELCOME, "user1")
            .check(&m)
            .unwrap_err();
        assert!(err.to_string().contains("Expected a prefix"));
    }

    #[test]
    fn unconstrained_positions_are_skipped() {
        let m = msg(":irc.example.net 004 user1 irc.example.net 1.0 ao mtov");
        Expect::reply(replies::RPL_MYINFO, "user1")
            .nparams(4)
            .param(2, "ao")
            .check(&m)
            .unwrap();
    }

    #[test]
    fn trailing_pattern_with_captures() {
        let m = msg(":irc.example.net 251 user1 :There are 5 users and 0 services on 2 servers");
        Expect::reply(replies::RPL_LUSERCLIENT, "user1")
            .trailing(r"There are (?P<users>\d+) users and 0 services on (?P<servers>\d+) servers")
            .capture("users", 5)
            .capture("servers", 2)
            .check(&m)
            .unwrap();

        let err = Expect::reply(replies::RPL_LUSERCLIENT, "user1")
            .trailing(r"There are (?P<users>\d+) users and 0 services on (?P<servers>\d+) servers")
            .capture("users", 6)
            .check(&m)
            .unwrap_err();
        assert!(err.to_string().contains("<users>"));
    }

    #[test]
    fn trailing_pattern_is_anchored() {
        let m = msg(":irc.example.net 422 user1 :MOTD File is missing today");
        let err = Expect::reply(replies::ERR_NOMOTD, "user1")
            .trailing("MOTD File is missing")
            .check(&m)
            .unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn nparams_mismatch_reports_both_counts() {
        let m = msg(":irc.example.net 366 user1 #test :End of NAMES list");
        let err = Expect::reply(replies::RPL_ENDOFNAMES, "user1")
            .nparams(3)
            .check(&m)
            .unwrap_err();
        assert!(err.to_string().contains("Expected 4 parameters, got 3"));
    }

    #[test]
    fn truncated_accepts_exact_bound() {
        let nick_part = ":user1!user1@host PRIVMSG user2 :";
        let body: String = (0..MAX_PAYLOAD_LEN - nick_part.len() + 1)
            .map(|i| char::from(b'a' + (i % 26) as u8))
            .collect();
        let line = format!("{nick_part}{}", &body[..MAX_PAYLOAD_LEN - nick_part.len()]);
        assert_eq!(line.len(), MAX_PAYLOAD_LEN);

        let m = msg(&line);
        truncated(&m, &body).unwrap();

        let short = msg(":user1!user1@host PRIVMSG user2 :hi");
        assert!(truncated(&short, "hi").is_err());
    }
}

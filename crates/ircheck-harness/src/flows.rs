//! Common action-and-verify sequences.
//!
//! Scenario code builds larger situations out of these: registering users,
//! filling channels from a fixture map, granting operator status. Every
//! flow verifies the traffic it triggers as it goes, so a scenario that
//! gets a populated channel back knows the wire was clean along the way.

use std::collections::HashMap;

use ircheck_proto::replies;

use crate::client::Client;
use crate::error::{HarnessError, Result};
use crate::expect::{self, Expect, LusersExpect};
use crate::session::ServerSession;

/// Register a user: NICK and USER, then the welcome burst, the LUSERS
/// burst, and the missing-MOTD error (the default scratch directory has no
/// MOTD file).
pub async fn register_user<'s>(
    session: &'s ServerSession,
    nick: &str,
    username: &str,
) -> Result<Client<'s>> {
    let mut client = session.client().await?;
    client.send_line(&format!("NICK {nick}")).await?;
    client
        .send_line(&format!("USER {nick} * * :{username}"))
        .await?;

    expect::welcome_burst(&mut client, nick, None).await?;
    expect::lusers(&mut client, nick, &LusersExpect::default()).await?;
    expect::motd(&mut client, nick, None).await?;

    Ok(client)
}

/// Register `user1`..`userN`, optionally joining them all to a channel.
pub async fn connect_clients<'s>(
    session: &'s ServerSession,
    numclients: usize,
    join: Option<&str>,
) -> Result<Vec<(String, Client<'s>)>> {
    let mut clients = Vec::new();
    for i in 0..numclients {
        let nick = format!("user{}", i + 1);
        let username = format!("User {nick}");
        let client = register_user(session, &nick, &username).await?;
        clients.push((nick, client));
    }

    if let Some(channel) = join {
        join_channel(&mut clients, channel).await?;
    }

    Ok(clients)
}

/// Join every client to `channel` in order, verifying each join echo and
/// the relays fanned out to everyone already in the channel.
pub async fn join_channel(clients: &mut [(String, Client<'_>)], channel: &str) -> Result<()> {
    for (nick, client) in clients.iter_mut() {
        client.send_line(&format!("JOIN {channel}")).await?;
        expect::relayed_join(client, Some(nick), channel).await?;
        expect::names(client, nick, None, None).await?;
    }

    // Everyone sees one relayed JOIN per member that joined after them.
    let mut relayed = clients.len().saturating_sub(1);
    for (_, client) in clients.iter_mut() {
        for _ in 0..relayed {
            expect::relayed_join(client, None, channel).await?;
        }
        relayed = relayed.saturating_sub(1);
    }

    Ok(())
}

/// Part every client from `channel`, verifying the relays shrink with the
/// membership.
pub async fn part_channel(clients: &mut [(String, Client<'_>)], channel: &str) -> Result<()> {
    for i in 0..clients.len() {
        let part_msg = format!("{} is out of here!", clients[i].0);
        let nick = clients[i].0.clone();

        clients[i]
            .1
            .send_line(&format!("PART {channel} :{part_msg}"))
            .await?;
        expect::relayed_part(&mut clients[i].1, &nick, channel, Some(&part_msg)).await?;

        for (_, other) in clients.iter_mut().skip(i + 1) {
            expect::relayed_part(other, &nick, channel, Some(&part_msg)).await?;
        }
    }
    Ok(())
}

/// Make `nick` an IRC operator using the session's operator password.
pub async fn make_oper(session: &ServerSession, client: &mut Client<'_>, nick: &str) -> Result<()> {
    client
        .send_line(&format!("OPER {nick} {}", session.oper_password()))
        .await?;
    expect::message(
        client,
        Expect::reply(replies::RPL_YOUREOPER, nick)
            .nparams(1)
            .trailing("You are now an IRC operator"),
    )
    .await?;
    Ok(())
}

/// Mark `nick` as away.
pub async fn mark_away(client: &mut Client<'_>, nick: &str, away_msg: &str) -> Result<()> {
    client.send_line(&format!("AWAY :{away_msg}")).await?;
    expect::message(
        client,
        Expect::reply(replies::RPL_NOWAWAY, nick)
            .nparams(1)
            .trailing("You have been marked as being away"),
    )
    .await?;
    Ok(())
}

/// Build a channel population from a fixture map.
///
/// Each entry is a channel plus its members; the `None` channel holds users
/// that connect without joining anything. The first member of a channel is
/// its operator and must carry the `@` marker; later members marked `@` or
/// `+` get `+o`/`+v` from the operator after joining, with the mode change
/// relayed to the whole channel. `aways` and `ircops` then get AWAY and
/// OPER applied.
///
/// Returns the connected clients keyed by nick.
pub async fn populate_channels<'s>(
    session: &'s ServerSession,
    channels: &[(Option<&str>, &[&str])],
    aways: &[&str],
    ircops: &[&str],
) -> Result<HashMap<String, Client<'s>>> {
    let mut users: HashMap<String, Client<'s>> = HashMap::new();

    for (channel, members) in channels {
        if channel.is_none() {
            for user in *members {
                if !users.contains_key(*user) {
                    users.insert(user.to_string(), register_user(session, user, user).await?);
                }
            }
        }
    }

    let mut named: Vec<(&str, &[&str])> = channels
        .iter()
        .filter_map(|(channel, members)| channel.map(|c| (c, *members)))
        .collect();
    named.sort_unstable_by_key(|(channel, _)| *channel);

    for (channel, members) in named {
        let op = members[0].strip_prefix('@').ok_or_else(|| {
            HarnessError::assertion(
                format!("fixture error: first member of {channel} must be its @ operator"),
                None,
            )
        })?;

        if !users.contains_key(op) {
            users.insert(op.to_string(), register_user(session, op, op).await?);
        }

        let op_client = users.get_mut(op).expect("op registered above");
        op_client.send_line(&format!("JOIN {channel}")).await?;
        expect::relayed_join(op_client, Some(op), channel).await?;
        expect::names(op_client, op, None, None).await?;

        let mut joined = vec![op.to_string()];

        for member in &members[1..] {
            let marker = member.chars().next();
            let nick = member.trim_start_matches(['@', '+']);

            if !users.contains_key(nick) {
                users.insert(nick.to_string(), register_user(session, nick, nick).await?);
            }

            let client = users.get_mut(nick).expect("registered above");
            client.send_line(&format!("JOIN {channel}")).await?;
            expect::relayed_join(client, Some(nick), channel).await?;
            expect::names(client, nick, None, None).await?;

            for prior in &joined {
                let prior_client = users.get_mut(prior).expect("joined earlier");
                expect::relayed_join(prior_client, None, channel).await?;
            }
            joined.push(nick.to_string());

            let mode = match marker {
                Some('@') => Some("+o"),
                Some('+') => Some("+v"),
                _ => None,
            };
            if let Some(mode) = mode {
                let op_client = users.get_mut(op).expect("op registered above");
                op_client
                    .send_line(&format!("MODE {channel} {mode} {nick}"))
                    .await?;
                for member in &joined {
                    let member_client = users.get_mut(member).expect("joined earlier");
                    expect::relayed_mode(member_client, op, channel, mode, Some(nick)).await?;
                }
            }
        }
    }

    for user in aways {
        let client = users.get_mut(*user).expect("away user must be in fixture");
        mark_away(client, user, "I'm away").await?;
    }

    for user in ircops {
        let client = users.get_mut(*user).expect("ircop user must be in fixture");
        make_oper(session, client, user).await?;
    }

    Ok(users)
}

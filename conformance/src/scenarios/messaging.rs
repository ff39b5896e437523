//! PRIVMSG/NOTICE relays, AWAY, user and channel modes, OPER, WHOIS.

use ircheck_harness::expect::{self, Expect};
use ircheck_harness::{HarnessError, Result, flows};
use ircheck_proto::replies;

use crate::ScenarioCtx;

async fn privmsg_relay(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client1 = flows::register_user(&session, "user1", "User One").await?;
        let mut client2 = flows::register_user(&session, "user2", "User Two").await?;

        client1.send_line("PRIVMSG user2 :Hello").await?;
        expect::relayed_privmsg(&mut client2, "user1", "user2", "Hello").await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("privmsg.relay", "PRIVMSG_NOTICE", privmsg_relay);

async fn privmsg_no_such_nick(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = flows::register_user(&session, "user1", "User One").await?;
        client.send_line("PRIVMSG user2 :Hello").await?;
        expect::message(
            &mut client,
            Expect::reply(replies::ERR_NOSUCHNICK, "user1")
                .nparams(2)
                .param(0, "user2")
                .trailing("No such nick/channel"),
        )
        .await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("privmsg.no_such_nick", "PRIVMSG_NOTICE", privmsg_no_such_nick);

/// A channel message fans out to every member except the sender, and the
/// sender gets no echo.
async fn privmsg_channel_relay(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut clients = flows::connect_clients(&session, 3, Some("#test")).await?;

        clients[0]
            .1
            .send_line("PRIVMSG #test :Hello from user1!")
            .await?;
        for (_, client) in clients.iter_mut().skip(1) {
            expect::relayed_privmsg(client, "user1", "#test", "Hello from user1!").await?;
        }
        expect::silence(&mut clients[0].1).await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("privmsg.channel_relay", "CHANNEL_PRIVMSG_NOTICE", privmsg_channel_relay);

async fn privmsg_channel_not_member(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client1 = flows::register_user(&session, "user1", "User One").await?;
        client1.send_line("JOIN #test").await?;
        expect::relayed_join(&mut client1, Some("user1"), "#test").await?;
        expect::names(&mut client1, "user1", None, None).await?;

        let mut client2 = flows::register_user(&session, "user2", "User Two").await?;
        client2.send_line("PRIVMSG #test :Hello").await?;
        expect::message(
            &mut client2,
            Expect::reply(replies::ERR_CANNOTSENDTOCHAN, "user2")
                .nparams(2)
                .param(0, "#test")
                .trailing("Cannot send to channel"),
        )
        .await?;

        expect::silence(&mut client1).await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!(
    "privmsg.channel_not_member",
    "CHANNEL_PRIVMSG_NOTICE",
    privmsg_channel_not_member
);

async fn privmsg_channel_missing(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = flows::register_user(&session, "user1", "User One").await?;
        client.send_line("PRIVMSG #test :Hello").await?;
        expect::message(
            &mut client,
            Expect::reply(replies::ERR_NOSUCHNICK, "user1")
                .nparams(2)
                .param(0, "#test")
                .trailing("No such nick/channel"),
        )
        .await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!(
    "privmsg.channel_missing",
    "CHANNEL_PRIVMSG_NOTICE",
    privmsg_channel_missing
);

async fn notice_relay(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client1 = flows::register_user(&session, "user1", "User One").await?;
        let mut client2 = flows::register_user(&session, "user2", "User Two").await?;

        client1.send_line("NOTICE user2 :Hello").await?;
        expect::relayed_notice(&mut client2, "user1", "user2", "Hello").await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("notice.relay", "PRIVMSG_NOTICE", notice_relay);

/// NOTICE never generates error replies, even for missing targets.
async fn notice_missing_target_is_silent(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = flows::register_user(&session, "user1", "User One").await?;
        client.send_line("NOTICE #test :Hello").await?;
        expect::silence(&mut client).await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!(
    "notice.missing_target_is_silent",
    "PRIVMSG_NOTICE",
    notice_missing_target_is_silent
);

/// Messaging an away user gets the away reply; the message itself is
/// still delivered.
async fn away_reply(ctx: &ScenarioCtx) -> Result<()> {
    const AWAY_MSG: &str = "I'm away";

    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client1 = flows::register_user(&session, "user1", "User One").await?;
        let mut client2 = flows::register_user(&session, "user2", "User Two").await?;

        flows::mark_away(&mut client2, "user2", AWAY_MSG).await?;

        client1.send_line("PRIVMSG user2 :Are you there?").await?;
        expect::message(
            &mut client1,
            Expect::reply(replies::RPL_AWAY, "user1")
                .nparams(2)
                .param(0, "user2")
                .trailing(AWAY_MSG),
        )
        .await?;
        expect::relayed_privmsg(&mut client2, "user1", "user2", "Are you there?").await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("away.reply", "AWAY", away_reply);

async fn away_and_back(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = flows::register_user(&session, "user1", "User One").await?;

        flows::mark_away(&mut client, "user1", "brb").await?;

        client.send_line("AWAY").await?;
        expect::message(
            &mut client,
            Expect::reply(replies::RPL_UNAWAY, "user1")
                .nparams(1)
                .trailing("You are no longer marked as being away"),
        )
        .await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("away.and_back", "AWAY", away_and_back);

async fn user_mode_unknown_flag(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = flows::register_user(&session, "user1", "User One").await?;
        client.send_line("MODE user1 +v").await?;
        expect::message(
            &mut client,
            Expect::reply(replies::ERR_UMODEUNKNOWNFLAG, "user1")
                .nparams(1)
                .trailing("Unknown MODE flag"),
        )
        .await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("mode.user_unknown_flag", "MODES", user_mode_unknown_flag);

async fn user_mode_other_user(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = flows::register_user(&session, "user1", "User One").await?;
        client.send_line("MODE user2 -o").await?;
        expect::message(
            &mut client,
            Expect::reply(replies::ERR_USERSDONTMATCH, "user1")
                .nparams(1)
                .trailing("Cannot change mode for other users"),
        )
        .await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("mode.user_other_user", "MODES", user_mode_other_user);

/// Dropping one's own operator flag is acknowledged with a relayed MODE.
async fn user_mode_deop_relayed(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = flows::register_user(&session, "user1", "User One").await?;
        client.send_line("MODE user1 -o").await?;
        let msg = expect::message(
            &mut client,
            Expect::cmd("MODE")
                .prefixed()
                .nparams(2)
                .param(0, "user1")
                .trailing("-o"),
        )
        .await?;
        let prefix = msg.prefix.as_ref().map(|p| p.host());
        if prefix != Some("user1") {
            return Err(HarnessError::assertion(
                "Expected MODE's prefix to be nick 'user1'",
                Some(msg.raw()),
            ));
        }
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("mode.user_deop_relayed", "MODES", user_mode_deop_relayed);

/// Granting oneself +o via MODE is silently ignored: no relay, no error,
/// on any connection.
async fn user_mode_self_op_ignored(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = flows::register_user(&session, "user1", "User One").await?;
        client.send_line("MODE user1 +o").await?;
        expect::silence(&mut client).await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("mode.user_self_op_ignored", "MODES", user_mode_self_op_ignored);

async fn channel_mode_query(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = flows::register_user(&session, "user1", "User One").await?;
        client.send_line("JOIN #test").await?;
        expect::relayed_join(&mut client, Some("user1"), "#test").await?;
        expect::names(&mut client, "user1", None, None).await?;

        client.send_line("MODE #test +m").await?;
        expect::relayed_mode(&mut client, "user1", "#test", "+m", None).await?;

        client.send_line("MODE #test").await?;
        let msg = expect::message(
            &mut client,
            Expect::reply(replies::RPL_CHANNELMODEIS, "user1")
                .nparams(2)
                .param(0, "#test"),
        )
        .await?;
        let mode_string = msg.params.last().map(String::as_str).unwrap_or("");
        let Some(modes) = mode_string.strip_prefix('+') else {
            return Err(HarnessError::assertion(
                "Returned mode string does not start with '+'",
                Some(msg.raw()),
            ));
        };
        if modes != "m" {
            return Err(HarnessError::assertion(
                format!("Expected mode string to be 'm', got '{modes}'"),
                Some(msg.raw()),
            ));
        }
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("mode.channel_query", "MODES", channel_mode_query);

async fn channel_mode_needs_ops(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut clients = flows::connect_clients(&session, 2, Some("#test")).await?;

        clients[1].1.send_line("MODE #test +m").await?;
        expect::message(
            &mut clients[1].1,
            Expect::reply(replies::ERR_CHANOPRIVSNEEDED, "user2")
                .nparams(2)
                .param(0, "#test")
                .trailing("You're not channel operator"),
        )
        .await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("mode.channel_needs_ops", "MODES", channel_mode_needs_ops);

/// In a moderated channel an unvoiced member's message is refused at the
/// sender and, crucially, never relayed: the other members observe
/// nothing at all.
async fn moderated_suppresses_relay(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut clients = flows::connect_clients(&session, 3, Some("#test")).await?;

        clients[0].1.send_line("MODE #test +m").await?;
        for (_, client) in clients.iter_mut() {
            expect::relayed_mode(client, "user1", "#test", "+m", None).await?;
        }

        clients[1].1.send_line("PRIVMSG #test :Hello!").await?;
        expect::message(
            &mut clients[1].1,
            Expect::reply(replies::ERR_CANNOTSENDTOCHAN, "user2")
                .nparams(2)
                .param(0, "#test")
                .trailing("Cannot send to channel"),
        )
        .await?;

        expect::silence(&mut clients[0].1).await?;
        expect::silence(&mut clients[2].1).await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("mode.moderated_suppresses_relay", "MODES", moderated_suppresses_relay);

/// Voicing a member of a moderated channel lets their messages through
/// again.
async fn moderated_voice_allows_speaking(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut clients = flows::connect_clients(&session, 3, Some("#test")).await?;

        clients[0].1.send_line("MODE #test +m").await?;
        for (_, client) in clients.iter_mut() {
            expect::relayed_mode(client, "user1", "#test", "+m", None).await?;
        }

        clients[0].1.send_line("MODE #test +v user2").await?;
        for (_, client) in clients.iter_mut() {
            expect::relayed_mode(client, "user1", "#test", "+v", Some("user2")).await?;
        }

        clients[1].1.send_line("PRIVMSG #test :Hello!").await?;
        expect::relayed_privmsg(&mut clients[0].1, "user2", "#test", "Hello!").await?;
        expect::relayed_privmsg(&mut clients[2].1, "user2", "#test", "Hello!").await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!(
    "mode.moderated_voice_allows_speaking",
    "MODES",
    moderated_voice_allows_speaking
);

async fn oper_password(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = flows::register_user(&session, "user1", "User One").await?;
        flows::make_oper(&session, &mut client, "user1").await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("oper.password", "OPER", oper_password);

async fn oper_bad_password(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = flows::register_user(&session, "user1", "User One").await?;
        client
            .send_line(&format!("OPER user1 BAD{}", session.oper_password()))
            .await?;
        expect::message(
            &mut client,
            Expect::reply(replies::ERR_PASSWDMISMATCH, "user1")
                .nparams(1)
                .trailing("Password incorrect"),
        )
        .await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("oper.bad_password", "OPER", oper_bad_password);

async fn whois_basic(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client1 = flows::register_user(&session, "user1", "User One").await?;
        let _client2 = flows::register_user(&session, "user2", "User Two").await?;

        client1.send_line("WHOIS user2").await?;
        expect::message(
            &mut client1,
            Expect::reply(replies::RPL_WHOISUSER, "user1")
                .nparams(5)
                .trailing("User Two"),
        )
        .await?;
        expect::message(
            &mut client1,
            Expect::reply(replies::RPL_WHOISSERVER, "user1").nparams(3),
        )
        .await?;
        expect::message(
            &mut client1,
            Expect::reply(replies::RPL_ENDOFWHOIS, "user1")
                .nparams(2)
                .trailing("End of WHOIS list"),
        )
        .await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("whois.basic", "WHOIS", whois_basic);

async fn whois_no_such_nick(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = flows::register_user(&session, "user1", "User One").await?;
        client.send_line("WHOIS user9").await?;
        expect::message(
            &mut client,
            Expect::reply(replies::ERR_NOSUCHNICK, "user1")
                .nparams(2)
                .param(0, "user9")
                .trailing("No such nick/channel"),
        )
        .await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("whois.no_such_nick", "WHOIS", whois_no_such_nick);

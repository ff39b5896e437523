//! Connection and registration scenarios.
//!
//! The registration invariant under test: the welcome burst is emitted if
//! and only if both NICK and USER have been accepted at least once,
//! regardless of order; repeating either before completion means only the
//! last value takes effect; commands sent before completion either get the
//! not-registered error (if recognized) or are dropped silently.

use ircheck_harness::expect::{self, Expect, LusersExpect};
use ircheck_harness::{Result, flows};
use ircheck_proto::replies;

use crate::ScenarioCtx;

async fn welcome_basic(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let _client = flows::register_user(&session, "user1", "User One").await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("connection.welcome_basic", "BASIC_CONNECTION", welcome_basic);

async fn welcome_user_first(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = session.client().await?;
        client.send_line("USER user1 * * :User One").await?;
        expect::silence(&mut client).await?;
        client.send_line("NICK user1").await?;
        expect::welcome_burst(&mut client, "user1", None).await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!(
    "connection.welcome_user_first",
    "BASIC_CONNECTION",
    welcome_user_first
);

async fn no_welcome_nick_only(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = session.client().await?;
        client.send_line("NICK user1").await?;
        expect::silence(&mut client).await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!(
    "connection.no_welcome_nick_only",
    "BASIC_CONNECTION",
    no_welcome_nick_only
);

async fn no_welcome_user_only(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = session.client().await?;
        client.send_line("USER user1 * * :User One").await?;
        expect::silence(&mut client).await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!(
    "connection.no_welcome_user_only",
    "BASIC_CONNECTION",
    no_welcome_user_only
);

async fn nick_repeated_last_wins(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = session.client().await?;
        client.send_line("NICK userone").await?;
        client.send_line("NICK usertwo").await?;
        client.send_line("USER usertwo * * :User Two").await?;
        expect::welcome_burst(&mut client, "usertwo", None).await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!(
    "connection.nick_repeated_last_wins",
    "BASIC_CONNECTION",
    nick_repeated_last_wins
);

async fn user_repeated_last_wins(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = session.client().await?;
        client.send_line("USER olduser * * :Old").await?;
        client.send_line("USER newuser * * :New").await?;
        client.send_line("NICK user1").await?;
        expect::welcome_burst(&mut client, "user1", Some("newuser")).await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!(
    "connection.user_repeated_last_wins",
    "BASIC_CONNECTION",
    user_repeated_last_wins
);

async fn known_command_before_registration(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = session.client().await?;
        client.send_line("PRIVMSG user2 :Hello").await?;
        expect::message(
            &mut client,
            Expect::reply(replies::ERR_NOTREGISTERED, "*")
                .nparams(1)
                .trailing("You have not registered"),
        )
        .await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!(
    "connection.known_command_before_registration",
    "BASIC_CONNECTION",
    known_command_before_registration
);

async fn unknown_command_before_registration(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = session.client().await?;
        client.send_line("BLURDYBLOOP user2").await?;
        expect::silence(&mut client).await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!(
    "connection.unknown_command_before_registration",
    "BASIC_CONNECTION",
    unknown_command_before_registration
);

async fn duplicate_nick(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let _client1 = flows::register_user(&session, "user1", "User One").await?;

        let mut client2 = session.client().await?;
        client2.send_line("NICK user1").await?;
        expect::message(
            &mut client2,
            Expect::reply(replies::ERR_NICKNAMEINUSE, "*")
                .nparams(2)
                .param(0, "user1")
                .trailing("Nickname is already in use"),
        )
        .await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("connection.duplicate_nick", "BASIC_CONNECTION", duplicate_nick);

async fn unknown_command_after_registration(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = flows::register_user(&session, "user1", "User One").await?;
        client.send_line("WHOWAS user2").await?;
        expect::message(
            &mut client,
            Expect::reply(replies::ERR_UNKNOWNCOMMAND, "user1")
                .nparams(2)
                .param(0, "WHOWAS")
                .trailing("Unknown command"),
        )
        .await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!(
    "connection.unknown_command_after_registration",
    "ERR_UNKNOWN",
    unknown_command_after_registration
);

async fn ping_pong(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = flows::register_user(&session, "user1", "User One").await?;
        client.send_line("PING").await?;
        expect::message(&mut client, Expect::cmd("PONG").nparams(1)).await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("connection.ping_pong", "PING_PONG", ping_pong);

async fn pong_is_ignored(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = flows::register_user(&session, "user1", "User One").await?;
        client.send_line("PONG").await?;
        expect::silence(&mut client).await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("connection.pong_is_ignored", "PING_PONG", pong_is_ignored);

/// Replies must not leak across connections: only the clients that PING
/// get a PONG back.
async fn ping_does_not_leak(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut clients = flows::connect_clients(&session, 5, None).await?;

        for (_, client) in clients.iter_mut().take(3) {
            client.send_line("PING").await?;
        }
        for (_, client) in clients.iter_mut().take(3) {
            expect::message(client, Expect::cmd("PONG").nparams(1)).await?;
        }
        for (_, client) in clients.iter_mut().skip(3) {
            expect::silence(client).await?;
        }
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("connection.ping_does_not_leak", "PING_PONG", ping_does_not_leak);

async fn quit_closes_connection(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = flows::register_user(&session, "user1", "User One").await?;
        client.send_line("QUIT").await?;
        expect::message(
            &mut client,
            Expect::cmd("ERROR")
                .nparams(1)
                .trailing(r"Closing Link: .* \(Client Quit\)"),
        )
        .await?;
        expect::disconnected(&mut client).await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!(
    "connection.quit_closes_connection",
    "BASIC_CONNECTION",
    quit_closes_connection
);

async fn quit_with_message(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = flows::register_user(&session, "user1", "User One").await?;
        client.send_line("QUIT :I'm outta here").await?;
        expect::message(
            &mut client,
            Expect::cmd("ERROR")
                .nparams(1)
                .trailing(r"Closing Link: .* \(I'm outta here\)"),
        )
        .await?;
        expect::disconnected(&mut client).await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("connection.quit_with_message", "BASIC_CONNECTION", quit_with_message);

async fn motd_from_file(ctx: &ScenarioCtx) -> Result<()> {
    const MOTD: &str = "Welcome to the test server.\nBe excellent to each other.";

    let mut session = ctx.session();
    session.set_motd(MOTD);
    session.start()?;

    let outcome: Result<()> = async {
        let mut client = session.client().await?;
        client.send_line("NICK user1").await?;
        client.send_line("USER user1 * * :User One").await?;

        expect::welcome_burst(&mut client, "user1", None).await?;
        expect::lusers(&mut client, "user1", &LusersExpect::default()).await?;
        expect::motd(&mut client, "user1", Some(MOTD)).await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("connection.motd_from_file", "LUSERS_MOTD", motd_from_file);

async fn lusers_counts(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let _client1 = flows::register_user(&session, "user1", "User One").await?;
        let mut client2 = flows::register_user(&session, "user2", "User Two").await?;

        client2.send_line("LUSERS").await?;
        expect::lusers(
            &mut client2,
            "user2",
            &LusersExpect {
                users: Some(2),
                ops: Some(0),
                unknown: Some(0),
                channels: Some(0),
                clients: Some(2),
                ..LusersExpect::default()
            },
        )
        .await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("connection.lusers_counts", "LUSERS_MOTD", lusers_counts);

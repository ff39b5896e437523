//! Robustness scenarios: fragmented input, oversized lines, whitespace.

use std::time::Duration;

use ircheck_harness::expect::{self, Expect};
use ircheck_harness::{Result, flows};
use ircheck_proto::{MAX_LINE_LEN, replies};

use crate::ScenarioCtx;

const CHUNK_DELAY: Duration = Duration::from_millis(50);

fn long_message(len: usize) -> String {
    (0..len).map(|i| char::from(b'a' + (i % 26) as u8)).collect()
}

async fn whitespace_only_line(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = session.client().await?;
        client.send_line("  ").await?;
        expect::silence(&mut client).await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("robust.whitespace_only_line", "ROBUST", whitespace_only_line);

async fn whitespace_after_registration(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = flows::register_user(&session, "user1", "User One").await?;
        client.send_line("  ").await?;
        expect::silence(&mut client).await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!(
    "robust.whitespace_after_registration",
    "ROBUST",
    whitespace_after_registration
);

/// Registration split into arbitrary chunks, including the terminator
/// split across writes; the subject must reassemble.
async fn fragmented_registration(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = session.client_nodelay().await?;
        client
            .send_raw(
                &[
                    b"NI", b"CK ", b"user1\r", b"\n", b"USER user", b"1 * * ", b":Us", b"er ",
                    b"One", b"\r", b"\n",
                ],
                Some(CHUNK_DELAY),
            )
            .await?;
        expect::message(
            &mut client,
            Expect::reply(replies::RPL_WELCOME, "user1").nparams(1),
        )
        .await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("robust.fragmented_registration", "ROBUST", fragmented_registration);

/// Both registration commands in a single write.
async fn combined_messages(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = session.client_nodelay().await?;
        client
            .send_raw(&[b"NICK user1\r\nUSER user1 * * :User One\r\n"], None)
            .await?;
        expect::message(
            &mut client,
            Expect::reply(replies::RPL_WELCOME, "user1").nparams(1),
        )
        .await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("robust.combined_messages", "ROBUST", combined_messages);

async fn relay_truncated(ctx: &ScenarioCtx, sent_len: usize) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client1 = flows::register_user(&session, "user1", "User One").await?;
        let mut client2 = flows::register_user(&session, "user2", "User Two").await?;

        let base = "PRIVMSG user2 :";
        let text = long_message(sent_len - base.len());
        client1.send_line(&format!("{base}{text}")).await?;

        let msg = expect::message(
            &mut client2,
            Expect::cmd("PRIVMSG").prefixed().nparams(2).param(0, "user2"),
        )
        .await?;
        expect::truncated(&msg, &text)?;

        // The sender gets nothing back, truncation is not an error.
        expect::silence(&mut client1).await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}

/// A line at exactly the 512-byte bound relays with a 510-byte payload.
async fn line_at_limit(ctx: &ScenarioCtx) -> Result<()> {
    relay_truncated(ctx, MAX_LINE_LEN).await
}
crate::scenario!("robust.line_at_limit", "ROBUST", line_at_limit);

/// A line far over the bound is truncated to the same 510-byte payload.
async fn line_over_limit(ctx: &ScenarioCtx) -> Result<()> {
    relay_truncated(ctx, 2048).await
}
crate::scenario!("robust.line_over_limit", "ROBUST", line_over_limit);

/// Truncation must not corrupt the connection: a second oversized message
/// still relays correctly.
async fn line_over_limit_twice(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client1 = flows::register_user(&session, "user1", "User One").await?;
        let mut client2 = flows::register_user(&session, "user2", "User Two").await?;

        let base = "PRIVMSG user2 :";
        let text = long_message(MAX_LINE_LEN - base.len());
        for _ in 0..2 {
            client1.send_line(&format!("{base}{text}")).await?;
            let msg = expect::message(
                &mut client2,
                Expect::cmd("PRIVMSG").prefixed().nparams(2).param(0, "user2"),
            )
            .await?;
            expect::truncated(&msg, &text)?;
        }
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("robust.line_over_limit_twice", "ROBUST", line_over_limit_twice);

//! Channel scenarios: JOIN/PART fan-out, TOPIC, NAMES, LIST, WHO.

use ircheck_harness::expect::{self, Expect};
use ircheck_harness::{Result, flows};
use ircheck_proto::replies;

use super::fixtures;
use crate::ScenarioCtx;

async fn join_single(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = flows::register_user(&session, "user1", "User One").await?;
        client.send_line("JOIN #test").await?;
        expect::relayed_join(&mut client, Some("user1"), "#test").await?;
        expect::names(&mut client, "user1", Some("#test"), Some(&["@user1"])).await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("channel.join_single", "CHANNEL_JOIN", join_single);

/// Each join is echoed to the joiner and relayed to everyone already in
/// the channel.
async fn join_fanout(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let _clients = flows::connect_clients(&session, 3, Some("#test")).await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("channel.join_fanout", "CHANNEL_JOIN", join_fanout);

async fn join_needs_params(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = flows::register_user(&session, "user1", "User One").await?;
        client.send_line("JOIN").await?;
        expect::need_more_params(&mut client, "user1", "JOIN").await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("channel.join_needs_params", "CHANNEL_JOIN", join_needs_params);

async fn part_with_message(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut clients = flows::connect_clients(&session, 3, Some("#test")).await?;
        flows::part_channel(&mut clients, "#test").await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("channel.part_with_message", "CHANNEL_PART", part_with_message);

async fn part_not_on_channel(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client1 = flows::register_user(&session, "user1", "User One").await?;
        client1.send_line("JOIN #test").await?;
        expect::relayed_join(&mut client1, Some("user1"), "#test").await?;
        expect::names(&mut client1, "user1", None, None).await?;

        let mut client2 = flows::register_user(&session, "user2", "User Two").await?;
        client2.send_line("PART #test").await?;
        expect::message(
            &mut client2,
            Expect::reply(replies::ERR_NOTONCHANNEL, "user2")
                .nparams(2)
                .param(0, "#test")
                .trailing("You're not on that channel"),
        )
        .await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("channel.part_not_on_channel", "CHANNEL_PART", part_not_on_channel);

async fn part_needs_params(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = flows::register_user(&session, "user1", "User One").await?;
        client.send_line("PART").await?;
        expect::need_more_params(&mut client, "user1", "PART").await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("channel.part_needs_params", "CHANNEL_PART", part_needs_params);

async fn topic_set_and_query(ctx: &ScenarioCtx) -> Result<()> {
    const TOPIC: &str = "Hello There";

    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut clients = flows::connect_clients(&session, 2, Some("#test")).await?;

        clients[0]
            .1
            .send_line(&format!("TOPIC #test :{TOPIC}"))
            .await?;
        for (_, client) in clients.iter_mut() {
            expect::relayed_topic(client, "user1", "#test", TOPIC).await?;
        }

        let client1 = &mut clients[0].1;
        client1.send_line("TOPIC #test").await?;
        expect::message(
            client1,
            Expect::reply(replies::RPL_TOPIC, "user1")
                .nparams(2)
                .param(0, "#test")
                .trailing(TOPIC),
        )
        .await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("channel.topic_set_and_query", "CHANNEL_TOPIC", topic_set_and_query);

async fn topic_unset_query(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut client = flows::register_user(&session, "user1", "User One").await?;
        client.send_line("JOIN #test").await?;
        expect::relayed_join(&mut client, Some("user1"), "#test").await?;
        expect::names(&mut client, "user1", None, None).await?;

        client.send_line("TOPIC #test").await?;
        expect::message(
            &mut client,
            Expect::reply(replies::RPL_NOTOPIC, "user1")
                .nparams(2)
                .param(0, "#test")
                .trailing("No topic is set"),
        )
        .await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("channel.topic_unset_query", "CHANNEL_TOPIC", topic_unset_query);

/// A topic set before a join is delivered as part of the join replies.
async fn topic_seen_on_join(ctx: &ScenarioCtx) -> Result<()> {
    const TOPIC: &str = "All about testing";

    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut clients = flows::connect_clients(&session, 2, Some("#test")).await?;
        clients[0]
            .1
            .send_line(&format!("TOPIC #test :{TOPIC}"))
            .await?;
        for (_, client) in clients.iter_mut() {
            expect::relayed_topic(client, "user1", "#test", TOPIC).await?;
        }

        let mut client3 = flows::register_user(&session, "user3", "User Three").await?;
        client3.send_line("JOIN #test").await?;
        expect::relayed_join(&mut client3, Some("user3"), "#test").await?;
        expect::message(
            &mut client3,
            Expect::reply(replies::RPL_TOPIC, "user3")
                .nparams(2)
                .param(0, "#test")
                .trailing(TOPIC),
        )
        .await?;
        expect::names(&mut client3, "user3", None, None).await?;

        for (_, client) in clients.iter_mut() {
            expect::relayed_join(client, Some("user3"), "#test").await?;
        }
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("channel.topic_seen_on_join", "CHANNEL_TOPIC", topic_seen_on_join);

async fn names_populated(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut users =
            flows::populate_channels(&session, fixtures::CHANNELS1, &[], &[]).await?;

        let client = users.get_mut("user1").expect("user1 in fixture");
        client.send_line("NAMES #test2").await?;
        expect::names(
            client,
            "user1",
            Some("#test2"),
            Some(&["@user4", "user5", "user6"]),
        )
        .await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("channel.names_populated", "NAMES", names_populated);

/// One LIST row per channel in any order, then exactly one sentinel.
async fn list_unordered(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut users =
            flows::populate_channels(&session, fixtures::CHANNELS1, &[], &[]).await?;

        let client = users.get_mut("user1").expect("user1 in fixture");
        client.send_line("LIST").await?;
        expect::list(
            client,
            "user1",
            &[("#test1", 3), ("#test2", 3), ("#test3", 3)],
            None,
        )
        .await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("channel.list_unordered", "LIST", list_unordered);

/// One WHO row per member in any order, then the end-of-WHO sentinel.
async fn who_channel(ctx: &ScenarioCtx) -> Result<()> {
    let session = ctx.start_session()?;
    let outcome: Result<()> = async {
        let mut users =
            flows::populate_channels(&session, fixtures::CHANNELS1, &[], &[]).await?;

        let client = users.get_mut("user1").expect("user1 in fixture");
        client.send_line("WHO #test2").await?;
        expect::who(client, "user1", "#test2", &["user4", "user5", "user6"]).await?;
        Ok(())
    }
    .await;
    session.finish(outcome)
}
crate::scenario!("channel.who_channel", "WHO", who_channel);

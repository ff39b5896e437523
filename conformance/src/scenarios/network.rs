//! Federation scenarios.
//!
//! Most of these run a single real subject plus a [`DummyPeer`] that speaks
//! the server-to-server protocol over a raw connection, so relay behavior
//! is verified without depending on two cooperating subject processes. The
//! CONNECT scenarios at the end do link two real subjects.

use ircheck_harness::expect::{self, Expect, LusersExpect};
use ircheck_harness::{DummyPeer, Network, Result, flows};
use ircheck_proto::replies;

use crate::ScenarioCtx;

async fn dummy_link<'n>(net: &'n Network) -> Result<DummyPeer<'n>> {
    DummyPeer::register(net.session(0), net.member(0), net.member(1)).await
}

async fn registration(ctx: &ScenarioCtx) -> Result<()> {
    let mut net = ctx.network(2);
    net.start(0)?;
    let outcome: Result<()> = async {
        let _peer = dummy_link(&net).await?;
        Ok(())
    }
    .await;
    net.finish(outcome)
}
crate::scenario!("server.registration", "SERVER_REGISTRATION", registration);

/// SERVER before PASS registers just the same.
async fn registration_server_first(ctx: &ScenarioCtx) -> Result<()> {
    let mut net = ctx.network(2);
    net.start(0)?;
    let outcome: Result<()> = async {
        let mut client = net.session(0).client().await?;

        client
            .send_line(&format!(
                "SERVER {} 1 1 :Test Server",
                net.member(1).servername
            ))
            .await?;
        expect::silence(&mut client).await?;

        client
            .send_line(&format!("PASS {} 0210 ircheck|test", net.member(0).passwd))
            .await?;
        expect::server_registration(&mut client, net.member(0), net.member(1)).await?;
        Ok(())
    }
    .await;
    net.finish(outcome)
}
crate::scenario!(
    "server.registration_server_first",
    "SERVER_REGISTRATION",
    registration_server_first
);

async fn registration_bad_password(ctx: &ScenarioCtx) -> Result<()> {
    let mut net = ctx.network(2);
    net.start(0)?;
    let outcome: Result<()> = async {
        let mut client = net.session(0).client().await?;

        client
            .send_line("PASS wrongpassword 0210 ircheck|test")
            .await?;
        expect::silence(&mut client).await?;

        client
            .send_line(&format!(
                "SERVER {} 1 1 :Test Server",
                net.member(1).servername
            ))
            .await?;
        expect::message(
            &mut client,
            Expect::cmd("ERROR").nparams(1).trailing("Bad password"),
        )
        .await?;
        Ok(())
    }
    .await;
    net.finish(outcome)
}
crate::scenario!(
    "server.registration_bad_password",
    "SERVER_REGISTRATION",
    registration_bad_password
);

async fn registration_unknown_servername(ctx: &ScenarioCtx) -> Result<()> {
    let mut net = ctx.network(2);
    net.start(0)?;
    let outcome: Result<()> = async {
        let mut client = net.session(0).client().await?;

        // A bad password too, to make sure the servername check comes first.
        client
            .send_line("PASS wrongpassword 0210 ircheck|test")
            .await?;
        expect::silence(&mut client).await?;

        client.send_line("SERVER rogue.example.net 1 1 :Rogue").await?;
        expect::message(
            &mut client,
            Expect::cmd("ERROR")
                .nparams(1)
                .trailing("Server not configured here"),
        )
        .await?;
        Ok(())
    }
    .await;
    net.finish(outcome)
}
crate::scenario!(
    "server.registration_unknown_servername",
    "SERVER_REGISTRATION",
    registration_unknown_servername
);

/// The same server identity cannot register twice from a second
/// connection.
async fn registration_duplicate(ctx: &ScenarioCtx) -> Result<()> {
    let mut net = ctx.network(2);
    net.start(0)?;
    let outcome: Result<()> = async {
        let _peer = dummy_link(&net).await?;

        let mut client2 = net.session(0).client().await?;
        client2
            .send_line(&format!("PASS {} 0210 ircheck|test", net.member(0).passwd))
            .await?;
        expect::silence(&mut client2).await?;

        client2
            .send_line(&format!(
                "SERVER {} 1 1 :Test Server",
                net.member(1).servername
            ))
            .await?;
        expect::message(
            &mut client2,
            Expect::cmd("ERROR").nparams(1).trailing(&format!(
                "ID \"{}\" already registered",
                net.member(1).servername
            )),
        )
        .await?;
        Ok(())
    }
    .await;
    net.finish(outcome)
}
crate::scenario!(
    "server.registration_duplicate",
    "SERVER_REGISTRATION",
    registration_duplicate
);

/// After registering, the same connection may not send PASS again.
async fn registration_repeated_pass(ctx: &ScenarioCtx) -> Result<()> {
    let mut net = ctx.network(2);
    net.start(0)?;
    let outcome: Result<()> = async {
        let mut peer = dummy_link(&net).await?;

        peer.client_mut()
            .send_line(&format!("PASS {} 0210 ircheck|test", net.member(0).passwd))
            .await?;
        expect::message(
            peer.client_mut(),
            Expect::reply(replies::ERR_ALREADYREGISTRED, &net.member(1).servername)
                .nparams(1)
                .trailing(r"Unauthorized command \(already registered\)"),
        )
        .await?;
        Ok(())
    }
    .await;
    net.finish(outcome)
}
crate::scenario!(
    "server.registration_repeated_pass",
    "SERVER_REGISTRATION",
    registration_repeated_pass
);

/// A user registering with the subject is announced to the linked peer.
async fn relay_new_local_user(ctx: &ScenarioCtx) -> Result<()> {
    let mut net = ctx.network(2);
    net.start(0)?;
    let outcome: Result<()> = async {
        let mut peer = dummy_link(&net).await?;

        let _client = flows::register_user(net.session(0), "user1", "user1").await?;
        peer.expect_announced(net.member(0), "user1").await?;
        Ok(())
    }
    .await;
    net.finish(outcome)
}
crate::scenario!(
    "network.relay_new_local_user",
    "NETWORK_RELAY_NO_CONNECT",
    relay_new_local_user
);

async fn relay_multiple_local_users(ctx: &ScenarioCtx) -> Result<()> {
    let mut net = ctx.network(2);
    net.start(0)?;
    let outcome: Result<()> = async {
        let mut peer = dummy_link(&net).await?;

        let mut clients = Vec::new();
        for i in 1..=5 {
            let nick = format!("user{i}");
            clients.push(flows::register_user(net.session(0), &nick, &nick).await?);
            peer.expect_announced(net.member(0), &nick).await?;
        }
        Ok(())
    }
    .await;
    net.finish(outcome)
}
crate::scenario!(
    "network.relay_multiple_local_users",
    "NETWORK_RELAY_NO_CONNECT",
    relay_multiple_local_users
);

/// A message to a user announced by the peer is forwarded over the link.
async fn privmsg_to_remote_user(ctx: &ScenarioCtx) -> Result<()> {
    let mut net = ctx.network(2);
    net.start(0)?;
    let outcome: Result<()> = async {
        let mut peer = dummy_link(&net).await?;

        let mut client = flows::register_user(net.session(0), "user1", "user1").await?;
        peer.expect_announced(net.member(0), "user1").await?;

        peer.announce_user("user101").await?;
        net.settle().await;

        client.send_line("PRIVMSG user101 :Hello").await?;
        expect::relayed_privmsg(peer.client_mut(), "user1", "user101", "Hello").await?;
        Ok(())
    }
    .await;
    net.finish(outcome)
}
crate::scenario!(
    "network.privmsg_to_remote_user",
    "NETWORK_RELAY_NO_CONNECT",
    privmsg_to_remote_user
);

/// Local traffic stays local: a message between two users on the subject
/// must not leak over the link.
async fn local_privmsg_not_relayed(ctx: &ScenarioCtx) -> Result<()> {
    let mut net = ctx.network(2);
    net.start(0)?;
    let outcome: Result<()> = async {
        let mut peer = dummy_link(&net).await?;

        let mut client1 = flows::register_user(net.session(0), "user1", "user1").await?;
        peer.expect_announced(net.member(0), "user1").await?;
        let mut client2 = flows::register_user(net.session(0), "user2", "user2").await?;
        peer.expect_announced(net.member(0), "user2").await?;

        client1.send_line("PRIVMSG user2 :Hello").await?;
        expect::relayed_privmsg(&mut client2, "user1", "user2", "Hello").await?;

        expect::silence(peer.client_mut()).await?;
        Ok(())
    }
    .await;
    net.finish(outcome)
}
crate::scenario!(
    "network.local_privmsg_not_relayed",
    "NETWORK_RELAY_NO_CONNECT",
    local_privmsg_not_relayed
);

/// A message injected by the peer on behalf of a remote user reaches the
/// right local client.
async fn privmsg_from_remote_user(ctx: &ScenarioCtx) -> Result<()> {
    let mut net = ctx.network(2);
    net.start(0)?;
    let outcome: Result<()> = async {
        let mut peer = dummy_link(&net).await?;

        let mut client = flows::register_user(net.session(0), "user1", "user1").await?;
        peer.expect_announced(net.member(0), "user1").await?;

        peer.announce_user("user101").await?;
        net.settle().await;

        peer.privmsg_from("user101", "user1", "Hello back").await?;
        expect::relayed_privmsg(&mut client, "user101", "user1", "Hello back").await?;
        Ok(())
    }
    .await;
    net.finish(outcome)
}
crate::scenario!(
    "network.privmsg_from_remote_user",
    "NETWORK_RELAY_NO_CONNECT",
    privmsg_from_remote_user
);

/// Link two real subjects with an operator CONNECT. The command has no
/// synchronous acknowledgment, so the link is verified through LUSERS
/// after a settle delay.
async fn connect_links_servers(ctx: &ScenarioCtx) -> Result<()> {
    let mut net = ctx.network(2);
    net.start(0)?;
    net.start(1)?;
    let outcome: Result<()> = async {
        let mut client = flows::register_user(net.session(0), "user1", "User One").await?;
        flows::make_oper(net.session(0), &mut client, "user1").await?;

        client
            .send_line(&format!("CONNECT {}", net.member(1).servername))
            .await?;
        net.settle().await;

        client.send_line("LUSERS").await?;
        expect::lusers(
            &mut client,
            "user1",
            &LusersExpect {
                users: Some(1),
                servers: Some(2),
                clients: Some(1),
                direct_servers: Some(1),
                ..LusersExpect::default()
            },
        )
        .await?;
        Ok(())
    }
    .await;
    net.finish(outcome)
}
crate::scenario!("connect.links_servers", "CONNECT", connect_links_servers);

/// WHOIS across a real link names the server the target is attached to.
async fn whois_across_link(ctx: &ScenarioCtx) -> Result<()> {
    let mut net = ctx.network(2);
    net.start(0)?;
    net.start(1)?;
    let outcome: Result<()> = async {
        let mut client1 = flows::register_user(net.session(0), "user1", "User user1").await?;
        flows::make_oper(net.session(0), &mut client1, "user1").await?;
        client1
            .send_line(&format!("CONNECT {}", net.member(1).servername))
            .await?;
        net.settle().await;

        let _client101 = flows::register_user(net.session(1), "user101", "User user101").await?;
        net.settle().await;

        client1.send_line("WHOIS user101").await?;
        expect::message(
            &mut client1,
            Expect::reply(replies::RPL_WHOISUSER, "user1")
                .nparams(5)
                .trailing("User user101"),
        )
        .await?;
        expect::message(
            &mut client1,
            Expect::reply(replies::RPL_WHOISSERVER, "user1")
                .nparams(3)
                .param(0, "user101")
                .param(1, &net.member(1).servername),
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
    net.finish(outcome)
}
crate::scenario!("network.whois_across_link", "NETWORK_STATE", whois_across_link);

/// LUSERS counts aggregate across the network while per-server client
/// counts stay local.
async fn lusers_across_link(ctx: &ScenarioCtx) -> Result<()> {
    let mut net = ctx.network(2);
    net.start(0)?;
    net.start(1)?;
    let outcome: Result<()> = async {
        let mut client1 = flows::register_user(net.session(0), "user1", "User user1").await?;
        flows::make_oper(net.session(0), &mut client1, "user1").await?;
        client1
            .send_line(&format!("CONNECT {}", net.member(1).servername))
            .await?;
        net.settle().await;

        let mut client2 = flows::register_user(net.session(0), "user2", "User user2").await?;
        let _client3 = flows::register_user(net.session(0), "user3", "User user3").await?;
        let mut client101 = flows::register_user(net.session(1), "user101", "User user101").await?;
        let _client102 = flows::register_user(net.session(1), "user102", "User user102").await?;
        net.settle().await;

        client2.send_line("LUSERS").await?;
        expect::lusers(
            &mut client2,
            "user2",
            &LusersExpect {
                users: Some(5),
                servers: Some(2),
                clients: Some(3),
                direct_servers: Some(1),
                ..LusersExpect::default()
            },
        )
        .await?;

        client101.send_line("LUSERS").await?;
        expect::lusers(
            &mut client101,
            "user101",
            &LusersExpect {
                users: Some(5),
                servers: Some(2),
                clients: Some(2),
                direct_servers: Some(1),
                ..LusersExpect::default()
            },
        )
        .await?;
        Ok(())
    }
    .await;
    net.finish(outcome)
}
crate::scenario!("network.lusers_across_link", "NETWORK_STATE", lusers_across_link);

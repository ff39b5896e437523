//! Transport and expectation tests against a scripted in-process server.
//!
//! These use the external-port session mode: the "subject" is a tokio task
//! that plays back scripted traffic, so the bounded-wait semantics can be
//! verified without any real server binary.

use std::future::Future;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use ircheck_harness::expect::{self, Expect};
use ircheck_harness::{HarnessError, ServerSession, SubjectConfig};
use ircheck_proto::replies;

const TEST_TIMEOUT: Duration = Duration::from_millis(200);

async fn scripted_server<F, Fut>(script: F) -> (ServerSession, JoinHandle<()>)
where
    F: FnOnce(TcpStream) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        script(sock).await;
    });

    let mut config = SubjectConfig::new("/bin/false");
    config.external_port = Some(port);
    config.msg_timeout = TEST_TIMEOUT;
    let mut session = ServerSession::new(config);
    session.start().unwrap();

    (session, handle)
}

#[tokio::test]
async fn reads_one_decoded_message() {
    let (session, server) = scripted_server(|mut sock| async move {
        sock.write_all(b":irc.example.net 001 user1 :Welcome to the Internet Relay Network user1!user1@localhost\r\n")
            .await
            .unwrap();
    })
    .await;

    let mut client = session.client().await.unwrap();
    let msg = client.read_message().await.unwrap();
    assert_eq!(msg.command, "001");
    assert_eq!(msg.params[0], "user1");
    assert!(msg.prefix.is_some());

    drop(client);
    server.await.unwrap();
    session.finish(Ok(())).unwrap();
}

#[tokio::test]
async fn reassembles_fragmented_lines() {
    let (session, server) = scripted_server(|mut sock| async move {
        for chunk in [&b"PONG :irc.ex"[..], b"ample", b".net\r", b"\n"] {
            sock.write_all(chunk).await.unwrap();
            sock.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;

    let mut client = session.client().await.unwrap();
    let msg = client.read_message().await.unwrap();
    assert_eq!(msg.command, "PONG");
    assert_eq!(msg.params, vec![":irc.example.net"]);

    drop(client);
    server.await.unwrap();
    session.finish(Ok(())).unwrap();
}

#[tokio::test]
async fn timeout_with_no_bytes_reports_empty_partial() {
    let (session, server) = scripted_server(|sock| async move {
        let _sock = sock;
        tokio::time::sleep(Duration::from_millis(500)).await;
    })
    .await;

    let mut client = session.client().await.unwrap();
    let start = std::time::Instant::now();
    let err = client.read_message().await.unwrap_err();
    assert!(start.elapsed() >= TEST_TIMEOUT);
    match err {
        HarnessError::ReplyTimeout { partial } => assert!(partial.is_empty()),
        other => panic!("expected ReplyTimeout, got {other}"),
    }

    drop(client);
    server.await.unwrap();
    session.finish(Ok(())).unwrap();
}

#[tokio::test]
async fn timeout_carries_unterminated_fragment() {
    let (session, server) = scripted_server(|mut sock| async move {
        sock.write_all(b"PING :no-terminator").await.unwrap();
        sock.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
    })
    .await;

    let mut client = session.client().await.unwrap();
    match client.read_message().await.unwrap_err() {
        HarnessError::ReplyTimeout { partial } => {
            assert_eq!(partial, b"PING :no-terminator");
        }
        other => panic!("expected ReplyTimeout, got {other}"),
    }

    drop(client);
    server.await.unwrap();
    session.finish(Ok(())).unwrap();
}

#[tokio::test]
async fn trickling_bytes_do_not_extend_the_deadline() {
    let (session, server) = scripted_server(|mut sock| async move {
        // One byte every 20ms, never a terminator.
        for _ in 0..50 {
            if sock.write_all(b"x").await.is_err() {
                break;
            }
            let _ = sock.flush().await;
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;

    let mut client = session.client().await.unwrap();
    let start = std::time::Instant::now();
    let err = client.read_message().await.unwrap_err();
    let elapsed = start.elapsed();
    assert!(matches!(err, HarnessError::ReplyTimeout { .. }));
    assert!(elapsed >= TEST_TIMEOUT);
    assert!(elapsed < Duration::from_millis(600), "deadline was extended");

    drop(client);
    server.abort();
    session.finish(Ok(())).unwrap();
}

#[tokio::test]
async fn eof_is_reported_as_connection_closed() {
    let (session, server) = scripted_server(|sock| async move {
        drop(sock);
    })
    .await;

    let mut client = session.client().await.unwrap();
    let err = client.read_message().await.unwrap_err();
    assert!(matches!(err, HarnessError::ConnectionClosed));

    drop(client);
    server.await.unwrap();
    session.finish(Ok(())).unwrap();
}

#[tokio::test]
async fn send_line_appends_terminator() {
    // The echo server only ever forwards complete lines, so the reply can
    // only decode if send_line terminated the command properly.
    let (session, server) = scripted_server(|mut sock| async move {
        use tokio::io::{AsyncBufReadExt, BufReader};
        let (read, mut write) = sock.split();
        let mut lines = BufReader::new(read).lines();
        if let Ok(Some(line)) = lines.next_line().await {
            write
                .write_all(format!("{line} :echoed\r\n").as_bytes())
                .await
                .unwrap();
        }
    })
    .await;

    let mut client = session.client().await.unwrap();
    client.send_line("PING").await.unwrap();
    let msg = client.read_message().await.unwrap();
    assert_eq!(msg.command, "PING");
    assert_eq!(msg.params, vec![":echoed"]);

    drop(client);
    server.await.unwrap();
    session.finish(Ok(())).unwrap();
}

#[tokio::test]
async fn silence_passes_only_without_a_message() {
    let (session, server) = scripted_server(|mut sock| async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        sock.write_all(b":irc.example.net NOTICE user1 :too late\r\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
    })
    .await;

    let mut client = session.client().await.unwrap();
    // First window: nothing arrives, silence holds.
    expect::silence(&mut client).await.unwrap();
    // Second window: the NOTICE lands, silence must fail.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let err = expect::silence(&mut client).await.unwrap_err();
    assert!(err.to_string().contains("Was not expecting a reply"));

    drop(client);
    server.await.unwrap();
    session.finish(Ok(())).unwrap();
}

#[tokio::test]
async fn welcome_burst_order_is_enforced() {
    let (session, server) = scripted_server(|mut sock| async move {
        let burst = ":irc.example.net 001 user1 :Welcome to the Internet Relay Network user1!user1@localhost\r\n\
                     :irc.example.net 002 user1 :Your host is irc.example.net\r\n\
                     :irc.example.net 003 user1 :This server was created sometime\r\n\
                     :irc.example.net 004 user1 irc.example.net 1.0 ao mtov\r\n";
        sock.write_all(burst.as_bytes()).await.unwrap();
    })
    .await;

    let mut client = session.client().await.unwrap();
    let burst = expect::welcome_burst(&mut client, "user1", None).await.unwrap();
    assert_eq!(burst.len(), 4);

    drop(client);
    server.await.unwrap();
    session.finish(Ok(())).unwrap();
}

#[tokio::test]
async fn welcome_burst_rejects_wrong_order() {
    let (session, server) = scripted_server(|mut sock| async move {
        let burst = ":irc.example.net 002 user1 :Your host is irc.example.net\r\n\
                     :irc.example.net 001 user1 :Welcome to the Internet Relay Network user1!user1@localhost\r\n";
        sock.write_all(burst.as_bytes()).await.unwrap();
    })
    .await;

    let mut client = session.client().await.unwrap();
    let err = expect::welcome_burst(&mut client, "user1", None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Expected command 001"));

    drop(client);
    server.await.unwrap();
    session.finish(Ok(())).unwrap();
}

#[tokio::test]
async fn list_group_accepts_any_row_order() {
    let (session, server) = scripted_server(|mut sock| async move {
        let rows = ":irc.example.net 322 user1 #test3 3 :\r\n\
                    :irc.example.net 322 user1 #test1 3 :\r\n\
                    :irc.example.net 322 user1 #test2 3 :\r\n\
                    :irc.example.net 323 user1 :End of LIST\r\n";
        sock.write_all(rows.as_bytes()).await.unwrap();
    })
    .await;

    let mut client = session.client().await.unwrap();
    expect::list(
        &mut client,
        "user1",
        &[("#test1", 3), ("#test2", 3), ("#test3", 3)],
        None,
    )
    .await
    .unwrap();

    drop(client);
    server.await.unwrap();
    session.finish(Ok(())).unwrap();
}

#[tokio::test]
async fn list_group_requires_sentinel_after_all_rows() {
    // The sentinel arriving before all rows must fail the group.
    let (session, server) = scripted_server(|mut sock| async move {
        let rows = ":irc.example.net 322 user1 #test1 3 :\r\n\
                    :irc.example.net 323 user1 :End of LIST\r\n";
        sock.write_all(rows.as_bytes()).await.unwrap();
    })
    .await;

    let mut client = session.client().await.unwrap();
    let err = expect::list(&mut client, "user1", &[("#test1", 3), ("#test2", 3)], None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Expected command 322"));

    drop(client);
    server.await.unwrap();
    session.finish(Ok(())).unwrap();
}

#[tokio::test]
async fn reply_expectation_reads_through_the_client() {
    let (session, server) = scripted_server(|mut sock| async move {
        sock.write_all(b":irc.example.net 422 user1 :MOTD File is missing\r\n")
            .await
            .unwrap();
    })
    .await;

    let mut client = session.client().await.unwrap();
    expect::message(
        &mut client,
        Expect::reply(replies::ERR_NOMOTD, "user1")
            .nparams(1)
            .trailing("MOTD File is missing"),
    )
    .await
    .unwrap();

    drop(client);
    server.await.unwrap();
    session.finish(Ok(())).unwrap();
}

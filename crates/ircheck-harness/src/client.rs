//! Transport client: one logical connection to a subject server.
//!
//! A client borrows the session it is connected to, so the borrow checker
//! enforces the teardown order the harness depends on: every client is gone
//! before `ServerSession::stop` (which takes `&mut self`) can run.

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, trace};

use ircheck_proto::Message;

use crate::error::{HarnessError, Result};
use crate::session::ServerSession;

const CONNECT_ATTEMPTS: u32 = 3;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const CONNECT_BACKOFF: Duration = Duration::from_millis(100);

/// One connection to a subject server, with a bounded-wait reader.
pub struct Client<'s> {
    stream: TcpStream,
    buf: BytesMut,
    timeout: Duration,
    session: &'s ServerSession,
}

impl<'s> Client<'s> {
    /// Connect to the session's server, retrying a fixed number of times
    /// with a short backoff before giving up with `ConnectionFailure`.
    pub(crate) async fn connect(session: &'s ServerSession, nodelay: bool) -> Result<Client<'s>> {
        let host = session.host();
        let port = session.port();

        let mut last_err = None;
        for attempt in 0..CONNECT_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(CONNECT_BACKOFF).await;
            }
            match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port))).await {
                Ok(Ok(stream)) => {
                    if nodelay {
                        stream.set_nodelay(true)?;
                    }
                    session.client_connected();
                    debug!(host, port, "client connected");
                    return Ok(Client {
                        stream,
                        buf: BytesMut::with_capacity(4096),
                        timeout: session.msg_timeout(),
                        session,
                    });
                }
                Ok(Err(e)) => last_err = Some(e),
                Err(_) => {
                    last_err = Some(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "connect timed out",
                    ))
                }
            }
        }

        Err(HarnessError::ConnectionFailure {
            host: host.to_string(),
            port,
            attempts: CONNECT_ATTEMPTS,
            last: last_err.expect("at least one connect attempt"),
        })
    }

    /// Send one command line; the terminator is appended here.
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        trace!(line, "send");
        self.stream.write_all(line.as_bytes()).await?;
        self.stream.write_all(b"\r\n").await?;
        Ok(())
    }

    /// Send pre-fragmented raw bytes, optionally pausing between chunks.
    ///
    /// No terminator is appended; the caller controls exactly what hits the
    /// wire, which is the point: this is how partial-message reassembly in
    /// the subject is exercised.
    pub async fn send_raw(&mut self, chunks: &[&[u8]], delay: Option<Duration>) -> Result<()> {
        for chunk in chunks {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.stream.write_all(chunk).await?;
            self.stream.flush().await?;
        }
        Ok(())
    }

    /// Read one message within the client's configured timeout.
    pub async fn read_message(&mut self) -> Result<Message> {
        self.read_message_timeout(self.timeout).await
    }

    /// Read one message, waiting at most `timeout` from now.
    ///
    /// The deadline is absolute: bytes trickling in without a terminator do
    /// not extend it. On timeout the accumulated fragment is drained into
    /// the error; a clean EOF is reported as `ConnectionClosed`.
    pub async fn read_message_timeout(&mut self, timeout: Duration) -> Result<Message> {
        use tokio::io::AsyncReadExt;

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(pos) = find_terminator(&self.buf) {
                let line = self.buf.split_to(pos + 2);
                let text = String::from_utf8_lossy(&line).into_owned();
                trace!(line = %text.trim_end(), "recv");
                return Ok(Message::parse(&text)?);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(HarnessError::ReplyTimeout {
                    partial: self.buf.split().to_vec(),
                });
            }

            match tokio::time::timeout(deadline - now, self.stream.read_buf(&mut self.buf)).await {
                Err(_) => {
                    return Err(HarnessError::ReplyTimeout {
                        partial: self.buf.split().to_vec(),
                    });
                }
                Ok(Ok(0)) => return Err(HarnessError::ConnectionClosed),
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Per-read timeout currently in effect.
    pub fn msg_timeout(&self) -> Duration {
        self.timeout
    }
}

impl Drop for Client<'_> {
    fn drop(&mut self) {
        self.session.client_dropped();
    }
}

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt as _, StreamExt as _};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::time::{MissedTickBehavior, interval, timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

use super::error::WsError;
use super::traits::{DeliveryGate, MessageParser};
use crate::Result;
use crate::error::{Error, Kind};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Upper bound for the closing handshake during teardown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Open a WebSocket to `url` on behalf of `key`.
pub async fn dial(
    key: &str,
    url: &str,
    connect_timeout: Duration,
) -> std::result::Result<Connection, WsError> {
    let (ws_stream, _) = timeout(connect_timeout, connect_async(url))
        .await
        .map_err(|_elapsed| WsError::Timeout)??;

    #[cfg(feature = "tracing")]
    tracing::debug!(key, url, "WebSocket connected");

    let (write, read) = ws_stream.split();
    let key: Arc<str> = Arc::from(key);

    Ok(Connection {
        handle: ConnectionHandle {
            key: Arc::clone(&key),
            writer: Arc::new(Mutex::new(write)),
        },
        reader: Reader { key, source: read },
    })
}

/// A freshly dialed WebSocket, not yet split between its workers.
pub struct Connection {
    handle: ConnectionHandle,
    reader: Reader,
}

impl Connection {
    /// Split into the write side (keepalive, close) and the read side (dispatch).
    #[must_use]
    pub fn into_parts(self) -> (ConnectionHandle, Reader) {
        (self.handle, self.reader)
    }

    pub async fn close(self) {
        let (handle, reader) = self.into_parts();
        drop(reader);
        handle.close().await;
    }
}

/// Write side of a connection. Cloning shares the same underlying socket.
#[derive(Clone)]
pub struct ConnectionHandle {
    key: Arc<str>,
    writer: Arc<Mutex<WsSink>>,
}

impl ConnectionHandle {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Send a single PING frame.
    pub async fn ping(&self) -> std::result::Result<(), WsError> {
        self.writer
            .lock()
            .await
            .send(Message::Ping(Vec::new().into()))
            .await?;
        Ok(())
    }

    /// Send a close frame and shut the write side down.
    ///
    /// Best effort: a peer that never completes the handshake is abandoned after
    /// [`CLOSE_TIMEOUT`], and the socket is released once every part is dropped.
    pub async fn close(&self) {
        let closed = timeout(CLOSE_TIMEOUT, async {
            self.writer.lock().await.close().await
        })
        .await;

        match closed {
            Ok(Ok(())) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(key = %self.key, "WebSocket closed");
            }
            Ok(Err(e)) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(key = %self.key, error = %e, "WebSocket close failed");
                #[cfg(not(feature = "tracing"))]
                let _ = &e;
            }
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(key = %self.key, "WebSocket close timed out");
            }
        }
    }

    /// Keepalive loop: one PING per `period`, the first one a full period after start.
    ///
    /// Returns `Ok` once `token` is cancelled and a [`Kind::Write`] error if a PING cannot be
    /// sent. Never touches the read side, so a blocked reader cannot delay it.
    pub async fn keepalive(self, period: Duration, token: CancellationToken) -> Result<()> {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                () = token.cancelled() => return Ok(()),
                _ = ticker.tick() => {}
            }

            tokio::select! {
                () = token.cancelled() => return Ok(()),
                sent = self.ping() => {
                    if let Err(e) = sent {
                        return Err(Error::for_pair(Kind::Write, &*self.key, e));
                    }

                    #[cfg(feature = "tracing")]
                    tracing::trace!(key = %self.key, "PING sent");
                }
            }
        }
    }
}

/// Read side of a connection.
pub struct Reader {
    key: Arc<str>,
    source: WsSource,
}

impl Reader {
    /// Read, decode and deliver messages into `sender` until `token` is cancelled or the
    /// connection fails.
    ///
    /// Cancellation is checked before every read and again as soon as a frame arrives, so
    /// nothing is delivered once shutdown has begun. Messages arriving while `gate` is closed
    /// for this key are dropped.
    pub async fn run<M, P, G>(
        mut self,
        parser: Arc<P>,
        sender: mpsc::Sender<M>,
        gate: Arc<G>,
        token: CancellationToken,
    ) -> Result<()>
    where
        M: Send + 'static,
        P: MessageParser<M>,
        G: DeliveryGate,
    {
        loop {
            if token.is_cancelled() {
                return Ok(());
            }

            let frame = tokio::select! {
                biased;
                () = token.cancelled() => return Ok(()),
                frame = self.source.next() => frame,
            };

            if token.is_cancelled() {
                return Ok(());
            }

            let parsed = match frame {
                Some(Ok(Message::Text(text))) => parser.parse(text.as_bytes()),
                Some(Ok(Message::Binary(bytes))) => parser.parse(&bytes),
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Close(_))) | None => Err(WsError::ConnectionClosed),
                Some(Err(e)) => Err(WsError::Connection(e)),
            };
            let message = parsed.map_err(|e| Error::for_pair(Kind::Read, &*self.key, e))?;

            if !gate.is_open(&self.key) {
                #[cfg(feature = "tracing")]
                tracing::trace!(key = %self.key, "Session no longer connected, message dropped");
                continue;
            }

            tokio::select! {
                () = token.cancelled() => return Ok(()),
                sent = sender.send(message) => {
                    if sent.is_err() {
                        #[cfg(feature = "tracing")]
                        tracing::trace!(key = %self.key, "Subscriber receiver dropped, message discarded");
                    }
                }
            }
        }
    }
}

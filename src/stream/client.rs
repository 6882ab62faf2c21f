use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::subscription::{StreamParser, SubscriptionManager};
use super::types::StreamMessage;
use crate::Result;
use crate::error::{Error, Kind};
use crate::ws::config::Config;
use crate::ws::connection::{self, Connection};
use crate::ws::group::TaskGroup;

/// Streaming client for the Zaif public feed.
///
/// One WebSocket is opened per subscribed currency pair. Each connection gets a keepalive task
/// and a reader task; decoded [`StreamMessage`]s are pushed into the channel registered for
/// that pair.
///
/// # Examples
///
/// ```rust, no_run
/// use tokio::sync::mpsc;
/// use zaif_client_sdk::stream::Client;
/// use zaif_client_sdk::types::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = Client::default();
///
///     let (tx, mut rx) = mpsc::channel(64);
///     client.add_subscription("btc_jpy", tx)?;
///
///     let cancel = CancellationToken::new();
///     let session = tokio::spawn({
///         let client = client.clone();
///         let cancel = cancel.clone();
///         async move { client.receive(cancel).await }
///     });
///
///     while let Some(message) = rx.recv().await {
///         println!("{}: {:?}", message.currency_pair, message.last_price);
///     }
///
///     cancel.cancel();
///     session.await??;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new(Config::default()).expect("Client with default endpoint should succeed")
    }
}

struct ClientInner {
    config: Config,
    /// Base stream URL, validated once at construction
    endpoint: Url,
    subscriptions: Arc<SubscriptionManager>,
    parser: Arc<StreamParser>,
}

impl Client {
    /// Create an idle client with an empty subscription registry.
    pub fn new(config: Config) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint)?;
        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(Error::validation(format!(
                "endpoint must use ws or wss, got {}",
                endpoint.scheme()
            )));
        }
        if config.heartbeat_interval.is_zero() {
            return Err(Error::validation("heartbeat_interval must be non-zero"));
        }
        if config.connect_timeout.is_zero() {
            return Err(Error::validation("connect_timeout must be non-zero"));
        }

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                endpoint,
                subscriptions: Arc::new(SubscriptionManager::new()),
                parser: Arc::new(StreamParser),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Deliver every update for `pair` into `sender`.
    ///
    /// Replaces any earlier registration for the same pair. Registrations only take effect
    /// for sessions started afterwards; a running session keeps its original senders. The channel is closed (the client drops its sender) by
    /// [`Client::close`] or when a session fails to connect.
    pub fn add_subscription<P: Into<String>>(
        &self,
        pair: P,
        sender: mpsc::Sender<StreamMessage>,
    ) -> Result<()> {
        self.inner.subscriptions.subscribe(pair.into(), sender);
        Ok(())
    }

    /// Registered pairs, sorted.
    #[must_use]
    pub fn subscribed_pairs(&self) -> Vec<String> {
        self.inner.subscriptions.pairs()
    }

    /// Whether a session is running and still delivering messages.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.subscriptions.is_connected()
    }

    /// Number of live connections in the current session.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.subscriptions.connection_count()
    }

    /// Connect every subscribed pair and stream until `cancel` fires or a connection fails.
    ///
    /// All pairs are dialed before anything is spawned; if any dial fails, the connections
    /// opened so far are closed, every subscriber channel is closed and the dial error is
    /// returned. Otherwise the first keepalive or read error of any connection stops the whole
    /// session and is returned. Cancellation ends the session with `Ok(())`. Every connection
    /// is closed before this returns.
    ///
    /// With no subscriptions registered the session has nothing to run and returns at once.
    pub async fn receive(&self, cancel: CancellationToken) -> Result<()> {
        let token = cancel.child_token();
        let pairs = self.inner.subscriptions.begin_session(token.clone())?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            pairs = ?pairs.iter().map(|(pair, _)| pair.as_str()).collect::<Vec<_>>(),
            "Starting stream session"
        );

        let guard = SessionGuard::new(&self.inner.subscriptions);
        let connections = match self.dial_all(pairs).await {
            Ok(connections) => connections,
            Err(e) => {
                guard.disarm();
                return Err(e);
            }
        };

        let mut group = TaskGroup::new(token.clone());
        let mut handles = Vec::with_capacity(connections.len());
        for (connection, sender) in connections {
            let (handle, reader) = connection.into_parts();

            group.spawn(
                handle
                    .clone()
                    .keepalive(self.inner.config.heartbeat_interval, token.clone()),
            );
            group.spawn(reader.run(
                Arc::clone(&self.inner.parser),
                sender,
                Arc::clone(&self.inner.subscriptions),
                token.clone(),
            ));
            handles.push(handle);
        }
        self.inner.subscriptions.attach(handles);

        let result = group.wait().await;

        guard.disarm();
        for handle in self.inner.subscriptions.end_session() {
            handle.close().await;
        }

        #[cfg(feature = "tracing")]
        match &result {
            Ok(()) => tracing::info!("Stream session finished"),
            Err(e) => tracing::error!(error = %e, "Stream session failed"),
        }

        result
    }

    /// Close every subscriber channel and empty the registry.
    ///
    /// A running [`Client::receive`] stops delivering immediately, winds down and returns
    /// `Ok(())`; its channels close once its readers have stopped. Calling this again is a
    /// no-op.
    pub fn close(&self) -> Result<()> {
        self.inner.subscriptions.close();
        Ok(())
    }

    /// Open one connection per pair, all or nothing.
    async fn dial_all(
        &self,
        pairs: Vec<(String, mpsc::Sender<StreamMessage>)>,
    ) -> Result<Vec<(Connection, mpsc::Sender<StreamMessage>)>> {
        let mut opened: Vec<(Connection, mpsc::Sender<StreamMessage>)> =
            Vec::with_capacity(pairs.len());

        for (pair, sender) in pairs {
            let url = stream_url(&self.inner.endpoint, &pair);

            match connection::dial(&pair, url.as_str(), self.inner.config.connect_timeout).await {
                Ok(connection) => opened.push((connection, sender)),
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        pair = %pair,
                        error = %e,
                        opened = opened.len(),
                        "Unable to connect, rolling back session"
                    );

                    for (connection, _sender) in opened {
                        connection.close().await;
                    }
                    self.inner.subscriptions.abort_session();

                    return Err(Error::for_pair(Kind::Dial, pair, e));
                }
            }
        }

        Ok(opened)
    }
}

/// Resets the session if [`Client::receive`] is dropped before it finishes.
///
/// Dropping the future also drops its [`TaskGroup`], which aborts the workers; the
/// connections are then released without a closing handshake.
struct SessionGuard<'manager> {
    subscriptions: Option<&'manager SubscriptionManager>,
}

impl<'manager> SessionGuard<'manager> {
    fn new(subscriptions: &'manager SubscriptionManager) -> Self {
        Self {
            subscriptions: Some(subscriptions),
        }
    }

    fn disarm(mut self) {
        self.subscriptions = None;
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if let Some(subscriptions) = self.subscriptions.take() {
            #[cfg(feature = "tracing")]
            tracing::debug!("Stream session dropped before completion, resetting");
            drop(subscriptions.end_session());
        }
    }
}

/// `endpoint` with `pair` as the `currency_pair` query parameter.
fn stream_url(endpoint: &Url, pair: &str) -> Url {
    let mut url = endpoint.clone();
    url.query_pairs_mut().append_pair("currency_pair", pair);
    url
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn stream_url_appends_pair() {
        let endpoint = Url::parse("wss://ws.zaif.jp:8888/stream").unwrap();

        assert_eq!(
            stream_url(&endpoint, "btc_jpy").as_str(),
            "wss://ws.zaif.jp:8888/stream?currency_pair=btc_jpy"
        );
    }

    #[test]
    fn stream_url_encodes_pair() {
        let endpoint = Url::parse("ws://127.0.0.1:9000/stream").unwrap();

        assert_eq!(
            stream_url(&endpoint, "a&b").as_str(),
            "ws://127.0.0.1:9000/stream?currency_pair=a%26b"
        );
    }

    #[test]
    fn rejects_non_websocket_endpoint() {
        let config = Config::builder().endpoint("https://api.zaif.jp").build();

        let error = Client::new(config).err().unwrap();
        assert_eq!(error.kind(), Kind::Validation);
    }

    #[test]
    fn rejects_unparseable_endpoint() {
        let config = Config::builder().endpoint("not a url").build();

        let error = Client::new(config).err().unwrap();
        assert_eq!(error.kind(), Kind::Validation);
    }

    #[test]
    fn rejects_zero_heartbeat_interval() {
        let config = Config::builder().heartbeat_interval(Duration::ZERO).build();

        let error = Client::new(config).err().unwrap();
        assert_eq!(error.kind(), Kind::Validation);
        assert!(error.to_string().contains("heartbeat_interval"));
    }

    #[test]
    fn rejects_zero_connect_timeout() {
        let config = Config::builder().connect_timeout(Duration::ZERO).build();

        let error = Client::new(config).err().unwrap();
        assert_eq!(error.kind(), Kind::Validation);
        assert!(error.to_string().contains("connect_timeout"));
    }

    #[test]
    fn default_client_is_idle() {
        let client = Client::default();

        assert!(!client.is_connected());
        assert_eq!(client.connection_count(), 0);
        assert!(client.subscribed_pairs().is_empty());
    }

    #[test]
    fn dropped_receive_resets_the_session() {
        let client = Client::default();
        let manager = &client.inner.subscriptions;
        manager.begin_session(CancellationToken::new()).unwrap();

        drop(SessionGuard::new(manager));

        assert!(!client.is_connected());
        manager.begin_session(CancellationToken::new()).unwrap();
    }

    #[tokio::test]
    async fn receive_without_subscriptions_returns_immediately() {
        let client = Client::default();

        client.receive(CancellationToken::new()).await.unwrap();
        assert!(!client.is_connected());
    }
}

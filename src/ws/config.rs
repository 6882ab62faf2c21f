#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use bon::Builder;

/// Public stream endpoint; the pair is appended as the `currency_pair` query parameter.
pub const DEFAULT_ENDPOINT: &str = "wss://ws.zaif.jp:8888/stream";

const DEFAULT_HEARTBEAT_INTERVAL_DURATION: Duration = Duration::from_secs(20);
const DEFAULT_CONNECT_TIMEOUT_DURATION: Duration = Duration::from_secs(10);

/// Configuration for WebSocket client behavior.
///
/// ```
/// use std::time::Duration;
///
/// use zaif_client_sdk::ws::config::Config;
///
/// let config = Config::builder()
///     .heartbeat_interval(Duration::from_secs(10))
///     .build();
/// assert_eq!(config.endpoint, "wss://ws.zaif.jp:8888/stream");
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct Config {
    /// Base stream URL, without the `currency_pair` query parameter
    #[builder(into, default = DEFAULT_ENDPOINT.to_owned())]
    pub endpoint: String,
    /// Interval for sending PING frames to keep each connection alive
    #[builder(default = DEFAULT_HEARTBEAT_INTERVAL_DURATION)]
    pub heartbeat_interval: Duration,
    /// Upper bound for opening a single pair's connection
    #[builder(default = DEFAULT_CONNECT_TIMEOUT_DURATION)]
    pub connect_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self::builder().build()
    }
}

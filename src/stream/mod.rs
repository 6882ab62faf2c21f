//! Streaming client for the Zaif public market data feed.
//!
//! The feed serves one WebSocket per currency pair at
//! `wss://ws.zaif.jp:8888/stream?currency_pair=<pair>`, each frame carrying the top of the
//! order book, recent trades and the last price for that pair.
//!
//! # Lifecycle
//!
//! 1. Register a delivery channel per pair with [`Client::add_subscription`].
//! 2. Call [`Client::receive`]: every pair is connected (all or nothing), then each connection
//!    runs a keepalive task and a reader task until the caller cancels or one of them fails.
//! 3. Call [`Client::close`] to release every subscriber channel.
//!
//! The first failing connection cancels all the others and its error, tagged with the pair,
//! is what [`Client::receive`] returns. Nothing reconnects automatically.

pub mod client;
pub mod subscription;
pub mod types;

pub use client::Client;
pub use subscription::StreamParser;
pub use types::{LastPrice, PriceLevel, StreamMessage, Trade, TradeType};

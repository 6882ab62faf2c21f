//! Streams a few public updates for two currency pairs, then shuts the session down.
//!
//! Run with tracing enabled:
//! ```sh
//! RUST_LOG=info cargo run --example stream --features tracing
//! ```

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{info, warn};
use zaif_client_sdk::stream::Client;
use zaif_client_sdk::types::CancellationToken;

const PAIRS: [&str; 2] = ["btc_jpy", "eth_jpy"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let client = Client::default();

    let (tx, mut rx) = mpsc::channel(64);
    for pair in PAIRS {
        client.add_subscription(pair, tx.clone())?;
    }
    // Only the registry holds senders now, so `rx` ends when the client closes them
    drop(tx);
    info!(pairs = ?client.subscribed_pairs(), "Subscribed");

    let cancel = CancellationToken::new();
    let session = tokio::spawn({
        let client = client.clone();
        let cancel = cancel.clone();
        async move { client.receive(cancel).await }
    });

    let mut count = 0;
    while let Ok(Some(message)) = timeout(Duration::from_secs(30), rx.recv()).await {
        info!(
            pair = %message.currency_pair,
            last = %message.last_price.price,
            action = ?message.last_price.action,
            best_ask = ?message.best_ask().map(|level| level.price),
            best_bid = ?message.best_bid().map(|level| level.price),
            trades = message.trades.len(),
            connections = client.connection_count(),
        );
        count += 1;
        if count >= 10 {
            break;
        }
    }
    info!(received = count);

    cancel.cancel();
    client.close()?;

    match session.await? {
        Ok(()) => info!("Session finished"),
        Err(e) => warn!(error = %e, pair = ?e.pair(), "Session failed"),
    }

    Ok(())
}

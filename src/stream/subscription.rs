#![expect(
    clippy::module_name_repetitions,
    reason = "Subscription types deliberately include the module name for clarity"
)]

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::types::StreamMessage;
use crate::Result;
use crate::error::Error;
use crate::serde_helpers::deserialize_with_warnings;
use crate::ws::connection::ConnectionHandle;
use crate::ws::error::WsError;
use crate::ws::traits::{DeliveryGate, MessageParser};

#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamParser;

impl MessageParser<StreamMessage> for StreamParser {
    fn parse(&self, bytes: &[u8]) -> std::result::Result<StreamMessage, WsError> {
        Ok(deserialize_with_warnings(bytes)?)
    }
}

/// Everything guarded by the one client lock.
#[derive(Default)]
struct SessionState {
    /// Delivery channel per pair
    subscriptions: HashMap<String, mpsc::Sender<StreamMessage>>,
    /// Write handles of the live session's connections
    connections: HashMap<String, ConnectionHandle>,
    /// Whether decoded messages may still be delivered
    connected: bool,
    /// Scope of the in-flight session, present from start until teardown completes
    session: Option<CancellationToken>,
}

/// Owns the subscription registry and session state behind a single mutex.
///
/// Every method takes the lock for metadata only and releases it before returning; nothing
/// here awaits, and message delivery happens on a sender cloned out of the lock.
#[derive(Default)]
pub struct SubscriptionManager {
    state: Mutex<SessionState>,
}

impl SubscriptionManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `sender` for `pair`, replacing any earlier registration.
    ///
    /// A running session keeps delivering into the sender it started with.
    pub fn subscribe(&self, pair: String, sender: mpsc::Sender<StreamMessage>) {
        let replaced = self.lock().subscriptions.insert(pair, sender);

        #[cfg(feature = "tracing")]
        if replaced.is_some() {
            tracing::debug!("Subscription replaced an earlier registration");
        }
        #[cfg(not(feature = "tracing"))]
        let _ = &replaced;
    }

    /// Registered pairs, sorted.
    #[must_use]
    pub fn pairs(&self) -> Vec<String> {
        let mut pairs: Vec<String> = self.lock().subscriptions.keys().cloned().collect();
        pairs.sort_unstable();
        pairs
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.lock().connections.len()
    }

    /// Start a session scoped to `token` and return the pairs to dial, sorted, each with the
    /// sender its reader delivers into for the whole session.
    ///
    /// Fails without side effects if a session is already in flight.
    pub fn begin_session(
        &self,
        token: CancellationToken,
    ) -> Result<Vec<(String, mpsc::Sender<StreamMessage>)>> {
        let mut state = self.lock();
        if state.connected || state.session.is_some() {
            return Err(Error::already_started());
        }

        state.connected = true;
        state.session = Some(token);

        let mut pairs: Vec<(String, mpsc::Sender<StreamMessage>)> = state
            .subscriptions
            .iter()
            .map(|(pair, sender)| (pair.clone(), sender.clone()))
            .collect();
        pairs.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
        Ok(pairs)
    }

    /// Record the live connections of the current session.
    pub fn attach(&self, handles: Vec<ConnectionHandle>) {
        let mut state = self.lock();
        for handle in handles {
            state.connections.insert(handle.key().to_owned(), handle);
        }
    }

    /// Roll back a session whose dial pass failed: every subscriber channel is closed.
    pub fn abort_session(&self) {
        let dropped = {
            let mut state = self.lock();
            state.connected = false;
            state.session = None;
            std::mem::take(&mut state.subscriptions)
        };
        drop(dropped);
    }

    /// Finish the current session, handing back the connections still to be closed.
    #[must_use]
    pub fn end_session(&self) -> Vec<ConnectionHandle> {
        let mut state = self.lock();
        state.connected = false;
        state.session = None;
        state.connections.drain().map(|(_, handle)| handle).collect()
    }

    /// Close every subscriber channel, stop delivery, and cancel the in-flight session.
    ///
    /// Repeated calls are no-ops: channels are closed by dropping the registry's sender, which
    /// can only happen once.
    pub fn close(&self) {
        let (dropped, session) = {
            let mut state = self.lock();
            state.connected = false;
            (std::mem::take(&mut state.subscriptions), state.session.clone())
        };

        if let Some(token) = session {
            token.cancel();
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(subscriptions = dropped.len(), "Subscriptions closed");
        drop(dropped);
    }
}

impl DeliveryGate for SubscriptionManager {
    fn is_open(&self, key: &str) -> bool {
        let state = self.lock();
        state.connected && state.subscriptions.contains_key(key)
    }
}

//! Core traits for generic WebSocket infrastructure.

use super::error::WsError;

/// Message parser trait for converting raw frame bytes to messages.
///
/// # Example
///
/// ```ignore
/// pub struct SimpleParser;
///
/// impl MessageParser<MyMessage> for SimpleParser {
///     fn parse(&self, bytes: &[u8]) -> Result<MyMessage, WsError> {
///         Ok(serde_json::from_slice(bytes)?)
///     }
/// }
/// ```
pub trait MessageParser<M>: Send + Sync + 'static {
    /// Parse one text or binary frame into a message.
    fn parse(&self, bytes: &[u8]) -> Result<M, WsError>;
}

/// Decides whether a connection's decoded messages may still be delivered.
///
/// Each reader owns the sender it was started with; the gate only answers whether that
/// delivery is still wanted, so it must never block on anything but its own short lock.
pub trait DeliveryGate: Send + Sync + 'static {
    /// `false` once messages for `key` should be dropped instead of delivered.
    fn is_open(&self, key: &str) -> bool;
}

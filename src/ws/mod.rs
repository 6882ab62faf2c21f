//! Core WebSocket infrastructure.
//!
//! This module provides the per-connection plumbing that [`crate::stream`] builds on:
//!
//! - [`connection::dial`]: open one WebSocket, split into a [`ConnectionHandle`] (keepalive,
//!   close) and a [`Reader`] (decode and dispatch)
//! - [`TaskGroup`]: first-error-wins task supervision under one cancellation scope
//! - [`MessageParser`] / [`DeliveryGate`]: the seams between raw frames, message types and
//!   subscribers

pub mod config;
pub mod connection;
pub mod error;
pub mod group;
pub mod traits;

pub use connection::{Connection, ConnectionHandle, Reader};
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use group::TaskGroup;
pub use traits::*;

//! Live push channel: STOMP over WebSocket, one session per signed-in user.

pub mod client;
pub mod stomp;

pub use client::{ChannelConfig, ChannelState, EventHandler, LiveChannel};

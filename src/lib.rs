//! Echod - WebSocket Echo Service
//!
//! A minimal WebSocket echo server written in Rust.
//!
//! ## Features
//!
//! - Per-connection sessions with paired inbound/outbound pumps
//! - Heartbeat liveness via ping/pong with read and write deadlines
//! - Bounded outbound queue with newline coalescing under burst load
//! - Environment-variable configuration with silent fallback to defaults
//! - Graceful shutdown with a bounded grace period
//! - Interactive companion client (`echod-client`)

pub mod api;
pub mod config;
pub mod error;
pub mod ws;

pub use config::Config;
pub use error::{EchoError, Result};

//! HTTP surface
//!
//! Route registration, shared state, and the non-WebSocket handlers.

pub mod handlers;
pub mod routes;
pub mod server;

pub use server::EchoServer;

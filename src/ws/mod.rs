//! WebSocket echo protocol
//!
//! One session per upgraded connection; see [`session`] for the pump
//! protocol and [`transport`] for the frame-level seam.

use std::time::Duration;

pub mod handler;
pub mod session;
pub mod transport;

pub use session::{Session, SessionConfig, SessionHandle};
pub use transport::{Frame, FrameSink, FrameStream};

/// Time allowed to write a single frame to the peer
pub const WRITE_WAIT: Duration = Duration::from_secs(10);

/// Time allowed between reads before the peer is considered unresponsive;
/// an answering pong refreshes the window
pub const PONG_WAIT: Duration = Duration::from_secs(60);

/// Maximum message size accepted from a peer, in bytes
pub const MAX_MESSAGE_SIZE: usize = 512;

/// Outbound queue capacity per session
pub const OUTBOUND_QUEUE_SIZE: usize = 256;

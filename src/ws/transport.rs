//! Transport seam between the session protocol and the underlying socket
//!
//! The session pumps only ever see [`Frame`]s through the [`FrameStream`] and
//! [`FrameSink`] traits, one half per pump, so the single-reader and
//! single-writer disciplines hold by construction. The axum adapter below is
//! the production implementation; tests substitute channel-backed stubs.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};

use crate::error::Result;

/// One discrete message unit on the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Ping,
    Pong,
    Close,
}

impl Frame {
    fn from_message(msg: Message) -> Frame {
        match msg {
            Message::Text(text) => Frame::Text(text),
            Message::Binary(data) => Frame::Binary(data),
            Message::Ping(_) => Frame::Ping,
            Message::Pong(_) => Frame::Pong,
            Message::Close(_) => Frame::Close,
        }
    }

    fn into_message(self) -> Message {
        match self {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(data) => Message::Binary(data),
            Frame::Ping => Message::Ping(Vec::new()),
            Frame::Pong => Message::Pong(Vec::new()),
            Frame::Close => Message::Close(None),
        }
    }
}

/// Read half of a transport connection
#[async_trait]
pub trait FrameStream: Send {
    /// Receive the next frame; `None` means the peer is gone
    async fn next_frame(&mut self) -> Option<Result<Frame>>;
}

/// Write half of a transport connection
#[async_trait]
pub trait FrameSink: Send {
    async fn send_frame(&mut self, frame: Frame) -> Result<()>;

    /// Flush and close the write side
    async fn close(&mut self) -> Result<()>;
}

/// Read half of an upgraded axum WebSocket
pub struct WsFrameStream {
    inner: SplitStream<WebSocket>,
}

/// Write half of an upgraded axum WebSocket
pub struct WsFrameSink {
    inner: SplitSink<WebSocket, Message>,
}

/// Split an upgraded socket into its session-facing halves
pub fn split(socket: WebSocket) -> (WsFrameSink, WsFrameStream) {
    let (sink, stream) = socket.split();
    (WsFrameSink { inner: sink }, WsFrameStream { inner: stream })
}

#[async_trait]
impl FrameStream for WsFrameStream {
    async fn next_frame(&mut self) -> Option<Result<Frame>> {
        self.inner
            .next()
            .await
            .map(|res| res.map(Frame::from_message).map_err(Into::into))
    }
}

#[async_trait]
impl FrameSink for WsFrameSink {
    async fn send_frame(&mut self, frame: Frame) -> Result<()> {
        self.inner
            .send(frame.into_message())
            .await
            .map_err(Into::into)
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close().await.map_err(Into::into)
    }
}

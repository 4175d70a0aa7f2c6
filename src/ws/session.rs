//! Per-connection session protocol
//!
//! Each session runs two concurrent pumps over one transport connection: the
//! inbound pump reads frames under a rolling read deadline and queues echo
//! responses, the outbound pump is the sole writer and multiplexes queued
//! messages, heartbeat pings, and shutdown. Whichever pump hits a terminal
//! condition first cancels the shared token and the other pump follows it out.

use std::time::Duration;

use chrono::Local;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{EchoError, Result};
use crate::ws::transport::{Frame, FrameSink, FrameStream};
use crate::ws::{MAX_MESSAGE_SIZE, OUTBOUND_QUEUE_SIZE, PONG_WAIT, WRITE_WAIT};

/// Timing and sizing knobs for a session
///
/// Defaults match the protocol constants; tests shrink the windows.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Read deadline; refreshed by every received frame, pongs included
    pub pong_wait: Duration,
    /// Deadline for any single write to the transport
    pub write_wait: Duration,
    /// Largest accepted incoming text message, in bytes
    pub max_message_size: usize,
    /// Outbound queue capacity
    pub queue_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pong_wait: PONG_WAIT,
            write_wait: WRITE_WAIT,
            max_message_size: MAX_MESSAGE_SIZE,
            queue_size: OUTBOUND_QUEUE_SIZE,
        }
    }
}

impl SessionConfig {
    /// Heartbeat period; must undercut `pong_wait` so an answering pong
    /// lands before the read deadline lapses
    pub fn ping_period(&self) -> Duration {
        self.pong_wait * 9 / 10
    }
}

/// One WebSocket client connection
pub struct Session {
    client_id: String,
    config: SessionConfig,
}

/// Handle to a running session's pump tasks
pub struct SessionHandle {
    inbound: JoinHandle<()>,
    outbound: JoinHandle<()>,
}

impl SessionHandle {
    /// Wait until both pumps have exited and the connection is torn down
    pub async fn closed(self) {
        let _ = tokio::join!(self.inbound, self.outbound);
    }
}

impl Session {
    pub fn new(client_id: impl Into<String>, config: SessionConfig) -> Self {
        Self {
            client_id: client_id.into(),
            config,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Spawn both pumps over the given transport halves
    ///
    /// The welcome message is queued before the inbound pump starts, so it is
    /// always the first frame the peer sees. `shutdown` is the server-wide
    /// graceful-shutdown signal; flipping it makes the outbound pump send a
    /// close frame and exit.
    pub fn spawn<S, K>(
        self,
        stream: S,
        sink: K,
        shutdown: watch::Receiver<bool>,
    ) -> SessionHandle
    where
        S: FrameStream + 'static,
        K: FrameSink + 'static,
    {
        let (queue_tx, queue_rx) = mpsc::channel(self.config.queue_size);
        let cancel = CancellationToken::new();

        let welcome = format!("Welcome! Your client ID is: {}", self.client_id);
        let _ = queue_tx.try_send(welcome);

        let inbound = tokio::spawn({
            let cancel = cancel.clone();
            let client_id = self.client_id.clone();
            let config = self.config.clone();
            async move {
                match read_pump(stream, queue_tx, &cancel, &client_id, &config).await {
                    Ok(()) => debug!(client_id = %client_id, "inbound pump finished"),
                    Err(EchoError::ReadTimeout) => {
                        warn!(client_id = %client_id, "no read activity within deadline, dropping client")
                    }
                    Err(e) => {
                        debug!(client_id = %client_id, error = %e, "inbound pump failed")
                    }
                }
                cancel.cancel();
            }
        });

        let outbound = tokio::spawn({
            let cancel = cancel.clone();
            let client_id = self.client_id.clone();
            let config = self.config.clone();
            async move {
                match write_pump(sink, queue_rx, &cancel, shutdown, &client_id, &config).await {
                    Ok(()) => debug!(client_id = %client_id, "outbound pump finished"),
                    Err(EchoError::WriteTimeout) => {
                        warn!(client_id = %client_id, "write deadline exceeded, dropping client")
                    }
                    Err(e) => {
                        debug!(client_id = %client_id, error = %e, "outbound pump failed")
                    }
                }
                cancel.cancel();
            }
        });

        SessionHandle { inbound, outbound }
    }
}

/// Inbound pump: reads frames and queues echo responses
///
/// Every loop iteration re-arms the read deadline, so any received frame
/// (an answering pong in particular) counts as liveness. Terminal conditions
/// are the deadline, a close frame, stream end, or any transport error; none
/// of them is retried.
async fn read_pump<S: FrameStream>(
    mut stream: S,
    queue: mpsc::Sender<String>,
    cancel: &CancellationToken,
    client_id: &str,
    config: &SessionConfig,
) -> Result<()> {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            read = timeout(config.pong_wait, stream.next_frame()) => match read {
                Err(_) => return Err(EchoError::ReadTimeout),
                Ok(None) => return Ok(()),
                Ok(Some(Err(e))) => return Err(e),
                Ok(Some(Ok(frame))) => frame,
            },
        };

        match frame {
            Frame::Text(message) => {
                if message.len() > config.max_message_size {
                    return Err(EchoError::MessageTooLarge {
                        size: message.len(),
                        limit: config.max_message_size,
                    });
                }

                info!(client_id, message = %message, "received message");

                let response =
                    format!("[{}] Echo: {}", Local::now().format("%H:%M:%S"), message);
                // Best-effort: a full queue or one whose reader already
                // exited drops the echo rather than blocking the read side.
                if queue.try_send(response).is_err() {
                    debug!(client_id, "outbound queue unavailable, dropping echo");
                }
            }
            // Read activity alone refreshes the deadline
            Frame::Ping | Frame::Pong => {}
            Frame::Binary(_) => {
                warn!(client_id, "ignoring binary frame");
            }
            Frame::Close => return Ok(()),
        }
    }
}

/// Outbound pump: the sole writer to the transport
///
/// Multiplexes queued messages, the heartbeat timer, the server shutdown
/// signal, and cancellation. A closed queue is the graceful path: send a
/// close frame and exit without further pings.
async fn write_pump<K: FrameSink>(
    mut sink: K,
    mut queue: mpsc::Receiver<String>,
    cancel: &CancellationToken,
    mut shutdown: watch::Receiver<bool>,
    client_id: &str,
    config: &SessionConfig,
) -> Result<()> {
    let period = config.ping_period();
    let mut heartbeat = interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.close().await;
                return Ok(());
            }
            entry = queue.recv() => match entry {
                Some(message) => {
                    let mut payload = message;
                    // Coalesce whatever is already queued into this frame
                    while let Ok(next) = queue.try_recv() {
                        payload.push('\n');
                        payload.push_str(&next);
                    }
                    send_with_deadline(&mut sink, Frame::Text(payload), config.write_wait).await?;
                    debug!(client_id, "sent message");
                }
                None => {
                    // Producers are gone; tell the peer we are done
                    let _ = send_with_deadline(&mut sink, Frame::Close, config.write_wait).await;
                    let _ = sink.close().await;
                    return Ok(());
                }
            },
            _ = heartbeat.tick() => {
                send_with_deadline(&mut sink, Frame::Ping, config.write_wait).await?;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!(client_id, "shutting down session");
                    let _ = send_with_deadline(&mut sink, Frame::Close, config.write_wait).await;
                    let _ = sink.close().await;
                    return Ok(());
                }
            }
        }
    }
}

async fn send_with_deadline<K: FrameSink>(
    sink: &mut K,
    frame: Frame,
    deadline: Duration,
) -> Result<()> {
    match timeout(deadline, sink.send_frame(frame)).await {
        Ok(res) => res,
        Err(_) => Err(EchoError::WriteTimeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio_test::assert_ok;

    struct StreamStub {
        rx: mpsc::UnboundedReceiver<Result<Frame>>,
    }

    #[async_trait]
    impl FrameStream for StreamStub {
        async fn next_frame(&mut self) -> Option<Result<Frame>> {
            self.rx.recv().await
        }
    }

    struct SinkStub {
        tx: mpsc::UnboundedSender<Frame>,
    }

    #[async_trait]
    impl FrameSink for SinkStub {
        async fn send_frame(&mut self, frame: Frame) -> Result<()> {
            self.tx.send(frame).map_err(|_| EchoError::ConnectionClosed)
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    /// Sink whose writes never complete; used to trip the write deadline
    struct StalledSink;

    #[async_trait]
    impl FrameSink for StalledSink {
        async fn send_frame(&mut self, _frame: Frame) -> Result<()> {
            std::future::pending().await
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn stream_stub() -> (mpsc::UnboundedSender<Result<Frame>>, StreamStub) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, StreamStub { rx })
    }

    fn sink_stub() -> (SinkStub, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SinkStub { tx }, rx)
    }

    fn assert_echo_shape(line: &str, original: &str) {
        assert_eq!(&line[..1], "[", "missing timestamp prefix: {line}");
        assert_eq!(&line[9..], format!("] Echo: {original}"));
        for (i, c) in line[1..9].char_indices() {
            if i == 2 || i == 5 {
                assert_eq!(c, ':');
            } else {
                assert!(c.is_ascii_digit(), "bad timestamp in {line}");
            }
        }
    }

    #[tokio::test]
    async fn test_echo_response_format() {
        let (frames, stream) = stream_stub();
        let (queue_tx, mut queue_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let config = SessionConfig::default();

        frames.send(Ok(Frame::Text("hello".to_string()))).unwrap();
        drop(frames);

        assert_ok!(read_pump(stream, queue_tx, &cancel, "test-client", &config).await);

        let echoed = queue_rx.recv().await.unwrap();
        assert_echo_shape(&echoed, "hello");
    }

    #[tokio::test]
    async fn test_oversize_message_terminates_without_echo() {
        let (frames, stream) = stream_stub();
        let (queue_tx, mut queue_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let config = SessionConfig::default();

        frames
            .send(Ok(Frame::Text("x".repeat(513))))
            .unwrap();

        let result = read_pump(stream, queue_tx, &cancel, "test-client", &config).await;

        assert!(matches!(
            result,
            Err(EchoError::MessageTooLarge { size: 513, limit: 512 })
        ));
        assert!(queue_rx.try_recv().is_err(), "oversize message was echoed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_deadline_evicts_silent_peer() {
        let (frames, stream) = stream_stub();
        let (queue_tx, _queue_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let config = SessionConfig::default();

        // Hold the sender so the stream stays open but never yields
        let result = read_pump(stream, queue_tx, &cancel, "test-client", &config).await;
        drop(frames);

        assert!(matches!(result, Err(EchoError::ReadTimeout)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pong_refreshes_read_deadline() {
        let (frames, stream) = stream_stub();
        let (queue_tx, _queue_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let config = SessionConfig::default();

        let pump = tokio::spawn(async move {
            read_pump(stream, queue_tx, &cancel, "test-client", &config).await
        });

        // Two refreshes carry the session well past the 60s window
        for _ in 0..2 {
            tokio::time::sleep(Duration::from_secs(40)).await;
            frames.send(Ok(Frame::Pong)).unwrap();
        }
        tokio::time::sleep(Duration::from_secs(40)).await;
        assert!(!pump.is_finished(), "pump timed out despite pong traffic");

        drop(frames);
        assert_ok!(pump.await.unwrap());
    }

    #[tokio::test]
    async fn test_coalesces_queued_messages_in_order() {
        let (sink, mut out) = sink_stub();
        let (queue_tx, queue_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = SessionConfig::default();

        for msg in ["a", "b", "c"] {
            queue_tx.try_send(msg.to_string()).unwrap();
        }

        let pump = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                write_pump(sink, queue_rx, &cancel, shutdown_rx, "test-client", &config).await
            }
        });

        assert_eq!(out.recv().await.unwrap(), Frame::Text("a\nb\nc".to_string()));

        cancel.cancel();
        assert_ok!(pump.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_queue_sends_close_frame_and_no_pings() {
        let (sink, mut out) = sink_stub();
        let (queue_tx, queue_rx) = mpsc::channel::<String>(8);
        let cancel = CancellationToken::new();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = SessionConfig::default();

        drop(queue_tx);
        assert_ok!(
            write_pump(sink, queue_rx, &cancel, shutdown_rx, "test-client", &config).await
        );

        assert_eq!(out.recv().await.unwrap(), Frame::Close);
        assert!(out.recv().await.is_none(), "frames sent after close");
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_pings_idle_connection() {
        let (sink, mut out) = sink_stub();
        let (_queue_tx, queue_rx) = mpsc::channel::<String>(8);
        let cancel = CancellationToken::new();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = SessionConfig::default();

        let pump = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                write_pump(sink, queue_rx, &cancel, shutdown_rx, "test-client", &config).await
            }
        });

        assert_eq!(out.recv().await.unwrap(), Frame::Ping);
        assert_eq!(out.recv().await.unwrap(), Frame::Ping);

        cancel.cancel();
        assert_ok!(pump.await.unwrap());
    }

    #[tokio::test]
    async fn test_write_error_terminates_outbound_pump() {
        let (sink, out) = sink_stub();
        let (queue_tx, queue_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = SessionConfig::default();

        drop(out);
        queue_tx.try_send("hello".to_string()).unwrap();

        let result =
            write_pump(sink, queue_rx, &cancel, shutdown_rx, "test-client", &config).await;

        assert!(matches!(result, Err(EchoError::ConnectionClosed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_deadline_evicts_stalled_peer() {
        let (queue_tx, queue_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = SessionConfig::default();

        queue_tx.try_send("hello".to_string()).unwrap();

        let result =
            write_pump(StalledSink, queue_rx, &cancel, shutdown_rx, "test-client", &config).await;

        assert!(matches!(result, Err(EchoError::WriteTimeout)));
    }

    #[tokio::test]
    async fn test_session_welcome_is_first_frame_then_echoes_in_order() {
        let (frames, stream) = stream_stub();
        let (sink, mut out) = sink_stub();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let session = Session::new("127.0.0.1:4242-1700000000", SessionConfig::default());
        let handle = session.spawn(stream, sink, shutdown_rx);

        assert_eq!(
            out.recv().await.unwrap(),
            Frame::Text("Welcome! Your client ID is: 127.0.0.1:4242-1700000000".to_string())
        );

        for msg in ["a", "b", "c"] {
            frames.send(Ok(Frame::Text(msg.to_string()))).unwrap();
        }

        let mut lines = Vec::new();
        while lines.len() < 3 {
            match out.recv().await.unwrap() {
                Frame::Text(payload) => {
                    lines.extend(payload.split('\n').map(str::to_string))
                }
                Frame::Ping => {}
                other => panic!("unexpected frame: {other:?}"),
            }
        }

        for (line, original) in lines.iter().zip(["a", "b", "c"]) {
            assert_echo_shape(line, original);
        }

        frames.send(Ok(Frame::Close)).unwrap();
        handle.closed().await;
    }

    #[tokio::test]
    async fn test_shutdown_signal_closes_session() {
        let (_frames, stream) = stream_stub();
        let (sink, mut out) = sink_stub();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let session = Session::new("127.0.0.1:4242-1700000000", SessionConfig::default());
        let handle = session.spawn(stream, sink, shutdown_rx);

        // Skip the welcome frame
        assert!(matches!(out.recv().await.unwrap(), Frame::Text(_)));

        shutdown_tx.send(true).unwrap();

        loop {
            match out.recv().await.unwrap() {
                Frame::Close => break,
                Frame::Ping => {}
                other => panic!("unexpected frame: {other:?}"),
            }
        }
        handle.closed().await;
    }

    #[test]
    fn test_ping_period_undercuts_pong_wait() {
        let config = SessionConfig::default();
        assert_eq!(config.ping_period(), Duration::from_secs(54));
        assert!(config.ping_period() < config.pong_wait);
    }
}

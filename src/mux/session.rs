//! Multiplexing session dispatcher
//!
//! The session is the single reader of the transport: every inbound
//! byte goes through the frame codec and every decoded frame is routed
//! by type. Outbound frames from all producers (channels, the
//! dispatcher itself, the keepalive ticker) funnel through one queue
//! into a single writer task, which serialises access to the transport
//! and preserves each producer's ordering.

use crate::error::Error;
use crate::helper::DEFAULT_BUFFER_SIZE;
use crate::mux::channel::{Channel, ChannelEvent};
use crate::mux::frame::{Frame, FrameCodec, FrameType};
use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace, warn};

/// Session-level settings
#[derive(Debug, Clone)]
pub struct MuxConfig {
    /// Initial send/recv flow-control window per channel, in bytes
    pub channel_window_size: u32,
    /// Period of keepalive PING frames in milliseconds; 0 disables
    pub keepalive_interval_ms: u64,
}

impl Default for MuxConfig {
    fn default() -> Self {
        MuxConfig {
            channel_window_size: 262144,
            keepalive_interval_ms: 30000,
        }
    }
}

/// Serialised path for outbound frames
///
/// Cloned into every channel task; sending fails once the session has
/// shut down, which the producers treat as a signal to stop.
#[derive(Clone)]
pub(crate) struct FrameSink {
    tx: mpsc::Sender<Bytes>,
}

impl FrameSink {
    pub(crate) async fn send(&self, frame: Bytes) -> Result<(), ()> {
        self.tx.send(frame).await.map_err(|_| ())
    }

    pub(crate) async fn send_open_ack(&self, channel_id: u16) -> Result<(), ()> {
        self.send(FrameCodec::open_ack(channel_id)).await
    }

    pub(crate) async fn send_request_ack(&self, channel_id: u16, payload: &[u8]) -> Result<(), ()> {
        self.send(FrameCodec::request_ack(channel_id, payload)).await
    }

    pub(crate) async fn send_data(&self, channel_id: u16, payload: &[u8]) -> Result<(), ()> {
        self.send(FrameCodec::data(channel_id, payload)).await
    }

    pub(crate) async fn send_close(&self, channel_id: u16, flags: u8) -> Result<(), ()> {
        self.send(FrameCodec::close(channel_id, flags)).await
    }

    pub(crate) async fn send_close_ack(&self, channel_id: u16) -> Result<(), ()> {
        self.send(FrameCodec::close_ack(channel_id)).await
    }

    pub(crate) async fn send_window_update(&self, channel_id: u16, increment: u32) -> Result<(), ()> {
        self.send(FrameCodec::window_update(channel_id, increment))
            .await
    }
}

/// One multiplexing session over one transport connection
pub struct MuxSession {
    config: MuxConfig,
}

impl MuxSession {
    /// Create a session with the given settings
    pub fn new(config: MuxConfig) -> Self {
        MuxSession { config }
    }

    /// Run the session until the transport disconnects, a fatal
    /// protocol error occurs, or shutdown is requested.
    ///
    /// Returns `Ok(())` only for a locally requested shutdown; every
    /// other exit is the single disconnect notification.
    pub async fn run<S>(
        self,
        stream: S,
        mut shutdown_rx: broadcast::Receiver<bool>,
    ) -> Result<(), Error>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut reader, mut writer) = tokio::io::split(stream);

        // Single writer task: the serialised transport-send path
        let (frame_tx, mut frame_rx) = mpsc::channel::<Bytes>(256);
        let mut writer_task = tokio::spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                writer.write_all(&frame).await?;
                writer.flush().await?;
            }
            Ok::<(), std::io::Error>(())
        });

        let sink = FrameSink { tx: frame_tx };

        let keepalive_task = self.start_keepalive(&sink);

        let mut codec = FrameCodec::new();
        let mut registry: HashMap<u16, mpsc::Sender<ChannelEvent>> = HashMap::new();
        let mut read_buf = vec![0u8; DEFAULT_BUFFER_SIZE];

        info!("Mux session started");

        let result = loop {
            tokio::select! {
                read = reader.read(&mut read_buf) => match read {
                    Ok(0) => {
                        break Err(Error::TransportDisconnected(
                            "connection closed by peer".to_string(),
                        ));
                    }
                    Ok(n) => match codec.feed(&read_buf[..n]) {
                        Ok(frames) => {
                            for frame in frames {
                                self.dispatch(frame, &mut registry, &sink).await;
                            }
                        }
                        Err(e) => break Err(e),
                    },
                    Err(e) => break Err(Error::TransportDisconnected(e.to_string())),
                },
                write_result = &mut writer_task => {
                    let message = match write_result {
                        Ok(Ok(())) => "write side closed".to_string(),
                        Ok(Err(e)) => e.to_string(),
                        Err(e) => e.to_string(),
                    };
                    break Err(Error::TransportDisconnected(message));
                }
                _ = shutdown_rx.recv() => {
                    info!("Session shutdown requested");
                    break Ok(());
                }
            }
        };

        if let Some(task) = keepalive_task {
            task.abort();
        }
        self.close_all_channels(&mut registry);

        match &result {
            Ok(()) => info!("Mux session shut down"),
            Err(e) => warn!("Mux session ended: {}", e),
        }

        result
    }

    /// Route one decoded frame
    async fn dispatch(
        &self,
        frame: Frame,
        registry: &mut HashMap<u16, mpsc::Sender<ChannelEvent>>,
        sink: &FrameSink,
    ) {
        let Some(frame_type) = frame.frame_type() else {
            warn!("Unknown frame type: 0x{:02X}", frame.ty);
            return;
        };

        match frame_type {
            FrameType::ChannelOpen => {
                let id = frame.channel_id;
                debug!("ChannelOpen for channel {}", id);
                let events = Channel::spawn(id, self.config.channel_window_size, sink.clone());
                if let Some(previous) = registry.insert(id, events) {
                    warn!("Duplicate ChannelOpen for channel {}, replacing", id);
                    let _ = previous.try_send(ChannelEvent::ForceClose);
                }
            }
            FrameType::ChannelRequest => match registry.get(&frame.channel_id) {
                Some(channel) => {
                    if channel
                        .send(ChannelEvent::Request(frame.payload))
                        .await
                        .is_err()
                    {
                        warn!(
                            "ChannelRequest for closed channel {}, ignoring",
                            frame.channel_id
                        );
                    }
                }
                None => {
                    warn!("ChannelRequest for unknown channel {}", frame.channel_id);
                }
            },
            FrameType::Data => match registry.get(&frame.channel_id) {
                // A closed channel drops in-flight data silently
                Some(channel) => {
                    let _ = channel.send(ChannelEvent::Data(frame.payload)).await;
                }
                None => {
                    trace!("Data for unknown channel {}, dropping", frame.channel_id);
                }
            },
            FrameType::ChannelClose => match registry.remove(&frame.channel_id) {
                Some(channel) => {
                    if channel
                        .send(ChannelEvent::Close(frame.flags))
                        .await
                        .is_err()
                    {
                        // The task already finished; acknowledge on its behalf
                        let _ = sink.send_close_ack(frame.channel_id).await;
                    }
                }
                None => {
                    // Already gone: still acknowledge, closes are idempotent
                    let _ = sink.send_close_ack(frame.channel_id).await;
                }
            },
            FrameType::ChannelCloseAck => {
                if let Some(channel) = registry.remove(&frame.channel_id) {
                    let _ = channel.send(ChannelEvent::ForceClose).await;
                }
            }
            FrameType::Ping => {
                debug!("Ping received, sending Pong");
                let _ = sink.send(FrameCodec::pong()).await;
            }
            FrameType::Pong => {
                trace!("Pong received");
            }
            FrameType::WindowUpdate => {
                if frame.payload.len() < 4 {
                    warn!("WindowUpdate with insufficient payload");
                    return;
                }
                let increment = u32::from_le_bytes([
                    frame.payload[0],
                    frame.payload[1],
                    frame.payload[2],
                    frame.payload[3],
                ]);
                if let Some(channel) = registry.get(&frame.channel_id) {
                    let _ = channel.send(ChannelEvent::WindowUpdate(increment)).await;
                }
            }
            FrameType::ChannelOpenAck | FrameType::ChannelRequestAck => {
                warn!("Unexpected {:?} frame from server, ignoring", frame_type);
            }
        }
    }

    /// Periodic PING on channel 0; the first tick fires one full
    /// period after start.
    fn start_keepalive(&self, sink: &FrameSink) -> Option<tokio::task::JoinHandle<()>> {
        if self.config.keepalive_interval_ms == 0 {
            return None;
        }

        let period = Duration::from_millis(self.config.keepalive_interval_ms);
        let sink = sink.clone();
        debug!("Keepalive timer started ({:?})", period);

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The immediate first tick; pings start one period in
            ticker.tick().await;
            loop {
                ticker.tick().await;
                debug!("Sending keepalive ping");
                if sink.send(FrameCodec::ping()).await.is_err() {
                    break;
                }
            }
        }))
    }

    /// Force-close every channel; their tasks tear down the targets.
    fn close_all_channels(&self, registry: &mut HashMap<u16, mpsc::Sender<ChannelEvent>>) {
        let count = registry.len();
        for (_, channel) in registry.drain() {
            // Dropping the sender stops the task even when its queue is full
            let _ = channel.try_send(ChannelEvent::ForceClose);
        }
        if count > 0 {
            info!("Closed all {} channels", count);
        }
    }
}

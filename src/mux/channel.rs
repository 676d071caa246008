//! Per-channel state machine
//!
//! Each channel is a task that owns one proxied connection end to end:
//! it answers the channel open, drives the SOCKS5 handshake from
//! CHANNEL_REQUEST payloads, dials the target, then relays bytes
//! between the target socket and DATA frames while honouring the
//! flow-control windows. All mux-side events for the channel arrive on
//! a single queue, so they are processed serially and in receipt order.

use crate::error::ReplyCode;
use crate::helper::DEFAULT_BUFFER_SIZE;
use crate::mux::flow::FlowControl;
use crate::mux::frame::{FRAME_FLAG_FIN, FRAME_FLAG_RST, FRAME_MAX_PAYLOAD};
use crate::mux::session::FrameSink;
use crate::socks::{
    self, build_connect_reply, build_method_response, ConnectRequest, SOCKS5_AUTH_METHOD_NONE,
    SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE,
};
use crate::target;
use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Mux-side events forwarded to a channel by the session dispatcher
#[derive(Debug)]
pub(crate) enum ChannelEvent {
    /// SOCKS5 handshake bytes from a CHANNEL_REQUEST frame
    Request(Bytes),
    /// Relay payload from a DATA frame
    Data(Bytes),
    /// Send-window credit from a WINDOW_UPDATE frame
    WindowUpdate(u32),
    /// CHANNEL_CLOSE received; flags carry FIN/RST
    Close(u8),
    /// Tear down immediately without acknowledging anything
    ForceClose,
}

/// Channel lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelState {
    Opening,
    Requesting,
    Connecting,
    Relaying,
    Closing,
    Closed,
}

/// Outcome of one SOCKS5 driving pass over the accumulated buffer
enum SocksProgress {
    NeedMore,
    Ready(ConnectRequest),
    Failed,
}

pub(crate) struct Channel {
    id: u16,
    state: ChannelState,
    sink: FrameSink,
    events: mpsc::Receiver<ChannelEvent>,
    socks_buf: BytesMut,
    method_done: bool,
    flow: FlowControl,
}

impl Channel {
    /// Spawn the channel task; the returned sender is the dispatcher's
    /// handle for forwarding mux events.
    pub(crate) fn spawn(id: u16, window_size: u32, sink: FrameSink) -> mpsc::Sender<ChannelEvent> {
        let (tx, rx) = mpsc::channel(64);
        let channel = Channel {
            id,
            state: ChannelState::Opening,
            sink,
            events: rx,
            socks_buf: BytesMut::new(),
            method_done: false,
            flow: FlowControl::new(window_size),
        };
        tokio::spawn(channel.run());
        tx
    }

    async fn run(mut self) {
        debug!("Channel {}: opened", self.id);
        if self.sink.send_open_ack(self.id).await.is_err() {
            return;
        }
        self.state = ChannelState::Requesting;

        let Some(request) = self.next_connect_request().await else {
            return;
        };

        let Some(stream) = self.connect_target(&request).await else {
            return;
        };

        self.state = ChannelState::Relaying;
        debug!("Channel {}: relay started", self.id);
        self.relay(stream).await;
    }

    /// Requesting: accumulate CHANNEL_REQUEST payloads and drive the
    /// SOCKS5 handshake until a CONNECT request is fully parsed.
    async fn next_connect_request(&mut self) -> Option<ConnectRequest> {
        loop {
            match self.events.recv().await {
                Some(ChannelEvent::Request(data)) => {
                    self.socks_buf.extend_from_slice(&data);
                    match self.drive_socks5().await {
                        SocksProgress::NeedMore => continue,
                        SocksProgress::Ready(request) => return Some(request),
                        SocksProgress::Failed => return None,
                    }
                }
                Some(ChannelEvent::Data(_)) => {
                    trace!("Channel {}: DATA before relay, dropping", self.id);
                }
                Some(ChannelEvent::WindowUpdate(increment)) => self.flow.add_send(increment),
                Some(ChannelEvent::Close(_)) => {
                    self.acknowledge_close().await;
                    return None;
                }
                Some(ChannelEvent::ForceClose) | None => {
                    self.state = ChannelState::Closed;
                    return None;
                }
            }
        }
    }

    /// One pass of the SOCKS5 state machine over the accumulated bytes:
    /// method selection first, then the CONNECT request.
    async fn drive_socks5(&mut self) -> SocksProgress {
        if !self.method_done {
            match socks::parse_method_request(&self.socks_buf) {
                Ok(None) => return SocksProgress::NeedMore,
                Ok(Some((consumed, true))) => {
                    self.socks_buf.advance(consumed);
                    let response = build_method_response(SOCKS5_AUTH_METHOD_NONE);
                    if self.sink.send_request_ack(self.id, &response).await.is_err() {
                        return SocksProgress::Failed;
                    }
                    self.method_done = true;
                }
                Ok(Some((_, false))) | Err(_) => {
                    warn!("Channel {}: SOCKS5 auth negotiation failed", self.id);
                    let response = build_method_response(SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE);
                    let _ = self.sink.send_request_ack(self.id, &response).await;
                    self.abort_with_rst().await;
                    return SocksProgress::Failed;
                }
            }
        }

        if self.socks_buf.is_empty() {
            return SocksProgress::NeedMore;
        }

        match socks::parse_connect_request(&self.socks_buf) {
            Ok(None) => SocksProgress::NeedMore,
            Ok(Some((consumed, request))) => {
                self.socks_buf.advance(consumed);
                if !request.is_connect() {
                    warn!(
                        "Channel {}: unsupported SOCKS5 command {}",
                        self.id, request.command
                    );
                    let reply = build_connect_reply(ReplyCode::CommandNotSupported);
                    let _ = self.sink.send_request_ack(self.id, &reply).await;
                    self.abort_with_rst().await;
                    return SocksProgress::Failed;
                }
                SocksProgress::Ready(request)
            }
            Err(e) => {
                warn!("Channel {}: malformed SOCKS5 request: {}", self.id, e);
                let reply = build_connect_reply(ReplyCode::from(&e));
                let _ = self.sink.send_request_ack(self.id, &reply).await;
                self.abort_with_rst().await;
                SocksProgress::Failed
            }
        }
    }

    /// Connecting: dial the target while staying responsive to close
    /// and window events that race with the connect.
    async fn connect_target(&mut self, request: &ConnectRequest) -> Option<TcpStream> {
        self.state = ChannelState::Connecting;
        info!("Channel {}: CONNECT {}", self.id, request);

        let connect_fut = target::connect(&request.addr, request.port);
        tokio::pin!(connect_fut);

        loop {
            tokio::select! {
                result = &mut connect_fut => match result {
                    Ok(stream) => {
                        let reply = build_connect_reply(ReplyCode::Succeeded);
                        if self.sink.send_request_ack(self.id, &reply).await.is_err() {
                            return None;
                        }
                        return Some(stream);
                    }
                    Err(e) => {
                        warn!("Channel {}: target connect failed: {}", self.id, e);
                        let reply = build_connect_reply(ReplyCode::from(&e));
                        let _ = self.sink.send_request_ack(self.id, &reply).await;
                        self.abort_with_rst().await;
                        return None;
                    }
                },
                event = self.events.recv() => match event {
                    Some(ChannelEvent::Close(_)) => {
                        self.acknowledge_close().await;
                        return None;
                    }
                    Some(ChannelEvent::Data(_)) => {
                        trace!("Channel {}: DATA while connecting, dropping", self.id);
                    }
                    Some(ChannelEvent::WindowUpdate(increment)) => self.flow.add_send(increment),
                    Some(ChannelEvent::Request(_)) => {
                        warn!("Channel {}: CHANNEL_REQUEST while connecting, ignoring", self.id);
                    }
                    Some(ChannelEvent::ForceClose) | None => {
                        self.state = ChannelState::Closed;
                        return None;
                    }
                },
            }
        }
    }

    /// Relaying: copy bytes in both directions until one side closes.
    async fn relay(&mut self, stream: TcpStream) {
        let (mut target_rd, mut target_wr) = stream.into_split();
        let mut read_buf = vec![0u8; DEFAULT_BUFFER_SIZE];
        // Bytes read from the target but not yet covered by send credit
        let mut pending = BytesMut::new();

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(ChannelEvent::Data(data)) => {
                        if self.state != ChannelState::Relaying {
                            trace!("Channel {}: DATA after half-close, dropping", self.id);
                            continue;
                        }
                        if let Err(e) = target_wr.write_all(&data).await {
                            debug!("Channel {}: target write failed: {}", self.id, e);
                            self.target_gone().await;
                            continue;
                        }
                        if let Some(increment) = self.flow.note_received(data.len()) {
                            let _ = self.sink.send_window_update(self.id, increment).await;
                        }
                    }
                    Some(ChannelEvent::WindowUpdate(increment)) => {
                        self.flow.add_send(increment);
                        if self.flush_pending(&mut pending).await.is_err() {
                            return;
                        }
                    }
                    Some(ChannelEvent::Close(_)) => {
                        self.acknowledge_close().await;
                        return;
                    }
                    Some(ChannelEvent::Request(_)) => {
                        warn!("Channel {}: CHANNEL_REQUEST while relaying, ignoring", self.id);
                    }
                    Some(ChannelEvent::ForceClose) | None => {
                        self.state = ChannelState::Closed;
                        return;
                    }
                },
                result = target_rd.read(&mut read_buf),
                    if self.state == ChannelState::Relaying && pending.is_empty() =>
                {
                    match result {
                        Ok(0) => {
                            debug!("Channel {}: target closed", self.id);
                            self.target_gone().await;
                        }
                        Ok(n) => {
                            pending.extend_from_slice(&read_buf[..n]);
                            if self.flush_pending(&mut pending).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            debug!("Channel {}: target read failed: {}", self.id, e);
                            self.target_gone().await;
                        }
                    }
                }
            }
        }
    }

    /// Send as much pending data as the window allows, chunked to the
    /// maximum frame payload. Leftover bytes wait for the next
    /// WINDOW_UPDATE.
    async fn flush_pending(&mut self, pending: &mut BytesMut) -> Result<(), ()> {
        while !pending.is_empty() {
            let chunk = self.flow.reserve_send(pending.len(), FRAME_MAX_PAYLOAD);
            if chunk == 0 {
                trace!(
                    "Channel {}: send window exhausted, {} bytes queued",
                    self.id,
                    pending.len()
                );
                break;
            }
            let data = pending.split_to(chunk).freeze();
            self.sink.send_data(self.id, &data).await?;
        }
        Ok(())
    }

    /// The target side is gone: half-close towards the server.
    async fn target_gone(&mut self) {
        if self.state == ChannelState::Relaying {
            let _ = self.sink.send_close(self.id, FRAME_FLAG_FIN).await;
            self.state = ChannelState::Closing;
        }
    }

    /// CHANNEL_CLOSE received: acknowledge and finish.
    async fn acknowledge_close(&mut self) {
        debug!("Channel {}: close received", self.id);
        let _ = self.sink.send_close_ack(self.id).await;
        self.state = ChannelState::Closed;
    }

    /// Local failure: reset the channel towards the server.
    async fn abort_with_rst(&mut self) {
        let _ = self.sink.send_close(self.id, FRAME_FLAG_RST).await;
        self.state = ChannelState::Closed;
    }
}

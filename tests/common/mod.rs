//! Test utilities for Muxsocks integration tests
//!
//! The tests play the server role: they hold the far side of a duplex
//! stream standing in for the encrypted transport, write frames the way
//! the server would, and read back what the client emits.

#![allow(dead_code)]

use muxsocks::mux::frame::FRAME_HEADER_SIZE;
use muxsocks::mux::{Frame, FrameCodec, FrameType, MuxConfig, MuxSession};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// A session under test, driven through the server end of a duplex pair
pub struct TestSession {
    /// The server side of the transport
    pub transport: DuplexStream,
    /// Sends the shutdown signal to the session
    pub shutdown_tx: broadcast::Sender<bool>,
    /// Resolves with the session's exit result
    pub handle: JoinHandle<Result<(), muxsocks::Error>>,
}

/// Spawn a session over a duplex transport with the given settings
pub fn start_session(config: MuxConfig) -> TestSession {
    let (server, client) = tokio::io::duplex(1 << 20);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let session = MuxSession::new(config);
    let handle = tokio::spawn(session.run(client, shutdown_rx));

    TestSession {
        transport: server,
        shutdown_tx,
        handle,
    }
}

/// Session settings with keepalive off, so tests only see the frames
/// they provoke
pub fn quiet_config() -> MuxConfig {
    MuxConfig {
        keepalive_interval_ms: 0,
        ..Default::default()
    }
}

/// Read one frame from the client, failing the test after 2 seconds
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Frame {
    tokio::time::timeout(Duration::from_secs(2), read_frame_raw(reader))
        .await
        .expect("timed out waiting for a frame")
}

async fn read_frame_raw<R: AsyncRead + Unpin>(reader: &mut R) -> Frame {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    reader.read_exact(&mut header).await.unwrap();
    let payload_len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload).await.unwrap();

    Frame {
        ty: header[0],
        flags: header[1],
        channel_id: u16::from_le_bytes([header[2], header[3]]),
        payload: payload.into(),
    }
}

/// Write a frame the way the server would
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    ty: FrameType,
    flags: u8,
    channel_id: u16,
    payload: &[u8],
) {
    let wire = FrameCodec::encode(ty, flags, channel_id, payload);
    writer.write_all(&wire).await.unwrap();
}

/// Create a test TCP listener on an available port
pub async fn create_test_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Drive the SOCKS5 handshake on `channel_id` up to an accepted target
/// connection; returns the accepted server end of the target socket.
pub async fn establish_relay(
    transport: &mut DuplexStream,
    listener: &TcpListener,
    port: u16,
    channel_id: u16,
) -> TcpStream {
    write_frame(transport, FrameType::ChannelOpen, 0, channel_id, &[]).await;
    let frame = read_frame(transport).await;
    assert_eq!(frame.frame_type(), Some(FrameType::ChannelOpenAck));
    assert_eq!(frame.channel_id, channel_id);

    write_frame(
        transport,
        FrameType::ChannelRequest,
        0,
        channel_id,
        &socks5::method_request_no_auth(),
    )
    .await;
    let frame = read_frame(transport).await;
    assert_eq!(frame.frame_type(), Some(FrameType::ChannelRequestAck));
    assert_eq!(frame.payload.as_ref(), &[0x05, 0x00]);

    write_frame(
        transport,
        FrameType::ChannelRequest,
        0,
        channel_id,
        &socks5::connect_ipv4([127, 0, 0, 1], port),
    )
    .await;

    let (target, _) = listener.accept().await.unwrap();

    let frame = read_frame(transport).await;
    assert_eq!(frame.frame_type(), Some(FrameType::ChannelRequestAck));
    assert_eq!(
        frame.payload.as_ref(),
        &[0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0]
    );

    target
}

/// SOCKS5 handshake byte builders
pub mod socks5 {
    /// Method selection offering only NO_AUTH
    pub fn method_request_no_auth() -> Vec<u8> {
        vec![0x05, 0x01, 0x00]
    }

    /// Method selection offering GSSAPI and username/password only
    pub fn method_request_without_no_auth() -> Vec<u8> {
        vec![0x05, 0x02, 0x01, 0x02]
    }

    /// CONNECT to an IPv4 address
    pub fn connect_ipv4(ip: [u8; 4], port: u16) -> Vec<u8> {
        let mut cmd = vec![0x05, 0x01, 0x00, 0x01];
        cmd.extend_from_slice(&ip);
        cmd.extend_from_slice(&port.to_be_bytes());
        cmd
    }

    /// CONNECT to a domain
    pub fn connect_domain(domain: &str, port: u16) -> Vec<u8> {
        let mut cmd = vec![0x05, 0x01, 0x00, 0x03, domain.len() as u8];
        cmd.extend_from_slice(domain.as_bytes());
        cmd.extend_from_slice(&port.to_be_bytes());
        cmd
    }
}

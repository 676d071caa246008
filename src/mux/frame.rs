//! Framing codec for the multiplexing protocol
//!
//! Every frame on the wire is a fixed 8-byte little-endian header
//! followed by a payload:
//!
//! ```text
//! +------+-------+------------+----------------+=============+
//! | type | flags | channel_id | payload_length |   payload   |
//! |  1   |   1   |     2      |       4        |  variable   |
//! +------+-------+------------+----------------+=============+
//! ```
//!
//! `channel_id` 0 is reserved for session-global frames (PING/PONG).

use crate::error::Error;
use bytes::{BufMut, Bytes, BytesMut};

/// Size of the fixed frame header in bytes
pub const FRAME_HEADER_SIZE: usize = 8;

/// Maximum payload length per frame
pub const FRAME_MAX_PAYLOAD: usize = 65536;

/// Graceful half-close flag in CHANNEL_CLOSE frames
pub const FRAME_FLAG_FIN: u8 = 0x01;

/// Abortive close flag in CHANNEL_CLOSE frames
pub const FRAME_FLAG_RST: u8 = 0x02;

/// Multiplexing frame types
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// Server opens a new logical channel
    ChannelOpen = 0x01,
    /// Client acknowledges a channel open
    ChannelOpenAck = 0x02,
    /// SOCKS5 handshake bytes from the server
    ChannelRequest = 0x03,
    /// SOCKS5 handshake reply from the client
    ChannelRequestAck = 0x04,
    /// Relay payload for an established channel
    Data = 0x05,
    /// Close a channel (flags carry FIN/RST)
    ChannelClose = 0x06,
    /// Acknowledge a channel close
    ChannelCloseAck = 0x07,
    /// Session-level keepalive probe
    Ping = 0x08,
    /// Keepalive answer
    Pong = 0x09,
    /// Flow-control credit: payload is a 4-byte little-endian increment
    WindowUpdate = 0x0A,
}

impl FrameType {
    /// Decode a wire byte; unknown values return `None` so the
    /// dispatcher can log and drop them without killing the session.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x01 => Some(Self::ChannelOpen),
            0x02 => Some(Self::ChannelOpenAck),
            0x03 => Some(Self::ChannelRequest),
            0x04 => Some(Self::ChannelRequestAck),
            0x05 => Some(Self::Data),
            0x06 => Some(Self::ChannelClose),
            0x07 => Some(Self::ChannelCloseAck),
            0x08 => Some(Self::Ping),
            0x09 => Some(Self::Pong),
            0x0A => Some(Self::WindowUpdate),
            _ => None,
        }
    }
}

/// A decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw type byte from the wire
    pub ty: u8,
    /// FIN/RST flags
    pub flags: u8,
    /// Channel the frame addresses; 0 for session-global frames
    pub channel_id: u16,
    /// Frame payload
    pub payload: Bytes,
}

impl Frame {
    /// The decoded frame type, or `None` for unknown type bytes
    pub fn frame_type(&self) -> Option<FrameType> {
        FrameType::from_u8(self.ty)
    }

    /// Whether the FIN flag is set
    pub fn is_fin(&self) -> bool {
        self.flags & FRAME_FLAG_FIN != 0
    }

    /// Whether the RST flag is set
    pub fn is_rst(&self) -> bool {
        self.flags & FRAME_FLAG_RST != 0
    }
}

/// Accumulates transport bytes and emits complete frames
///
/// Partial frames never block; they stay buffered until the remainder
/// arrives. A declared payload length above [`FRAME_MAX_PAYLOAD`] is a
/// fatal protocol error: the internal state is discarded and the caller
/// must terminate the session.
#[derive(Debug, Default)]
pub struct FrameCodec {
    buf: BytesMut,
}

impl FrameCodec {
    /// Create an empty codec
    pub fn new() -> Self {
        FrameCodec {
            buf: BytesMut::with_capacity(FRAME_HEADER_SIZE + FRAME_MAX_PAYLOAD),
        }
    }

    /// Feed raw transport bytes; returns the frames completed by this
    /// call, in receipt order.
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<Frame>, Error> {
        self.buf.extend_from_slice(data);

        let mut frames = Vec::new();
        while self.buf.len() >= FRAME_HEADER_SIZE {
            let payload_len =
                u32::from_le_bytes([self.buf[4], self.buf[5], self.buf[6], self.buf[7]]) as usize;

            if payload_len > FRAME_MAX_PAYLOAD {
                self.buf.clear();
                return Err(Error::Protocol(format!(
                    "frame payload too large: {} bytes",
                    payload_len
                )));
            }

            let total = FRAME_HEADER_SIZE + payload_len;
            if self.buf.len() < total {
                break;
            }

            let header = self.buf.split_to(FRAME_HEADER_SIZE);
            let payload = self.buf.split_to(payload_len).freeze();

            frames.push(Frame {
                ty: header[0],
                flags: header[1],
                channel_id: u16::from_le_bytes([header[2], header[3]]),
                payload,
            });
        }

        Ok(frames)
    }

    /// Encode a frame into wire bytes
    pub fn encode(ty: FrameType, flags: u8, channel_id: u16, payload: &[u8]) -> Bytes {
        debug_assert!(payload.len() <= FRAME_MAX_PAYLOAD);

        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());
        buf.put_u8(ty as u8);
        buf.put_u8(flags);
        buf.put_u16_le(channel_id);
        buf.put_u32_le(payload.len() as u32);
        buf.extend_from_slice(payload);
        buf.freeze()
    }

    /// Build a CHANNEL_OPEN_ACK frame
    pub fn open_ack(channel_id: u16) -> Bytes {
        Self::encode(FrameType::ChannelOpenAck, 0, channel_id, &[])
    }

    /// Build a CHANNEL_REQUEST_ACK frame carrying a SOCKS5 reply
    pub fn request_ack(channel_id: u16, payload: &[u8]) -> Bytes {
        Self::encode(FrameType::ChannelRequestAck, 0, channel_id, payload)
    }

    /// Build a DATA frame
    pub fn data(channel_id: u16, payload: &[u8]) -> Bytes {
        Self::encode(FrameType::Data, 0, channel_id, payload)
    }

    /// Build a CHANNEL_CLOSE frame
    pub fn close(channel_id: u16, flags: u8) -> Bytes {
        Self::encode(FrameType::ChannelClose, flags, channel_id, &[])
    }

    /// Build a CHANNEL_CLOSE_ACK frame
    pub fn close_ack(channel_id: u16) -> Bytes {
        Self::encode(FrameType::ChannelCloseAck, 0, channel_id, &[])
    }

    /// Build a PING frame (session-global, channel 0)
    pub fn ping() -> Bytes {
        Self::encode(FrameType::Ping, 0, 0, &[])
    }

    /// Build a PONG frame (session-global, channel 0)
    pub fn pong() -> Bytes {
        Self::encode(FrameType::Pong, 0, 0, &[])
    }

    /// Build a WINDOW_UPDATE frame with a little-endian increment
    pub fn window_update(channel_id: u16, increment: u32) -> Bytes {
        Self::encode(
            FrameType::WindowUpdate,
            0,
            channel_id,
            &increment.to_le_bytes(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(ty: FrameType, flags: u8, channel_id: u16, payload: &[u8]) -> Frame {
        let wire = FrameCodec::encode(ty, flags, channel_id, payload);
        let mut codec = FrameCodec::new();
        let mut frames = codec.feed(&wire).unwrap();
        assert_eq!(frames.len(), 1);
        frames.pop().unwrap()
    }

    #[test]
    fn test_roundtrip() {
        let frame = roundtrip(FrameType::Data, 0, 42, b"hello world");
        assert_eq!(frame.frame_type(), Some(FrameType::Data));
        assert_eq!(frame.channel_id, 42);
        assert_eq!(frame.payload.as_ref(), b"hello world");
    }

    #[test]
    fn test_roundtrip_empty_payload() {
        let frame = roundtrip(FrameType::ChannelOpenAck, 0, 7, &[]);
        assert_eq!(frame.frame_type(), Some(FrameType::ChannelOpenAck));
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_roundtrip_max_payload() {
        let payload = vec![0xAB; FRAME_MAX_PAYLOAD];
        let frame = roundtrip(FrameType::Data, 0, 1, &payload);
        assert_eq!(frame.payload.len(), FRAME_MAX_PAYLOAD);
    }

    #[test]
    fn test_header_layout_is_little_endian() {
        let wire = FrameCodec::encode(FrameType::Data, FRAME_FLAG_FIN, 0x0102, b"ab");
        assert_eq!(wire[0], 0x05); // type
        assert_eq!(wire[1], 0x01); // flags
        assert_eq!(&wire[2..4], &[0x02, 0x01]); // channel_id LE
        assert_eq!(&wire[4..8], &[0x02, 0x00, 0x00, 0x00]); // length LE
        assert_eq!(&wire[8..], b"ab");
    }

    #[test]
    fn test_feed_byte_by_byte() {
        let wire = FrameCodec::encode(FrameType::ChannelRequest, 0, 9, b"\x05\x01\x00");
        let mut codec = FrameCodec::new();

        let mut collected = Vec::new();
        for byte in wire.iter() {
            collected.extend(codec.feed(&[*byte]).unwrap());
        }

        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].channel_id, 9);
        assert_eq!(collected[0].payload.as_ref(), b"\x05\x01\x00");
    }

    #[test]
    fn test_feed_multiple_frames_at_once() {
        let mut wire = BytesMut::new();
        wire.extend_from_slice(&FrameCodec::open_ack(1));
        wire.extend_from_slice(&FrameCodec::data(2, b"xyz"));
        wire.extend_from_slice(&FrameCodec::ping());

        let mut codec = FrameCodec::new();
        let frames = codec.feed(&wire).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].frame_type(), Some(FrameType::ChannelOpenAck));
        assert_eq!(frames[1].frame_type(), Some(FrameType::Data));
        assert_eq!(frames[1].payload.as_ref(), b"xyz");
        assert_eq!(frames[2].frame_type(), Some(FrameType::Ping));
        assert_eq!(frames[2].channel_id, 0);
    }

    #[test]
    fn test_feed_arbitrary_partition_preserves_order() {
        let mut wire = Vec::new();
        for i in 0..5u16 {
            wire.extend_from_slice(&FrameCodec::data(i, format!("payload-{}", i).as_bytes()));
        }

        // Split at awkward boundaries
        let mut codec = FrameCodec::new();
        let mut frames = Vec::new();
        for chunk in wire.chunks(7) {
            frames.extend(codec.feed(chunk).unwrap());
        }

        assert_eq!(frames.len(), 5);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.channel_id, i as u16);
            assert_eq!(frame.payload.as_ref(), format!("payload-{}", i).as_bytes());
        }
    }

    #[test]
    fn test_oversized_payload_is_fatal() {
        let mut wire = BytesMut::new();
        wire.put_u8(FrameType::Data as u8);
        wire.put_u8(0);
        wire.put_u16_le(1);
        wire.put_u32_le(FRAME_MAX_PAYLOAD as u32 + 1);

        let mut codec = FrameCodec::new();
        let result = codec.feed(&wire);
        assert!(matches!(result, Err(Error::Protocol(_))));

        // State is discarded: a subsequent valid frame decodes cleanly
        let frames = codec.feed(&FrameCodec::ping()).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame_type(), Some(FrameType::Ping));
    }

    #[test]
    fn test_unknown_type_survives_decode() {
        let wire = FrameCodec::encode(FrameType::Data, 0, 3, b"x");
        let mut raw = wire.to_vec();
        raw[0] = 0x7F;

        let mut codec = FrameCodec::new();
        let frames = codec.feed(&raw).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].ty, 0x7F);
        assert!(frames[0].frame_type().is_none());
    }

    #[test]
    fn test_flags_accessors() {
        let wire = FrameCodec::close(5, FRAME_FLAG_RST);
        let mut codec = FrameCodec::new();
        let frames = codec.feed(&wire).unwrap();
        assert!(frames[0].is_rst());
        assert!(!frames[0].is_fin());

        let wire = FrameCodec::close(5, FRAME_FLAG_FIN);
        let frames = codec.feed(&wire).unwrap();
        assert!(frames[0].is_fin());
        assert!(!frames[0].is_rst());
    }

    #[test]
    fn test_window_update_payload_little_endian() {
        let wire = FrameCodec::window_update(3, 0x01020304);
        let mut codec = FrameCodec::new();
        let frames = codec.feed(&wire).unwrap();
        assert_eq!(frames[0].payload.as_ref(), &[0x04, 0x03, 0x02, 0x01]);
    }
}

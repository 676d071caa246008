//! SOCKS5 reply builders
//!
//! Replies are fixed-format acknowledgements; the bind address reported
//! to the server side is always 0.0.0.0:0.

use super::consts::*;
use crate::error::ReplyCode;
use bytes::{BufMut, Bytes, BytesMut};

/// Build the method selection response (VER + METHOD)
pub fn build_method_response(method: u8) -> Bytes {
    Bytes::from(vec![SOCKS5_VERSION, method])
}

/// Build a CONNECT reply with an all-zero IPv4 bind address
pub fn build_connect_reply(reply_code: ReplyCode) -> Bytes {
    let mut buf = BytesMut::with_capacity(10);
    buf.put_u8(SOCKS5_VERSION);
    buf.put_u8(reply_code.into());
    buf.put_u8(SOCKS5_RESERVED);
    buf.put_u8(SOCKS5_ADDR_TYPE_IPV4);
    buf.put_slice(&[0, 0, 0, 0]); // BND.ADDR
    buf.put_u16(0); // BND.PORT, big-endian
    buf.freeze()
}

//! Incremental SOCKS5 request parsers
//!
//! Both parsers are pure functions over byte slices. They return
//! `Ok(None)` when more bytes are needed, `Ok(Some((consumed, value)))`
//! on success, and `Err` on malformed input. Callers keep their own
//! accumulation buffer and erase consumed bytes.

use super::addr::{ConnectRequest, TargetAddr};
use super::consts::*;
use crate::error::Socks5Error;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Parse result: `None` means the input is a proper prefix of a valid
/// message and more bytes are needed.
pub type ParseResult<T> = Result<Option<(usize, T)>, Socks5Error>;

/// Parse the method selection message (VER + NMETHODS + METHODS)
///
/// The boolean result is whether NO_AUTH (`0x00`) was offered.
pub fn parse_method_request(data: &[u8]) -> ParseResult<bool> {
    if data.len() < 2 {
        return Ok(None);
    }

    if data[0] != SOCKS5_VERSION {
        return Err(Socks5Error::UnsupportedVersion(data[0]));
    }

    let nmethods = data[1] as usize;
    let total = 2 + nmethods;
    if data.len() < total {
        return Ok(None);
    }

    let offers_no_auth = data[2..total].contains(&SOCKS5_AUTH_METHOD_NONE);
    Ok(Some((total, offers_no_auth)))
}

/// Parse the request message (VER + CMD + RSV + ATYP + DST.ADDR + DST.PORT)
///
/// A command other than CONNECT still consumes its bytes; the caller
/// inspects [`ConnectRequest::is_connect`] and replies accordingly.
pub fn parse_connect_request(data: &[u8]) -> ParseResult<ConnectRequest> {
    if data.len() < 4 {
        return Ok(None);
    }

    if data[0] != SOCKS5_VERSION {
        return Err(Socks5Error::UnsupportedVersion(data[0]));
    }

    let command = data[1];
    let atyp = data[3];

    let addr_start = 4;
    let addr_len = match atyp {
        SOCKS5_ADDR_TYPE_IPV4 => 4,
        SOCKS5_ADDR_TYPE_DOMAIN => {
            if data.len() < 5 {
                return Ok(None);
            }
            let domain_len = data[4] as usize;
            if domain_len == 0 {
                return Err(Socks5Error::Malformed("empty domain name"));
            }
            1 + domain_len
        }
        SOCKS5_ADDR_TYPE_IPV6 => 16,
        _ => return Err(Socks5Error::AddressTypeNotSupported(atyp)),
    };

    let total = addr_start + addr_len + 2;
    if data.len() < total {
        return Ok(None);
    }

    let addr = match atyp {
        SOCKS5_ADDR_TYPE_IPV4 => {
            let mut octets = [0u8; 4];
            octets.copy_from_slice(&data[addr_start..addr_start + 4]);
            TargetAddr::Ipv4(Ipv4Addr::from(octets))
        }
        SOCKS5_ADDR_TYPE_DOMAIN => {
            let domain_len = data[addr_start] as usize;
            let raw = &data[addr_start + 1..addr_start + 1 + domain_len];
            let domain = std::str::from_utf8(raw)
                .map_err(|_| Socks5Error::Malformed("domain is not valid UTF-8"))?;
            TargetAddr::Domain(domain.to_string())
        }
        _ => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&data[addr_start..addr_start + 16]);
            TargetAddr::Ipv6(Ipv6Addr::from(octets))
        }
    };

    // Port is big-endian per RFC 1928
    let port = u16::from_be_bytes([data[total - 2], data[total - 1]]);

    Ok(Some((total, ConnectRequest { command, addr, port })))
}

//! Target address types for SOCKS5 CONNECT requests

use super::consts::*;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Destination address from a CONNECT request
///
/// Address bytes are preserved for the IP variants; domains stay
/// unresolved until the outbound connect performs the lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetAddr {
    /// IPv4 address
    Ipv4(Ipv4Addr),
    /// IPv6 address
    Ipv6(Ipv6Addr),
    /// Domain name, resolved at connect time
    Domain(String),
}

impl TargetAddr {
    /// Host string suitable for logging and DNS lookup
    pub fn host(&self) -> String {
        match self {
            TargetAddr::Ipv4(ip) => ip.to_string(),
            TargetAddr::Ipv6(ip) => ip.to_string(),
            TargetAddr::Domain(domain) => domain.clone(),
        }
    }

    /// The SOCKS5 address-type byte for this address
    pub fn atyp(&self) -> u8 {
        match self {
            TargetAddr::Ipv4(_) => SOCKS5_ADDR_TYPE_IPV4,
            TargetAddr::Ipv6(_) => SOCKS5_ADDR_TYPE_IPV6,
            TargetAddr::Domain(_) => SOCKS5_ADDR_TYPE_DOMAIN,
        }
    }
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetAddr::Ipv4(ip) => write!(f, "{}", ip),
            TargetAddr::Ipv6(ip) => write!(f, "[{}]", ip),
            TargetAddr::Domain(domain) => write!(f, "{}", domain),
        }
    }
}

/// Parsed SOCKS5 CONNECT request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Command byte; anything other than CONNECT is reported, not served
    pub command: u8,
    /// Destination address
    pub addr: TargetAddr,
    /// Destination port
    pub port: u16,
}

impl ConnectRequest {
    /// Whether the request carries the CONNECT command
    pub fn is_connect(&self) -> bool {
        self.command == SOCKS5_CMD_TCP_CONNECT
    }
}

impl fmt::Display for ConnectRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

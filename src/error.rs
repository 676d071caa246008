//! Error types for Muxsocks
//!
//! This module defines all custom error types used throughout the
//! application, plus the mapping from outbound-connect failures to
//! SOCKS5 reply codes.

use std::io;
use thiserror::Error;

/// Main error type for Muxsocks operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Framing protocol error; fatal to the session
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Transport-level error (connect, handshake, socket options)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The transport dropped while the session was running
    #[error("Transport disconnected: {0}")]
    TransportDisconnected(String),

    /// SOCKS5 protocol error
    #[error("SOCKS5 error: {0}")]
    Socks5(#[from] Socks5Error),

    /// The channel is gone or never existed
    #[error("Channel {0} closed")]
    ChannelClosed(u16),

    /// Shutdown was requested
    #[error("Shutdown requested")]
    Shutdown,
}

/// SOCKS5 specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Socks5Error {
    /// Unsupported SOCKS version
    #[error("Unsupported SOCKS version: {0}")]
    UnsupportedVersion(u8),

    /// No acceptable authentication method
    #[error("No acceptable authentication method")]
    NoAcceptableMethod,

    /// Command not supported
    #[error("Command not supported: {0}")]
    CommandNotSupported(u8),

    /// Address type not supported
    #[error("Address type not supported: {0}")]
    AddressTypeNotSupported(u8),

    /// Malformed request bytes
    #[error("Malformed request: {0}")]
    Malformed(&'static str),
}

/// Failure kinds for an outbound target connection
///
/// These are the conditions a SOCKS5 reply can express; everything else
/// collapses into `Socket`.
#[derive(Error, Debug)]
pub enum ConnectError {
    /// Name resolution failed
    #[error("DNS resolution failed: {0}")]
    DnsResolutionFailed(String),

    /// The target actively refused the connection
    #[error("Connection refused")]
    ConnectionRefused,

    /// The connection attempt timed out
    #[error("Connection timed out")]
    ConnectionTimeout,

    /// The target host is unreachable
    #[error("Host unreachable")]
    HostUnreachable,

    /// The target network is unreachable
    #[error("Network unreachable")]
    NetworkUnreachable,

    /// The peer reset the connection
    #[error("Connection reset")]
    ConnectionReset,

    /// Any other socket-level failure
    #[error("Socket error: {0}")]
    Socket(io::Error),
}

impl From<io::Error> for ConnectError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => ConnectError::ConnectionRefused,
            io::ErrorKind::ConnectionReset => ConnectError::ConnectionReset,
            io::ErrorKind::TimedOut => ConnectError::ConnectionTimeout,
            io::ErrorKind::HostUnreachable => ConnectError::HostUnreachable,
            io::ErrorKind::NetworkUnreachable => ConnectError::NetworkUnreachable,
            _ => ConnectError::Socket(err),
        }
    }
}

/// Reply codes for SOCKS5 protocol (RFC 1928)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReplyCode {
    /// Command succeeded
    Succeeded = 0x00,
    /// General SOCKS server failure
    GeneralFailure = 0x01,
    /// Connection not allowed by ruleset
    ConnectionNotAllowed = 0x02,
    /// Network unreachable
    NetworkUnreachable = 0x03,
    /// Host unreachable
    HostUnreachable = 0x04,
    /// Connection refused
    ConnectionRefused = 0x05,
    /// TTL expired
    TtlExpired = 0x06,
    /// Command not supported
    CommandNotSupported = 0x07,
    /// Address type not supported
    AddressTypeNotSupported = 0x08,
}

impl From<ReplyCode> for u8 {
    fn from(code: ReplyCode) -> Self {
        code as u8
    }
}

impl From<&ConnectError> for ReplyCode {
    fn from(err: &ConnectError) -> Self {
        match err {
            ConnectError::ConnectionRefused => ReplyCode::ConnectionRefused,
            ConnectError::HostUnreachable => ReplyCode::HostUnreachable,
            ConnectError::NetworkUnreachable => ReplyCode::NetworkUnreachable,
            // Timeouts are reported as TTL expired, per common practice
            ConnectError::ConnectionTimeout => ReplyCode::TtlExpired,
            _ => ReplyCode::GeneralFailure,
        }
    }
}

impl From<&Socks5Error> for ReplyCode {
    fn from(err: &Socks5Error) -> Self {
        match err {
            Socks5Error::CommandNotSupported(_) => ReplyCode::CommandNotSupported,
            Socks5Error::AddressTypeNotSupported(_) => ReplyCode::AddressTypeNotSupported,
            _ => ReplyCode::GeneralFailure,
        }
    }
}

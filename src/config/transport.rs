//! Transport configuration types
//!
//! Defines configuration for the transport protocols (TCP, TLS).

use serde::{Deserialize, Serialize};

/// Transport type enumeration
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportType {
    /// Plain TCP transport
    #[default]
    #[serde(rename = "tcp")]
    Tcp,
    /// TLS encrypted transport
    #[serde(rename = "tls")]
    Tls,
}

/// Main transport configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TransportConfig {
    /// Transport type
    #[serde(rename = "type", default)]
    pub transport_type: TransportType,

    /// TCP configuration
    #[serde(default)]
    pub tcp: TcpConfig,

    /// TLS configuration (optional)
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

/// Default keepalive seconds
fn default_keepalive_secs() -> u64 {
    20
}

/// Default keepalive interval
fn default_keepalive_interval() -> u64 {
    8
}

/// TCP transport configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TcpConfig {
    /// Enable TCP_NODELAY
    #[serde(default)]
    pub nodelay: bool,

    /// TCP keepalive timeout in seconds
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    /// TCP keepalive interval in seconds
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        TcpConfig {
            nodelay: true,
            keepalive_secs: default_keepalive_secs(),
            keepalive_interval: default_keepalive_interval(),
        }
    }
}

/// TLS transport configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TlsConfig {
    /// Server hostname for verification
    pub hostname: Option<String>,

    /// Path to trusted root certificate
    pub trusted_root: Option<String>,

    /// Skip certificate verification (dangerous!)
    #[serde(default)]
    pub skip_verify: bool,
}

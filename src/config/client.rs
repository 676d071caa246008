//! Client configuration types
//!
//! Defines the main configuration structures for the Muxsocks client.

use super::TransportConfig;
use serde::{Deserialize, Serialize};

/// Default per-channel flow-control window in bytes (256 KiB)
fn default_channel_window_size() -> u32 {
    262144
}

/// Default keepalive interval in milliseconds
fn default_keepalive_interval_ms() -> u64 {
    30000
}

/// Default initial reconnect delay in milliseconds
fn default_reconnect_delay_initial_ms() -> u64 {
    1000
}

/// Default maximum reconnect delay in milliseconds
fn default_reconnect_delay_max_ms() -> u64 {
    60000
}

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Client configuration
    pub client: ClientConfig,
}

/// Client configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClientConfig {
    /// Remote server address (e.g., "server.example.com:8443")
    pub remote_addr: String,

    /// Initial send/recv flow-control window per channel, in bytes
    #[serde(default = "default_channel_window_size")]
    pub channel_window_size: u32,

    /// Period of session-level PING frames in milliseconds; 0 disables
    #[serde(default = "default_keepalive_interval_ms")]
    pub keepalive_interval_ms: u64,

    /// Number of I/O worker threads; 0 means one per CPU
    #[serde(default)]
    pub io_threads: usize,

    /// Delay before the first reconnect attempt, in milliseconds
    #[serde(default = "default_reconnect_delay_initial_ms")]
    pub reconnect_delay_initial_ms: u64,

    /// Upper bound on the reconnect delay, in milliseconds
    #[serde(default = "default_reconnect_delay_max_ms")]
    pub reconnect_delay_max_ms: u64,

    /// Transport configuration
    #[serde(default)]
    pub transport: TransportConfig,
}

impl ClientConfig {
    /// Session-level settings consumed by the multiplexing session
    pub fn mux_config(&self) -> crate::mux::MuxConfig {
        crate::mux::MuxConfig {
            channel_window_size: self.channel_window_size,
            keepalive_interval_ms: self.keepalive_interval_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> ClientConfig {
        ClientConfig {
            remote_addr: "127.0.0.1:8443".to_string(),
            channel_window_size: default_channel_window_size(),
            keepalive_interval_ms: default_keepalive_interval_ms(),
            io_threads: 0,
            reconnect_delay_initial_ms: default_reconnect_delay_initial_ms(),
            reconnect_delay_max_ms: default_reconnect_delay_max_ms(),
            transport: TransportConfig::default(),
        }
    }

    #[test]
    fn test_defaults() {
        let config = minimal();
        assert_eq!(config.channel_window_size, 256 * 1024);
        assert_eq!(config.keepalive_interval_ms, 30000);
        assert_eq!(config.reconnect_delay_initial_ms, 1000);
        assert_eq!(config.reconnect_delay_max_ms, 60000);
    }

    #[test]
    fn test_mux_config() {
        let mut config = minimal();
        config.channel_window_size = 1024;
        config.keepalive_interval_ms = 50;

        let mux = config.mux_config();
        assert_eq!(mux.channel_window_size, 1024);
        assert_eq!(mux.keepalive_interval_ms, 50);
    }
}

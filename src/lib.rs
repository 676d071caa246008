//! # Muxsocks - Reverse SOCKS5 Proxy Client
//!
//! Muxsocks is a long-running client that keeps a single encrypted
//! connection to a remote server and multiplexes many independent TCP
//! proxy sessions over it. The server opens logical channels; on each
//! channel the client runs a SOCKS5 handshake, dials the requested
//! target from its own network, and relays bytes in both directions.
//!
//! ## Features
//!
//! - **Reverse SOCKS5**: requests flow from the server to the client;
//!   outbound connections originate on the client's network
//! - **Single Connection**: up to 65536 concurrent channels share one
//!   transport, each with its own flow-control window
//! - **Pluggable Transport**: plain TCP for lab use, rustls-based TLS
//!   for production
//! - **Automatic Reconnect**: exponential backoff supervision around
//!   the multiplexing session
//!
//! ## Usage
//!
//! ```rust,ignore
//! use muxsocks::config::load_config;
//! use muxsocks::client::run_client;
//! use tokio::sync::broadcast;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("config.toml")?;
//!     let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
//!
//!     run_client(config, shutdown_rx).await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! SOCKS5 Client -> Server -> [one framed transport] -> Muxsocks -> Target
//! ```
//!
//! The session dispatcher is the single reader of the transport. Each
//! decoded frame is routed to the channel it addresses; each channel is
//! a task that drives its own SOCKS5 state machine and owns its own
//! outbound TCP connection.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod client;
pub mod config;
pub mod error;
pub mod helper;
pub mod mux;
pub mod socks;
pub mod target;
pub mod transport;

// Re-export commonly used items
pub use client::run_client;
pub use config::{load_config, Config};
pub use error::{Error, Socks5Error};

/// Version of the Muxsocks library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "muxsocks");
    }
}

//! TCP transport implementation
//!
//! Plain, unencrypted connections; intended for tests and lab setups
//! where the network path is already trusted.

use super::{AddrMaybeCached, SocketOpts, Transport};
use crate::config::TransportConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::net::TcpStream;

/// TCP transport for plain connections
#[derive(Debug, Clone)]
pub struct TcpTransport {
    socket_opts: SocketOpts,
}

#[async_trait]
impl Transport for TcpTransport {
    type Stream = TcpStream;

    fn new(config: &TransportConfig) -> Result<Self> {
        Ok(TcpTransport {
            socket_opts: SocketOpts::from_tcp_config(&config.tcp),
        })
    }

    async fn connect(&self, addr: &AddrMaybeCached) -> Result<Self::Stream> {
        let resolved = addr.resolve().await?;

        let stream = TcpStream::connect(resolved)
            .await
            .with_context(|| format!("Failed to connect to {}", addr.addr()))?;

        self.socket_opts.apply(&stream)?;

        tracing::debug!("TCP connection established to {}", resolved);

        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_transport_new_from_config() {
        let config = TransportConfig::default();
        let transport = TcpTransport::new(&config).unwrap();
        assert!(transport.socket_opts.nodelay);
    }

    #[tokio::test]
    async fn test_tcp_transport_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport = TcpTransport::new(&TransportConfig::default()).unwrap();
        let addr = AddrMaybeCached::new(&format!("127.0.0.1:{}", port));
        assert!(transport.connect(&addr).await.is_err());
    }

    #[tokio::test]
    async fn test_tcp_transport_connect_success() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let transport = TcpTransport::new(&TransportConfig::default()).unwrap();
        let addr = AddrMaybeCached::new(&format!("127.0.0.1:{}", port));
        let stream = transport.connect(&addr).await.unwrap();
        assert!(stream.peer_addr().is_ok());
    }
}

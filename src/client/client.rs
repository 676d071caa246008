//! Main client structure
//!
//! Manages the client lifecycle: one multiplexing session per transport
//! connection, restarted with exponential backoff until shutdown.

use crate::config::{ClientConfig, Config, TransportType};
use crate::helper::Backoff;
use crate::mux::MuxSession;
use crate::transport::{AddrMaybeCached, TcpTransport, TlsTransport, Transport};
use anyhow::Result;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Run the client with the transport selected by configuration
pub async fn run_client(config: Config, shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
    match config.client.transport.transport_type {
        TransportType::Tcp => {
            Client::<TcpTransport>::new(config.client)?
                .run(shutdown_rx)
                .await
        }
        TransportType::Tls => {
            Client::<TlsTransport>::new(config.client)?
                .run(shutdown_rx)
                .await
        }
    }
}

/// Main Muxsocks client
pub struct Client<T: Transport> {
    config: ClientConfig,
    transport: T,
}

impl<T: Transport> Client<T> {
    /// Create a new client with the given configuration
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = T::new(&config.transport)?;
        Ok(Client { config, transport })
    }

    /// Run the client until shutdown
    ///
    /// Each transport connection hosts one multiplexing session. When
    /// the session ends with an error the client reconnects after an
    /// exponentially growing delay; a successful connect resets the
    /// delay.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
        info!("Starting Muxsocks client");
        info!("Remote server: {}", self.config.remote_addr);

        let remote_addr = AddrMaybeCached::new(&self.config.remote_addr);
        let mut backoff = Backoff::new(
            Duration::from_millis(self.config.reconnect_delay_initial_ms),
            Duration::from_millis(self.config.reconnect_delay_max_ms),
        );

        loop {
            info!("Connecting to server: {}", self.config.remote_addr);

            match self.transport.connect(&remote_addr).await {
                Ok(stream) => {
                    info!("Connected to {}", self.config.remote_addr);
                    backoff.reset();

                    let session = MuxSession::new(self.config.mux_config());
                    match session.run(stream, shutdown_rx.resubscribe()).await {
                        Ok(()) => {
                            info!("Client stopped");
                            return Ok(());
                        }
                        Err(e) => warn!("Session ended: {:#}", e),
                    }
                }
                Err(e) => {
                    warn!("Failed to connect: {:#}", e);
                    // The server may have moved; resolve again next time
                    remote_addr.clear_cache().await;
                }
            }

            // Shutdown requested while the session was down
            if shutdown_rx.try_recv().is_ok() {
                info!("Client stopped");
                return Ok(());
            }

            let delay = backoff.next_delay();
            info!("Reconnecting in {:?}...", delay);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping client");
                    return Ok(());
                }
            }
        }
    }

    /// Get a reference to the configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportConfig;

    fn create_test_config() -> ClientConfig {
        ClientConfig {
            remote_addr: "127.0.0.1:8443".to_string(),
            channel_window_size: 262144,
            keepalive_interval_ms: 30000,
            io_threads: 0,
            reconnect_delay_initial_ms: 1000,
            reconnect_delay_max_ms: 60000,
            transport: TransportConfig::default(),
        }
    }

    #[test]
    fn test_client_new_tcp() {
        let client = Client::<TcpTransport>::new(create_test_config()).unwrap();
        assert_eq!(client.config().remote_addr, "127.0.0.1:8443");
    }

    #[test]
    fn test_client_new_tls_requires_config() {
        // TLS transport without a [client.transport.tls] section fails
        assert!(Client::<TlsTransport>::new(create_test_config()).is_err());
    }

    #[tokio::test]
    async fn test_run_client_stops_on_shutdown() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut config = create_test_config();
        config.remote_addr = addr.to_string();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(run_client(Config { client: config }, shutdown_rx));

        // Let the client connect, then ask it to stop
        let (_server_side, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("client did not stop")
            .unwrap();
        assert!(result.is_ok());
    }
}

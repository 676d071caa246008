//! Server address resolution with caching
//!
//! The reconnect loop resolves the server address on every attempt;
//! caching the first successful resolution avoids hammering DNS during
//! backoff storms.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Address string with an optionally cached resolution
#[derive(Debug, Clone)]
pub struct AddrMaybeCached {
    addr: String,
    cached: Arc<RwLock<Option<SocketAddr>>>,
}

impl AddrMaybeCached {
    /// Create a new address without cached resolution
    pub fn new(addr: &str) -> Self {
        AddrMaybeCached {
            addr: addr.to_string(),
            cached: Arc::new(RwLock::new(None)),
        }
    }

    /// Get the original address string
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Drop the cached resolution, forcing a fresh lookup next time
    pub async fn clear_cache(&self) {
        *self.cached.write().await = None;
    }

    /// Resolve the address, using the cache if available
    pub async fn resolve(&self) -> Result<SocketAddr> {
        if let Some(cached) = *self.cached.read().await {
            return Ok(cached);
        }

        let resolved = tokio::net::lookup_host(&self.addr)
            .await
            .with_context(|| format!("Failed to resolve address: {}", self.addr))?
            .next()
            .with_context(|| format!("No addresses found for: {}", self.addr))?;

        *self.cached.write().await = Some(resolved);
        Ok(resolved)
    }
}

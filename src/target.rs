//! Outbound TCP connections to proxy targets
//!
//! Name resolution happens here so its failure is distinguishable from
//! per-address connect failures; the resulting reply code differs.

use crate::error::ConnectError;
use crate::socks::TargetAddr;
use std::net::SocketAddr;
use tokio::net::{lookup_host, TcpStream};
use tracing::{debug, trace};

/// Establish an outbound TCP connection to the requested target
///
/// Domains are resolved with the system resolver; each candidate
/// address is tried in order and the last error wins. `TCP_NODELAY` is
/// enabled on the connected socket.
pub async fn connect(addr: &TargetAddr, port: u16) -> Result<TcpStream, ConnectError> {
    let candidates: Vec<SocketAddr> = match addr {
        TargetAddr::Ipv4(ip) => vec![SocketAddr::new((*ip).into(), port)],
        TargetAddr::Ipv6(ip) => vec![SocketAddr::new((*ip).into(), port)],
        TargetAddr::Domain(domain) => lookup_host((domain.as_str(), port))
            .await
            .map_err(|e| ConnectError::DnsResolutionFailed(e.to_string()))?
            .collect(),
    };

    if candidates.is_empty() {
        return Err(ConnectError::DnsResolutionFailed(format!(
            "no addresses found for {}",
            addr
        )));
    }

    let mut last_err = None;
    for candidate in candidates {
        trace!("Trying target address {}", candidate);
        match TcpStream::connect(candidate).await {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                debug!("Connected to target {}", candidate);
                return Ok(stream);
            }
            Err(e) => last_err = Some(ConnectError::from(e)),
        }
    }

    // Non-empty candidate list, so at least one attempt set last_err
    Err(last_err.unwrap_or_else(|| {
        ConnectError::Socket(std::io::Error::new(
            std::io::ErrorKind::Other,
            "no connect attempt made",
        ))
    }))
}

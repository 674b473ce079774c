use std::io::ErrorKind;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::warn;

/// Ports tried after the preferred one when fallback is enabled.
pub const FALLBACK_ATTEMPTS: u16 = 19;

/// Binds `0.0.0.0:port`. When `fallback` is set and the port is taken, walks up
/// through the next `FALLBACK_ATTEMPTS` ports.
pub async fn bind_with_fallback(port: u16, fallback: bool) -> anyhow::Result<TcpListener> {
    bind_on([0, 0, 0, 0], port, fallback).await
}

async fn bind_on(ip: [u8; 4], port: u16, fallback: bool) -> anyhow::Result<TcpListener> {
    let attempts = if fallback { FALLBACK_ATTEMPTS } else { 0 };

    let mut last_err = None;
    for offset in 0..=attempts {
        let Some(candidate) = port.checked_add(offset) else {
            break;
        };
        match TcpListener::bind(SocketAddr::from((ip, candidate))).await {
            Ok(listener) => return Ok(listener),
            Err(e) if e.kind() == ErrorKind::AddrInUse && fallback => {
                warn!("Port {candidate} is in use, trying the next one");
                last_err = Some(e);
            }
            Err(e) => {
                return Err(anyhow::Error::new(e).context(format!("binding port {candidate}")))
            }
        }
    }

    let err = last_err
        .map(anyhow::Error::new)
        .unwrap_or_else(|| anyhow::anyhow!("port range exhausted"));
    Err(err.context(format!(
        "no free port in {port}..={}",
        port.saturating_add(attempts)
    )))
}

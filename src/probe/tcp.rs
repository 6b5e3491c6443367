//! Raw TCP probe driver.

use super::{result, HealthState, ProbeResult, PROBE_TIMEOUT};
use crate::config::Endpoint;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Connect to `host:port`, send a ping line, and sample any banner the peer
/// sends back. A connected but silent peer still counts as up.
pub async fn probe_tcp(endpoint: &Endpoint) -> ProbeResult {
    let mut stream = match timeout(PROBE_TIMEOUT, TcpStream::connect(&endpoint.host)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return result(endpoint, HealthState::Down, e.to_string()),
        Err(_) => {
            return result(
                endpoint,
                HealthState::Down,
                format!("dial {} timed out", endpoint.host),
            )
        }
    };

    if let Err(e) = stream.write_all(b"ping\n").await {
        return result(endpoint, HealthState::Down, format!("write failed: {e}"));
    }

    let mut buf = [0u8; 64];
    match timeout(READ_TIMEOUT, stream.read(&mut buf)).await {
        Ok(Ok(n)) if n > 0 => result(
            endpoint,
            HealthState::Up,
            format!(
                "response received {}",
                String::from_utf8_lossy(&buf[..n]).trim()
            ),
        ),
        _ => result(
            endpoint,
            HealthState::Up,
            "no response after connect".to_string(),
        ),
    }
}

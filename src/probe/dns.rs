//! DNS resolution probe driver.

use super::{result, HealthState, ProbeResult, PROBE_TIMEOUT};
use crate::config::Endpoint;
use std::net::IpAddr;
use tokio::net::lookup_host;
use tokio::time::timeout;

/// Resolve the endpoint host. A literal IP is flagged as a skipped lookup
/// rather than resolved.
pub async fn probe_dns(endpoint: &Endpoint) -> ProbeResult {
    if endpoint.host.parse::<IpAddr>().is_ok() {
        return result(
            endpoint,
            HealthState::Warn,
            "Input is already an IP, DNS lookup skipped".to_string(),
        );
    }

    match timeout(PROBE_TIMEOUT, lookup_host((endpoint.host.as_str(), 0))).await {
        Ok(Ok(addrs)) => {
            let ips: Vec<String> = addrs.map(|a| a.ip().to_string()).collect();
            result(
                endpoint,
                HealthState::Up,
                format!("resolved [{}]", ips.join(" ")),
            )
        }
        Ok(Err(e)) => result(endpoint, HealthState::Down, format!("DNS error: {e}")),
        Err(_) => result(
            endpoint,
            HealthState::Down,
            "DNS error: lookup timed out".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(host: &str) -> Endpoint {
        Endpoint {
            name: "svc".to_string(),
            protocol: "dns".to_string(),
            host: host.to_string(),
            interval: 1.0,
        }
    }

    #[tokio::test]
    async fn literal_ipv4_skips_the_lookup() {
        let res = probe_dns(&endpoint("1.2.3.4")).await;
        assert_eq!(res.state, vec!["warn"]);
        assert!(res.description.contains("skipped"));
        assert_eq!(res.protocol, "DNS");
    }

    #[tokio::test]
    async fn literal_ipv6_skips_the_lookup() {
        let res = probe_dns(&endpoint("::1")).await;
        assert_eq!(res.state, vec!["warn"]);
        assert!(res.description.contains("skipped"));
    }

    #[tokio::test]
    async fn resolvable_host_is_up() {
        let res = probe_dns(&endpoint("localhost")).await;
        assert_eq!(res.state, vec!["up"]);
        assert!(res.description.starts_with("resolved ["));
    }
}

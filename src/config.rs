//! Configuration loaded from environment variables with sensible defaults.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::time::Duration;

/// Default HTTP probe User-Agent when `USER_AGENT` is unset.
pub const DEFAULT_USER_AGENT: &str = "BeepMonitor/1.0";

/// A monitored endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    pub protocol: String,
    pub host: String,
    /// Probe interval in seconds; non-positive values fall back to 1s.
    #[serde(default)]
    pub interval: f64,
}

impl Endpoint {
    pub fn interval_duration(&self) -> Duration {
        if self.interval > 0.0 {
            Duration::from_secs_f64(self.interval)
        } else {
            Duration::from_secs(1)
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the HTTP/SSE server (default: 8976).
    pub http_port: u16,
    pub nats_url: String,
    pub nats_jwt: Option<String>,
    pub nats_seed: Option<String>,
    pub user_agent: String,
    /// SLA availability target in `[0, 1]`.
    pub sla_target: f64,
    /// Granularity of one accumulator bucket (default: one day).
    pub bucket_span: TimeDelta,
    pub endpoints: Vec<Endpoint>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8976,
            nats_url: "nats://127.0.0.1:4222".to_string(),
            nats_jwt: None,
            nats_seed: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            sla_target: 1.0,
            bucket_span: TimeDelta::days(1),
            endpoints: default_endpoints(),
        }
    }
}

fn default_endpoints() -> Vec<Endpoint> {
    vec![Endpoint {
        name: "example.com".to_string(),
        protocol: "https".to_string(),
        host: "example.com".to_string(),
        interval: 10.0,
    }]
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `NATS_URL`, `NATS_JWT`, `NATS_SEED`: KV provider connection
    /// - `USER_AGENT`: HTTP probe User-Agent
    /// - `BEEP_HTTP_PORT`: server port (default: 8976)
    /// - `BEEP_ENDPOINTS`: JSON array of endpoint objects
    /// - `BEEP_BUCKET_SECONDS`: accumulator bucket granularity (default: 86400)
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(port_str) = env::var("BEEP_HTTP_PORT") {
            if let Ok(port) = port_str.parse() {
                cfg.http_port = port;
            }
        }

        if let Ok(url) = env::var("NATS_URL") {
            if !url.is_empty() {
                cfg.nats_url = url;
            }
        }
        cfg.nats_jwt = env::var("NATS_JWT").ok().filter(|v| !v.is_empty());
        cfg.nats_seed = env::var("NATS_SEED").ok().filter(|v| !v.is_empty());

        if let Ok(ua) = env::var("USER_AGENT") {
            if !ua.is_empty() {
                cfg.user_agent = ua;
            }
        }

        if let Ok(secs_str) = env::var("BEEP_BUCKET_SECONDS") {
            if let Ok(secs) = secs_str.parse::<i64>() {
                if secs > 0 {
                    cfg.bucket_span = TimeDelta::seconds(secs);
                }
            }
        }

        if let Ok(raw) = env::var("BEEP_ENDPOINTS") {
            match serde_json::from_str::<Vec<Endpoint>>(&raw) {
                Ok(endpoints) if !endpoints.is_empty() => cfg.endpoints = endpoints,
                Ok(_) => {}
                Err(e) => tracing::warn!("ignoring malformed BEEP_ENDPOINTS: {e}"),
            }
        }

        cfg.endpoints = dedupe_names(cfg.endpoints);
        cfg
    }
}

/// Make endpoint names unique by suffixing `-N` to repeats in declaration
/// order.
pub fn dedupe_names(endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    endpoints
        .into_iter()
        .map(|mut endpoint| {
            let count = counts.entry(endpoint.name.clone()).or_insert(0);
            *count += 1;
            if *count > 1 {
                endpoint.name = format!("{}-{}", endpoint.name, count);
            }
            endpoint
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> Endpoint {
        Endpoint {
            name: name.to_string(),
            protocol: "https".to_string(),
            host: "example.test".to_string(),
            interval: 10.0,
        }
    }

    #[test]
    fn default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.http_port, 8976);
        assert_eq!(cfg.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(cfg.sla_target, 1.0);
        assert_eq!(cfg.bucket_span, TimeDelta::days(1));
        assert!(!cfg.endpoints.is_empty());
    }

    #[test]
    fn duplicate_names_are_suffixed_in_order() {
        let deduped = dedupe_names(vec![named("a"), named("a"), named("b"), named("a")]);
        let names: Vec<_> = deduped.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "a-2", "b", "a-3"]);
    }

    #[test]
    fn non_positive_intervals_fall_back_to_one_second() {
        let mut endpoint = named("a");
        endpoint.interval = 0.0;
        assert_eq!(endpoint.interval_duration(), Duration::from_secs(1));
        endpoint.interval = -3.0;
        assert_eq!(endpoint.interval_duration(), Duration::from_secs(1));
        endpoint.interval = 10.0;
        assert_eq!(endpoint.interval_duration(), Duration::from_secs(10));
    }

    #[test]
    fn endpoints_parse_from_json() {
        let raw = r#"[{"name":"svc","protocol":"tcp","host":"example.test:4222","interval":5}]"#;
        let endpoints: Vec<Endpoint> = serde_json::from_str(raw).unwrap();
        assert_eq!(endpoints[0].name, "svc");
        assert_eq!(endpoints[0].interval, 5.0);
    }
}

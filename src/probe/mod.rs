//! Probe drivers for the supported endpoint protocols.
//!
//! Drivers never fail: transport errors, bad status codes, and overruns all
//! fold into a [`ProbeResult`] carrying a single health token.

pub mod dns;
pub mod http;
pub mod tcp;

use crate::config::Endpoint;
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard deadline for a single probe execution.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(20);

/// UTC day-stamp format used in probe dates and stored history.
pub const DAY_FORMAT: &str = "%d/%m/%Y";

const TIMESTAMP_FORMAT: &str = "%H:%M:%S%.3f";

/// Health token attached to a probe result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Up,
    Down,
    Warn,
}

impl HealthState {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthState::Up => "up",
            HealthState::Down => "down",
            HealthState::Warn => "warn",
        }
    }
}

/// Outcome of one probe against one endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub state: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub date: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub timestamp: String,
}

/// Probe driver selected for an endpoint at scheduler startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    Http,
    Tcp,
    Dns,
}

impl ProbeKind {
    /// Select a driver by protocol, case-insensitive and trimmed. `None`
    /// means the endpoint must not be scheduled.
    pub fn for_protocol(protocol: &str) -> Option<Self> {
        match protocol.trim().to_ascii_lowercase().as_str() {
            "http" | "https" => Some(ProbeKind::Http),
            "tcp" => Some(ProbeKind::Tcp),
            "dns" => Some(ProbeKind::Dns),
            _ => None,
        }
    }

    pub async fn run(self, endpoint: &Endpoint, user_agent: &str) -> ProbeResult {
        match self {
            ProbeKind::Http => http::probe_http(endpoint, user_agent).await,
            ProbeKind::Tcp => tcp::probe_tcp(endpoint).await,
            ProbeKind::Dns => dns::probe_dns(endpoint).await,
        }
    }
}

pub(crate) fn result(endpoint: &Endpoint, state: HealthState, description: String) -> ProbeResult {
    ProbeResult {
        id: String::new(),
        name: endpoint.name.clone(),
        protocol: endpoint.protocol.to_uppercase(),
        state: vec![state.as_str().to_string()],
        description,
        date: vec![Utc::now().format(DAY_FORMAT).to_string()],
        timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
    }
}

/// Result substituted when a driver exceeds the probe deadline.
pub fn timed_out(endpoint: &Endpoint) -> ProbeResult {
    result(
        endpoint,
        HealthState::Down,
        format!("probe timed out after {}s", PROBE_TIMEOUT.as_secs()),
    )
}

//! HTTP request handlers.

use super::AppState;
use crate::config::Endpoint;
use crate::hub::{Hub, Subscription, Update};
use crate::store::{self, StatusPayload, StoredDocument};

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Json, Response};
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;

/// Error body emitted by the panic-recovery layer.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub state: Vec<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    monitors: bool,
    #[serde(rename = "miniMonitors")]
    mini_monitors: bool,
}

/// Drops the hub registration when the SSE stream is torn down, whether by
/// client disconnect or write failure.
struct SubscriptionGuard {
    hub: Arc<Hub>,
    id: u64,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.hub.unregister(self.id);
    }
}

/// Live probe/SLA updates as server-sent events. New subscribers receive
/// the warm cache first, then the live queue.
pub async fn handle_sse(State(state): State<AppState>) -> impl IntoResponse {
    let Subscription {
        id,
        receiver,
        warm_cache,
    } = state.hub.register();
    let guard = SubscriptionGuard {
        hub: state.hub.clone(),
        id,
    };

    let endpoints = state.endpoints.clone();
    let warmup = events_for(&endpoints, &warm_cache);

    let live = ReceiverStream::new(receiver).flat_map(move |update: Update| {
        let _held = &guard;
        stream::iter(events_for(&endpoints, &update))
    });

    let events = stream::iter(warmup).chain(live);

    (
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Sse::new(events),
    )
}

/// Serialize one update map as one event per endpoint.
fn events_for(
    endpoints: &[Endpoint],
    update: &HashMap<String, StatusPayload>,
) -> Vec<Result<Event, Infallible>> {
    update
        .iter()
        .map(|(name, payload)| {
            let doc = frame(endpoints, name, payload);
            let data = serde_json::to_string(&doc).unwrap_or_else(|_| "{}".to_string());
            Ok(Event::default().data(data))
        })
        .collect()
}

/// Build one SSE frame, resolving the endpoint's configured index (−1 when
/// unknown). Configured lists are small, so a linear scan is fine.
fn frame(endpoints: &[Endpoint], name: &str, payload: &StatusPayload) -> StoredDocument {
    let index = endpoints
        .iter()
        .position(|e| e.name == name)
        .map_or(-1, |i| i as i32);
    StoredDocument {
        index,
        payload: payload.clone(),
    }
}

/// Whether any monitors exist, and whether the dashboard should switch to
/// its condensed display.
pub async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusResponse {
        monitors: !state.endpoints.is_empty(),
        mini_monitors: state.endpoints.len() > 3,
    })
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub name: String,
}

/// Latest persisted document for one endpoint.
pub async fn handle_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    match store::read_document(state.kv.as_ref(), &query.name).await {
        Ok(doc) => Json(doc).into_response(),
        Err(e) => {
            tracing::error!(endpoint = %query.name, "history lookup failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ResetQuery {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub empty: String,
}

/// Reset one named tracker, or all of them when no name is given.
pub async fn handle_reset(
    State(state): State<AppState>,
    Query(query): Query<ResetQuery>,
) -> Response {
    if query.name.is_empty() {
        state.trackers.reset_all();
    } else {
        state.trackers.reset(&query.name);
    }

    if query.empty == "true" {
        return StatusCode::NO_CONTENT.into_response();
    }
    Json(serde_json::json!({ "sla_reset": true, "probe": query.name })).into_response()
}

pub async fn handle_ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

/// Recovery handler for the catch-panic layer.
pub fn recover_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| err.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_default();
    tracing::error!("recovered from handler panic: {detail}");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            state: vec!["error".to_string()],
            message: "internal server error".to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeResult;

    fn endpoints() -> Vec<Endpoint> {
        ["alpha", "beta"]
            .iter()
            .map(|name| Endpoint {
                name: name.to_string(),
                protocol: "https".to_string(),
                host: "example.test".to_string(),
                interval: 10.0,
            })
            .collect()
    }

    fn payload(name: &str) -> StatusPayload {
        StatusPayload {
            probe: ProbeResult {
                name: name.to_string(),
                state: vec!["up".to_string()],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn frames_resolve_the_configured_index() {
        let endpoints = endpoints();
        assert_eq!(frame(&endpoints, "alpha", &payload("alpha")).index, 0);
        assert_eq!(frame(&endpoints, "beta", &payload("beta")).index, 1);
        assert_eq!(frame(&endpoints, "ghost", &payload("ghost")).index, -1);
    }

    #[test]
    fn updates_become_one_event_per_endpoint() {
        let endpoints = endpoints();
        let update = HashMap::from([
            ("alpha".to_string(), payload("alpha")),
            ("beta".to_string(), payload("beta")),
        ]);
        assert_eq!(events_for(&endpoints, &update).len(), 2);
    }

    #[test]
    fn panic_recovery_returns_the_error_shape() {
        let response = recover_panic(Box::new("boom".to_string()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

//! Durable status writer: merges each probe tick with the prior stored
//! document under optimistic concurrency.
//!
//! The merge itself is the pure [`reconcile`] function; the writer wraps it
//! with the KV read/compare-and-swap loop. Persistence is best effort — a
//! failed write never reaches the scheduler, which broadcasts the merged
//! in-memory payload regardless.

use super::{
    decode_document, encode_document, KvBucket, StatusPayload, StoreError, StoredDocument,
    KV_OP_TIMEOUT,
};
use crate::probe::DAY_FORMAT;
use crate::sla::{format_duration_full, parse_duration_secs, SlaSnapshot, SlaTracker};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use uuid::Uuid;

const WRITE_ATTEMPTS: usize = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Maximum retained entries in the state/date/history sequences.
pub const HISTORY_CAP: usize = 90;

pub struct StatusWriter {
    kv: Arc<dyn KvBucket>,
}

impl StatusWriter {
    pub fn new(kv: Arc<dyn KvBucket>) -> Self {
        Self { kv }
    }

    /// Merge this tick with the stored document and persist it, retrying a
    /// bounded number of times on write conflicts. Always returns the
    /// enriched payload for broadcast, even when persistence fails.
    pub async fn persist_tick(
        &self,
        index: i32,
        payload: StatusPayload,
        tracker: &SlaTracker,
    ) -> StatusPayload {
        let name = payload.probe.name.clone();
        let today = Utc::now().format(DAY_FORMAT).to_string();
        let mut enriched = payload.clone();

        for attempt in 1..=WRITE_ATTEMPTS {
            let (old, revision) = match self.load(&name).await {
                Ok(loaded) => loaded,
                Err(e) => {
                    // Unreachable store reads as a fresh start; the create
                    // below will fail and retry if a document exists.
                    tracing::warn!(endpoint = %name, attempt, "status read failed: {e}");
                    (None, 0)
                }
            };

            enriched = reconcile(payload.clone(), old, &today, tracker.target(), || {
                tracker.reset();
                tracker.snapshot()
            });

            let doc = StoredDocument {
                index,
                payload: enriched.clone(),
            };
            let bytes = match encode_document(&doc) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!(endpoint = %name, "failed to encode status document: {e}");
                    return enriched;
                }
            };

            let write = if revision > 0 {
                timeout(KV_OP_TIMEOUT, self.kv.update(&name, bytes, revision)).await
            } else {
                timeout(KV_OP_TIMEOUT, self.kv.create(&name, bytes)).await
            };
            match write {
                Ok(Ok(_)) => return enriched,
                Ok(Err(e)) => {
                    tracing::debug!(endpoint = %name, attempt, "status write rejected: {e}")
                }
                Err(_) => tracing::warn!(endpoint = %name, attempt, "status write timed out"),
            }
            tokio::time::sleep(RETRY_BACKOFF).await;
        }

        tracing::warn!(endpoint = %name, "dropping status write after {WRITE_ATTEMPTS} attempts");
        enriched
    }

    /// Load the prior payload. A missing key is a fresh start; a document
    /// that fails to decode is treated as absent but keeps its revision so
    /// the next write overwrites it.
    async fn load(&self, name: &str) -> Result<(Option<StatusPayload>, u64), StoreError> {
        let entry = timeout(KV_OP_TIMEOUT, self.kv.entry(name))
            .await
            .map_err(|_| StoreError::Read("kv get timed out".to_string()))??;
        Ok(match entry {
            None => (None, 0),
            Some(entry) => match decode_document(&entry.value) {
                Ok(doc) => (Some(doc.payload), entry.revision),
                Err(e) => {
                    tracing::warn!(endpoint = %name, "discarding malformed stored document: {e}");
                    (None, entry.revision)
                }
            },
        })
    }
}

fn monitor_id() -> String {
    format!("monitor_{}", Uuid::new_v4().simple())
}

fn sla_id() -> String {
    format!("sla_{}", Uuid::new_v4().simple())
}

/// Pure merge of one tick with the previously stored payload.
///
/// `rollover_snapshot` is invoked only when the stored day differs from
/// `today`: the caller resets its tracker there and returns the fresh
/// zeroed snapshot that heads the new day.
pub(crate) fn reconcile(
    mut tick: StatusPayload,
    old: Option<StatusPayload>,
    today: &str,
    target: f64,
    rollover_snapshot: impl FnOnce() -> SlaSnapshot,
) -> StatusPayload {
    if let Some(old) = &old {
        if !old.probe.id.is_empty() {
            tick.probe.id = old.probe.id.clone();
        }
        if !old.sla.id.is_empty() {
            tick.sla.id = old.sla.id.clone();
        }
    }
    if tick.probe.id.is_empty() {
        tick.probe.id = monitor_id();
    }
    if tick.sla.id.is_empty() {
        tick.sla.id = sla_id();
    }

    let current_status = tick
        .probe
        .state
        .first()
        .cloned()
        .unwrap_or_else(|| "warn".to_string());

    match old {
        Some(old) if !old.probe.date.is_empty() => {
            if old.probe.date[0] == today {
                // Same-day update: carry the stored sequences, refresh the
                // head of each.
                let live = tick.sla.snapshot.clone();
                tick.sla.history = old.sla.history;
                tick.probe.date = old.probe.date;
                tick.probe.state = old.probe.state;
                if tick.probe.state.is_empty() {
                    tick.probe.state.push(current_status);
                } else {
                    tick.probe.state[0] = current_status;
                }
                if !tick.sla.history.is_empty() {
                    tick.sla.history[0] = live;
                }
            } else {
                // Day rollover: the window advances; prior days stay frozen
                // in history.
                let fresh = rollover_snapshot();
                tick.sla.history = std::iter::once(fresh).chain(old.sla.history).collect();
                tick.probe.date = std::iter::once(today.to_string())
                    .chain(old.probe.date)
                    .collect();
                tick.probe.state = std::iter::once(current_status)
                    .chain(old.probe.state)
                    .collect();
            }
        }
        _ => {
            tick.sla.history = vec![tick.sla.snapshot.clone()];
            tick.probe.date = vec![today.to_string()];
            tick.probe.state = vec![current_status];
        }
    }

    tick.probe.state.truncate(HISTORY_CAP);
    tick.probe.date.truncate(HISTORY_CAP);
    tick.sla.history.truncate(HISTORY_CAP);

    aggregate_from_history(&mut tick, target);
    tick
}

/// Recompute the top-level SLA figures from the retained history, so they
/// cover the full stored window rather than only the in-memory ring.
fn aggregate_from_history(payload: &mut StatusPayload, target: f64) {
    let mut total = 0i64;
    let mut down = 0i64;
    for entry in &payload.sla.history {
        total += parse_duration_secs(&entry.total_time_seconds);
        down += parse_duration_secs(&entry.down_time_seconds);
    }

    let availability = if total > 0 {
        1.0 - down as f64 / total as f64
    } else {
        1.0
    };

    let snapshot = &mut payload.sla.snapshot;
    snapshot.total_time_seconds = format_duration_full(total);
    snapshot.down_time_seconds = format_duration_full(down);
    snapshot.up_time_seconds = format_duration_full(total - down);
    snapshot.uptime90 = format!("{:.3}%", availability * 100.0);
    snapshot.sla_breached = (target >= 1.0 && down > 0) || availability < target;
}

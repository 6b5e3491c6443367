//! Sliding SLA accounting over a fixed ring of time buckets.
//!
//! Each endpoint gets one [`SlaTracker`]: 90 buckets of accumulated
//! total/down seconds, rotated as the clock crosses bucket boundaries
//! (daily by default). A [`SlaSnapshot`] is the formatted reading of the
//! whole ring.

mod duration;

pub use duration::{format_duration_full, parse_duration_secs};

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Number of buckets in the sliding window.
pub const WINDOW_BUCKETS: usize = 90;

/// Point-in-time SLA reading derived from the ring buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlaSnapshot {
    pub sla_target: String,
    pub uptime90: String,
    pub up_time_seconds: String,
    pub down_time_seconds: String,
    pub total_time_seconds: String,
    pub sla_breached: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    total_sec: i64,
    down_sec: i64,
}

struct RingState {
    buckets: [Bucket; WINDOW_BUCKETS],
    idx: usize,
    current_bucket: DateTime<Utc>,
    last_update: DateTime<Utc>,
}

/// Ring-buffered accumulator of up/down seconds for one endpoint.
pub struct SlaTracker {
    target: f64,
    span: TimeDelta,
    state: Mutex<RingState>,
}

impl SlaTracker {
    /// Tracker with the default daily bucket granularity.
    pub fn new(target: f64) -> Self {
        Self::with_span(target, TimeDelta::days(1))
    }

    /// Tracker with an explicit bucket granularity.
    pub fn with_span(target: f64, span: TimeDelta) -> Self {
        let span = if span.num_seconds() > 0 {
            span
        } else {
            TimeDelta::days(1)
        };
        let now = Utc::now();
        Self {
            target,
            span,
            state: Mutex::new(RingState {
                buckets: [Bucket::default(); WINDOW_BUCKETS],
                idx: 0,
                current_bucket: truncate(now, span),
                last_update: now,
            }),
        }
    }

    /// The availability target in `[0, 1]`.
    pub fn target(&self) -> f64 {
        self.target
    }

    /// Account one probe interval into the current bucket.
    pub fn tick(&self, is_down: bool, interval: Duration) {
        self.tick_at(Utc::now(), is_down, interval);
    }

    fn tick_at(&self, now: DateTime<Utc>, is_down: bool, interval: Duration) {
        let mut state = self.state.lock().unwrap();
        self.rotate_to(&mut state, now);

        let inc = interval.as_secs_f64().round() as i64;
        let idx = state.idx;
        state.buckets[idx].total_sec += inc;
        if is_down {
            state.buckets[idx].down_sec += inc;
        }
        state.last_update = now;
    }

    /// Formatted reading of the whole ring.
    pub fn snapshot(&self) -> SlaSnapshot {
        self.snapshot_at(Utc::now())
    }

    fn snapshot_at(&self, now: DateTime<Utc>) -> SlaSnapshot {
        let mut state = self.state.lock().unwrap();
        self.rotate_to(&mut state, now);

        let mut total = 0i64;
        let mut down = 0i64;
        for bucket in &state.buckets {
            total += bucket.total_sec;
            down += bucket.down_sec;
        }

        let sla_target = format!("{:.3}%", self.target * 100.0);

        if total <= 0 {
            return SlaSnapshot {
                sla_target,
                uptime90: "100.000%".to_string(),
                up_time_seconds: format_duration_full(0),
                down_time_seconds: format_duration_full(0),
                total_time_seconds: format_duration_full(0),
                sla_breached: false,
            };
        }

        let availability = 1.0 - (down as f64 / total as f64);
        let mut uptime90 = format!("{:.3}%", availability * 100.0);
        // Any recorded downtime must not round up to a perfect score.
        if down > 0 && uptime90 == "100.000%" {
            uptime90 = "99.999%".to_string();
        }

        let breached = (self.target >= 1.0 && down > 0) || availability < self.target;

        SlaSnapshot {
            sla_target,
            uptime90,
            up_time_seconds: format_duration_full(total - down),
            down_time_seconds: format_duration_full(down),
            total_time_seconds: format_duration_full(total),
            sla_breached: breached,
        }
    }

    /// Clear the ring and re-anchor the current bucket to now.
    pub fn reset(&self) {
        self.reset_at(Utc::now());
    }

    fn reset_at(&self, now: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap();
        state.buckets = [Bucket::default(); WINDOW_BUCKETS];
        state.idx = 0;
        state.current_bucket = truncate(now, self.span);
        state.last_update = now;
    }

    fn rotate_to(&self, state: &mut RingState, now: DateTime<Utc>) {
        let bucket_now = truncate(now, self.span);
        if bucket_now <= state.current_bucket {
            return;
        }

        let steps = (bucket_now - state.current_bucket).num_seconds() / self.span.num_seconds();
        if steps as usize >= WINDOW_BUCKETS {
            state.buckets = [Bucket::default(); WINDOW_BUCKETS];
            state.idx = 0;
        } else {
            for _ in 0..steps {
                state.idx = (state.idx + 1) % WINDOW_BUCKETS;
                state.buckets[state.idx] = Bucket::default();
            }
        }
        state.current_bucket = bucket_now;
    }
}

fn truncate(t: DateTime<Utc>, span: TimeDelta) -> DateTime<Utc> {
    t.duration_trunc(span).unwrap_or(t)
}

/// Lazily-populated map of per-endpoint trackers. The map lock is held only
/// for lookup and insert, never across tracker operations.
pub struct TrackerMap {
    target: f64,
    span: TimeDelta,
    inner: Mutex<HashMap<String, Arc<SlaTracker>>>,
}

impl TrackerMap {
    pub fn new(target: f64, span: TimeDelta) -> Self {
        Self {
            target,
            span,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the tracker for an endpoint, creating it on first use.
    pub fn get_or_create(&self, name: &str) -> Arc<SlaTracker> {
        let mut map = self.inner.lock().unwrap();
        map.entry(name.to_string())
            .or_insert_with(|| Arc::new(SlaTracker::with_span(self.target, self.span)))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<SlaTracker>> {
        self.inner.lock().unwrap().get(name).cloned()
    }

    /// Reset one named tracker; returns whether it existed.
    pub fn reset(&self, name: &str) -> bool {
        match self.get(name) {
            Some(tracker) => {
                tracker.reset();
                true
            }
            None => false,
        }
    }

    pub fn reset_all(&self) {
        let trackers: Vec<_> = self.inner.lock().unwrap().values().cloned().collect();
        for tracker in trackers {
            tracker.reset();
        }
    }
}

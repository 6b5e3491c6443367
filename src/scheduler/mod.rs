//! Probe scheduler: one worker task per configured endpoint.
//!
//! Workers are independent; a slow probe never delays another endpoint.
//! Within one endpoint, ticks are strictly sequential — probe, SLA
//! accounting, persistence, and broadcast all complete before the next
//! tick, and missed ticks are skipped rather than caught up.

use crate::config::Endpoint;
use crate::hub::Hub;
use crate::probe::{self, ProbeKind, PROBE_TIMEOUT};
use crate::sla::TrackerMap;
use crate::store::{SlaReport, StatusPayload, StatusWriter};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};

/// Bound on waiting for probe workers to drain at shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(40);

pub struct Scheduler {
    endpoints: Arc<Vec<Endpoint>>,
    trackers: Arc<TrackerMap>,
    hub: Arc<Hub>,
    writer: Arc<StatusWriter>,
    user_agent: String,
    stop_tx: broadcast::Sender<()>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(
        endpoints: Arc<Vec<Endpoint>>,
        trackers: Arc<TrackerMap>,
        hub: Arc<Hub>,
        writer: Arc<StatusWriter>,
        user_agent: String,
    ) -> Self {
        let (stop_tx, _) = broadcast::channel(1);
        Self {
            endpoints,
            trackers,
            hub,
            writer,
            user_agent,
            stop_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn one probe worker per schedulable endpoint. Endpoints with an
    /// unsupported protocol are skipped with a warning and never retried.
    pub async fn start(&self) {
        tracing::info!("starting probe scheduler with {} endpoints", self.endpoints.len());

        let mut handles = self.handles.lock().await;
        for (index, endpoint) in self.endpoints.iter().enumerate() {
            let Some(kind) = ProbeKind::for_protocol(&endpoint.protocol) else {
                tracing::warn!(
                    endpoint = %endpoint.name,
                    protocol = %endpoint.protocol,
                    "unsupported protocol, endpoint not scheduled"
                );
                continue;
            };

            let worker = Worker {
                endpoint: endpoint.clone(),
                index: index as i32,
                kind,
                trackers: self.trackers.clone(),
                hub: self.hub.clone(),
                writer: self.writer.clone(),
                user_agent: self.user_agent.clone(),
            };
            handles.push(tokio::spawn(worker.run(self.stop_tx.subscribe())));
        }
    }

    /// Signal all workers to stop and wait (bounded) for them to drain.
    pub async fn shutdown(&self) {
        let _ = self.stop_tx.send(());
        let mut handles = self.handles.lock().await;
        let drain = async {
            for handle in handles.drain(..) {
                let _ = handle.await;
            }
        };
        if timeout(DRAIN_TIMEOUT, drain).await.is_err() {
            tracing::warn!("probe workers did not drain within {DRAIN_TIMEOUT:?}");
        }
    }
}

struct Worker {
    endpoint: Endpoint,
    index: i32,
    kind: ProbeKind,
    trackers: Arc<TrackerMap>,
    hub: Arc<Hub>,
    writer: Arc<StatusWriter>,
    user_agent: String,
}

impl Worker {
    async fn run(self, mut stop_rx: broadcast::Receiver<()>) {
        let interval = self.endpoint.interval_duration();
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = stop_rx.recv() => {
                    tracing::info!(endpoint = %self.endpoint.name, "stopping probe worker");
                    return;
                }
                _ = ticker.tick() => self.tick(interval).await,
            }
        }
    }

    /// One full probe tick: drive, account, persist, broadcast.
    async fn tick(&self, interval: Duration) {
        let result = match timeout(PROBE_TIMEOUT, self.kind.run(&self.endpoint, &self.user_agent)).await
        {
            Ok(result) => result,
            Err(_) => probe::timed_out(&self.endpoint),
        };

        let tracker = self.trackers.get_or_create(&self.endpoint.name);
        let is_down = result
            .state
            .first()
            .is_some_and(|s| s.eq_ignore_ascii_case("down"));
        tracker.tick(is_down, interval);

        let payload = StatusPayload {
            probe: result,
            sla: SlaReport {
                id: String::new(),
                snapshot: tracker.snapshot(),
                history: Vec::new(),
            },
        };

        let enriched = self.writer.persist_tick(self.index, payload, &tracker).await;
        self.hub
            .broadcast(HashMap::from([(self.endpoint.name.clone(), enriched)]));
    }
}

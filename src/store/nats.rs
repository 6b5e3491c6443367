//! NATS JetStream KV backend.

use super::{KvBucket, KvEntry, StoreError, BUCKET_MAX_BYTES, BUCKET_NAME};
use crate::config::Config;
use async_nats::jetstream::{self, kv};
use async_trait::async_trait;
use std::time::Duration;

/// JetStream-backed implementation of [`KvBucket`].
pub struct NatsKv {
    store: kv::Store,
    client: async_nats::Client,
}

impl NatsKv {
    /// Connect to the configured NATS server and open the status bucket,
    /// creating it when it does not exist yet.
    pub async fn connect(cfg: &Config) -> Result<Self, StoreError> {
        let options = match (&cfg.nats_jwt, &cfg.nats_seed) {
            (Some(jwt), Some(seed)) => {
                async_nats::ConnectOptions::with_credentials(&credentials(jwt, seed))
                    .map_err(|e| StoreError::Connection(e.to_string()))?
            }
            _ => async_nats::ConnectOptions::new(),
        };

        let client = options
            .ping_interval(Duration::from_secs(20))
            .connection_timeout(Duration::from_secs(10))
            .event_callback(|event| async move {
                match event {
                    async_nats::Event::Disconnected => tracing::warn!("disconnected from NATS"),
                    async_nats::Event::Connected => tracing::info!("reconnected to NATS"),
                    other => tracing::debug!("NATS client event: {other}"),
                }
            })
            .connect(cfg.nats_url.as_str())
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let js = jetstream::new(client.clone());
        let store = match js.get_key_value(BUCKET_NAME).await {
            Ok(store) => store,
            Err(_) => js
                .create_key_value(kv::Config {
                    bucket: BUCKET_NAME.to_string(),
                    max_bytes: BUCKET_MAX_BYTES,
                    ..Default::default()
                })
                .await
                .map_err(|e| StoreError::Connection(e.to_string()))?,
        };

        Ok(Self { store, client })
    }

    /// Flush buffered publishes; used on shutdown.
    pub async fn flush(&self) -> Result<(), StoreError> {
        self.client
            .flush()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))
    }
}

#[async_trait]
impl KvBucket for NatsKv {
    async fn entry(&self, key: &str) -> Result<Option<KvEntry>, StoreError> {
        let entry = self
            .store
            .entry(key)
            .await
            .map_err(|e| StoreError::Read(e.to_string()))?;
        Ok(entry.map(|e| KvEntry {
            value: e.value.to_vec(),
            revision: e.revision,
        }))
    }

    async fn create(&self, key: &str, value: Vec<u8>) -> Result<u64, StoreError> {
        self.store
            .create(key, value.into())
            .await
            .map_err(|e| StoreError::Write(e.to_string()))
    }

    async fn update(&self, key: &str, value: Vec<u8>, revision: u64) -> Result<u64, StoreError> {
        self.store
            .update(key, value.into(), revision)
            .await
            .map_err(|e| StoreError::Write(e.to_string()))
    }
}

/// Assemble a NATS credentials-file body from a user JWT and nkey seed, the
/// format `ConnectOptions::with_credentials` expects.
fn credentials(jwt: &str, seed: &str) -> String {
    format!(
        "-----BEGIN NATS USER JWT-----\n{jwt}\n------END NATS USER JWT------\n\n\
         -----BEGIN USER NKEY SEED-----\n{seed}\n------END USER NKEY SEED------\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_body_carries_both_sections() {
        let creds = credentials("jwt-token", "SUSEED");
        assert!(creds.contains("-----BEGIN NATS USER JWT-----\njwt-token\n"));
        assert!(creds.contains("-----BEGIN USER NKEY SEED-----\nSUSEED\n"));
    }
}

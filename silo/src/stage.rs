//! Staging object-store client.
//!
//! Thin wrapper over the bucket that holds staged batches between
//! extraction and the warehouse load. Listing is a lazy sequence over
//! remote pages; a cleanup interrupted mid-page is restarted only by
//! re-listing.

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use opendal::{Operator, services};
use secrecy::ExposeSecret;
use tracing::debug;

use crate::error::{ErrorKind, SiloError, SiloResult};
use crate::silo_error;
use silo_config::shared::StorageConfig;

/// Client for one staging bucket.
#[derive(Debug, Clone)]
pub struct Stage {
    operator: Operator,
    bucket: String,
}

impl Stage {
    /// Builds a stage client for the configured bucket.
    ///
    /// Credentials fall back to the ambient credential chain when not set
    /// explicitly.
    pub fn new(config: &StorageConfig) -> SiloResult<Stage> {
        let mut builder = services::S3::default()
            .bucket(&config.bucket)
            .region(&config.region);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint(endpoint);
        }
        if let Some(access_key_id) = &config.access_key_id {
            builder = builder.access_key_id(access_key_id);
        }
        if let Some(secret_access_key) = &config.secret_access_key {
            builder = builder.secret_access_key(secret_access_key.expose_secret());
        }

        let operator = Operator::new(builder)
            .map_err(|err| map_storage_error(err, "failed to build object store client"))?
            .finish();

        Ok(Stage {
            operator,
            bucket: config.bucket.clone(),
        })
    }

    /// Builds a stage over an existing operator.
    ///
    /// Used by tests to run against an in-memory store.
    pub fn with_operator(operator: Operator, bucket: impl Into<String>) -> Stage {
        Stage {
            operator,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Uploads one staged object.
    pub async fn put(&self, key: &str, payload: Vec<u8>) -> SiloResult<()> {
        debug!(bucket = %self.bucket, key, bytes = payload.len(), "staging object");

        self.operator
            .write(key, payload)
            .await
            .map_err(|err| map_storage_error(err, "failed to upload staged object"))?;

        Ok(())
    }

    /// Downloads one staged object.
    pub async fn get(&self, key: &str) -> SiloResult<Vec<u8>> {
        let buffer = self
            .operator
            .read(key)
            .await
            .map_err(|err| map_storage_error(err, "failed to read staged object"))?;

        Ok(buffer.to_vec())
    }

    /// Lists the keys of all staged objects.
    pub async fn list_keys(&self) -> SiloResult<Vec<String>> {
        let mut lister = self
            .operator
            .lister_with("/")
            .recursive(true)
            .await
            .map_err(|err| map_storage_error(err, "failed to list staged objects"))?;

        let mut keys = Vec::new();
        while let Some(entry) = lister
            .try_next()
            .await
            .map_err(|err| map_storage_error(err, "failed to advance staged object listing"))?
        {
            if entry.path().ends_with('/') {
                continue;
            }
            keys.push(entry.path().to_string());
        }

        Ok(keys)
    }

    /// Deletes every staged object, driven page by page off the listing.
    ///
    /// Returns the number of objects removed.
    pub async fn delete_all(&self) -> SiloResult<u64> {
        let mut lister = self
            .operator
            .lister_with("/")
            .recursive(true)
            .await
            .map_err(|err| map_storage_error(err, "failed to list staged objects"))?;

        let mut removed = 0;
        while let Some(entry) = lister
            .try_next()
            .await
            .map_err(|err| map_storage_error(err, "failed to advance staged object listing"))?
        {
            if entry.path().ends_with('/') {
                continue;
            }

            self.operator
                .delete(entry.path())
                .await
                .map_err(|err| map_storage_error(err, "failed to delete staged object"))?;
            removed += 1;
        }

        debug!(bucket = %self.bucket, removed, "cleared staged objects");

        Ok(removed)
    }
}

/// Key for a staged object: dataset name plus extraction timestamp.
pub fn staged_object_key(dataset: &str, timestamp: DateTime<Utc>, extension: &str) -> String {
    format!(
        "{dataset}_{}.{extension}",
        timestamp.format("%Y-%m-%dT%H:%M:%S%.6fZ")
    )
}

fn map_storage_error(error: opendal::Error, description: &'static str) -> SiloError {
    let detail = error.to_string();
    silo_error!(ErrorKind::StorageIoError, description, detail, source: error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn memory_stage() -> Stage {
        let operator = Operator::new(services::Memory::default())
            .expect("memory operator should build")
            .finish();

        Stage::with_operator(operator, "staging-test")
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let stage = memory_stage();

        stage.put("trades_1.json", b"{\"id\":1}\n".to_vec()).await.unwrap();

        let payload = stage.get("trades_1.json").await.unwrap();
        assert_eq!(payload, b"{\"id\":1}\n");
    }

    #[tokio::test]
    async fn delete_all_removes_every_object() {
        let stage = memory_stage();

        stage.put("trades_1.json", b"a".to_vec()).await.unwrap();
        stage.put("trades_2.json", b"b".to_vec()).await.unwrap();

        let removed = stage.delete_all().await.unwrap();
        assert_eq!(removed, 2);
        assert!(stage.list_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_all_on_empty_bucket_is_a_noop() {
        let stage = memory_stage();

        assert_eq!(stage.delete_all().await.unwrap(), 0);
    }

    #[test]
    fn staged_keys_carry_dataset_and_timestamp() {
        let timestamp = Utc.with_ymd_and_hms(2026, 8, 5, 12, 30, 45).unwrap();
        let key = staged_object_key("trades", timestamp, "json");

        assert_eq!(key, "trades_2026-08-05T12:30:45.000000Z.json");
    }
}

//! Generic content-addressed record persistence.
//!
//! Alerts, matrix configs, and matrix actions are all "persist this under
//! its own content hash, as JSON, with the default TTL" — the same shape
//! for three different entity types, per the data model's `Alert`,
//! `MatrixConfig`, `MatrixAction` records. This module implements that
//! shape once, generically over [`sv_common::ContentAddressed`].

use std::marker::PhantomData;
use std::time::Duration;

use std::sync::Arc;
use sv_common::ContentAddressed;

use crate::error::Result;
use crate::store::{StateStore, DEFAULT_TTL};

pub struct RecordStore<T> {
    store: Arc<dyn StateStore>,
    ttl: Duration,
    _marker: PhantomData<T>,
}

impl<T: ContentAddressed> RecordStore<T> {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            ttl: DEFAULT_TTL,
            _marker: PhantomData,
        }
    }

    /// Persists `record` under its content hash and returns that hash.
    /// Two records with identical content collapse onto the same key.
    pub async fn put(&self, record: &T) -> Result<String> {
        let id = record.content_hash();
        let bytes = serde_json::to_vec(record)?;
        self.store.set(&id, bytes, Some(self.ttl)).await?;
        Ok(id)
    }

    pub async fn get(&self, id: &str) -> Result<Option<T>> {
        match self.store.get(id).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fake::FakeStore;
    use std::time::Duration as StdDuration;
    use sv_common::{Alert, DeviationCondition, SignalStrategy};

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let records: RecordStore<Alert> = RecordStore::new(Arc::new(FakeStore::new()));
        let alert = Alert::new(
            DeviationCondition {
                signal: "server_load_1m".to_string(),
                timeframe: StdDuration::from_secs(60),
                difference: 50,
            },
            "{{signal}} moved".to_string(),
            None,
            None,
            60,
            SignalStrategy::OldestNewest,
        );

        let id = records.put(&alert).await.unwrap();
        assert_eq!(id, alert.id);

        let fetched = records.get(&id).await.unwrap().unwrap();
        assert_eq!(fetched.id, alert.id);
    }

    #[tokio::test]
    async fn missing_id_returns_none() {
        let records: RecordStore<Alert> = RecordStore::new(Arc::new(FakeStore::new()));
        assert!(records.get("nonexistent").await.unwrap().is_none());
    }
}

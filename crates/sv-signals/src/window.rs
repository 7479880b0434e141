//! Time-Series Window store (C2): a process-wide, per-signal sliding
//! horizon of readings.
//!
//! Concurrent writers to distinct signal names proceed independently;
//! writers to the same name are serialized behind a per-name lock so the
//! append-then-truncate sequence is atomic with respect to concurrent
//! readers. A persistence hook mirrors each window to the state store on a
//! scheduled cadence and on shutdown; on startup the map is hydrated back
//! from the store.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use sv_common::{Reading, Window};
use sv_store::{decode_window, encode_window, StateStore};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

/// Store key for the set of known external signal names.
const EXTERNAL_SIGNALS_KEY: &str = "signals";

pub struct TimeSeriesStore {
    windows: DashMap<String, Arc<AsyncMutex<Window>>>,
    store: Arc<dyn StateStore>,
}

impl TimeSeriesStore {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            windows: DashMap::new(),
            store,
        }
    }

    fn entry(&self, name: &str) -> Arc<AsyncMutex<Window>> {
        self.windows
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(Window::new())))
            .clone()
    }

    /// Appends `(now, value)` to `name`'s window and returns the full
    /// current window. Used for built-in signals, whose readings are
    /// never tracked in the external-signals set.
    pub async fn ingest(&self, name: &str, value: f64) -> Window {
        let slot = self.entry(name);
        let mut window = slot.lock().await;
        window.push(Reading::new(value));
        window.clone()
    }

    /// Same as [`ingest`](Self::ingest), but also records `name` in the
    /// store's set of known external signals, per the persisted-state
    /// contract (`signals` key). Used for readings arriving through the
    /// admin API's ingest operation.
    pub async fn ingest_external(&self, name: &str, value: f64) -> sv_store::Result<Window> {
        self.store.sadd(EXTERNAL_SIGNALS_KEY, name).await?;
        Ok(self.ingest(name, value).await)
    }

    /// Removes readings older than `horizon` and any `NaN` values,
    /// returning the truncated window.
    pub async fn truncate(&self, name: &str, horizon: Duration) -> Window {
        let slot = self.entry(name);
        let mut window = slot.lock().await;
        window.truncate(Utc::now(), horizon);
        window.clone()
    }

    /// Returns the current window without mutating it.
    pub async fn snapshot(&self, name: &str) -> Window {
        let slot = self.entry(name);
        slot.lock().await.clone()
    }

    /// Serializes one signal's window to the store under its raw name.
    pub async fn persist(&self, name: &str) -> sv_store::Result<()> {
        let window = self.snapshot(name).await;
        let encoded = encode_window(&window);
        self.store
            .set(name, encoded, Some(sv_store::DEFAULT_TTL))
            .await
    }

    /// Persists every known window. Called on the scheduled persistence
    /// cadence and on shutdown.
    pub async fn persist_all(&self) {
        let names: Vec<String> = self.windows.iter().map(|e| e.key().clone()).collect();
        for name in names {
            if let Err(err) = self.persist(&name).await {
                warn!(signal = %name, error = %err, "failed to persist window");
            }
        }
    }

    /// Hydrates the in-memory map from the store on startup: the known
    /// external-signal names plus any built-in names the caller already
    /// knows about (so their history survives a restart too).
    pub async fn hydrate(&self, known_builtin_names: &[String]) -> sv_store::Result<()> {
        let mut names = self.store.smembers(EXTERNAL_SIGNALS_KEY).await?;
        names.extend(known_builtin_names.iter().cloned());

        for name in names {
            if let Some(bytes) = self.store.get(&name).await? {
                match decode_window(&bytes) {
                    Ok(window) => {
                        self.windows
                            .insert(name.clone(), Arc::new(AsyncMutex::new(window)));
                        debug!(signal = %name, "hydrated window from store");
                    }
                    Err(err) => {
                        warn!(signal = %name, error = %err, "stored window frame is malformed, starting empty");
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sv_store::fake::FakeStore;

    #[tokio::test]
    async fn ingest_then_truncate_drops_stale_readings() {
        let ts = TimeSeriesStore::new(Arc::new(FakeStore::new()));
        ts.ingest("server_load_1m", 1.0).await;
        ts.ingest("server_load_1m", 2.0).await;

        let snapshot = ts.snapshot("server_load_1m").await;
        assert_eq!(snapshot.len(), 2);

        let truncated = ts.truncate("server_load_1m", Duration::from_secs(0)).await;
        assert!(truncated.is_empty());
    }

    #[tokio::test]
    async fn ingest_external_tracks_signal_name() {
        let store = Arc::new(FakeStore::new());
        let ts = TimeSeriesStore::new(store.clone());
        ts.ingest_external("custom_metric", 3.0).await.unwrap();
        assert_eq!(
            store.smembers(EXTERNAL_SIGNALS_KEY).await.unwrap(),
            vec!["custom_metric".to_string()]
        );
    }

    #[tokio::test]
    async fn persist_and_hydrate_round_trips() {
        let store = Arc::new(FakeStore::new());
        let ts = TimeSeriesStore::new(store.clone());
        ts.ingest("btc_price", 65000.0).await;
        ts.persist("btc_price").await.unwrap();

        let reloaded = TimeSeriesStore::new(store);
        reloaded
            .hydrate(&["btc_price".to_string()])
            .await
            .unwrap();
        let snapshot = reloaded.snapshot("btc_price").await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.readings[0].value, 65000.0);
    }

    #[tokio::test]
    async fn distinct_names_do_not_interfere() {
        let ts = TimeSeriesStore::new(Arc::new(FakeStore::new()));
        ts.ingest("a", 1.0).await;
        ts.ingest("b", 2.0).await;
        assert_eq!(ts.snapshot("a").await.len(), 1);
        assert_eq!(ts.snapshot("b").await.len(), 1);
    }
}

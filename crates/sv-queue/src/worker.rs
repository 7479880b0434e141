//! Message Queue Worker (C8): a single concurrent worker draining the
//! store's `injest` FIFO list and driving the Matrix client.
//!
//! State machine per entry: `QUEUED -> IN_FLIGHT -> {DELIVERED, QUEUED
//! (retry), DROPPED (max_attempts | bad_encoding)}`. At-least-once:
//! duplicates are possible if the Matrix call succeeds but the worker
//! crashes before the pop is durable.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use sv_common::{MatrixConfig, MessageDelivery};
use sv_store::StateStore;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::matrix_client::MatrixClient;

/// The FIFO key the worker pops from, populated by the matrix sink.
pub const QUEUE_KEY: &str = "injest";

/// Between-iteration backoff on an empty queue, and between retries:
/// uniform `[1, 5]` seconds.
const IDLE_SLEEP_MIN_SECS: f64 = 1.0;
const IDLE_SLEEP_MAX_SECS: f64 = 5.0;

pub struct QueueWorker {
    store: Arc<dyn StateStore>,
    matrix_client: Arc<dyn MatrixClient>,
    matrix_config: MatrixConfig,
    delivery_interval: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl QueueWorker {
    pub fn new(
        store: Arc<dyn StateStore>,
        matrix_client: Arc<dyn MatrixClient>,
        matrix_config: MatrixConfig,
        delivery_interval: Duration,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            matrix_client,
            matrix_config,
            delivery_interval,
            shutdown_rx,
        }
    }

    /// Runs the worker loop until shutdown fires. Cancellation is
    /// cooperative at the top of each iteration.
    pub async fn run(mut self) {
        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }

            match self.store.rpop(QUEUE_KEY).await {
                Ok(Some(bytes)) => {
                    if self.process_one(bytes).await {
                        // A retry or a transient fetch issue already slept internally.
                    }
                }
                Ok(None) => {
                    if self.sleep_idle().await {
                        break;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "queue pop failed, backing off");
                    if self.sleep_idle().await {
                        break;
                    }
                }
            }
        }
        debug!("queue worker loop exited");
    }

    /// Handles one popped entry. Returns true if the loop should move on
    /// without an extra idle sleep (it already slept as part of pacing or
    /// a retry).
    async fn process_one(&mut self, bytes: Vec<u8>) -> bool {
        let delivery: MessageDelivery = match serde_json::from_slice(&bytes) {
            Ok(d) => d,
            Err(err) => {
                warn!(error = %err, "dropping queue entry with malformed encoding");
                sv_common::metrics::record_queue_dropped("malformed");
                return true;
            }
        };

        if delivery.exhausted() {
            warn!(
                room = %delivery.message.room,
                attempts = delivery.attempts,
                "dropping queue entry: max attempts exceeded"
            );
            sv_common::metrics::record_queue_dropped("max_attempts");
            return true;
        }

        self.pace().await;

        match self.matrix_client.send(&self.matrix_config, &delivery.message).await {
            Ok(()) => {
                info!(room = %delivery.message.room, "delivered queued message");
                sv_common::metrics::record_queue_delivered();
                true
            }
            Err(err) => {
                let retried = delivery.retried();
                warn!(
                    room = %retried.message.room,
                    attempts = retried.attempts,
                    error = %err,
                    "delivery failed, re-queueing"
                );
                sv_common::metrics::record_queue_retried();
                if let Ok(bytes) = serde_json::to_vec(&retried) {
                    if let Err(e) = self.store.lpush(QUEUE_KEY, bytes).await {
                        warn!(error = %e, "failed to re-queue entry after delivery failure");
                    }
                }
                self.sleep_idle().await;
                true
            }
        }
    }

    /// Adaptive pacing: `S / max(N, 1)` seconds, where `S` is the
    /// configured delivery interval in seconds and `N` is the current
    /// queue length sampled once per iteration. Smooths delivery so a
    /// backlog drains over roughly one delivery interval regardless of
    /// depth — a target rate, not a guarantee.
    async fn pace(&self) {
        let n = self.store.llen(QUEUE_KEY).await.unwrap_or(0);
        sv_common::metrics::set_queue_depth(n);
        let n = n.max(1);
        let s = self.delivery_interval.as_secs_f64();
        let sleep_secs = s / n as f64;
        if sleep_secs > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(sleep_secs)).await;
        }
    }

    /// Sleeps a fresh uniform `[1, 5]` seconds, returning early (`true`)
    /// if shutdown fires mid-sleep.
    async fn sleep_idle(&mut self) -> bool {
        let secs = rand::thread_rng().gen_range(IDLE_SLEEP_MIN_SECS..=IDLE_SLEEP_MAX_SECS);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs_f64(secs)) => false,
            _ = self.shutdown_rx.changed() => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use sv_common::{AlertingError, MatrixMessage, Result};
    use sv_store::fake::FakeStore;

    struct AlwaysFails;
    #[async_trait]
    impl MatrixClient for AlwaysFails {
        async fn send(&self, _config: &MatrixConfig, _message: &MatrixMessage) -> Result<()> {
            Err(AlertingError::QueueTransportError("boom".to_string()))
        }
    }

    struct AlwaysSucceeds(Arc<AtomicUsize>);
    #[async_trait]
    impl MatrixClient for AlwaysSucceeds {
        async fn send(&self, _config: &MatrixConfig, _message: &MatrixMessage) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_config() -> MatrixConfig {
        MatrixConfig {
            host: "https://matrix.example.org".to_string(),
            user: "bot".to_string(),
            password: "secret".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn successful_delivery_commits_the_entry() {
        let store = Arc::new(FakeStore::new());
        let delivered = Arc::new(AtomicUsize::new(0));
        store
            .lpush(
                QUEUE_KEY,
                serde_json::to_vec(&MessageDelivery::new("!r:h".to_string(), "hi".to_string())).unwrap(),
            )
            .await
            .unwrap();

        let (_tx, rx) = watch::channel(false);
        let mut worker = QueueWorker::new(
            store.clone(),
            Arc::new(AlwaysSucceeds(delivered.clone())),
            test_config(),
            Duration::from_secs(1),
            rx,
        );

        let bytes = store.rpop(QUEUE_KEY).await.unwrap().unwrap();
        worker.process_one(bytes).await;

        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        assert_eq!(store.llen(QUEUE_KEY).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_delivery_requeues_with_incremented_attempts() {
        let store = Arc::new(FakeStore::new());
        let (_tx, rx) = watch::channel(false);
        let mut worker = QueueWorker::new(
            store.clone(),
            Arc::new(AlwaysFails),
            test_config(),
            Duration::from_secs(1),
            rx,
        );

        let delivery = MessageDelivery::new("!r:h".to_string(), "hi".to_string()).with_max_attempts(2);
        worker.process_one(serde_json::to_vec(&delivery).unwrap()).await;

        assert_eq!(store.llen(QUEUE_KEY).await.unwrap(), 1);
        let requeued: MessageDelivery =
            serde_json::from_slice(&store.rpop(QUEUE_KEY).await.unwrap().unwrap()).unwrap();
        assert_eq!(requeued.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn max_attempts_exceeded_drops_without_requeue() {
        let store = Arc::new(FakeStore::new());
        let (_tx, rx) = watch::channel(false);
        let mut worker = QueueWorker::new(
            store.clone(),
            Arc::new(AlwaysFails),
            test_config(),
            Duration::from_secs(1),
            rx,
        );

        let delivery = MessageDelivery {
            message: sv_common::MatrixMessage {
                room: "!r:h".to_string(),
                message: "hi".to_string(),
            },
            attempts: 2,
            max_attempts: 2,
        };
        worker.process_one(serde_json::to_vec(&delivery).unwrap()).await;

        assert_eq!(store.llen(QUEUE_KEY).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn malformed_entry_is_dropped_not_requeued() {
        let store = Arc::new(FakeStore::new());
        let (_tx, rx) = watch::channel(false);
        let mut worker = QueueWorker::new(
            store.clone(),
            Arc::new(AlwaysFails),
            test_config(),
            Duration::from_secs(1),
            rx,
        );

        worker.process_one(b"not json".to_vec()).await;
        assert_eq!(store.llen(QUEUE_KEY).await.unwrap(), 0);
    }
}

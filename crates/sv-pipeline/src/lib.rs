//! Wires one alert's sampling iteration together: the data flow that runs
//! under each of the Scheduler's per-alert tasks.
//!
//! `Scheduler -> Signal producer -> Time-Series Window -> Deviation
//! Evaluator -> Cooloff Gate -> Renderer -> Sink`.
//!
//! Built-in signals are sampled here each iteration; external signals have
//! no sampler, so the iteration just re-evaluates whatever the admin
//! API's ingest operation has already appended to the window.

use std::sync::Arc;

use chrono::Utc;
use sv_common::{Alert, Result};
use sv_evaluator::{evaluate, render, CooloffGate};
use sv_signals::{SignalRegistry, TimeSeriesStore};
use sv_sinks::Sink;
use sv_store::RecordStore;
use tracing::{debug, warn};

/// Shared dependencies an alert's scheduled task needs to run one
/// iteration of the pipeline.
pub struct AlertRuntime {
    pub registry: Arc<SignalRegistry>,
    pub windows: Arc<TimeSeriesStore>,
    pub alerts: Arc<RecordStore<Alert>>,
}

impl AlertRuntime {
    pub fn new(
        registry: Arc<SignalRegistry>,
        windows: Arc<TimeSeriesStore>,
        alerts: Arc<RecordStore<Alert>>,
    ) -> Self {
        Self {
            registry,
            windows,
            alerts,
        }
    }

    /// Runs one iteration of the pipeline for `alert_id`, delivering
    /// through `sink` if the deviation check fires and the cooloff gate
    /// permits it.
    ///
    /// Every error kind this touches is caught here and logged rather than
    /// propagated, so a single bad sample or rejected message never kills
    /// the scheduled task: this returns `Ok(())` in every case except "the
    /// alert itself has vanished from the store", which is a signal to
    /// the caller that the scheduled task should probably stop.
    pub async fn run_iteration(&self, alert_id: &str, sink: &dyn Sink) -> anyhow::Result<()> {
        let Some(mut alert) = self.alerts.get(alert_id).await? else {
            anyhow::bail!("alert {alert_id} no longer exists in the store");
        };

        self.sample_if_builtin(&alert).await;

        let window = self
            .windows
            .truncate(&alert.condition.signal, alert.condition.timeframe)
            .await;

        let Some(reading) = evaluate(&alert.condition, alert.strategy, &window) else {
            return Ok(());
        };
        if reading.diff < alert.condition.difference {
            return Ok(());
        }

        let now = Utc::now();
        if !CooloffGate::permits(&alert, now) {
            debug!(alert_id, "suppressed by cooloff gate");
            sv_common::metrics::record_cooloff_suppressed(&alert.condition.signal);
            return Ok(());
        }

        let message = match render(&alert, &reading) {
            Ok(message) => message,
            Err(err) => {
                warn!(alert_id, error = %err, "message rejected, dropping this notification");
                return Ok(());
            }
        };

        // The stamp stands whether or not the sink itself ultimately
        // succeeds: the cooloff is about not re-evaluating too often, not
        // about delivery guarantees. Message retries are the queue
        // worker's job, not the evaluator's.
        CooloffGate::stamp(&mut alert, now);
        sv_common::metrics::record_notification_fired(&alert.condition.signal);
        if let Err(err) = sink.deliver(&alert, &message).await {
            warn!(alert_id, error = %err, "sink delivery failed");
        }

        if let Err(err) = self.alerts.put(&alert).await {
            warn!(alert_id, error = %err, "failed to persist cooloff stamp");
        }

        Ok(())
    }

    async fn sample_if_builtin(&self, alert: &Alert) {
        let signal = &alert.condition.signal;
        if !self.registry.is_builtin(signal) {
            return;
        }
        match self.registry.sample(signal).await {
            Ok(value) => {
                self.windows.ingest(signal, value).await;
            }
            Err(err) => {
                let kind = match &err {
                    sv_common::AlertingError::SamplerFatal(_) => "fatal",
                    _ => "transient",
                };
                sv_common::metrics::record_sampler_failure(signal, kind);
                warn!(signal = %signal, error = %err, "sampler failed this iteration, schedule continues");
            }
        }
    }

    /// sv_common's Result alias, re-exported so callers constructing the
    /// runtime don't need to depend on sv-common just for this.
    pub async fn alert_exists(&self, alert_id: &str) -> Result<bool> {
        Ok(self.alerts.get(alert_id).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use sv_common::{DeviationCondition, SignalStrategy};
    use sv_store::fake::FakeStore;

    struct RecordingSink {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Sink for RecordingSink {
        async fn deliver(&self, _alert: &Alert, _message: &str) -> Result<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_runtime() -> (AlertRuntime, Arc<FakeStore>) {
        let store = Arc::new(FakeStore::new());
        let registry = Arc::new(SignalRegistry::new());
        let windows = Arc::new(TimeSeriesStore::new(store.clone()));
        let alerts = Arc::new(RecordStore::new(store.clone()));
        (AlertRuntime::new(registry, windows, alerts), store)
    }

    #[tokio::test]
    async fn fires_exactly_once_for_a_qualifying_external_signal() {
        let (runtime, _store) = test_runtime();
        let alert = Alert::new(
            DeviationCondition {
                signal: "custom_metric".to_string(),
                timeframe: Duration::from_secs(60),
                difference: 50,
            },
            "{{signal}} moved {{diff}}% ({{direction}})".to_string(),
            Some("!ops:example.org".to_string()),
            Some(Duration::from_secs(10)),
            1,
            SignalStrategy::OldestNewest,
        );
        runtime.alerts.put(&alert).await.unwrap();

        runtime.windows.ingest("custom_metric", 1.0).await;
        runtime.windows.ingest("custom_metric", 2.5).await;

        let count = Arc::new(AtomicUsize::new(0));
        let sink = RecordingSink { count: count.clone() };

        runtime.run_iteration(&alert.id, &sink).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Within cooloff: no second notification even though the window
        // still deviates.
        runtime.run_iteration(&alert.id, &sink).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_alert_errors_so_the_caller_can_stop_the_task() {
        let (runtime, _store) = test_runtime();
        let count = Arc::new(AtomicUsize::new(0));
        let sink = RecordingSink { count };
        assert!(runtime.run_iteration("nonexistent", &sink).await.is_err());
    }

    #[tokio::test]
    async fn below_threshold_does_not_notify() {
        let (runtime, _store) = test_runtime();
        let alert = Alert::new(
            DeviationCondition {
                signal: "custom_metric".to_string(),
                timeframe: Duration::from_secs(60),
                difference: 90,
            },
            "{{signal}}".to_string(),
            None,
            None,
            1,
            SignalStrategy::OldestNewest,
        );
        runtime.alerts.put(&alert).await.unwrap();
        runtime.windows.ingest("custom_metric", 1.0).await;
        runtime.windows.ingest("custom_metric", 1.1).await;

        let count = Arc::new(AtomicUsize::new(0));
        let sink = RecordingSink { count: count.clone() };
        runtime.run_iteration(&alert.id, &sink).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}

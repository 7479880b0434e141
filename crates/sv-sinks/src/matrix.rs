//! The matrix sink: construct `{ room, message }` and enqueue into the
//! Message Queue. Success means "successfully enqueued", not "delivered to
//! the room" — actual delivery is the queue worker's job (C8).

use std::sync::Arc;

use async_trait::async_trait;
use sv_common::{Alert, AlertingError, MessageDelivery, Result};

use crate::enqueue::QueueEnqueuer;
use crate::Sink;

pub struct MatrixSink {
    enqueuer: Arc<dyn QueueEnqueuer>,
}

impl MatrixSink {
    pub fn new(enqueuer: Arc<dyn QueueEnqueuer>) -> Self {
        Self { enqueuer }
    }
}

#[async_trait]
impl Sink for MatrixSink {
    async fn deliver(&self, alert: &Alert, message: &str) -> Result<()> {
        let room = alert.room.clone().ok_or_else(|| {
            AlertingError::SinkTransient(format!("alert {} has no room configured", alert.id))
        })?;
        let delivery = MessageDelivery::new(room, message.to_string());
        self.enqueuer.enqueue(delivery).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use sv_common::{DeviationCondition, SignalStrategy};
    use sv_store::fake::FakeStore;

    use crate::enqueue::RedisEnqueuer;

    fn test_alert(room: Option<&str>) -> Alert {
        Alert::new(
            DeviationCondition {
                signal: "x".to_string(),
                timeframe: Duration::from_secs(60),
                difference: 10,
            },
            "{{signal}}".to_string(),
            room.map(str::to_string),
            None,
            60,
            SignalStrategy::OldestNewest,
        )
    }

    #[tokio::test]
    async fn enqueues_when_room_is_set() {
        let store = Arc::new(FakeStore::new());
        let sink = MatrixSink::new(Arc::new(RedisEnqueuer::new(store.clone())));
        sink.deliver(&test_alert(Some("!ops:example.org")), "hi")
            .await
            .unwrap();
        assert_eq!(store.llen(crate::enqueue::QUEUE_KEY).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rejects_alert_without_a_room() {
        let store = Arc::new(FakeStore::new());
        let sink = MatrixSink::new(Arc::new(RedisEnqueuer::new(store)));
        assert!(sink.deliver(&test_alert(None), "hi").await.is_err());
    }
}

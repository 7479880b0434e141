//! Queue transport for the matrix sink: enqueue a [`MessageDelivery`]
//! either directly against the store's `injest` list, or over HTTP to a
//! remote queue service (`MESSAGE_QUEUE`).

use async_trait::async_trait;
use sv_common::{AlertingError, MessageDelivery, Result};
use sv_store::StateStore;

/// The FIFO key the message queue worker drains.
pub const QUEUE_KEY: &str = "injest";

#[async_trait]
pub trait QueueEnqueuer: Send + Sync {
    async fn enqueue(&self, delivery: MessageDelivery) -> Result<()>;
}

/// Pushes straight onto the store's list, head-first (`LPUSH`), matching
/// the worker's tail-pop (`RPOP`) consumption order.
pub struct RedisEnqueuer {
    store: std::sync::Arc<dyn StateStore>,
}

impl RedisEnqueuer {
    pub fn new(store: std::sync::Arc<dyn StateStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl QueueEnqueuer for RedisEnqueuer {
    async fn enqueue(&self, delivery: MessageDelivery) -> Result<()> {
        let bytes = serde_json::to_vec(&delivery)?;
        self.store
            .lpush(QUEUE_KEY, bytes)
            .await
            .map_err(|e| AlertingError::SinkTransient(format!("enqueue failed: {e}")))
    }
}

/// Posts the delivery to a remote queue service over HTTP, used when
/// `MESSAGE_QUEUE` names an external enqueue endpoint instead of a direct
/// store connection.
pub struct HttpEnqueuer {
    client: reqwest::Client,
    url: String,
}

impl HttpEnqueuer {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl QueueEnqueuer for HttpEnqueuer {
    async fn enqueue(&self, delivery: MessageDelivery) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&delivery)
            .send()
            .await
            .map_err(|e| AlertingError::SinkTransient(format!("enqueue HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AlertingError::SinkTransient(format!(
                "enqueue HTTP request returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sv_store::fake::FakeStore;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn redis_enqueuer_lpushes_encoded_delivery() {
        let store = std::sync::Arc::new(FakeStore::new());
        let enqueuer = RedisEnqueuer::new(store.clone());
        enqueuer
            .enqueue(MessageDelivery::new("!room:host".to_string(), "hi".to_string()))
            .await
            .unwrap();
        assert_eq!(store.llen(QUEUE_KEY).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn http_enqueuer_posts_to_configured_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let enqueuer = HttpEnqueuer::new(reqwest::Client::new(), server.uri());
        enqueuer
            .enqueue(MessageDelivery::new("!room:host".to_string(), "hi".to_string()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn http_enqueuer_surfaces_non_success_as_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let enqueuer = HttpEnqueuer::new(reqwest::Client::new(), server.uri());
        let err = enqueuer
            .enqueue(MessageDelivery::new("!room:host".to_string(), "hi".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AlertingError::SinkTransient(_)));
    }
}

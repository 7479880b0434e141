//! Redis-backed state store: the key/value, list, and set primitives
//! consumed by the rest of the service.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::{Result, StoreError};

/// All entries except the message queue carry this TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Key/value, list, and set primitives against the backing store. Kept as
/// a trait so the rest of the service (window persistence, alert storage,
/// the queue worker) can be exercised against an in-memory fake in tests.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;
    async fn lpush(&self, key: &str, value: Vec<u8>) -> Result<()>;
    async fn rpop(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn llen(&self, key: &str) -> Result<usize>;
    async fn sadd(&self, key: &str, member: &str) -> Result<()>;
    async fn smembers(&self, key: &str) -> Result<Vec<String>>;
}

/// Redis implementation, built on a cloneable [`ConnectionManager`] the
/// same way the standby leader election keeps one around per instance.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client =
            redis::Client::open(redis_url).map_err(|e| StoreError::Connection(e.to_string()))?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl StateStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => {
                let _: () = conn.set_ex(key, value, ttl.as_secs()).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn lpush(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.lpush(key, value).await?;
        Ok(())
    }

    async fn rpop(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.rpop(key, None).await?;
        Ok(value)
    }

    async fn llen(&self, key: &str) -> Result<usize> {
        let mut conn = self.conn.clone();
        let len: usize = conn.llen(key).await?;
        Ok(len)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.sadd(key, member).await?;
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.smembers(key).await?;
        Ok(members)
    }
}

/// In-memory `StateStore` used by unit tests across the workspace so each
/// crate doesn't need a live Redis instance to exercise its logic.
pub mod fake {
    use super::*;
    use std::collections::{HashMap, HashSet, VecDeque};
    use tokio::sync::Mutex;

    #[derive(Default)]
    pub struct FakeStore {
        values: Mutex<HashMap<String, Vec<u8>>>,
        lists: Mutex<HashMap<String, VecDeque<Vec<u8>>>>,
        sets: Mutex<HashMap<String, HashSet<String>>>,
    }

    impl FakeStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl StateStore for FakeStore {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            Ok(self.values.lock().await.get(key).cloned())
        }

        async fn set(&self, key: &str, value: Vec<u8>, _ttl: Option<Duration>) -> Result<()> {
            self.values.lock().await.insert(key.to_string(), value);
            Ok(())
        }

        async fn lpush(&self, key: &str, value: Vec<u8>) -> Result<()> {
            self.lists
                .lock()
                .await
                .entry(key.to_string())
                .or_default()
                .push_front(value);
            Ok(())
        }

        async fn rpop(&self, key: &str) -> Result<Option<Vec<u8>>> {
            Ok(self
                .lists
                .lock()
                .await
                .get_mut(key)
                .and_then(|list| list.pop_back()))
        }

        async fn llen(&self, key: &str) -> Result<usize> {
            Ok(self
                .lists
                .lock()
                .await
                .get(key)
                .map(|list| list.len())
                .unwrap_or(0))
        }

        async fn sadd(&self, key: &str, member: &str) -> Result<()> {
            self.sets
                .lock()
                .await
                .entry(key.to_string())
                .or_default()
                .insert(member.to_string());
            Ok(())
        }

        async fn smembers(&self, key: &str) -> Result<Vec<String>> {
            Ok(self
                .sets
                .lock()
                .await
                .get(key)
                .map(|set| set.iter().cloned().collect())
                .unwrap_or_default())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use tracing::debug;

        #[tokio::test]
        async fn fake_store_round_trips_list_and_set_ops() {
            let store = FakeStore::new();
            store.lpush("q", b"a".to_vec()).await.unwrap();
            store.lpush("q", b"b".to_vec()).await.unwrap();
            assert_eq!(store.llen("q").await.unwrap(), 2);
            assert_eq!(store.rpop("q").await.unwrap(), Some(b"a".to_vec()));

            store.sadd("signals", "btc_price").await.unwrap();
            store.sadd("signals", "btc_price").await.unwrap();
            assert_eq!(store.smembers("signals").await.unwrap(), vec!["btc_price"]);

            debug!("fake store exercised");
        }
    }
}

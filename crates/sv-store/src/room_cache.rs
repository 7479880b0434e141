//! Room-alias → room-id cache used by the Matrix client.
//!
//! Persistent across restarts as a documented JSON schema on disk,
//! replacing the opaque language-specific "pickled" snapshot the source
//! used for the same purpose.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::Result;

#[derive(Debug, Default, Serialize, Deserialize)]
struct RoomCacheSnapshot {
    #[serde(default)]
    aliases: HashMap<String, String>,
}

/// Loaded from a state snapshot on start and saved after each successful
/// resolution, per the persisted-state contract.
pub struct RoomAliasCache {
    path: PathBuf,
    aliases: RwLock<HashMap<String, String>>,
}

impl RoomAliasCache {
    /// Loads the cache from `path` if it exists; an absent or unreadable
    /// file just starts the cache empty.
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let aliases = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<RoomCacheSnapshot>(&bytes)
                .map(|s| s.aliases)
                .unwrap_or_else(|e| {
                    warn!(error = %e, "room alias cache snapshot is malformed, starting empty");
                    HashMap::new()
                }),
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            aliases: RwLock::new(aliases),
        }
    }

    pub async fn get(&self, alias: &str) -> Option<String> {
        self.aliases.read().await.get(alias).cloned()
    }

    /// Records a resolved alias and persists the whole cache to disk.
    pub async fn put(&self, alias: String, room_id: String) -> Result<()> {
        {
            let mut aliases = self.aliases.write().await;
            aliases.insert(alias, room_id);
        }
        self.save().await
    }

    async fn save(&self) -> Result<()> {
        let snapshot = RoomCacheSnapshot {
            aliases: self.aliases.read().await.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        if let Some(parent) = self.path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        tokio::fs::write(&self.path, bytes).await.map_err(|e| {
            crate::error::StoreError::Connection(format!("writing room cache snapshot: {e}"))
        })?;
        debug!(path = %self.path.display(), "persisted room alias cache");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let cache = RoomAliasCache::load(&path).await;
        assert_eq!(cache.get("!ops:example.org").await, None);
        cache
            .put("!ops:example.org".to_string(), "!abc123:example.org".to_string())
            .await
            .unwrap();

        let reloaded = RoomAliasCache::load(&path).await;
        assert_eq!(
            reloaded.get("!ops:example.org").await,
            Some("!abc123:example.org".to_string())
        );
    }

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let cache = RoomAliasCache::load("/nonexistent/path/state.json").await;
        assert_eq!(cache.get("anything").await, None);
    }
}

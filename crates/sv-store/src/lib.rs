//! State Store Adapter (C9).
//!
//! Wraps Redis with the handful of primitives the rest of the service
//! needs — get/set with TTL, list push/pop/len, set add/members — plus the
//! wire formats for persisted windows and the Matrix room-alias cache.
//!
//! ```no_run
//! use sv_store::{RedisStore, StateStore};
//!
//! async fn example() {
//!     let store = RedisStore::connect("redis://127.0.0.1:6379").await.unwrap();
//!     store.sadd("signals", "btc_price").await.unwrap();
//! }
//! ```
//!
//! There is deliberately no leader election here: multi-replica fail-over
//! is out of scope, so the store is the single coordination point rather
//! than a lock target.

mod error;
mod record_store;
mod room_cache;
mod store;
mod window_codec;

pub use error::{Result, StoreError};
pub use record_store::RecordStore;
pub use room_cache::RoomAliasCache;
pub use store::fake;
pub use store::{fake::FakeStore, RedisStore, StateStore, DEFAULT_TTL};
pub use window_codec::{decode as decode_window, encode as encode_window};

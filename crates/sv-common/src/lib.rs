//! Shared domain types for the signal deviation alerting service.
//!
//! This crate holds the data model described by the system's core
//! components: signals, readings, windows, alerts, and the records that
//! travel through the message queue. Nothing here talks to Redis, HTTP, or
//! the filesystem directly — those live in their own crates.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

pub mod logging;
pub mod metrics;

// ============================================================================
// Signals & Readings
// ============================================================================

/// A single timestamped scalar reading for a named signal.
///
/// Timestamps are assigned at ingest time, not by the producer, per the
/// data model: `Reading: a pair (timestamp, value) keyed by signal name`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl Reading {
    pub fn new(value: f64) -> Self {
        Self { timestamp: Utc::now(), value }
    }

    pub fn at(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// An ordered, append-only sequence of readings for one signal, kept sorted
/// by timestamp ascending. A window is created on first reading and never
/// explicitly destroyed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Window {
    pub readings: Vec<Reading>,
}

impl Window {
    pub fn new() -> Self {
        Self { readings: Vec::new() }
    }

    /// Appends a reading, preserving ascending timestamp order. Readings at
    /// identical timestamps may coexist — monotonic clocks are not assumed.
    pub fn push(&mut self, reading: Reading) {
        let idx = self
            .readings
            .partition_point(|r| r.timestamp <= reading.timestamp);
        self.readings.insert(idx, reading);
    }

    /// Removes readings older than `horizon` relative to `now`, and any
    /// `NaN` values.
    pub fn truncate(&mut self, now: DateTime<Utc>, horizon: Duration) {
        let horizon = chrono::Duration::from_std(horizon).unwrap_or(chrono::Duration::zero());
        let cutoff = now - horizon;
        self.readings
            .retain(|r| r.timestamp > cutoff && !r.value.is_nan());
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn earliest(&self) -> Option<&Reading> {
        self.readings.first()
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.readings.last()
    }

    pub fn min_value(&self) -> Option<f64> {
        self.readings
            .iter()
            .map(|r| r.value)
            .fold(None, |acc, v| match acc {
                None => Some(v),
                Some(a) => Some(a.min(v)),
            })
    }

    pub fn max_value(&self) -> Option<f64> {
        self.readings
            .iter()
            .map(|r| r.value)
            .fold(None, |acc, v| match acc {
                None => Some(v),
                Some(a) => Some(a.max(v)),
            })
    }
}

// ============================================================================
// Alerts
// ============================================================================

/// `{ signal, timeframe, difference }` — the condition an alert watches.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeviationCondition {
    pub signal: String,
    #[serde(with = "duration_secs")]
    #[schema(value_type = u64)]
    pub timeframe: Duration,
    /// Integer percent, always `>= 0`.
    pub difference: u32,
}

/// How a window is reduced to the `(first, last)` pair fed to the
/// percentage calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SignalStrategy {
    OldestNewest,
    MinMax,
}

impl Default for SignalStrategy {
    fn default() -> Self {
        SignalStrategy::OldestNewest
    }
}

fn default_poll_rate() -> u64 {
    60
}

/// A configured alert. `id` is a deterministic hash of the alert's
/// serialized fields, so two alerts with identical configuration collapse
/// to one. `last_notified` is the only field mutated after creation, and is
/// owned exclusively by the Cooloff Gate.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Alert {
    pub id: String,
    pub condition: DeviationCondition,
    pub message: String,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub last_notified: Option<DateTime<Utc>>,
    #[serde(default)]
    #[serde(with = "opt_duration_secs")]
    #[schema(value_type = Option<u64>)]
    pub cooloff: Option<Duration>,
    #[serde(default = "default_poll_rate")]
    pub poll_rate: u64,
    #[serde(default)]
    pub strategy: SignalStrategy,
}

impl Alert {
    /// Builds an alert from its configured fields, computing the content
    /// hash that serves as its id. `last_notified` starts unset.
    pub fn new(
        condition: DeviationCondition,
        message: String,
        room: Option<String>,
        cooloff: Option<Duration>,
        poll_rate: u64,
        strategy: SignalStrategy,
    ) -> Self {
        let mut alert = Self {
            id: String::new(),
            condition,
            message,
            room,
            last_notified: None,
            cooloff,
            poll_rate,
            strategy,
        };
        alert.id = alert.content_hash();
        alert
    }

    /// Deterministic hash of the fields that define the alert's identity.
    /// `id` and `last_notified` are excluded by construction.
    pub fn content_hash(&self) -> String {
        let canonical = serde_json::json!({
            "signal": self.condition.signal,
            "timeframe_secs": self.condition.timeframe.as_secs(),
            "difference": self.condition.difference,
            "message": self.message,
            "room": self.room,
            "cooloff_secs": self.cooloff.map(|d| d.as_secs()),
            "poll_rate": self.poll_rate,
            "strategy": self.strategy,
        });
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// The effective cooloff interval: the configured cooloff, or else the
    /// condition's timeframe.
    pub fn effective_cooloff(&self) -> Duration {
        self.cooloff.unwrap_or(self.condition.timeframe)
    }
}

/// Anything persisted under its own content hash as the store key: alerts,
/// matrix configs, matrix actions. Lets the store adapter's record
/// persistence be generic over the record type instead of duplicating the
/// hash-then-serialize dance per entity.
pub trait ContentAddressed: Serialize + for<'de> Deserialize<'de> {
    fn content_hash(&self) -> String;
}

impl ContentAddressed for Alert {
    fn content_hash(&self) -> String {
        Alert::content_hash(self)
    }
}

/// `{ host, user, password }`, passed by value to each delivery attempt.
///
/// The password round-trips through storage like every other field — it is
/// the admin API's response DTOs, not this type, that are responsible for
/// not echoing it back over HTTP.
#[derive(Clone, Serialize, Deserialize, ToSchema)]
pub struct MatrixConfig {
    pub host: String,
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for MatrixConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatrixConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

impl MatrixConfig {
    pub fn content_hash(&self) -> String {
        let canonical = serde_json::json!({
            "host": self.host,
            "user": self.user,
        });
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// A binding between an alert and a delivery config, as created by the
/// admin API's "create matrix action" operation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MatrixAction {
    pub alert_id: String,
    pub config_id: String,
}

impl MatrixAction {
    pub fn content_hash(&self) -> String {
        let canonical = serde_json::json!({
            "alert_id": self.alert_id,
            "config_id": self.config_id,
        });
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl ContentAddressed for MatrixConfig {
    fn content_hash(&self) -> String {
        MatrixConfig::content_hash(self)
    }
}

impl ContentAddressed for MatrixAction {
    fn content_hash(&self) -> String {
        MatrixAction::content_hash(self)
    }
}

/// The result of reducing a window and comparing it against a threshold.
/// `increased` is true iff `last > first`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct SignalReading {
    pub first: f64,
    pub last: f64,
    pub increased: bool,
    pub diff: u32,
}

impl SignalReading {
    pub fn direction(&self) -> &'static str {
        if self.increased {
            "up"
        } else {
            "down"
        }
    }
}

// ============================================================================
// Message Queue
// ============================================================================

/// The payload handed to the Matrix backend: a room and a rendered message.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MatrixMessage {
    pub room: String,
    pub message: String,
}

fn default_max_attempts() -> u32 {
    10
}

/// A queue entry. Mutation of `attempts` is owned by the queue worker and
/// occurs only via reinsertion of a new value.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageDelivery {
    pub message: MatrixMessage,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl MessageDelivery {
    pub fn new(room: String, message: String) -> Self {
        Self {
            message: MatrixMessage { room, message },
            attempts: 0,
            max_attempts: default_max_attempts(),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Returns a copy with `attempts` incremented, as pushed back onto the
    /// queue after a failed delivery attempt.
    pub fn retried(&self) -> Self {
        let mut next = self.clone();
        next.attempts += 1;
        next
    }
}

// ============================================================================
// Serde helpers
// ============================================================================

mod duration_secs {
    use super::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

mod opt_duration_secs {
    use super::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<u64>::deserialize(d)?;
        Ok(secs.map(Duration::from_secs))
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error kinds observable at the boundary, per the error handling design.
/// No exception is permitted to terminate the event loop; callers wrap
/// these in catch-log-continue frames at the top of each task.
#[derive(Debug, thiserror::Error)]
pub enum AlertingError {
    /// Network/timeout/5xx from a sampler. Policy: log warn, skip this
    /// iteration, continue schedule.
    #[error("sampler transient error: {0}")]
    SamplerTransient(String),

    /// Bad API key, schema mismatch. Policy: log error, continue schedule.
    #[error("sampler fatal error: {0}")]
    SamplerFatal(String),

    /// Empty window, zero denominator. Policy: silently skip iteration.
    #[error("evaluator input invalid: {0}")]
    EvaluatorInputInvalid(String),

    /// File unwritable, queue full, enqueue HTTP error. Policy: log warn,
    /// do not retry the evaluator, do not clear the cooloff stamp.
    #[error("sink transient error: {0}")]
    SinkTransient(String),

    /// Store unreachable. Policy: retry with backoff at the worker; do not
    /// drop the entry.
    #[error("queue transport error: {0}")]
    QueueTransportError(String),

    /// Template render fails. Policy: log warn, drop the delivery.
    #[error("message rejected: {0}")]
    MessageRejected(String),

    /// Queue worker gave up. Policy: log warn, drop the delivery.
    #[error("max attempts exceeded")]
    MaxAttemptsExceeded,

    /// Bad YAML, missing env. Policy: fatal at startup, non-zero exit.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found")]
    NotFound,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

pub type Result<T> = std::result::Result<T, AlertingError>;

//! Delivery Sinks (C7).
//!
//! A sink is a function `(alert, rendered message) -> ok | error`. Three
//! are specified: stdout, file-append, and matrix-via-queue. Sinks are
//! selected at startup by the operator — a running process has exactly
//! one sink for all alerts.

mod enqueue;
mod file;
mod matrix;
mod stdout;

pub use enqueue::{HttpEnqueuer, QueueEnqueuer, RedisEnqueuer, QUEUE_KEY};
pub use file::FileSink;
pub use matrix::MatrixSink;
pub use stdout::StdoutSink;

use async_trait::async_trait;
use sv_common::{Alert, Result};

/// A terminal delivery channel. `deliver` receives the already-rendered
/// message string — rendering (C6) happens upstream of the sink.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn deliver(&self, alert: &Alert, message: &str) -> Result<()>;
}

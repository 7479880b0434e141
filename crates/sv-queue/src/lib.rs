//! Message Queue Worker (C8).
//!
//! The durable, at-least-once FIFO that paces delivery to the Matrix
//! backend. Populated by [`sv_sinks::MatrixSink`] (head-push), drained
//! here (tail-pop). See [`QueueWorker`] for the loop itself and
//! [`matrix_client`] for the delivery contract.

mod matrix_client;
mod worker;

pub use matrix_client::{HttpMatrixClient, MatrixClient};
pub use worker::{QueueWorker, QUEUE_KEY};

//! Signal Registry (C1) and Time-Series Window store (C2).
//!
//! The registry is a process-wide mapping from lowercased signal name to a
//! factory producing an object with a single capability: `sample()`. The
//! window store is the per-signal sliding-horizon buffer that samples and
//! externally-ingested readings are appended to.

mod builtins;
mod registry;
mod window;

pub use builtins::{register_builtins, BuiltinConfig};
pub use registry::{Sampler, SignalRegistry};
pub use window::TimeSeriesStore;

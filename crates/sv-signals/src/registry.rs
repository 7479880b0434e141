//! Process-wide mapping from lowercased signal name to a sampler.
//!
//! Built-in implementations are registered at process start; the set is
//! enumerated by an operator query (`list_signals`). External signals have
//! no factory here at all — their readings are injected directly into the
//! time-series window by name, from the admin API.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sv_common::{AlertingError, Result};

/// A single capability: produce one floating-point reading. May suspend
/// (network I/O); may fail. Implementations must be safe to invoke
/// concurrently from multiple scheduled tasks — HTTP-backed samplers share
/// a pooled client rather than opening a new connection per call.
#[async_trait]
pub trait Sampler: Send + Sync {
    async fn sample(&self) -> Result<f64>;
}

/// Holds the fixed set of built-in samplers, keyed by lowercased name.
#[derive(Default)]
pub struct SignalRegistry {
    builtins: HashMap<String, Arc<dyn Sampler>>,
}

impl SignalRegistry {
    pub fn new() -> Self {
        Self {
            builtins: HashMap::new(),
        }
    }

    /// Registers a built-in sampler. Names are lowercased so lookups are
    /// case-insensitive.
    pub fn register(&mut self, name: impl AsRef<str>, sampler: Arc<dyn Sampler>) {
        self.builtins.insert(name.as_ref().to_lowercase(), sampler);
    }

    /// Whether `name` names a built-in signal. Used by the admin API to
    /// reject external readings for built-in names.
    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtins.contains_key(&name.to_lowercase())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Sampler>> {
        self.builtins.get(&name.to_lowercase()).cloned()
    }

    /// All built-in signal names, for the `list_signals` operator query.
    pub fn builtin_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.builtins.keys().cloned().collect();
        names.sort();
        names
    }

    /// Looks up and samples a built-in signal by name, or reports
    /// [`AlertingError::NotFound`] if the name isn't registered.
    pub async fn sample(&self, name: &str) -> Result<f64> {
        let sampler = self
            .get(name)
            .ok_or_else(|| AlertingError::NotFound)?;
        sampler.sample().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSampler(f64);

    #[async_trait]
    impl Sampler for FixedSampler {
        async fn sample(&self) -> Result<f64> {
            Ok(self.0)
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut registry = SignalRegistry::new();
        registry.register("BTC_Price", Arc::new(FixedSampler(1.0)));
        assert!(registry.is_builtin("btc_price"));
        assert!(registry.get("btc_price").is_some());
    }

    #[tokio::test]
    async fn samples_a_registered_builtin() {
        let mut registry = SignalRegistry::new();
        registry.register("server_load_1m", Arc::new(FixedSampler(0.42)));
        assert_eq!(registry.sample("server_load_1m").await.unwrap(), 0.42);
    }

    #[tokio::test]
    async fn unregistered_name_is_not_found() {
        let registry = SignalRegistry::new();
        assert!(registry.sample("nonexistent").await.is_err());
    }

    #[test]
    fn builtin_names_enumerates_sorted() {
        let mut registry = SignalRegistry::new();
        registry.register("zeta", Arc::new(FixedSampler(0.0)));
        registry.register("alpha", Arc::new(FixedSampler(0.0)));
        assert_eq!(registry.builtin_names(), vec!["alpha", "zeta"]);
    }
}

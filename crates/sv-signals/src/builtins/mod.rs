//! Built-in signal samplers, registered at process start.
//!
//! Host samplers (load, memory, swap, disk) share one `sysinfo::System`
//! behind a mutex; HTTP samplers (btc price, stock-to-flow) share one
//! pooled `reqwest::Client`.

mod crypto;
mod host;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::Mutex as AsyncMutex;

use crate::registry::SignalRegistry;

/// Bounded timeout applied to every sampler HTTP call (default 30s).
pub const SAMPLER_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// External configuration the built-in samplers need: the Glassnode API
/// key (required only by `btc_stock_to_flow`) and the pooled HTTP client.
#[derive(Clone, Default)]
pub struct BuiltinConfig {
    pub glassnode_api_key: Option<String>,
}

/// Registers every built-in sampler into `registry`.
pub fn register_builtins(registry: &mut SignalRegistry, config: BuiltinConfig) {
    let http = Client::builder()
        .timeout(SAMPLER_HTTP_TIMEOUT)
        .build()
        .expect("reqwest client builder with static config never fails");

    let system = Arc::new(AsyncMutex::new(sysinfo::System::new()));

    registry.register(
        "server_load_1m",
        Arc::new(host::LoadSampler::new(host::LoadWindow::OneMinute)),
    );
    registry.register(
        "server_load_5m",
        Arc::new(host::LoadSampler::new(host::LoadWindow::FiveMinutes)),
    );
    registry.register(
        "server_load_15m",
        Arc::new(host::LoadSampler::new(host::LoadWindow::FifteenMinutes)),
    );

    registry.register(
        "server_memory_usage_percentage",
        Arc::new(host::MemorySampler::new(system.clone(), host::MemoryField::UsagePercentage)),
    );
    registry.register(
        "server_memory_usage_used",
        Arc::new(host::MemorySampler::new(system.clone(), host::MemoryField::Used)),
    );
    registry.register(
        "server_memory_usage_free",
        Arc::new(host::MemorySampler::new(system.clone(), host::MemoryField::Free)),
    );

    registry.register(
        "server_memory_swap_usage_percentage",
        Arc::new(host::SwapSampler::new(system.clone(), host::MemoryField::UsagePercentage)),
    );
    registry.register(
        "server_memory_swap_usage_used",
        Arc::new(host::SwapSampler::new(system.clone(), host::MemoryField::Used)),
    );
    registry.register(
        "server_memory_swap_usage_free",
        Arc::new(host::SwapSampler::new(system.clone(), host::MemoryField::Free)),
    );

    registry.register(
        "server_disk_usage_percent",
        Arc::new(host::DiskSampler::new(host::DiskField::UsagePercentage)),
    );
    registry.register(
        "server_disk_usage_free",
        Arc::new(host::DiskSampler::new(host::DiskField::Free)),
    );
    registry.register(
        "server_disk_usage_used",
        Arc::new(host::DiskSampler::new(host::DiskField::Used)),
    );

    registry.register("btc_price", Arc::new(crypto::BtcPriceSampler::new(http.clone())));
    registry.register(
        "btc_stock_to_flow",
        Arc::new(crypto::BtcStockToFlowSampler::new(
            http,
            config.glassnode_api_key,
        )),
    );
}

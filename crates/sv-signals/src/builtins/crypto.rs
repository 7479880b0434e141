//! HTTP-backed crypto samplers: `btc_price` and `btc_stock_to_flow`.
//!
//! Both share the pooled `reqwest::Client` built in [`super::register_builtins`];
//! neither opens its own connection per call.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use sv_common::{AlertingError, Result};
use tokio::sync::Mutex as AsyncMutex;

use crate::registry::Sampler;

/// `btc_price` is cached for 60 s, to avoid hammering the price API when
/// several alerts share the signal.
const BTC_PRICE_CACHE_TTL: Duration = Duration::from_secs(60);

const COINGECKO_URL: &str =
    "https://api.coingecko.com/api/v3/simple/price?ids=bitcoin&vs_currencies=usd";

#[derive(Deserialize)]
struct CoinGeckoResponse {
    bitcoin: CoinGeckoBitcoin,
}

#[derive(Deserialize)]
struct CoinGeckoBitcoin {
    usd: f64,
}

pub struct BtcPriceSampler {
    client: Client,
    cache: AsyncMutex<Option<(Instant, f64)>>,
}

impl BtcPriceSampler {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: AsyncMutex::new(None),
        }
    }
}

#[async_trait]
impl Sampler for BtcPriceSampler {
    async fn sample(&self) -> Result<f64> {
        let mut cache = self.cache.lock().await;
        if let Some((fetched_at, price)) = *cache {
            if fetched_at.elapsed() < BTC_PRICE_CACHE_TTL {
                return Ok(price);
            }
        }

        let response = self
            .client
            .get(COINGECKO_URL)
            .send()
            .await
            .map_err(|e| AlertingError::SamplerTransient(format!("btc_price request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AlertingError::SamplerTransient(format!(
                "btc_price request returned {}",
                response.status()
            )));
        }

        let parsed: CoinGeckoResponse = response
            .json()
            .await
            .map_err(|e| AlertingError::SamplerFatal(format!("btc_price response schema mismatch: {e}")))?;

        *cache = Some((Instant::now(), parsed.bitcoin.usd));
        Ok(parsed.bitcoin.usd)
    }
}

const GLASSNODE_URL: &str = "https://api.glassnode.com/v1/metrics/indicators/stock_to_flow_ratio";

#[derive(Deserialize)]
struct GlassnodePoint {
    #[allow(dead_code)]
    t: i64,
    v: f64,
}

/// `btc_stock_to_flow`. Requires `GLASSNODE_API_KEY`; its absence is a
/// configuration problem surfaced as a fatal sampler error rather than a
/// transient one, since retrying won't help.
pub struct BtcStockToFlowSampler {
    client: Client,
    api_key: Option<String>,
}

impl BtcStockToFlowSampler {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl Sampler for BtcStockToFlowSampler {
    async fn sample(&self) -> Result<f64> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            AlertingError::SamplerFatal(
                "GLASSNODE_API_KEY is required for btc_stock_to_flow".to_string(),
            )
        })?;

        let response = self
            .client
            .get(GLASSNODE_URL)
            .query(&[("a", "BTC"), ("api_key", api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                AlertingError::SamplerTransient(format!("btc_stock_to_flow request failed: {e}"))
            })?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AlertingError::SamplerFatal(
                "GLASSNODE_API_KEY rejected by Glassnode".to_string(),
            ));
        }
        if !response.status().is_success() {
            return Err(AlertingError::SamplerTransient(format!(
                "btc_stock_to_flow request returned {}",
                response.status()
            )));
        }

        let points: Vec<GlassnodePoint> = response.json().await.map_err(|e| {
            AlertingError::SamplerFatal(format!("btc_stock_to_flow response schema mismatch: {e}"))
        })?;

        points
            .last()
            .map(|p| p.v)
            .ok_or_else(|| AlertingError::SamplerTransient("btc_stock_to_flow returned no points".to_string()))
    }
}

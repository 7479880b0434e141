//! Host metric samplers: load average, memory, swap, disk usage.

use std::sync::Arc;

use async_trait::async_trait;
use sv_common::{AlertingError, Result};
use sysinfo::{Disks, System};
use tokio::sync::Mutex as AsyncMutex;

use crate::registry::Sampler;

#[derive(Clone, Copy)]
pub enum LoadWindow {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
}

/// `server_load_{1,5,15}m`. Load average is read from the kernel directly
/// and needs no refreshed `System` snapshot.
pub struct LoadSampler {
    window: LoadWindow,
}

impl LoadSampler {
    pub fn new(window: LoadWindow) -> Self {
        Self { window }
    }
}

#[async_trait]
impl Sampler for LoadSampler {
    async fn sample(&self) -> Result<f64> {
        let load = System::load_average();
        Ok(match self.window {
            LoadWindow::OneMinute => load.one,
            LoadWindow::FiveMinutes => load.five,
            LoadWindow::FifteenMinutes => load.fifteen,
        })
    }
}

#[derive(Clone, Copy)]
pub enum MemoryField {
    UsagePercentage,
    Used,
    Free,
}

/// `server_memory_usage_{percentage,used,free}`.
pub struct MemorySampler {
    system: Arc<AsyncMutex<System>>,
    field: MemoryField,
}

impl MemorySampler {
    pub fn new(system: Arc<AsyncMutex<System>>, field: MemoryField) -> Self {
        Self { system, field }
    }
}

#[async_trait]
impl Sampler for MemorySampler {
    async fn sample(&self) -> Result<f64> {
        let mut system = self.system.lock().await;
        system.refresh_memory();
        let total = system.total_memory();
        let used = system.used_memory();
        let free = system.free_memory();
        Ok(match self.field {
            MemoryField::UsagePercentage => {
                if total == 0 {
                    0.0
                } else {
                    (used as f64 / total as f64) * 100.0
                }
            }
            MemoryField::Used => used as f64,
            MemoryField::Free => free as f64,
        })
    }
}

/// `server_memory_swap_usage_{percentage,used,free}`.
pub struct SwapSampler {
    system: Arc<AsyncMutex<System>>,
    field: MemoryField,
}

impl SwapSampler {
    pub fn new(system: Arc<AsyncMutex<System>>, field: MemoryField) -> Self {
        Self { system, field }
    }
}

#[async_trait]
impl Sampler for SwapSampler {
    async fn sample(&self) -> Result<f64> {
        let mut system = self.system.lock().await;
        system.refresh_memory();
        let total = system.total_swap();
        let used = system.used_swap();
        let free = system.free_swap();
        Ok(match self.field {
            MemoryField::UsagePercentage => {
                if total == 0 {
                    0.0
                } else {
                    (used as f64 / total as f64) * 100.0
                }
            }
            MemoryField::Used => used as f64,
            MemoryField::Free => free as f64,
        })
    }
}

#[derive(Clone, Copy)]
pub enum DiskField {
    UsagePercentage,
    Free,
    Used,
}

/// `server_disk_usage_{percent,free,used}`, read from the root filesystem.
pub struct DiskSampler {
    field: DiskField,
}

impl DiskSampler {
    pub fn new(field: DiskField) -> Self {
        Self { field }
    }
}

#[async_trait]
impl Sampler for DiskSampler {
    async fn sample(&self) -> Result<f64> {
        let disks = Disks::new_with_refreshed_list();
        let root = disks
            .iter()
            .find(|d| d.mount_point().to_str() == Some("/"))
            .or_else(|| disks.iter().next())
            .ok_or_else(|| {
                AlertingError::SamplerTransient("no mounted disks reported by the host".to_string())
            })?;

        let total = root.total_space();
        let free = root.available_space();
        let used = total.saturating_sub(free);

        Ok(match self.field {
            DiskField::UsagePercentage => {
                if total == 0 {
                    0.0
                } else {
                    (used as f64 / total as f64) * 100.0
                }
            }
            DiskField::Free => free as f64,
            DiskField::Used => used as f64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_sampler_returns_a_finite_value() {
        let sampler = LoadSampler::new(LoadWindow::OneMinute);
        let value = sampler.sample().await.unwrap();
        assert!(value.is_finite());
        assert!(value >= 0.0);
    }

    #[tokio::test]
    async fn memory_percentage_is_bounded() {
        let system = Arc::new(AsyncMutex::new(System::new()));
        let sampler = MemorySampler::new(system, MemoryField::UsagePercentage);
        let value = sampler.sample().await.unwrap();
        assert!((0.0..=100.0).contains(&value));
    }

    #[tokio::test]
    async fn disk_usage_percent_is_bounded() {
        let sampler = DiskSampler::new(DiskField::UsagePercentage);
        let value = sampler.sample().await.unwrap();
        assert!((0.0..=100.0).contains(&value));
    }
}

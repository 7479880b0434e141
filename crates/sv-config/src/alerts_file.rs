//! Parses the alerts YAML file into [`sv_common::Alert`] records.
//!
//! This is the one piece of file/CLI parsing the core service still needs
//! to run at all — everything else about the CLI's exact grammar is left
//! to the operator-facing binary.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sv_common::{Alert, DeviationCondition, SignalStrategy};

use crate::ConfigError;

fn default_poll_rate() -> u64 {
    60
}

fn default_strategy() -> SignalStrategy {
    SignalStrategy::OldestNewest
}

/// One entry of the alerts YAML sequence, mirroring the documented schema:
///
/// ```yaml
/// - condition:
///     signal: server_load_1m
///     timeframe: { minutes: 30 }
///     difference: 50
///   message: "{{signal}} moved {{diff}}% ({{direction}})"
///   room: "!ops:example.org"
///   cooloff: PT10S
///   poll_rate: 60
///   signal_read_strategy: oldest_newest
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertSpec {
    pub condition: ConditionSpec,
    pub message: String,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub cooloff: Option<String>,
    #[serde(default = "default_poll_rate")]
    pub poll_rate: u64,
    #[serde(default = "default_strategy")]
    pub signal_read_strategy: SignalStrategy,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConditionSpec {
    pub signal: String,
    pub timeframe: HashMap<String, u64>,
    pub difference: u32,
}

impl ConditionSpec {
    fn timeframe_duration(&self) -> Result<Duration, ConfigError> {
        let mut total = Duration::from_secs(0);
        for (unit, amount) in &self.timeframe {
            let unit_secs: u64 = match unit.as_str() {
                "seconds" | "second" | "secs" | "sec" => 1,
                "minutes" | "minute" | "mins" | "min" => 60,
                "hours" | "hour" => 3_600,
                "days" | "day" => 86_400,
                "weeks" | "week" => 604_800,
                other => {
                    return Err(ConfigError::ValidationError(format!(
                        "unrecognized timeframe unit `{other}`"
                    )))
                }
            };
            total += Duration::from_secs(unit_secs.saturating_mul(*amount));
        }
        if total.is_zero() {
            return Err(ConfigError::ValidationError(
                "condition.timeframe must resolve to a non-zero duration".to_string(),
            ));
        }
        Ok(total)
    }
}

/// Parses a minimal subset of ISO 8601 durations: `PT` followed by any
/// combination of `#H`, `#M`, `#S` (e.g. `PT10S`, `PT1H30M`). Calendar
/// components (`Y`, `M` before `T`, `W`, `D`) are not required by the
/// alerts file contract and are rejected.
fn parse_iso8601_duration(s: &str) -> Result<Duration, ConfigError> {
    let rest = s.strip_prefix('P').ok_or_else(|| {
        ConfigError::ValidationError(format!("cooloff `{s}` is not an ISO 8601 duration"))
    })?;
    let rest = rest.strip_prefix('T').ok_or_else(|| {
        ConfigError::ValidationError(format!(
            "cooloff `{s}` must be a time-only duration (PT...)"
        ))
    })?;

    let mut total_secs: u64 = 0;
    let mut number = String::new();
    for ch in rest.chars() {
        match ch {
            '0'..='9' | '.' => number.push(ch),
            'H' | 'M' | 'S' => {
                let value: f64 = number.parse().map_err(|_| {
                    ConfigError::ValidationError(format!("malformed duration component in `{s}`"))
                })?;
                number.clear();
                let secs = match ch {
                    'H' => value * 3_600.0,
                    'M' => value * 60.0,
                    'S' => value,
                    _ => unreachable!(),
                };
                total_secs += secs.round() as u64;
            }
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unexpected character `{other}` in cooloff `{s}`"
                )))
            }
        }
    }
    Ok(Duration::from_secs(total_secs))
}

impl AlertSpec {
    pub fn into_alert(self) -> Result<Alert, ConfigError> {
        let timeframe = self.condition.timeframe_duration()?;
        let cooloff = self
            .cooloff
            .as_deref()
            .map(parse_iso8601_duration)
            .transpose()?;

        let condition = DeviationCondition {
            signal: self.condition.signal,
            timeframe,
            difference: self.condition.difference,
        };

        Ok(Alert::new(
            condition,
            self.message,
            self.room,
            cooloff,
            self.poll_rate,
            self.signal_read_strategy,
        ))
    }
}

/// Reads a YAML file containing a sequence of [`AlertSpec`] entries and
/// converts each into a fully-hashed [`Alert`].
pub fn load_alerts_file<P: AsRef<Path>>(path: P) -> Result<Vec<Alert>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let specs: Vec<AlertSpec> = serde_yaml::from_str(&content)?;
    specs.into_iter().map(AlertSpec::into_alert).collect()
}

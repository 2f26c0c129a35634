// Environment-driven configuration. Variables are prefixed DTR_, e.g.
// DTR_TIMEZONE=Asia/Manila.

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::orchestrator::RetryPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_gate_deadline_ms")]
    pub gate_deadline_ms: u64,
    #[serde(default = "default_recompute_max_attempts")]
    pub recompute_max_attempts: u32,
    #[serde(default = "default_recompute_base_delay_ms")]
    pub recompute_base_delay_ms: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_sweep_window_days")]
    pub sweep_window_days: i64,
}

fn default_timezone() -> String {
    "Asia/Manila".to_string()
}

fn default_gate_deadline_ms() -> u64 {
    3_000
}

fn default_recompute_max_attempts() -> u32 {
    3
}

fn default_recompute_base_delay_ms() -> u64 {
    200
}

fn default_sweep_interval_secs() -> u64 {
    900
}

fn default_sweep_window_days() -> i64 {
    3
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            gate_deadline_ms: default_gate_deadline_ms(),
            recompute_max_attempts: default_recompute_max_attempts(),
            recompute_base_delay_ms: default_recompute_base_delay_ms(),
            sweep_interval_secs: default_sweep_interval_secs(),
            sweep_window_days: default_sweep_window_days(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        envy::prefixed("DTR_")
            .from_env::<AppConfig>()
            .context("reading DTR_* environment configuration")
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("invalid DTR_TIMEZONE '{}': {}", self.timezone, e))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.recompute_max_attempts,
            base_delay_ms: self.recompute_base_delay_ms,
        }
    }
}

//! Generation settings

use crate::{MurmurError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Upper bound for one generation; exceeding it fails the turn
    pub timeout_ms: u64,

    /// Shortest simulated "thinking" time
    pub min_latency_ms: u64,

    /// Longest simulated "thinking" time
    pub max_latency_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 15_000,
            min_latency_ms: 600,
            max_latency_ms: 1500,
        }
    }
}

impl GenerationConfig {
    /// No simulated latency at all
    pub fn instant() -> Self {
        Self {
            min_latency_ms: 0,
            max_latency_ms: 0,
            ..Default::default()
        }
    }

    /// Set the timeout; sub-millisecond values round up to 1 ms
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.timeout_ms = if millis == 0 && !timeout.is_zero() {
            1
        } else {
            millis
        };
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Simulated latency for an input: longer inputs take longer, within the window
    pub fn latency_for(&self, input: &str) -> Duration {
        let span = self.max_latency_ms.saturating_sub(self.min_latency_ms);
        let extra = (input.len() as u64 * 10).min(span);
        Duration::from_millis(self.min_latency_ms + extra)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(MurmurError::ConfigError(
                "generation timeout_ms must be positive".into(),
            ));
        }
        if self.min_latency_ms > self.max_latency_ms {
            return Err(MurmurError::ConfigError(format!(
                "min_latency_ms {} exceeds max_latency_ms {}",
                self.min_latency_ms, self.max_latency_ms
            )));
        }
        Ok(())
    }
}

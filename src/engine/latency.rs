//! Latency and jitter probing

use super::EngineContext;
use crate::{defaults, models::{Config, LatencyResult}, stats::reduce_latency};
use std::time::Duration;
use tokio::time::Instant;

/// Probe timing parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PingSettings {
    /// Timed round trips after the warm-up
    pub count: usize,
    /// Pause after each probe
    pub interval: Duration,
    /// Sample recorded for a probe that failed at the transport level
    pub penalty: Duration,
}

impl PingSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            count: config.ping_count,
            ..Self::default()
        }
    }
}

impl Default for PingSettings {
    fn default() -> Self {
        Self {
            count: defaults::DEFAULT_PING_COUNT,
            interval: defaults::PROBE_INTERVAL,
            penalty: defaults::PROBE_PENALTY,
        }
    }
}

/// Measures round-trip latency against the backend's empty endpoint
pub struct LatencyProbe {
    settings: PingSettings,
}

impl LatencyProbe {
    pub fn new(settings: PingSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PingSettings {
        &self.settings
    }

    /// One discarded warm-up, then `count` timed probes reduced to average
    /// and jitter. Never fails: failed probes contribute the penalty sample.
    pub async fn run(&self, ctx: &EngineContext) -> LatencyResult {
        let _ = ctx.transport.ping().await;

        let mut samples = Vec::with_capacity(self.settings.count);
        let mut failures = 0;

        for index in 0..self.settings.count {
            let start = Instant::now();
            match ctx.transport.ping().await {
                Ok(()) => {
                    let sample = start.elapsed();
                    ctx.logger.log_probe(index, sample, None).await;
                    samples.push(sample);
                }
                Err(e) => {
                    failures += 1;
                    ctx.logger.log_probe(index, self.settings.penalty, Some(&e)).await;
                    samples.push(self.settings.penalty);
                }
            }
            tokio::time::sleep(self.settings.interval).await;
        }

        let result = reduce_latency(&samples);
        ctx.logger.log_latency_complete(&result, samples.len(), failures).await;
        result
    }
}

//! Download throughput phase

use super::{finish_phase, join_workers, Deadline, EngineContext, RateMeter, ThroughputEngine, TransferCounter, WorkerStats};
use crate::{
    defaults,
    models::{Config, PhaseKind, ThroughputResult},
    stats::BandwidthCalculator,
};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinSet;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadSettings {
    pub streams: usize,
    pub duration: Duration,
    pub chunk_mb: u32,
    pub overhead: f64,
    /// Pause before reopening after a failed stream
    pub backoff: Duration,
}

impl DownloadSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            streams: config.download_streams,
            duration: config.download_duration(),
            chunk_mb: config.download_chunk_mb,
            overhead: config.overhead_factor,
            backoff: defaults::TRANSFER_BACKOFF,
        }
    }
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Concurrent streaming GETs for a fixed duration
pub struct DownloadEngine {
    settings: DownloadSettings,
}

impl DownloadEngine {
    pub fn new(settings: DownloadSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &DownloadSettings {
        &self.settings
    }
}

#[async_trait]
impl ThroughputEngine for DownloadEngine {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Download
    }

    async fn run(&self, ctx: &EngineContext) -> ThroughputResult {
        let calculator = BandwidthCalculator::new(self.settings.overhead);
        let counter = TransferCounter::new();
        let timer = Deadline::start(self.settings.duration);
        let deadline = timer.deadline();
        let meter = RateMeter::new(PhaseKind::Download, counter.clone(), deadline.started(), calculator, ctx.board.clone());

        let mut workers = JoinSet::new();
        for id in 0..self.settings.streams {
            workers.spawn(download_worker(
                id,
                ctx.clone(),
                deadline.clone(),
                counter.clone(),
                meter.clone(),
                self.settings,
            ));
        }

        // Workers stop at expiry; the extra window only guards a stuck task
        let limit = deadline.expires_at() + defaults::WORKER_JOIN_GRACE;
        let stats = join_workers(workers, limit, PhaseKind::Download, &ctx.logger).await;
        drop(timer);

        let result = finish_phase(&counter, deadline.started(), calculator, stats);
        ctx.logger.log_phase_complete(PhaseKind::Download, &result).await;
        result
    }
}

async fn download_worker(
    id: usize,
    ctx: EngineContext,
    deadline: Deadline,
    counter: TransferCounter,
    meter: RateMeter,
    settings: DownloadSettings,
) -> WorkerStats {
    let mut stats = WorkerStats::default();

    while deadline.is_active() {
        stats.requests += 1;

        let opened = tokio::select! {
            biased;
            _ = deadline.expired() => break,
            opened = ctx.transport.open_download(settings.chunk_mb) => opened,
        };

        let failure = match opened {
            Ok(mut body) => loop {
                let next = tokio::select! {
                    biased;
                    _ = deadline.expired() => return stats,
                    next = body.next() => next,
                };

                match next {
                    Some(Ok(chunk)) => {
                        counter.add(chunk.len() as u64);
                        meter.publish();
                    }
                    Some(Err(e)) => break Some(e),
                    // Body exhausted; reopen straight away
                    None => break None,
                }
            },
            Err(e) => Some(e),
        };

        if let Some(e) = failure {
            stats.failures += 1;
            ctx.logger.log_transfer_failure(PhaseKind::Download, id, &e).await;
            tokio::time::sleep(settings.backoff).await;
        }
    }

    stats
}

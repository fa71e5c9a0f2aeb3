//! Upload throughput phase

use super::{finish_phase, join_workers, Deadline, EngineContext, RateMeter, ThroughputEngine, TransferCounter, WorkerStats};
use crate::{
    defaults,
    models::{Config, PhaseKind, ThroughputResult},
    stats::BandwidthCalculator,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tokio::{sync::mpsc, task::JoinSet};

/// Progress events buffered per request; older counts are superseded by newer ones
const PROGRESS_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadSettings {
    pub streams: usize,
    pub duration: Duration,
    pub payload_bytes: usize,
    pub overhead: f64,
    /// Pause before the single retry after a failed request
    pub backoff: Duration,
    /// How long a request may run past expiry without a progress event
    pub abort_grace: Duration,
}

impl UploadSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            streams: config.upload_streams,
            duration: config.upload_duration(),
            payload_bytes: config.upload_payload_bytes,
            overhead: config.overhead_factor,
            backoff: defaults::TRANSFER_BACKOFF,
            abort_grace: defaults::UPLOAD_ABORT_GRACE,
        }
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Concurrent uploads of one shared payload for a fixed duration
pub struct UploadEngine {
    settings: UploadSettings,
    payload: Bytes,
}

impl UploadEngine {
    pub fn new(settings: UploadSettings) -> Self {
        let payload = Bytes::from(vec![b'a'; settings.payload_bytes]);
        Self { settings, payload }
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }
}

#[async_trait]
impl ThroughputEngine for UploadEngine {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Upload
    }

    async fn run(&self, ctx: &EngineContext) -> ThroughputResult {
        let calculator = BandwidthCalculator::new(self.settings.overhead);
        let counter = TransferCounter::new();
        let timer = Deadline::start(self.settings.duration);
        let deadline = timer.deadline();
        let meter = RateMeter::new(PhaseKind::Upload, counter.clone(), deadline.started(), calculator, ctx.board.clone());

        let mut workers = JoinSet::new();
        for id in 0..self.settings.streams {
            let worker = UploadWorker {
                id,
                ctx: ctx.clone(),
                deadline: deadline.clone(),
                counter: counter.clone(),
                meter: meter.clone(),
                payload: self.payload.clone(),
                settings: self.settings,
            };
            workers.spawn(worker.run());
        }

        // Past expiry plus the abort grace every request has ended; anything
        // still running after the join grace is aborted
        let limit = deadline.expires_at() + self.settings.abort_grace + defaults::WORKER_JOIN_GRACE;
        let stats = join_workers(workers, limit, PhaseKind::Upload, &ctx.logger).await;
        drop(timer);

        let result = finish_phase(&counter, deadline.started(), calculator, stats);
        ctx.logger.log_phase_complete(PhaseKind::Upload, &result).await;
        result
    }
}

/// How a single upload request ended
#[derive(Debug, Clone, Copy, PartialEq)]
enum RequestEnd {
    Completed,
    Failed,
    Aborted,
}

struct UploadWorker {
    id: usize,
    ctx: EngineContext,
    deadline: Deadline,
    counter: TransferCounter,
    meter: RateMeter,
    payload: Bytes,
    settings: UploadSettings,
}

impl UploadWorker {
    /// Upload until expiry. A failure earns one retry after the backoff;
    /// the worker stops once that retry has ended.
    async fn run(self) -> WorkerStats {
        let mut stats = WorkerStats::default();
        let mut retrying = false;

        while self.deadline.is_active() {
            let end = self.single_upload(&mut stats).await;
            if retrying {
                break;
            }
            if end == RequestEnd::Failed {
                retrying = true;
                tokio::time::sleep(self.settings.backoff).await;
            }
        }

        stats
    }

    async fn single_upload(&self, stats: &mut WorkerStats) -> RequestEnd {
        stats.requests += 1;

        let (tx, mut progress) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
        let request = self.ctx.transport.upload(self.payload.clone(), tx);
        tokio::pin!(request);

        let grace = async {
            self.deadline.expired().await;
            tokio::time::sleep(self.settings.abort_grace).await;
        };
        tokio::pin!(grace);

        let mut acknowledged: u64 = 0;

        let end = loop {
            tokio::select! {
                biased;
                Some(loaded) = progress.recv() => {
                    self.acknowledge(&mut acknowledged, loaded);
                    if !self.deadline.is_active() {
                        break RequestEnd::Aborted;
                    }
                }
                result = &mut request => {
                    // Events sent just before completion are still queued
                    while let Ok(loaded) = progress.try_recv() {
                        self.acknowledge(&mut acknowledged, loaded);
                    }
                    break match result {
                        Ok(()) => RequestEnd::Completed,
                        Err(e) => {
                            stats.failures += 1;
                            self.ctx.logger.log_transfer_failure(PhaseKind::Upload, self.id, &e).await;
                            RequestEnd::Failed
                        }
                    };
                }
                _ = &mut grace => break RequestEnd::Aborted,
            }
        };

        // Bytes the transport never reported are counted once the request is over
        let payload_len = self.payload.len() as u64;
        if acknowledged < payload_len {
            let shortfall = payload_len - acknowledged;
            self.counter.add(shortfall);
            self.meter.publish();
            stats.compensations += 1;
            stats.compensated_bytes += shortfall;
            self.ctx.logger.log_compensation(self.id, shortfall, end == RequestEnd::Aborted).await;
        }

        end
    }

    /// Count the growth of a cumulative progress value
    fn acknowledge(&self, acknowledged: &mut u64, loaded: u64) {
        if loaded > *acknowledged {
            self.counter.add(loaded - *acknowledged);
            *acknowledged = loaded;
            self.meter.publish();
        }
    }
}

//! Measurement engine: latency probing and time-boxed throughput phases
//!
//! Each throughput phase owns a [`Deadline`] and a fresh [`TransferCounter`].
//! Workers run as tasks in a `JoinSet`, add transferred bytes to the counter
//! and publish a live [`RateSample`] through the [`MetricsBoard`]. The rate
//! computed after every worker has joined is authoritative.
//!
//! Download workers race every open and read against the deadline and stop
//! at once. Upload workers only notice expiry on the next progress event, or
//! once the abort grace window has passed.

pub mod download;
pub mod latency;
pub mod upload;

#[cfg(test)]
pub(crate) mod simulated;

pub use download::{DownloadEngine, DownloadSettings};
pub use latency::{LatencyProbe, PingSettings};
pub use upload::{UploadEngine, UploadSettings};

use crate::{
    client::SpeedTransport,
    logging::MeasurementLogger,
    models::{LiveMetrics, PhaseKind, PhaseResult, RateSample, RunState, ThroughputResult},
    stats::BandwidthCalculator,
};
use async_trait::async_trait;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::{
    sync::watch,
    task::{JoinHandle, JoinSet},
    time::Instant,
};

/// Shared collaborators handed to every phase
#[derive(Clone)]
pub struct EngineContext {
    pub transport: Arc<dyn SpeedTransport>,
    pub board: MetricsBoard,
    pub logger: Arc<MeasurementLogger>,
}

impl EngineContext {
    pub fn new(transport: Arc<dyn SpeedTransport>, board: MetricsBoard, logger: Arc<MeasurementLogger>) -> Self {
        Self { transport, board, logger }
    }
}

/// A time-boxed download or upload measurement
#[async_trait]
pub trait ThroughputEngine: Send + Sync {
    fn kind(&self) -> PhaseKind;

    /// Run the phase to completion and return its authoritative result
    async fn run(&self, ctx: &EngineContext) -> ThroughputResult;
}

/// Phase-scoped cut-off signal.
///
/// Written once by its timer task, read by every worker of the phase. Once
/// expired it never becomes active again.
#[derive(Clone)]
pub struct Deadline {
    expired: watch::Receiver<bool>,
    started: Instant,
    duration: Duration,
}

/// Owns the timer task behind a [`Deadline`]; dropping it stops the timer
pub struct DeadlineTimer {
    deadline: Deadline,
    handle: JoinHandle<()>,
}

impl Deadline {
    /// Start a deadline expiring `duration` from now
    pub fn start(duration: Duration) -> DeadlineTimer {
        let (tx, rx) = watch::channel(false);
        let started = Instant::now();
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(started + duration).await;
            tx.send_replace(true);
        });

        DeadlineTimer {
            deadline: Deadline {
                expired: rx,
                started,
                duration,
            },
            handle,
        }
    }

    pub fn is_active(&self) -> bool {
        !*self.expired.borrow()
    }

    /// Resolves once the deadline has expired. A stopped timer counts as
    /// expired.
    pub async fn expired(&self) {
        let mut rx = self.expired.clone();
        let _ = rx.wait_for(|expired| *expired).await;
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn expires_at(&self) -> Instant {
        self.started + self.duration
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl DeadlineTimer {
    pub fn deadline(&self) -> Deadline {
        self.deadline.clone()
    }
}

impl Drop for DeadlineTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Byte count of one throughput phase; only ever increases
#[derive(Debug, Clone, Default)]
pub struct TransferCounter(Arc<AtomicU64>);

impl TransferCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `bytes` and return the new total
    pub fn add(&self, bytes: u64) -> u64 {
        self.0.fetch_add(bytes, Ordering::Relaxed) + bytes
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Publishes live rates for one phase
#[derive(Clone)]
pub struct RateMeter {
    kind: PhaseKind,
    counter: TransferCounter,
    started: Instant,
    calculator: BandwidthCalculator,
    board: MetricsBoard,
}

impl RateMeter {
    pub fn new(kind: PhaseKind, counter: TransferCounter, started: Instant, calculator: BandwidthCalculator, board: MetricsBoard) -> Self {
        Self { kind, counter, started, calculator, board }
    }

    /// Publish the rate from the total counter and time since phase start.
    /// Nothing is published inside the floor window.
    pub fn publish(&self) -> Option<RateSample> {
        let bytes = self.counter.get();
        let elapsed_seconds = self.started.elapsed().as_secs_f64();
        let mbps = self.calculator.rate_checked(bytes, elapsed_seconds)?;
        let sample = RateSample { bytes, elapsed_seconds, mbps };
        self.board.publish_rate(self.kind, sample);
        Some(sample)
    }
}

/// Watch channel holding the metrics currently on display.
///
/// Only the latest value is observable; publications from racing workers may
/// overwrite each other.
#[derive(Clone)]
pub struct MetricsBoard {
    tx: Arc<watch::Sender<LiveMetrics>>,
}

impl MetricsBoard {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LiveMetrics::new());
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<LiveMetrics> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> LiveMetrics {
        self.tx.borrow().clone()
    }

    /// Clear all values back to the unmeasured sentinel
    pub fn reset(&self) {
        self.tx.send_modify(|live| live.reset());
    }

    pub fn set_state(&self, state: RunState) {
        self.tx.send_modify(|live| {
            live.state = state;
            live.status = state.status_message().to_string();
            live.latest_rate = None;
        });
    }

    pub fn set_status(&self, status: &str) {
        self.tx.send_modify(|live| live.status = status.to_string());
    }

    pub fn publish_rate(&self, kind: PhaseKind, sample: RateSample) {
        self.tx.send_modify(|live| {
            live.latest_rate = Some(sample);
            match kind {
                PhaseKind::Download => live.download_mbps = Some(sample.mbps),
                PhaseKind::Upload => live.upload_mbps = Some(sample.mbps),
                PhaseKind::Ping => {}
            }
        });
    }

    /// Replace the live value of a phase with its final result
    pub fn commit(&self, result: &PhaseResult) {
        self.tx.send_modify(|live| match result {
            PhaseResult::Ping(latency) => {
                live.ping_ms = Some(latency.average_ms);
                live.jitter_ms = Some(latency.jitter_ms);
            }
            PhaseResult::Download(throughput) => live.download_mbps = Some(throughput.mbps),
            PhaseResult::Upload(throughput) => live.upload_mbps = Some(throughput.mbps),
        });
    }
}

impl Default for MetricsBoard {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-worker request bookkeeping, summed after join
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WorkerStats {
    pub requests: u64,
    pub failures: u64,
    pub compensations: u64,
    pub compensated_bytes: u64,
}

impl WorkerStats {
    fn merge(&mut self, other: WorkerStats) {
        self.requests += other.requests;
        self.failures += other.failures;
        self.compensations += other.compensations;
        self.compensated_bytes += other.compensated_bytes;
    }
}

/// Join every worker, giving up at `limit`. Workers still running then are
/// aborted. A worker that panicked is logged and contributes no stats.
pub(crate) async fn join_workers(
    mut workers: JoinSet<WorkerStats>,
    limit: Instant,
    phase: PhaseKind,
    logger: &MeasurementLogger,
) -> WorkerStats {
    let mut total = WorkerStats::default();

    let joined = tokio::time::timeout_at(limit, async {
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(stats) => total.merge(stats),
                Err(e) => logger.log_worker_lost(phase, &e).await,
            }
        }
    })
    .await;

    if joined.is_err() || !workers.is_empty() {
        workers.shutdown().await;
    }

    total
}

/// Final figures of a throughput phase from its counter and start time
pub(crate) fn finish_phase(counter: &TransferCounter, started: Instant, calculator: BandwidthCalculator, stats: WorkerStats) -> ThroughputResult {
    let bytes = counter.get();
    let elapsed_seconds = started.elapsed().as_secs_f64();
    ThroughputResult {
        bytes,
        elapsed_seconds,
        mbps: calculator.final_rate(bytes, elapsed_seconds),
        requests: stats.requests,
        failures: stats.failures,
        compensations: stats.compensations,
        compensated_bytes: stats.compensated_bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LatencyResult;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires_once() {
        let timer = Deadline::start(Duration::from_secs(2));
        let deadline = timer.deadline();
        assert!(deadline.is_active());

        tokio::time::sleep(Duration::from_millis(1999)).await;
        assert!(deadline.is_active());

        deadline.expired().await;
        assert!(!deadline.is_active());
        assert_eq!(deadline.elapsed(), Duration::from_secs(2));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!deadline.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_timer_releases_waiters() {
        let timer = Deadline::start(Duration::from_secs(60));
        let deadline = timer.deadline();
        drop(timer);

        // Sender is gone, so waiting returns instead of hanging
        tokio::time::timeout(Duration::from_secs(1), deadline.expired())
            .await
            .unwrap();
    }

    #[test]
    fn test_transfer_counter_accumulates() {
        let counter = TransferCounter::new();
        let clone = counter.clone();
        assert_eq!(counter.add(100), 100);
        assert_eq!(clone.add(50), 150);
        assert_eq!(counter.get(), 150);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_meter_floor() {
        let board = MetricsBoard::new();
        let counter = TransferCounter::new();
        let meter = RateMeter::new(PhaseKind::Download, counter.clone(), Instant::now(), BandwidthCalculator::new(1.0), board.clone());

        counter.add(1_000_000);
        assert!(meter.publish().is_none());
        assert_eq!(board.snapshot().download_mbps, None);

        tokio::time::sleep(Duration::from_secs(1)).await;
        let sample = meter.publish().unwrap();
        assert!((sample.mbps - 8.0).abs() < 1e-9);
        assert_eq!(board.snapshot().download_mbps, Some(sample.mbps));
        assert_eq!(board.snapshot().latest_rate, Some(sample));
    }

    #[test]
    fn test_board_reset_and_commit() {
        let board = MetricsBoard::new();
        board.commit(&PhaseResult::Ping(LatencyResult::new(20.0, 2.0)));
        board.set_state(RunState::DownloadPhase);

        let live = board.snapshot();
        assert_eq!(live.ping_ms, Some(20.0));
        assert_eq!(live.status, "Downloading...");

        board.reset();
        let live = board.snapshot();
        assert_eq!(live.ping_ms, None);
        assert_eq!(live.jitter_ms, None);
    }

    fn quiet_logger() -> MeasurementLogger {
        MeasurementLogger::new(&crate::models::Config::default())
    }

    fn buggy_worker() -> WorkerStats {
        panic!("worker bug")
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_workers_aborts_stragglers() {
        let mut set = JoinSet::new();
        set.spawn(async {
            WorkerStats { requests: 1, ..Default::default() }
        });
        set.spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            WorkerStats { requests: 100, ..Default::default() }
        });

        let start = Instant::now();
        let total = join_workers(set, start + crate::defaults::WORKER_JOIN_GRACE, PhaseKind::Download, &quiet_logger()).await;
        assert_eq!(total.requests, 1);
        assert_eq!(start.elapsed(), crate::defaults::WORKER_JOIN_GRACE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_workers_survives_panicked_worker() {
        let mut set = JoinSet::new();
        set.spawn(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            WorkerStats { requests: 3, failures: 1, ..Default::default() }
        });
        set.spawn(async { buggy_worker() });
        set.spawn(async {
            WorkerStats { requests: 2, compensations: 1, compensated_bytes: 512, ..Default::default() }
        });

        let start = Instant::now();
        let total = join_workers(set, start + Duration::from_secs(5), PhaseKind::Upload, &quiet_logger()).await;

        assert_eq!(
            total,
            WorkerStats { requests: 5, failures: 1, compensations: 1, compensated_bytes: 512 }
        );
        assert_eq!(start.elapsed(), Duration::from_millis(50));
    }
}

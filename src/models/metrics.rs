//! Measurement results, session records and live display state

use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reduced latency measurement for one ping phase
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyResult {
    /// Mean round-trip time of the trimmed samples (milliseconds)
    pub average_ms: f64,
    /// Population standard deviation of the trimmed samples (milliseconds)
    pub jitter_ms: f64,
}

impl LatencyResult {
    pub fn new(average_ms: f64, jitter_ms: f64) -> Self {
        Self { average_ms, jitter_ms }
    }

    /// Result used when no samples were collected
    pub fn empty() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Latest observable transfer rate of a throughput phase
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateSample {
    /// Total bytes counted since phase start
    pub bytes: u64,
    /// Seconds elapsed since phase start
    pub elapsed_seconds: f64,
    /// Rate in megabits per second, overhead included
    pub mbps: f64,
}

/// The three measured phases of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    Ping,
    Download,
    Upload,
}

impl PhaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseKind::Ping => "ping",
            PhaseKind::Download => "download",
            PhaseKind::Upload => "upload",
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a download or upload phase
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ThroughputResult {
    /// Bytes counted over the whole phase
    pub bytes: u64,
    /// Wall-clock length of the phase in seconds
    pub elapsed_seconds: f64,
    /// Final authoritative rate
    pub mbps: f64,
    /// Requests started by all workers
    pub requests: u64,
    /// Requests that failed at the transport or HTTP level
    pub failures: u64,
    /// Upload requests whose unacknowledged remainder was added at completion
    pub compensations: u64,
    /// Bytes added by those compensations
    pub compensated_bytes: u64,
}

/// Value produced by one measured phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhaseResult {
    Ping(LatencyResult),
    Download(ThroughputResult),
    Upload(ThroughputResult),
}

impl PhaseResult {
    pub fn kind(&self) -> PhaseKind {
        match self {
            PhaseResult::Ping(_) => PhaseKind::Ping,
            PhaseResult::Download(_) => PhaseKind::Download,
            PhaseResult::Upload(_) => PhaseKind::Upload,
        }
    }
}

/// Final, immutable record of one complete run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSession {
    pub ping_ms: f64,
    pub jitter_ms: f64,
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl TestSession {
    /// Start collecting phase results for a new session
    pub fn builder() -> TestSessionBuilder {
        TestSessionBuilder::new()
    }

    /// Total wall-clock length of the run in seconds
    pub fn duration_seconds(&self) -> f64 {
        (self.completed_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// Collects phase results until every phase is present
#[derive(Debug, Clone)]
pub struct TestSessionBuilder {
    started_at: DateTime<Utc>,
    ping: Option<LatencyResult>,
    download: Option<ThroughputResult>,
    upload: Option<ThroughputResult>,
}

impl TestSessionBuilder {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            ping: None,
            download: None,
            upload: None,
        }
    }

    /// Record a phase result, replacing any earlier value for the same phase
    pub fn record(&mut self, result: PhaseResult) {
        match result {
            PhaseResult::Ping(latency) => self.ping = Some(latency),
            PhaseResult::Download(throughput) => self.download = Some(throughput),
            PhaseResult::Upload(throughput) => self.upload = Some(throughput),
        }
    }

    pub fn has(&self, kind: PhaseKind) -> bool {
        match kind {
            PhaseKind::Ping => self.ping.is_some(),
            PhaseKind::Download => self.download.is_some(),
            PhaseKind::Upload => self.upload.is_some(),
        }
    }

    /// Freeze the collected results into a session
    pub fn build(self) -> Result<TestSession> {
        let ping = self
            .ping
            .ok_or_else(|| AppError::measurement("ping phase has no result"))?;
        let download = self
            .download
            .ok_or_else(|| AppError::measurement("download phase has no result"))?;
        let upload = self
            .upload
            .ok_or_else(|| AppError::measurement("upload phase has no result"))?;

        Ok(TestSession {
            ping_ms: ping.average_ms,
            jitter_ms: ping.jitter_ms,
            download_mbps: download.mbps,
            upload_mbps: upload.mbps,
            started_at: self.started_at,
            completed_at: Utc::now(),
        })
    }
}

impl Default for TestSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Orchestrator state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    PingPhase,
    DownloadPhase,
    UploadPhase,
    Reporting,
}

impl RunState {
    /// Status line shown while in this state
    pub fn status_message(&self) -> &'static str {
        match self {
            RunState::Idle => "",
            RunState::PingPhase => "Pinging...",
            RunState::DownloadPhase => "Downloading...",
            RunState::UploadPhase => "Uploading...",
            RunState::Reporting => "Sending results...",
        }
    }

    pub fn phase(&self) -> Option<PhaseKind> {
        match self {
            RunState::PingPhase => Some(PhaseKind::Ping),
            RunState::DownloadPhase => Some(PhaseKind::Download),
            RunState::UploadPhase => Some(PhaseKind::Upload),
            RunState::Idle | RunState::Reporting => None,
        }
    }
}

/// Metrics as currently displayed; `None` is the unmeasured sentinel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveMetrics {
    pub state: RunState,
    pub status: String,
    pub ping_ms: Option<f64>,
    pub jitter_ms: Option<f64>,
    pub download_mbps: Option<f64>,
    pub upload_mbps: Option<f64>,
    /// Most recent rate publication of the active throughput phase
    pub latest_rate: Option<RateSample>,
}

impl LiveMetrics {
    pub fn new() -> Self {
        Self {
            state: RunState::Idle,
            status: String::new(),
            ping_ms: None,
            jitter_ms: None,
            download_mbps: None,
            upload_mbps: None,
            latest_rate: None,
        }
    }

    /// Clear every measured value back to the sentinel
    pub fn reset(&mut self) {
        self.ping_ms = None;
        self.jitter_ms = None;
        self.download_mbps = None;
        self.upload_mbps = None;
        self.latest_rate = None;
    }

    /// Format a metric for display, `--` when unmeasured
    pub fn display_value(value: Option<f64>) -> String {
        match value {
            Some(v) => format!("{:.2}", v),
            None => "--".to_string(),
        }
    }
}

impl Default for LiveMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Speed classification used for console coloring
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeedClass {
    Fast,
    Moderate,
    Slow,
}

impl SpeedClass {
    /// Classify a bandwidth figure
    pub fn from_mbps(mbps: f64) -> Self {
        if mbps >= 100.0 {
            Self::Fast
        } else if mbps >= 10.0 {
            Self::Moderate
        } else {
            Self::Slow
        }
    }

    /// Classify a round-trip time
    pub fn from_latency_ms(ms: f64) -> Self {
        if ms < 30.0 {
            Self::Fast
        } else if ms < 100.0 {
            Self::Moderate
        } else {
            Self::Slow
        }
    }
}

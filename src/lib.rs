//! Network Speed Tester
//!
//! Measures round-trip latency and jitter, then sustained download and upload
//! bandwidth against a speedtest backend, and optionally submits the results
//! to obtain a shareable link.

pub mod cli;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod isp;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod output;
pub mod reporter;
pub mod stats;

// Re-export commonly used types
pub use client::{NetworkClient, SpeedTransport};
pub use error::{AppError, Result};
pub use isp::IspInfo;
pub use models::{Config, LatencyResult, PhaseKind, PhaseResult, RateSample, TestSession, ThroughputResult};
pub use engine::{EngineContext, MetricsBoard};
pub use models::RunState;
pub use orchestrator::{RunOutcome, RunReport, TestOrchestrator};
pub use output::{
    ColoredFormatter, FormattingOptions, JsonFormatter, LiveDisplay, OutputFormatter, OutputFormatterFactory,
    PlainFormatter,
};
pub use reporter::{HttpResultReporter, ResultReporter};
pub use stats::{BandwidthCalculator, reduce_latency};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Build metadata emitted by build.rs
pub const BUILD_TIME: &str = env!("BUILD_TIME");
pub const GIT_COMMIT: &str = env!("GIT_COMMIT");
pub const TARGET_TRIPLE: &str = env!("TARGET_TRIPLE");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub const DEFAULT_DOWNLOAD_DURATION: Duration = Duration::from_secs(15);
    pub const DEFAULT_UPLOAD_DURATION: Duration = Duration::from_secs(10);
    pub const DEFAULT_DOWNLOAD_STREAMS: usize = 2;
    pub const DEFAULT_UPLOAD_STREAMS: usize = 4;
    pub const DEFAULT_UPLOAD_PAYLOAD_BYTES: usize = 2 * 1024 * 1024;
    pub const DEFAULT_DOWNLOAD_CHUNK_MB: u32 = 100;
    pub const DEFAULT_PING_COUNT: usize = 6;
    pub const DEFAULT_OVERHEAD_FACTOR: f64 = 1.06;
    pub const DEFAULT_ENABLE_COLOR: bool = true;
    pub const DEFAULT_SHARE_RESULTS: bool = true;

    /// Live rates are not published until this much of a phase has elapsed.
    pub const RATE_FLOOR_SECONDS: f64 = 0.1;
    pub const PROBE_INTERVAL: Duration = Duration::from_millis(50);
    pub const PROBE_PENALTY: Duration = Duration::from_millis(100);
    pub const TRANSFER_BACKOFF: Duration = Duration::from_millis(100);
    /// How long an upload may outlive the deadline without a progress event.
    pub const UPLOAD_ABORT_GRACE: Duration = Duration::from_secs(2);
    /// Workers still running this long after they should have stopped are aborted.
    pub const WORKER_JOIN_GRACE: Duration = Duration::from_secs(2);

    pub const DOWNLOAD_PATH: &str = "backend/garbage";
    pub const LATENCY_PATH: &str = "backend/empty";
    pub const UPLOAD_PATH: &str = "backend/empty";
    pub const ISP_PATH: &str = "backend/getIP";
    pub const TELEMETRY_PATH: &str = "backend/results/telemetry";
    pub const SHARE_PATH: &str = "backend/results/";

    pub const UNKNOWN_ISP: &str = "Unknown ISP";
}

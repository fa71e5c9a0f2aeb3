//! Data models and structures for the network speed tester

pub mod config;
pub mod metrics;

// Re-export main model types
pub use config::Config;
pub use metrics::{
    LatencyResult, LiveMetrics, PhaseKind, PhaseResult, RateSample, RunState, SpeedClass,
    TestSession, TestSessionBuilder, ThroughputResult,
};

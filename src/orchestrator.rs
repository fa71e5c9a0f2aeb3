//! Run orchestration
//!
//! Drives one complete run: ping, download, upload and result submission,
//! strictly in that order. Only one run can be in flight per orchestrator;
//! a second request while busy returns [`RunOutcome::AlreadyRunning`].

use crate::{
    client::NetworkClient,
    defaults,
    engine::{
        DownloadEngine, DownloadSettings, EngineContext, LatencyProbe, MetricsBoard, PingSettings,
        ThroughputEngine, UploadEngine, UploadSettings,
    },
    error::Result,
    isp::IspInfo,
    logging::{ErrorEventLogger, LoggerFactory},
    models::{Config, LatencyResult, PhaseResult, RunState, TestSession, TestSessionBuilder, ThroughputResult},
    reporter::{HttpResultReporter, ResultReporter},
};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;

pub const STATUS_SHARE_READY: &str = "Results ready to share";
pub const STATUS_FINISHED: &str = "Finished";

/// Everything a completed run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub session: TestSession,
    pub share_url: Option<String>,
    pub isp: IspInfo,
    pub download: ThroughputResult,
    pub upload: ThroughputResult,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(Box<RunReport>),
    /// A run was already in flight; nothing was started
    AlreadyRunning,
}

pub struct TestOrchestrator {
    ctx: EngineContext,
    reporter: Option<Arc<dyn ResultReporter>>,
    errors: Arc<ErrorEventLogger>,
    state: Mutex<RunState>,
    isp: RwLock<IspInfo>,
    ping: LatencyProbe,
    download: DownloadEngine,
    upload: UploadEngine,
}

impl TestOrchestrator {
    pub fn new(
        config: &Config,
        ctx: EngineContext,
        reporter: Option<Arc<dyn ResultReporter>>,
        errors: Arc<ErrorEventLogger>,
    ) -> Self {
        Self {
            ctx,
            reporter,
            errors,
            state: Mutex::new(RunState::Idle),
            isp: RwLock::new(IspInfo::unknown()),
            ping: LatencyProbe::new(PingSettings::from_config(config)),
            download: DownloadEngine::new(DownloadSettings::from_config(config)),
            upload: UploadEngine::new(UploadSettings::from_config(config)),
        }
    }

    /// Wire the HTTP transport, reporter and loggers for `config`
    pub async fn from_config(config: &Config) -> Result<Self> {
        let factory = LoggerFactory::new(config.clone());
        let transport = Arc::new(NetworkClient::from_config(config)?);
        let logger = Arc::new(factory.create_measurement_logger().await);
        let errors = Arc::new(factory.create_error_logger().await);

        let reporter: Option<Arc<dyn ResultReporter>> = if config.share_results {
            Some(Arc::new(HttpResultReporter::from_config(config)?))
        } else {
            None
        };

        let ctx = EngineContext::new(transport, MetricsBoard::new(), logger);
        Ok(Self::new(config, ctx, reporter, errors))
    }

    pub fn board(&self) -> &MetricsBoard {
        &self.ctx.board
    }

    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn isp(&self) -> IspInfo {
        self.isp.read().await.clone()
    }

    /// Look up the ISP and remember it for result submission. A failed
    /// lookup keeps the placeholder.
    pub async fn lookup_isp(&self) -> IspInfo {
        let info = match self.ctx.transport.fetch_isp_info().await {
            Ok(info) => info,
            Err(e) => {
                self.errors.log_recovered(&e, defaults::UNKNOWN_ISP).await;
                IspInfo::unknown()
            }
        };
        *self.isp.write().await = info.clone();
        info
    }

    /// Run every phase once and submit the result
    pub async fn run(&self) -> Result<RunOutcome> {
        let Some(guard) = RunGuard::acquire(&self.state, &self.ctx.board) else {
            return Ok(RunOutcome::AlreadyRunning);
        };

        self.ctx.board.reset();
        let mut builder = TestSession::builder();

        guard.enter(RunState::PingPhase);
        let latency = self.run_ping().await;
        self.record(&mut builder, PhaseResult::Ping(latency));

        guard.enter(RunState::DownloadPhase);
        let download = self.run_throughput(&self.download).await;
        self.record(&mut builder, PhaseResult::Download(download));

        guard.enter(RunState::UploadPhase);
        let upload = self.run_throughput(&self.upload).await;
        self.record(&mut builder, PhaseResult::Upload(upload));

        let session = builder.build()?;
        let isp = self.isp().await;

        let share_url = match &self.reporter {
            Some(reporter) => {
                guard.enter(RunState::Reporting);
                match reporter.submit(&session, &isp).await {
                    Ok(url) => Some(url),
                    Err(e) => {
                        self.errors.log_recovered(&e, "no share link").await;
                        None
                    }
                }
            }
            None => None,
        };

        drop(guard);
        self.ctx.board.set_status(if share_url.is_some() {
            STATUS_SHARE_READY
        } else {
            STATUS_FINISHED
        });

        Ok(RunOutcome::Completed(Box::new(RunReport {
            session,
            share_url,
            isp,
            download,
            upload,
        })))
    }

    async fn run_ping(&self) -> LatencyResult {
        let logger = self.ctx.logger.logger();
        let operation = logger.start_operation("ping_phase").await;
        let result = self.ping.run(&self.ctx).await;
        logger.end_operation(&operation, "ping_phase", true).await;
        result
    }

    async fn run_throughput(&self, engine: &dyn ThroughputEngine) -> ThroughputResult {
        let name = format!("{}_phase", engine.kind());
        let logger = self.ctx.logger.logger();
        let operation = logger.start_operation(&name).await;
        let result = engine.run(&self.ctx).await;
        logger.end_operation(&operation, &name, true).await;
        result
    }

    fn record(&self, builder: &mut TestSessionBuilder, result: PhaseResult) {
        self.ctx.board.commit(&result);
        builder.record(result);
    }
}

/// Holds the run slot; releasing it returns the orchestrator to Idle even if
/// the run future is dropped part way
struct RunGuard<'a> {
    state: &'a Mutex<RunState>,
    board: &'a MetricsBoard,
}

impl<'a> RunGuard<'a> {
    fn acquire(state: &'a Mutex<RunState>, board: &'a MetricsBoard) -> Option<Self> {
        let mut current = state.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != RunState::Idle {
            return None;
        }
        *current = RunState::PingPhase;
        Some(Self { state, board })
    }

    fn enter(&self, next: RunState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
        self.board.set_state(next);
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.enter(RunState::Idle);
    }
}

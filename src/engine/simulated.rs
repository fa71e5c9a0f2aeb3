//! Deterministic in-process transport for engine tests under paused time

use super::{EngineContext, MetricsBoard};
use crate::{
    client::{ByteStream, SpeedTransport},
    error::{AppError, Result},
    isp::IspInfo,
    logging::MeasurementLogger,
    models::Config,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub enum DownloadBehavior {
    /// Endless body yielding `chunk_bytes` every `every`
    Steady { chunk_bytes: usize, every: Duration },
    /// Body that ends after `chunks` chunks
    Finite { chunks: usize, chunk_bytes: usize, every: Duration },
    /// Every open fails
    Failing,
}

#[derive(Debug, Clone)]
pub enum UploadBehavior {
    /// Report `ack_percent` of the payload at once, then complete after `hold`
    Report { ack_percent: u64, hold: Duration },
    /// Report `step` more bytes every `every` until the payload is acknowledged
    Trickle { step: u64, every: Duration },
    /// Never report progress and never complete
    Silent,
    /// Fail immediately
    Failing,
    /// Fail the first call, then acknowledge everything and complete after `hold`
    FailFirst { hold: Duration },
}

pub struct SimulatedTransport {
    ping_delays: Vec<u64>,
    failing_pings: bool,
    download: DownloadBehavior,
    upload: UploadBehavior,
    isp: Option<IspInfo>,
    ping_calls: AtomicUsize,
    download_opens: AtomicU64,
    upload_calls: AtomicU64,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self {
            ping_delays: Vec::new(),
            failing_pings: false,
            download: DownloadBehavior::Steady {
                chunk_bytes: 500_000,
                every: Duration::from_millis(100),
            },
            upload: UploadBehavior::Report {
                ack_percent: 100,
                hold: Duration::from_millis(300),
            },
            isp: Some(IspInfo::new("Simulated ISP")),
            ping_calls: AtomicUsize::new(0),
            download_opens: AtomicU64::new(0),
            upload_calls: AtomicU64::new(0),
        }
    }

    /// Round-trip time in milliseconds of successive pings; later pings are instant
    pub fn with_ping_delays(mut self, delays_ms: &[u64]) -> Self {
        self.ping_delays = delays_ms.to_vec();
        self
    }

    pub fn with_failing_pings(mut self) -> Self {
        self.failing_pings = true;
        self
    }

    pub fn with_download(mut self, behavior: DownloadBehavior) -> Self {
        self.download = behavior;
        self
    }

    pub fn with_upload(mut self, behavior: UploadBehavior) -> Self {
        self.upload = behavior;
        self
    }

    pub fn without_isp(mut self) -> Self {
        self.isp = None;
        self
    }

    pub fn ping_calls(&self) -> usize {
        self.ping_calls.load(Ordering::SeqCst)
    }

    pub fn download_opens(&self) -> u64 {
        self.download_opens.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> u64 {
        self.upload_calls.load(Ordering::SeqCst)
    }
}

fn repeating_body(chunk: Bytes, every: Duration, limit: Option<usize>) -> ByteStream {
    Box::pin(futures::stream::unfold(0usize, move |sent| {
        let chunk = chunk.clone();
        async move {
            if limit.is_some_and(|limit| sent >= limit) {
                return None;
            }
            tokio::time::sleep(every).await;
            Some((Ok(chunk), sent + 1))
        }
    }))
}

#[async_trait]
impl SpeedTransport for SimulatedTransport {
    async fn ping(&self) -> Result<()> {
        let call = self.ping_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(&delay) = self.ping_delays.get(call) {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.failing_pings {
            return Err(AppError::network("connection refused"));
        }
        Ok(())
    }

    async fn open_download(&self, _chunk_mb: u32) -> Result<ByteStream> {
        self.download_opens.fetch_add(1, Ordering::SeqCst);
        match &self.download {
            DownloadBehavior::Steady { chunk_bytes, every } => {
                Ok(repeating_body(Bytes::from(vec![0u8; *chunk_bytes]), *every, None))
            }
            DownloadBehavior::Finite { chunks, chunk_bytes, every } => {
                Ok(repeating_body(Bytes::from(vec![0u8; *chunk_bytes]), *every, Some(*chunks)))
            }
            DownloadBehavior::Failing => Err(AppError::http_request("Download request returned status 503")),
        }
    }

    async fn upload(&self, payload: Bytes, progress: mpsc::Sender<u64>) -> Result<()> {
        let call = self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let total = payload.len() as u64;
        match &self.upload {
            UploadBehavior::Report { ack_percent, hold } => {
                let _ = progress.try_send(total * ack_percent / 100);
                tokio::time::sleep(*hold).await;
                Ok(())
            }
            UploadBehavior::Trickle { step, every } => {
                let mut loaded = 0;
                while loaded < total {
                    tokio::time::sleep(*every).await;
                    loaded = (loaded + step).min(total);
                    let _ = progress.try_send(loaded);
                }
                Ok(())
            }
            UploadBehavior::Silent => {
                std::future::pending::<()>().await;
                Ok(())
            }
            UploadBehavior::Failing => Err(AppError::network("connection reset")),
            UploadBehavior::FailFirst { .. } if call == 0 => Err(AppError::network("connection reset")),
            UploadBehavior::FailFirst { hold } => {
                let _ = progress.try_send(total);
                tokio::time::sleep(*hold).await;
                Ok(())
            }
        }
    }

    async fn fetch_isp_info(&self) -> Result<IspInfo> {
        self.isp
            .clone()
            .ok_or_else(|| AppError::http_request("ISP lookup returned status 404"))
    }
}

/// Engine context around a simulated transport with default logging
pub fn test_context(transport: Arc<SimulatedTransport>) -> EngineContext {
    EngineContext::new(
        transport,
        MetricsBoard::new(),
        Arc::new(MeasurementLogger::new(&Config::default())),
    )
}

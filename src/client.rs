//! HTTP transport for the speedtest backend


use crate::{
    defaults,
    error::{AppError, Result},
    isp::IspInfo,
    models::Config,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{header, Client, Url};
use std::{pin::Pin, time::Duration};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Streamed download body
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Size of the slices an upload body is handed to the connection in
pub const UPLOAD_SLICE_BYTES: usize = 64 * 1024;

/// Transport abstraction used by the measurement engine
#[async_trait]
pub trait SpeedTransport: Send + Sync {
    /// One latency round trip. Only transport failures are errors; the
    /// response status is ignored.
    async fn ping(&self) -> Result<()>;

    /// Open one streaming download. A non-success status is an error.
    async fn open_download(&self, chunk_mb: u32) -> Result<ByteStream>;

    /// Upload `payload` once. Cumulative acknowledged byte counts are sent on
    /// `progress` as they become known; events may be dropped when the
    /// channel is full.
    async fn upload(&self, payload: Bytes, progress: mpsc::Sender<u64>) -> Result<()>;

    /// Look up the caller's ISP
    async fn fetch_isp_info(&self) -> Result<IspInfo>;
}

/// Endpoint URLs relative to the configured server base
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    /// Build from a server base URL; a trailing slash is added if missing so
    /// that endpoint paths resolve beneath it
    pub fn new(server_url: &str) -> Result<Self> {
        HttpUtils::validate_url(server_url)?;
        let mut base = Url::parse(server_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.set_query(None);
        base.set_fragment(None);
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn join(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    fn with_cache_buster(mut url: Url) -> Url {
        url.query_pairs_mut().append_pair("r", &cache_buster());
        url
    }

    pub fn download(&self, chunk_mb: u32) -> Result<Url> {
        let mut url = self.join(defaults::DOWNLOAD_PATH)?;
        url.query_pairs_mut().append_pair("ckSize", &chunk_mb.to_string());
        Ok(Self::with_cache_buster(url))
    }

    pub fn latency(&self) -> Result<Url> {
        Ok(Self::with_cache_buster(self.join(defaults::LATENCY_PATH)?))
    }

    pub fn upload(&self) -> Result<Url> {
        Ok(Self::with_cache_buster(self.join(defaults::UPLOAD_PATH)?))
    }

    pub fn isp(&self) -> Result<Url> {
        let mut url = self.join(defaults::ISP_PATH)?;
        url.query_pairs_mut().append_pair("isp", "true");
        Ok(Self::with_cache_buster(url))
    }

    pub fn telemetry(&self) -> Result<Url> {
        Ok(Self::with_cache_buster(self.join(defaults::TELEMETRY_PATH)?))
    }

    /// Link under which a submitted result can be viewed
    pub fn share_url(&self, id: &str) -> Result<String> {
        let mut url = self.join(defaults::SHARE_PATH)?;
        url.query_pairs_mut().append_pair("id", id);
        Ok(url.to_string())
    }
}

/// Random query value defeating intermediate caches
fn cache_buster() -> String {
    Uuid::new_v4().simple().to_string()
}

/// User agent sent with every request
pub fn user_agent() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
}

/// reqwest-backed transport
pub struct NetworkClient {
    client: Client,
    endpoints: Endpoints,
    request_timeout: Duration,
}

impl NetworkClient {
    /// Create a new network client
    pub fn new(server_url: &str) -> Result<Self> {
        Self::with_timeout(server_url, defaults::DEFAULT_TIMEOUT)
    }

    /// Create a new network client with custom timeout.
    ///
    /// The timeout bounds connects and the small requests (latency, ISP).
    /// Transfers are bounded by the phase deadline instead.
    pub fn with_timeout(server_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .user_agent(user_agent())
            .build()
            .map_err(|e| AppError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoints: Endpoints::new(server_url)?,
            request_timeout: timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_timeout(&config.server_url, config.timeout())
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

#[async_trait]
impl SpeedTransport for NetworkClient {
    async fn ping(&self) -> Result<()> {
        let response = self.client
            .get(self.endpoints.latency()?)
            .timeout(self.request_timeout)
            .send()
            .await?;
        response.bytes().await?;
        Ok(())
    }

    async fn open_download(&self, chunk_mb: u32) -> Result<ByteStream> {
        let response = self.client
            .get(self.endpoints.download(chunk_mb)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::http_request(format!("Download request returned status {}", status)));
        }

        Ok(Box::pin(response.bytes_stream().map(|chunk| chunk.map_err(AppError::from))))
    }

    async fn upload(&self, payload: Bytes, progress: mpsc::Sender<u64>) -> Result<()> {
        let total = payload.len();
        let slices: Vec<Bytes> = (0..total)
            .step_by(UPLOAD_SLICE_BYTES)
            .map(|start| payload.slice(start..(start + UPLOAD_SLICE_BYTES).min(total)))
            .collect();

        // Count each slice as it is pulled by the connection
        let mut sent: u64 = 0;
        let body_stream = futures::stream::iter(slices).map(move |slice| {
            sent += slice.len() as u64;
            let _ = progress.try_send(sent);
            Ok::<Bytes, std::io::Error>(slice)
        });

        let response = self.client
            .post(self.endpoints.upload()?)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header(header::CONTENT_LENGTH, total)
            .body(reqwest::Body::wrap_stream(body_stream))
            .send()
            .await?;

        let status = response.status();
        response.bytes().await?;
        if !status.is_success() {
            return Err(AppError::http_request(format!("Upload request returned status {}", status)));
        }
        Ok(())
    }

    async fn fetch_isp_info(&self) -> Result<IspInfo> {
        let response = self.client
            .get(self.endpoints.isp()?)
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::http_request(format!(
                "ISP lookup returned status {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        IspInfo::from_response(&body)
    }
}

/// Utility functions for HTTP operations
pub struct HttpUtils;

impl HttpUtils {
    /// Validate URL format
    pub fn validate_url(url: &str) -> Result<()> {
        let parsed = Url::parse(url)
            .map_err(|e| AppError::validation(format!("Invalid URL format: {}", e)))?;

        match parsed.scheme() {
            "http" | "https" => {},
            scheme => return Err(AppError::validation(format!("Unsupported URL scheme: {}", scheme))),
        }

        if parsed.host().is_none() {
            return Err(AppError::validation("URL must have a host"));
        }

        Ok(())
    }

    /// Extract domain from URL
    pub fn extract_domain(url: &str) -> Result<String> {
        let parsed = Url::parse(url)
            .map_err(|e| AppError::parse(format!("Invalid URL: {}", e)))?;

        parsed.host_str()
            .ok_or_else(|| AppError::validation("URL must have a host"))
            .map(|s| s.to_string())
    }

    /// Check if URL uses HTTPS
    pub fn is_https(url: &str) -> bool {
        Url::parse(url).map(|parsed| parsed.scheme() == "https").unwrap_or(false)
    }

    /// Check whether the URL points at this machine
    pub fn is_loopback(url: &str) -> bool {
        match Url::parse(url) {
            Ok(parsed) => match parsed.host() {
                Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
                Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
                Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
                None => false,
            },
            Err(_) => false,
        }
    }
}

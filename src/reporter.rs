//! Result submission and share links

use crate::{
    client::{user_agent, Endpoints},
    error::{AppError, Result},
    isp::IspInfo,
    models::{Config, TestSession},
};
use async_trait::async_trait;
use regex::Regex;
use reqwest::{multipart::Form, Client};
use std::time::Duration;

/// Submits a finished session and returns the link it can be viewed under
#[async_trait]
pub trait ResultReporter: Send + Sync {
    async fn submit(&self, session: &TestSession, isp: &IspInfo) -> Result<String>;
}

/// Posts results to the backend's telemetry endpoint
pub struct HttpResultReporter {
    client: Client,
    endpoints: Endpoints,
    request_timeout: Duration,
    id_pattern: Regex,
}

impl HttpResultReporter {
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .user_agent(user_agent())
            .build()
            .map_err(|e| AppError::reporting(format!("Failed to create HTTP client: {}", e)))?;

        let id_pattern = Regex::new(r"^id\s+(\S+)")
            .map_err(|e| AppError::internal(format!("Invalid result id pattern: {}", e)))?;

        Ok(Self {
            client,
            endpoints: Endpoints::new(server_url)?,
            request_timeout: timeout,
            id_pattern,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.server_url, config.timeout())
    }

    /// Multipart body in the layout the backend stores
    pub fn build_form(session: &TestSession, isp: &IspInfo) -> Result<Form> {
        Ok(Form::new()
            .text("ispinfo", isp.to_json()?)
            .text("dl", format!("{:.1}", session.download_mbps))
            .text("ul", format!("{:.1}", session.upload_mbps))
            .text("ping", format!("{:.1}", session.ping_ms))
            .text("jitter", format!("{:.1}", session.jitter_ms))
            .text("log", "")
            .text("extra", ""))
    }

    /// Result id from a telemetry response body
    pub fn extract_id<'a>(&self, body: &'a str) -> Option<&'a str> {
        self.id_pattern
            .captures(body)
            .and_then(|captures| captures.get(1))
            .map(|id| id.as_str())
    }
}

#[async_trait]
impl ResultReporter for HttpResultReporter {
    async fn submit(&self, session: &TestSession, isp: &IspInfo) -> Result<String> {
        let form = Self::build_form(session, isp)?;

        let response = self.client
            .post(self.endpoints.telemetry()?)
            .timeout(self.request_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::reporting(format!("Result submission failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::reporting(format!("Failed to read submission response: {}", e)))?;

        match self.extract_id(&body) {
            Some(id) => self.endpoints.share_url(id),
            None => Err(AppError::reporting(format!(
                "Submission response (status {}) carried no result id",
                status
            ))),
        }
    }
}

//! Core formatting traits and implementations
//!
//! This module defines the output formatting interface and provides plain
//! text and JSON implementations.

use crate::{
    error::{AppError, Result},
    isp::IspInfo,
    models::{LiveMetrics, RunState, ThroughputResult},
    orchestrator::RunReport,
};
use std::fmt::{self, Write as _};

/// Main trait for output formatting
pub trait OutputFormatter: Send + Sync {
    /// Format a header section
    fn format_header(&self, title: &str) -> Result<String>;

    /// Format the ISP line shown before a run
    fn format_isp(&self, isp: &IspInfo) -> Result<String>;

    /// Format the single-line live view of a running phase
    fn format_live(&self, live: &LiveMetrics) -> Result<String>;

    /// Format the final results of a run, share link included
    fn format_report(&self, report: &RunReport) -> Result<String>;

    /// Format error messages
    fn format_error(&self, error: &str) -> Result<String>;

    /// Format warning messages
    fn format_warning(&self, warning: &str) -> Result<String>;

    /// Format success messages
    fn format_success(&self, message: &str) -> Result<String>;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    /// Enable colored output
    pub enable_color: bool,
    /// Show per-phase request and compensation counts
    pub verbose_mode: bool,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
        }
    }
}

pub(crate) fn format_failed(e: fmt::Error) -> AppError {
    AppError::io(format!("Failed to format output: {}", e))
}

/// Label and unit for the value the live line shows in `state`
pub(crate) fn live_figure(live: &LiveMetrics) -> Option<(&'static str, Option<f64>, &'static str)> {
    match live.state {
        RunState::PingPhase => Some(("Ping", live.ping_ms, "ms")),
        RunState::DownloadPhase => Some(("Download", live.download_mbps, "Mbps")),
        RunState::UploadPhase => Some(("Upload", live.upload_mbps, "Mbps")),
        RunState::Idle | RunState::Reporting => None,
    }
}

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    /// Create a new plain formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    /// Format the transfer detail of one throughput phase
    pub(crate) fn format_transfer(name: &str, result: &ThroughputResult) -> String {
        let mut line = format!(
            "  {:<9} {:.1} MB in {:.2}s, {} requests, {} failed",
            name,
            result.bytes as f64 / 1_000_000.0,
            result.elapsed_seconds,
            result.requests,
            result.failures
        );
        if result.compensations > 0 {
            line.push_str(&format!(
                ", {} compensated ({} bytes)",
                result.compensations, result.compensated_bytes
            ));
        }
        line
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "=".repeat(title.len() + 4);

        writeln!(output, "{}", border).map_err(format_failed)?;
        writeln!(output, "  {}  ", title).map_err(format_failed)?;
        write!(output, "{}", border).map_err(format_failed)?;

        Ok(output)
    }

    fn format_isp(&self, isp: &IspInfo) -> Result<String> {
        Ok(format!("ISP: {}", isp.processed_string))
    }

    fn format_live(&self, live: &LiveMetrics) -> Result<String> {
        match live_figure(live) {
            Some((label, value, unit)) => Ok(format!(
                "{} {}: {} {}",
                live.status,
                label,
                LiveMetrics::display_value(value),
                unit
            )),
            None => Ok(live.status.clone()),
        }
    }

    fn format_report(&self, report: &RunReport) -> Result<String> {
        let session = &report.session;
        let mut output = String::new();

        writeln!(output, "Results:").map_err(format_failed)?;
        writeln!(output, "--------").map_err(format_failed)?;
        writeln!(output, "Ping:      {:.2} ms", session.ping_ms).map_err(format_failed)?;
        writeln!(output, "Jitter:    {:.2} ms", session.jitter_ms).map_err(format_failed)?;
        writeln!(output, "Download:  {:.2} Mbps", session.download_mbps).map_err(format_failed)?;
        writeln!(output, "Upload:    {:.2} Mbps", session.upload_mbps).map_err(format_failed)?;
        write!(output, "ISP:       {}", report.isp.processed_string).map_err(format_failed)?;

        if self.options.verbose_mode {
            writeln!(output).map_err(format_failed)?;
            writeln!(output, "Transfers:").map_err(format_failed)?;
            writeln!(output, "{}", Self::format_transfer("download", &report.download)).map_err(format_failed)?;
            write!(output, "{}", Self::format_transfer("upload", &report.upload)).map_err(format_failed)?;
        }

        if let Some(url) = &report.share_url {
            write!(output, "\nShare:     {}", url).map_err(format_failed)?;
        }

        Ok(output)
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("ERROR: {}", error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("WARNING: {}", warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("SUCCESS: {}", message))
    }
}

/// Machine-readable output for `--json`; only the final report is emitted
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_header(&self, _title: &str) -> Result<String> {
        Ok(String::new())
    }

    fn format_isp(&self, _isp: &IspInfo) -> Result<String> {
        Ok(String::new())
    }

    fn format_live(&self, _live: &LiveMetrics) -> Result<String> {
        Ok(String::new())
    }

    fn format_report(&self, report: &RunReport) -> Result<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(serde_json::json!({ "error": error }).to_string())
    }

    fn format_warning(&self, _warning: &str) -> Result<String> {
        Ok(String::new())
    }

    fn format_success(&self, _message: &str) -> Result<String> {
        Ok(String::new())
    }
}

//! Colored formatter implementation with terminal color support
//!
//! Figures are colored by their [`SpeedClass`]: green when fast, yellow when
//! moderate, red when slow.

use super::formatter::{format_failed, live_figure, FormattingOptions, OutputFormatter, PlainFormatter};
use crate::{
    error::Result,
    isp::IspInfo,
    models::{LiveMetrics, RunState, SpeedClass},
    orchestrator::RunReport,
};
use colored::*;
use std::fmt::Write as _;

impl SpeedClass {
    /// Get color for this speed class
    pub fn color(&self) -> Color {
        match self {
            SpeedClass::Fast => Color::Green,
            SpeedClass::Moderate => Color::Yellow,
            SpeedClass::Slow => Color::Red,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SpeedClass::Fast => "Fast",
            SpeedClass::Moderate => "Moderate",
            SpeedClass::Slow => "Slow",
        }
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub muted: Color,
    pub border: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            muted: Color::BrightBlack,
            border: Color::BrightBlack,
        }
    }
}

/// Colored formatter implementation
pub struct ColoredFormatter {
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    /// Create a new colored formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self {
            options,
            color_scheme: ColorScheme::default(),
        }
    }

    /// Create a colored formatter with custom color scheme
    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        Self { options, color_scheme }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    /// Apply bold formatting if colors are enabled
    fn bold(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.bold()
        } else {
            text.normal()
        }
    }

    fn dimmed(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.dimmed()
        } else {
            text.normal()
        }
    }

    fn format_rate(&self, mbps: f64) -> String {
        let class = SpeedClass::from_mbps(mbps);
        format!(
            "{} {}",
            self.colorize(&format!("{:.2} Mbps", mbps), class.color()).bold(),
            self.dimmed(&format!("({})", class.description()))
        )
    }

    fn format_latency(&self, ms: f64) -> String {
        let class = SpeedClass::from_latency_ms(ms);
        self.colorize(&format!("{:.2} ms", ms), class.color()).to_string()
    }

    /// Create a colored section header
    fn create_section_header(&self, title: &str, icon: &str) -> String {
        format!("{} {}", icon, self.bold(title).color(self.color_scheme.header))
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();

        let decorated_title = format!("⚡ {}", title);
        let border = "═".repeat(decorated_title.chars().count() + 4);

        writeln!(output, "{}", self.colorize(&border, self.color_scheme.border)).map_err(format_failed)?;
        writeln!(output, "  {}  ", self.bold(&decorated_title).color(self.color_scheme.header)).map_err(format_failed)?;
        write!(output, "{}", self.colorize(&border, self.color_scheme.border)).map_err(format_failed)?;

        Ok(output)
    }

    fn format_isp(&self, isp: &IspInfo) -> Result<String> {
        let name = if isp.is_unknown() {
            self.dimmed(&isp.processed_string)
        } else {
            self.colorize(&isp.processed_string, self.color_scheme.info)
        };
        Ok(format!("🌐 ISP: {}", name))
    }

    fn format_live(&self, live: &LiveMetrics) -> Result<String> {
        let status = self.colorize(&live.status, self.color_scheme.info);
        let Some((label, value, unit)) = live_figure(live) else {
            return Ok(status.to_string());
        };

        let figure = match (live.state, value) {
            (_, None) => self.dimmed(&format!("-- {}", unit)).to_string(),
            (RunState::PingPhase, Some(ms)) => self.format_latency(ms),
            (_, Some(mbps)) => self
                .colorize(&format!("{:.2} {}", mbps, unit), SpeedClass::from_mbps(mbps).color())
                .to_string(),
        };
        Ok(format!("{} {}: {}", status, label, figure))
    }

    fn format_report(&self, report: &RunReport) -> Result<String> {
        let session = &report.session;
        let mut output = String::new();

        writeln!(output, "{}", self.create_section_header("Results", "📊")).map_err(format_failed)?;
        writeln!(output, "🏓 Ping:      {}", self.format_latency(session.ping_ms)).map_err(format_failed)?;
        writeln!(output, "〰️  Jitter:    {}", self.format_latency(session.jitter_ms)).map_err(format_failed)?;
        writeln!(output, "⬇️  Download:  {}", self.format_rate(session.download_mbps)).map_err(format_failed)?;
        writeln!(output, "⬆️  Upload:    {}", self.format_rate(session.upload_mbps)).map_err(format_failed)?;
        write!(output, "{}", self.format_isp(&report.isp)?).map_err(format_failed)?;

        if self.options.verbose_mode {
            writeln!(output).map_err(format_failed)?;
            writeln!(output, "{}", self.create_section_header("Transfers", "🔍")).map_err(format_failed)?;
            writeln!(output, "{}", self.dimmed(&PlainFormatter::format_transfer("download", &report.download)))
                .map_err(format_failed)?;
            write!(output, "{}", self.dimmed(&PlainFormatter::format_transfer("upload", &report.upload)))
                .map_err(format_failed)?;
        }

        if let Some(url) = &report.share_url {
            write!(output, "\n🔗 Share:     {}", self.colorize(url, self.color_scheme.success).underline())
                .map_err(format_failed)?;
        }

        Ok(output)
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("{} {}", self.bold("❌ Error:").color(self.color_scheme.error), error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("{} {}", self.bold("⚠️  Warning:").color(self.color_scheme.warning), warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("{} {}", self.bold("✅").color(self.color_scheme.success), message))
    }
}

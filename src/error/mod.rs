//! Error handling for the network speed tester
//!
//! Every failure is an [`AppError`]. A variant fixes the category label used
//! in logs, the process exit code, the console color and the hint shown in
//! verbose mode. Failures of a single transfer, the ISP lookup or telemetry
//! are recoverable: the run records them and carries on.

use colored::{Color, Colorize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid settings from flags, the environment or `.env`
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection refused, reset or unreachable
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered with an unusable status
    #[error("HTTP request error: {0}")]
    HttpRequest(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Rejected URL or option value
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(String),

    /// Malformed URL, JSON or ISP payload
    #[error("Parsing error: {0}")]
    Parse(String),

    /// A phase ended without a usable result
    #[error("Measurement error: {0}")]
    Measurement(String),

    /// Telemetry submission failed or returned no result id
    #[error("Reporting error: {0}")]
    Reporting(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

macro_rules! constructors {
    ($($name:ident => $variant:ident),* $(,)?) => {
        impl AppError {
            $(
                pub fn $name<S: Into<String>>(message: S) -> Self {
                    Self::$variant(message.into())
                }
            )*
        }
    };
}

constructors! {
    config => Config,
    network => Network,
    http_request => HttpRequest,
    timeout => Timeout,
    validation => Validation,
    io => Io,
    parse => Parse,
    measurement => Measurement,
    reporting => Reporting,
    internal => Internal,
}

impl AppError {
    /// Short label used in log fields and console prefixes
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::Network(_) => "NETWORK",
            Self::HttpRequest(_) => "HTTP",
            Self::Timeout(_) => "TIMEOUT",
            Self::Validation(_) => "VALIDATION",
            Self::Io(_) => "IO",
            Self::Parse(_) => "PARSE",
            Self::Measurement(_) => "MEASURE",
            Self::Reporting(_) => "REPORT",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Whether running the test again may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::HttpRequest(_) | Self::Timeout(_) | Self::Reporting(_)
        )
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => 1,
            Self::Network(_) | Self::HttpRequest(_) => 2,
            Self::Timeout(_) => 3,
            Self::Reporting(_) => 4,
            Self::Io(_) => 5,
            Self::Measurement(_) => 6,
            Self::Internal(_) => 99,
        }
    }

    /// One-line hint for the user
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::Config(_) => "Check .env and the command-line flags, or run with --init-env for an annotated example.",
            Self::Network(_) => "Check that the speedtest server is reachable from this machine.",
            Self::HttpRequest(_) => "The server may not be a speedtest backend. Check the --server URL.",
            Self::Timeout(_) => "Raise --timeout or pick a server closer to you.",
            Self::Validation(_) => "Server URLs need an http or https scheme and a host.",
            Self::Io(_) => "Check that the working directory is writable.",
            Self::Parse(_) => "The backend returned data in an unexpected format.",
            Self::Measurement(_) => "A phase ended without data. Run the test again.",
            Self::Reporting(_) => "The measurements are still valid. The server may not accept shared results.",
            Self::Internal(_) => "This is a bug. Please report it with the output of --debug.",
        }
    }

    /// Error message followed by its hint
    pub fn user_friendly_message(&self) -> String {
        format!("{}\n\nSuggestion: {}", self, self.suggestion())
    }

    fn console_color(&self) -> Color {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => Color::Red,
            Self::Network(_) | Self::HttpRequest(_) => Color::Yellow,
            Self::Timeout(_) => Color::Blue,
            Self::Reporting(_) => Color::Magenta,
            Self::Io(_) | Self::Measurement(_) => Color::Cyan,
            Self::Internal(_) => Color::BrightRed,
        }
    }

    /// `[CATEGORY] message`, colored by category when enabled
    pub fn format_for_console(&self, use_color: bool) -> String {
        if !use_color {
            return format!("[{}] {}", self.category(), self);
        }

        let color = self.console_color();
        format!("[{}] {}", self.category().color(color).bold(), self.to_string().color(color))
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(error: url::ParseError) -> Self {
        Self::parse(format!("URL parse error: {}", error))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse(format!("JSON parse error: {}", error))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::timeout(error.to_string())
        } else if error.is_connect() || error.is_request() {
            Self::network(error.to_string())
        } else {
            Self::http_request(error.to_string())
        }
    }
}

impl From<dotenv::Error> for AppError {
    fn from(error: dotenv::Error) -> Self {
        Self::config(format!("Environment file error: {}", error))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Prints the error that ended a run to stderr
pub struct ErrorReporter {
    pub use_color: bool,
    pub verbose: bool,
}

impl ErrorReporter {
    pub fn new(use_color: bool, verbose: bool) -> Self {
        Self { use_color, verbose }
    }

    /// Text printed for `error`; verbose mode adds the hint and a retry note
    pub fn render(&self, error: &AppError) -> String {
        let mut out = error.format_for_console(self.use_color);
        if !self.verbose {
            return out;
        }

        out.push_str("\n\nSuggestion: ");
        out.push_str(error.suggestion());

        if error.is_recoverable() {
            let note = "This may be temporary. Running the test again can succeed.";
            out.push_str("\n\n");
            if self.use_color {
                out.push_str(&note.green().to_string());
            } else {
                out.push_str(note);
            }
        }

        out
    }

    pub fn report_error(&self, error: &AppError) {
        eprintln!("{}", self.render(error));
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

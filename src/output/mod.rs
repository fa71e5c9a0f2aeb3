//! Output formatting and display system
//!
//! Colored, plain and JSON renderings of run results, plus the live progress
//! line shown while phases run.

mod colored;
mod formatter;
mod live;

pub use colored::{ColorScheme, ColoredFormatter};
pub use formatter::{FormattingOptions, JsonFormatter, OutputFormatter, PlainFormatter};
pub use live::LiveDisplay;

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on output mode and color support
    pub fn create_formatter(enable_color: bool, verbose: bool, json: bool) -> Box<dyn OutputFormatter> {
        if json {
            return Box::new(JsonFormatter::new());
        }

        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }

    /// Create a plain text formatter for scripts/logs
    pub fn create_plain_formatter() -> Box<dyn OutputFormatter> {
        Self::create_formatter(false, false, false)
    }
}

//! Single-line live progress on stderr
//!
//! Follows the metrics board and rewrites one status line in place while a
//! run is in flight. stdout is left to the final report.

use super::formatter::OutputFormatter;
use crate::{engine::MetricsBoard, models::LiveMetrics};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::{sync::watch, task::JoinHandle};

/// Minimum spacing between redraws
pub const REDRAW_INTERVAL: Duration = Duration::from_millis(100);

pub struct LiveDisplay {
    handle: JoinHandle<()>,
}

impl LiveDisplay {
    /// Start following `board`; lines are rendered by `formatter`
    pub fn start(board: &MetricsBoard, formatter: Arc<dyn OutputFormatter>) -> Self {
        let updates = board.subscribe();
        let handle = tokio::spawn(follow(updates, formatter));
        Self { handle }
    }

    /// Stop following and end the in-place line
    pub fn finish(self) {
        self.handle.abort();
        eprintln!();
    }
}

async fn follow(mut updates: watch::Receiver<LiveMetrics>, formatter: Arc<dyn OutputFormatter>) {
    let mut last_width = 0;
    while updates.changed().await.is_ok() {
        let live = updates.borrow_and_update().clone();
        let Ok(line) = formatter.format_live(&live) else {
            continue;
        };
        if line.is_empty() {
            continue;
        }
        last_width = redraw(&line, last_width);
        tokio::time::sleep(REDRAW_INTERVAL).await;
    }
}

/// Overwrite the current line, padding over anything longer left behind
fn redraw(line: &str, last_width: usize) -> usize {
    let width = line.chars().count();
    let padding = last_width.saturating_sub(width);
    eprint!("\r{}{}", line, " ".repeat(padding));
    io::stderr().flush().unwrap_or(());
    width
}

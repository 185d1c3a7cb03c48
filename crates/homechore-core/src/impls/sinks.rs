//! FailureSink implementations.
//!
//! - `TracingFailureSink`: 構造化ログに event payload ごと出力
//! - `ChannelFailureSink`: report をストリームとして受け取る
//! - `FnFailureSink`: 任意のクロージャを呼ぶ

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::domain::FailureReport;
use crate::ports::FailureSink;

/// Logs each dropped event with its full payload.
///
/// Cancellations are logged at `info`, everything else at `error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingFailureSink;

impl FailureSink for TracingFailureSink {
    fn report(&self, report: FailureReport) {
        let payload = serde_json::to_string(&report.event)
            .unwrap_or_else(|e| format!("<unserializable event: {e}>"));
        if report.is_alertable() {
            error!(
                event_id = %report.event.event_id(),
                user_id = %report.event.user_id(),
                task_id = %report.event.task_id(),
                reason = ?report.reason,
                attempts = report.attempts,
                last_error = report.last_error.as_deref().unwrap_or(""),
                payload = %payload,
                "completion event dropped"
            );
        } else {
            info!(
                event_id = %report.event.event_id(),
                attempts = report.attempts,
                payload = %payload,
                "completion event cancelled by shutdown"
            );
        }
    }
}

/// Forwards reports to an unbounded channel.
///
/// Reports are dropped silently once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelFailureSink {
    tx: mpsc::UnboundedSender<FailureReport>,
}

impl ChannelFailureSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FailureReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl FailureSink for ChannelFailureSink {
    fn report(&self, report: FailureReport) {
        // ignore send error: receiver may already be dropped
        let _ = self.tx.send(report);
    }
}

/// Calls a closure for each report.
pub struct FnFailureSink<F>(F);

impl<F> FnFailureSink<F>
where
    F: Fn(FailureReport) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> FailureSink for FnFailureSink<F>
where
    F: Fn(FailureReport) + Send + Sync,
{
    fn report(&self, report: FailureReport) {
        (self.0)(report)
    }
}

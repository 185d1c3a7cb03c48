//! CompletionConsumer - completion event を 1 件ずつ適用するループ
//!
//! # 状態遷移
//! - Idle → Draining → Applying → Idle（ループ）
//! - Idle → Stopped（shutdown）
//!
//! # 方針
//! - 同時に適用するイベントは常に 1 件（score 更新にロック不要）
//! - transient 失敗はこのループ内で backoff retry（channel の先頭は読み直さない）
//! - 実行中の attempt は shutdown で中断しない。backoff 待ちは中断する
//! - 停止時に channel に残っていたイベントは Cancelled として sink へ
//! - task が abort されても Drop で同じ報告を行う（処理中のイベントも含む）

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::applier::RewardApplier;
use super::channel::EventReceiver;
use super::retry::RetryPolicy;
use super::stats::ProcessorStats;
use crate::domain::{CompletionEvent, DropReason, ErrorKind, FailureReport};
use crate::ports::{Clock, FailureSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerState {
    /// Waiting for the next event.
    Idle,

    /// An event was dequeued and is being prepared.
    Draining,

    /// An attempt (or the backoff before the next one) is in progress.
    Applying,

    /// Terminal.
    Stopped,
}

impl ConsumerState {
    pub fn is_stopped(self) -> bool {
        matches!(self, ConsumerState::Stopped)
    }
}

/// The event being applied and how many attempts it has used.
struct InFlight {
    event: CompletionEvent,
    attempts: u32,
}

pub struct CompletionConsumer {
    rx: EventReceiver,
    in_flight: Option<InFlight>,
    stopped: bool,
    applier: RewardApplier,
    retry: RetryPolicy,
    sink: Arc<dyn FailureSink>,
    clock: Arc<dyn Clock>,
    stats: Arc<ProcessorStats>,
    state: Arc<watch::Sender<ConsumerState>>,
    shutdown: CancellationToken,
}

impl CompletionConsumer {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        rx: EventReceiver,
        applier: RewardApplier,
        retry: RetryPolicy,
        sink: Arc<dyn FailureSink>,
        clock: Arc<dyn Clock>,
        stats: Arc<ProcessorStats>,
        state: Arc<watch::Sender<ConsumerState>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            rx,
            in_flight: None,
            stopped: false,
            applier,
            retry,
            sink,
            clock,
            stats,
            state,
            shutdown,
        }
    }

    /// Run until shutdown is signalled or every sender is dropped.
    pub async fn run(mut self) {
        info!(
            max_attempts = self.retry.max_attempts,
            attempt_timeout_ms = self.applier.attempt_timeout().as_millis() as u64,
            "completion consumer started"
        );

        loop {
            self.set_state(ConsumerState::Idle);

            // shutdown を優先して判定する（biased）
            let event = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                event = self.rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            self.set_state(ConsumerState::Draining);
            self.in_flight = Some(InFlight {
                event: event.clone(),
                attempts: 0,
            });
            self.process(event).await;
            self.in_flight = None;
        }

        self.stop();
    }

    /// Apply one event, retrying transient failures.
    async fn process(&mut self, event: CompletionEvent) {
        let lag_ms = (self.clock.now() - event.enqueued_at()).num_milliseconds();
        debug!(
            event_id = %event.event_id(),
            user_id = %event.user_id(),
            task_id = %event.task_id(),
            reward = event.reward().points(),
            lag_ms,
            "completion event dequeued"
        );

        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            if let Some(in_flight) = self.in_flight.as_mut() {
                in_flight.attempts = attempts;
            }
            self.set_state(ConsumerState::Applying);

            let err = match self.applier.apply(&event).await {
                Ok(()) => {
                    self.stats.record_applied();
                    info!(
                        event_id = %event.event_id(),
                        user_id = %event.user_id(),
                        reward = event.reward().points(),
                        attempts,
                        "reward applied"
                    );
                    return;
                }
                Err(err) => err,
            };

            let kind = err.kind();
            if !kind.is_retryable() {
                let reason = match kind {
                    ErrorKind::Cancelled => DropReason::Cancelled,
                    _ => DropReason::Permanent,
                };
                self.drop_event(event, reason, attempts, Some(err.to_string()));
                return;
            }

            if !self.retry.should_retry(attempts) {
                self.drop_event(
                    event,
                    DropReason::RetriesExhausted,
                    attempts,
                    Some(err.to_string()),
                );
                return;
            }

            let delay = self.retry.next_delay(attempts);
            warn!(
                event_id = %event.event_id(),
                attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "reward attempt failed, retrying"
            );
            self.stats.record_retry();

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    self.drop_event(event, DropReason::Cancelled, attempts, Some(err.to_string()));
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn drop_event(
        &self,
        event: CompletionEvent,
        reason: DropReason,
        attempts: u32,
        last_error: Option<String>,
    ) {
        self.report(FailureReport::new(event, reason, attempts, last_error));
    }

    fn report(&self, report: FailureReport) {
        self.stats.record_dropped();
        self.sink.report(report);
    }

    /// Stop without ever running: buffered events are reported as cancelled.
    pub(crate) fn discard(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        // abort された場合のみ残っている
        if let Some(InFlight { event, attempts }) = self.in_flight.take() {
            warn!(
                event_id = %event.event_id(),
                attempts,
                "completion event interrupted mid-attempt"
            );
            self.report(FailureReport::cancelled(event, attempts));
        }

        let left = self.rx.close_and_drain();
        if !left.is_empty() {
            info!(count = left.len(), "discarding buffered completion events");
        }
        for event in left {
            self.report(FailureReport::cancelled(event, 0));
        }

        self.set_state(ConsumerState::Stopped);
        info!(stats = ?self.stats.snapshot(), "completion consumer stopped");
    }

    fn set_state(&self, state: ConsumerState) {
        self.state.send_replace(state);
    }
}

impl Drop for CompletionConsumer {
    /// Covers an aborted `run` and a consumer that was never started.
    fn drop(&mut self) {
        self.stop();
    }
}

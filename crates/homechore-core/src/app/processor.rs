//! CompletionProcessor - channel と consumer のライフサイクル管理
//!
//! - `start()` で consumer を tokio task として起動
//! - `shutdown(drain_timeout)` で停止を要求し、consumer の終了を待つ
//! - `sender()` で producer 用のハンドルを配る
//!
//! start 前に enqueue されたイベントはバッファに溜まり、start 後に処理されます。

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::channel::EventSender;
use super::consumer::{CompletionConsumer, ConsumerState};
use super::stats::{ProcessorStats, StatsSnapshot};
use crate::domain::{CompletionEvent, EnqueueError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StartError {
    #[error("completion processor already started")]
    AlreadyStarted,

    #[error("completion processor is shut down")]
    ShutDown,
}

#[derive(Debug, Error)]
pub enum ShutdownError {
    /// The consumer did not stop in time and was aborted.
    #[error("completion consumer did not stop within {0:?}")]
    DrainTimeout(Duration),

    #[error("completion consumer panicked: {0}")]
    ConsumerPanicked(String),
}

/// Task Completion Event Processor.
pub struct CompletionProcessor {
    sender: EventSender,
    consumer: Option<CompletionConsumer>,
    join: Option<JoinHandle<()>>,
    shutdown: CancellationToken,
    state: Arc<watch::Sender<ConsumerState>>,
    state_rx: watch::Receiver<ConsumerState>,
    stats: Arc<ProcessorStats>,
    drain_timeout: Duration,
}

impl CompletionProcessor {
    pub(crate) fn new(
        sender: EventSender,
        consumer: CompletionConsumer,
        shutdown: CancellationToken,
        state: Arc<watch::Sender<ConsumerState>>,
        stats: Arc<ProcessorStats>,
        drain_timeout: Duration,
    ) -> Self {
        let state_rx = state.subscribe();
        Self {
            sender,
            consumer: Some(consumer),
            join: None,
            shutdown,
            state,
            state_rx,
            stats,
            drain_timeout,
        }
    }

    /// Producer handle; clone it freely.
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    pub async fn enqueue(&self, event: CompletionEvent) -> Result<(), EnqueueError> {
        self.sender.enqueue(event).await
    }

    /// Spawn the consumer loop on the current tokio runtime.
    pub fn start(&mut self) -> Result<(), StartError> {
        if self.shutdown.is_cancelled() {
            return Err(StartError::ShutDown);
        }
        let consumer = self.consumer.take().ok_or(StartError::AlreadyStarted)?;
        self.join = Some(tokio::spawn(consumer.run()));
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.join.is_some()
    }

    pub fn state(&self) -> ConsumerState {
        *self.state_rx.borrow()
    }

    /// Watch consumer state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConsumerState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Token that stops the processor when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Shutdown with the configured drain timeout.
    pub async fn shutdown_default(&mut self) -> Result<(), ShutdownError> {
        self.shutdown(self.drain_timeout).await
    }

    /// Stop the consumer.
    ///
    /// The attempt in flight (if any) finishes; nothing else is dequeued.
    /// After this call `enqueue` fails with `ConsumerStopped`. Calling it
    /// again is a no-op.
    ///
    /// If the consumer is still busy after `drain_timeout` it is aborted; the
    /// interrupted event and everything still buffered go to the failure sink
    /// as `Cancelled` before this returns.
    pub async fn shutdown(&mut self, drain_timeout: Duration) -> Result<(), ShutdownError> {
        self.shutdown.cancel();

        // start されていない場合: バッファの中身を Cancelled として報告する
        if let Some(consumer) = self.consumer.take() {
            consumer.discard();
            info!("completion processor shut down before start");
            return Ok(());
        }

        let Some(mut join) = self.join.take() else {
            return Ok(());
        };

        match tokio::time::timeout(drain_timeout, &mut join).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(join_err)) => {
                self.state.send_replace(ConsumerState::Stopped);
                Err(ShutdownError::ConsumerPanicked(join_err.to_string()))
            }
            Err(_elapsed) => {
                warn!(
                    drain_timeout_ms = drain_timeout.as_millis() as u64,
                    "completion consumer did not stop in time, aborting"
                );
                join.abort();
                // abort 完了まで待つ: consumer の Drop が残りのイベントを sink へ報告する
                let _ = join.await;
                self.state.send_replace(ConsumerState::Stopped);
                Err(ShutdownError::DrainTimeout(drain_timeout))
            }
        }
    }
}

impl Drop for CompletionProcessor {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(consumer) = self.consumer.take() {
            consumer.discard();
        }
    }
}

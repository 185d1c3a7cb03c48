//! EventChannel - 有界の completion event キュー
//!
//! - producer は [`EventSender`] を clone して並行に enqueue できる
//! - consumer は 1 つだけ（[`EventReceiver`] は clone 不可）
//! - 同一 producer からのイベントは enqueue 順に届く（FIFO）
//!
//! shutdown 要求後の enqueue は `ConsumerStopped` で即座に失敗します。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::stats::ProcessorStats;
use crate::domain::{CompletionEvent, EnqueueError};

/// What `enqueue` does when the buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueMode {
    /// Fail with `ChannelFull` right away.
    NonBlocking,

    /// Wait for space up to the timeout, then fail with `ChannelFull`.
    Blocking(Duration),
}

/// Create a bounded channel. `shutdown` is the processor's stop signal.
pub(crate) fn event_channel(
    capacity: usize,
    mode: EnqueueMode,
    shutdown: CancellationToken,
    stats: Arc<ProcessorStats>,
) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    let sender = EventSender {
        tx,
        mode,
        shutdown,
        stats,
    };
    (sender, EventReceiver { rx })
}

/// Producer handle. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<CompletionEvent>,
    mode: EnqueueMode,
    shutdown: CancellationToken,
    stats: Arc<ProcessorStats>,
}

impl EventSender {
    pub fn mode(&self) -> EnqueueMode {
        self.mode
    }

    /// Same channel, different full-buffer behaviour.
    pub fn with_mode(&self, mode: EnqueueMode) -> Self {
        Self {
            mode,
            ..self.clone()
        }
    }

    /// Hand an event to the consumer.
    ///
    /// # Errors
    /// - `ConsumerStopped`: shutdown was requested (or the consumer is gone)
    /// - `ChannelFull`: no space (non-blocking), or no space before the timeout
    /// - `Cancelled`: shutdown fired while waiting for space
    pub async fn enqueue(&self, event: CompletionEvent) -> Result<(), EnqueueError> {
        let result = self.send(event).await;
        match &result {
            Ok(()) => self.stats.record_enqueued(),
            Err(err) => {
                self.stats.record_rejected();
                debug!(error = %err, "completion event rejected");
            }
        }
        result
    }

    async fn send(&self, event: CompletionEvent) -> Result<(), EnqueueError> {
        if self.shutdown.is_cancelled() {
            return Err(EnqueueError::ConsumerStopped);
        }

        match self.mode {
            EnqueueMode::NonBlocking => self.tx.try_send(event).map_err(|e| match e {
                TrySendError::Full(_) => EnqueueError::ChannelFull,
                TrySendError::Closed(_) => EnqueueError::ConsumerStopped,
            }),
            EnqueueMode::Blocking(timeout) => {
                tokio::select! {
                    biased;
                    _ = self.shutdown.cancelled() => Err(EnqueueError::Cancelled),
                    sent = tokio::time::timeout(timeout, self.tx.send(event)) => match sent {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(_closed)) => Err(EnqueueError::ConsumerStopped),
                        Err(_elapsed) => Err(EnqueueError::ChannelFull),
                    },
                }
            }
        }
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }
}

/// Consumer side. Exactly one exists per channel.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::Receiver<CompletionEvent>,
}

impl EventReceiver {
    /// Next event, or `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<CompletionEvent> {
        self.rx.recv().await
    }

    /// Refuse further sends and return whatever is still buffered, in order.
    pub fn close_and_drain(&mut self) -> Vec<CompletionEvent> {
        self.rx.close();
        let mut left = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            left.push(event);
        }
        left
    }
}

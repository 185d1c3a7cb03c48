//! ProcessorBuilder - CompletionProcessor の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - ScoreStore が未設定なら build() で BuildError
//! - 設定値の検証も build() 時に行う
//!
//! FailureSink と Clock は省略可能（TracingFailureSink / SystemClock）。

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::applier::RewardApplier;
use super::channel::{EnqueueMode, event_channel};
use super::consumer::{CompletionConsumer, ConsumerState};
use super::processor::CompletionProcessor;
use super::stats::ProcessorStats;
use crate::config::{ConfigError, ProcessorConfig};
use crate::impls::TracingFailureSink;
use crate::ports::{Clock, FailureSink, ScoreStore, SystemClock};

/// BuildError は processor 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no score store configured")]
    MissingScoreStore,

    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

/// # 使用例
/// ```ignore
/// let mut processor = ProcessorBuilder::new()
///     .config(ProcessorConfig::from_env()?)
///     .score_store(store)
///     .failure_sink(Arc::new(TracingFailureSink))
///     .build()?;
/// processor.start()?;
/// ```
pub struct ProcessorBuilder {
    config: ProcessorConfig,
    store: Option<Arc<dyn ScoreStore>>,
    sink: Option<Arc<dyn FailureSink>>,
    clock: Option<Arc<dyn Clock>>,
    parent_token: Option<CancellationToken>,
}

impl ProcessorBuilder {
    pub fn new() -> Self {
        Self {
            config: ProcessorConfig::default(),
            store: None,
            sink: None,
            clock: None,
            parent_token: None,
        }
    }

    pub fn config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn score_store(mut self, store: Arc<dyn ScoreStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn failure_sink(mut self, sink: Arc<dyn FailureSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Host-wide cancellation: cancelling `token` also shuts the processor down.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.parent_token = Some(token);
        self
    }

    pub fn build(self) -> Result<CompletionProcessor, BuildError> {
        self.config.validate()?;
        let store = self.store.ok_or(BuildError::MissingScoreStore)?;
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingFailureSink));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let shutdown = match self.parent_token {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        let mode = if self.config.blocking_enqueue {
            EnqueueMode::Blocking(self.config.enqueue_timeout)
        } else {
            EnqueueMode::NonBlocking
        };

        let stats = Arc::new(ProcessorStats::default());
        let (state, _) = watch::channel(ConsumerState::Idle);
        let state = Arc::new(state);
        let (sender, receiver) =
            event_channel(self.config.capacity, mode, shutdown.clone(), Arc::clone(&stats));

        let consumer = CompletionConsumer::new(
            receiver,
            RewardApplier::new(store, self.config.attempt_timeout),
            self.config.retry_policy(),
            sink,
            clock,
            Arc::clone(&stats),
            Arc::clone(&state),
            shutdown.clone(),
        );

        Ok(CompletionProcessor::new(
            sender,
            consumer,
            shutdown,
            state,
            stats,
            self.config.drain_timeout,
        ))
    }
}

impl Default for ProcessorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//! homechore-core
//!
//! Task-completion reward pipeline for the household task backend.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, event, model, errors, outcome）
//! - **ports**: 抽象化レイヤー（ScoreStore, TaskRepository, Clock, IdGenerator, FailureSink）
//! - **app**: channel / consumer / processor / service
//! - **impls**: 実装（InMemoryHousehold, FailureSink 各種）
//! - **config**: ProcessorConfig（環境変数 `HOMECHORE_*`）

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{CompletionProcessor, EventSender, ProcessorBuilder, TaskCompletionService};
pub use config::ProcessorConfig;
pub use domain::{CompletionEvent, EnqueueError};

//! App - アプリケーション層
//!
//! ports を組み合わせて completion パイプラインを実装します。
//!
//! # 主要コンポーネント
//! - **EventChannel**: 有界キュー（channel）
//! - **RewardApplier**: 1 回分の加点（applier）
//! - **CompletionConsumer**: 単一 consumer ループ（consumer）
//! - **CompletionProcessor**: start / shutdown のライフサイクル（processor）
//! - **ProcessorBuilder**: 構築とワイヤリング（builder）
//! - **TaskCompletionService**: producer 側の完了処理（service）

pub mod applier;
pub mod builder;
pub mod channel;
pub mod consumer;
pub mod processor;
pub mod retry;
pub mod service;
pub mod stats;

pub use self::applier::RewardApplier;
pub use self::builder::{BuildError, ProcessorBuilder};
pub use self::channel::{EnqueueMode, EventReceiver, EventSender};
pub use self::consumer::{CompletionConsumer, ConsumerState};
pub use self::processor::{CompletionProcessor, ShutdownError, StartError};
pub use self::retry::RetryPolicy;
pub use self::service::{CompleteTaskError, TaskCompletionService};
pub use self::stats::{ProcessorStats, StatsSnapshot};

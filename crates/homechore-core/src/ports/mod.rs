//! Ports - 抽象化レイヤー
//!
//! パイプラインが外部（グラフ DB、時刻、監視）に依存する境界を trait で定義します。
//! 実装は `impls` に置きます（開発・テスト用の in-memory 実装）。

pub mod clock;
pub mod failure_sink;
pub mod id_generator;
pub mod score_store;
pub mod task_repository;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::failure_sink::FailureSink;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::score_store::ScoreStore;
pub use self::task_repository::TaskRepository;

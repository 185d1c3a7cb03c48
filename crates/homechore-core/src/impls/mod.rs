//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryHousehold**: ScoreStore + TaskRepository のグラフ DB 代替
//! - **TracingFailureSink / ChannelFailureSink / FnFailureSink**: FailureSink
//!
//! 本番のグラフ DB 実装はこのクレートの外に置きます。

pub mod inmem_household;
pub mod sinks;

pub use self::inmem_household::InMemoryHousehold;
pub use self::sinks::{ChannelFailureSink, FnFailureSink, TracingFailureSink};

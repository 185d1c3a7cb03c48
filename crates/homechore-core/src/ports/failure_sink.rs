//! FailureSink port - 破棄されたイベントの通知先
//!
//! consumer はイベントを破棄するたびに（retry 枯渇・恒久エラー・shutdown）
//! `report` を 1 回呼びます。ホストはここでログ・アラートを行います。

use crate::domain::FailureReport;

/// 呼び出しは consumer ループ上で同期的に行われるので、重い処理は避けること。
pub trait FailureSink: Send + Sync {
    fn report(&self, report: FailureReport);
}

//! Errors - エラー型と分類
//!
//! - producer に同期的に返るもの: [`EnqueueError`]
//! - 外部ストアが返すもの: [`StoreError`]
//! - 加点処理の結果: [`ApplyError`]（[`ErrorKind`] で retry 可否を判定）

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// ErrorKind は実行エラーの運用分類
///
/// - Transient: 一時的なエラー（リトライする）
/// - Permanent: 恒久的なエラー（リトライ無意味、即 failure sink へ）
/// - Cancelled: shutdown 競合でのみ発生（監視上のエラーではない）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transient,
    Permanent,
    Cancelled,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transient)
    }
}

/// Returned synchronously from `enqueue`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnqueueError {
    #[error("completion channel is full")]
    ChannelFull,

    #[error("completion consumer is stopped")]
    ConsumerStopped,

    #[error("enqueue cancelled")]
    Cancelled,
}

/// Failure kinds reported by a [`crate::ports::ScoreStore`] or
/// [`crate::ports::TaskRepository`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Unknown(String),
}

impl StoreError {
    /// `Unknown` is retried like `Unavailable`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Unavailable(_) | StoreError::Unknown(_) => ErrorKind::Transient,
            StoreError::NotFound(_) => ErrorKind::Permanent,
        }
    }
}

/// Result of one reward application attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed event: {0}")]
    Malformed(String),
}

impl ApplyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApplyError::Store(err) => err.kind(),
            ApplyError::Timeout(_) => ErrorKind::Transient,
            ApplyError::Malformed(_) => ErrorKind::Permanent,
        }
    }
}

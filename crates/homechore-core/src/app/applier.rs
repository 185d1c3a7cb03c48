//! RewardApplier - 1 回分の加点処理
//!
//! ScoreStore への呼び出しを per-attempt timeout で包み、結果を
//! [`ApplyError`] に変換します。リトライ判定は consumer 側の責務です。

use std::sync::Arc;
use std::time::Duration;

use crate::domain::{ApplyError, CompletionEvent};
use crate::ports::ScoreStore;

pub struct RewardApplier {
    store: Arc<dyn ScoreStore>,
    attempt_timeout: Duration,
}

impl RewardApplier {
    pub fn new(store: Arc<dyn ScoreStore>, attempt_timeout: Duration) -> Self {
        Self {
            store,
            attempt_timeout,
        }
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// One attempt. A store call still running at the timeout is dropped and
    /// reported as `ApplyError::Timeout`.
    pub async fn apply(&self, event: &CompletionEvent) -> Result<(), ApplyError> {
        if event.user_id().as_str().trim().is_empty() {
            return Err(ApplyError::Malformed("empty user id".into()));
        }
        if event.task_id().as_str().trim().is_empty() {
            return Err(ApplyError::Malformed("empty task id".into()));
        }

        let key = event.idempotency_key();
        let call = self
            .store
            .apply_reward(event.user_id(), event.reward().points(), &key);

        match tokio::time::timeout(self.attempt_timeout, call).await {
            Ok(result) => result.map_err(ApplyError::from),
            Err(_elapsed) => Err(ApplyError::Timeout(self.attempt_timeout)),
        }
    }
}

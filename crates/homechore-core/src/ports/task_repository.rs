//! TaskRepository port - producer 側が加点前に使うタスク操作
//!
//! `(User)-[:LIVES_IN]->(Home)-[:HAS_TASK]->(Task)` を辿って
//! タスクの存在と所属を確認し、status を finished にします。

use async_trait::async_trait;

use crate::domain::{HomeId, StoreError, TaskAssignment, TaskId, UserId};

#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Resolve `task_id` through the homes `user_id` lives in.
    ///
    /// `Ok(None)` when the user exists but no home of theirs has the task.
    /// `Err(StoreError::NotFound)` when the user does not exist.
    async fn find_task(
        &self,
        user_id: &UserId,
        task_id: &TaskId,
    ) -> Result<Option<TaskAssignment>, StoreError>;

    /// Flip the `HAS_TASK` status from pending to finished.
    ///
    /// Returns `false` when the task was already finished, so of two
    /// concurrent callers exactly one gets `true`
    /// (`... WHERE r.status = 'pending' SET r.status = 'finished'`).
    async fn mark_finished(
        &self,
        home_id: HomeId,
        task_id: &TaskId,
    ) -> Result<bool, StoreError>;
}

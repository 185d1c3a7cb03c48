//! TaskCompletionService - producer 側の「タスク完了」処理
//!
//! # フロー
//! 1. TaskRepository::find_task() で user の home にタスクがあるか確認
//! 2. すでに finished なら拒否（同じ完了で二度加点しない）
//! 3. TaskRepository::mark_finished() で pending → finished
//!    （compare-and-set。並行した完了に負けたら 2. と同じく拒否）
//! 4. CompletionEvent を作って enqueue（結果は待たない）

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use super::channel::EventSender;
use crate::domain::{
    CompletionEvent, EnqueueError, StoreError, Task, TaskId, TaskStatus, UserId,
};
use crate::ports::{Clock, IdGenerator, TaskRepository};

#[derive(Debug, Error)]
pub enum CompleteTaskError {
    #[error("task {task_id} not found for user {user_id}")]
    TaskNotFound { user_id: UserId, task_id: TaskId },

    #[error("task {0} is already finished")]
    AlreadyFinished(TaskId),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The task is finished but no reward was queued.
    #[error("reward not queued: {0}")]
    Enqueue(#[from] EnqueueError),
}

pub struct TaskCompletionService {
    repository: Arc<dyn TaskRepository>,
    sender: EventSender,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl TaskCompletionService {
    pub fn new(
        repository: Arc<dyn TaskRepository>,
        sender: EventSender,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            repository,
            sender,
            clock,
            ids,
        }
    }

    /// Mark `task_id` finished for `user_id` and queue the reward.
    ///
    /// Returns the finished task as soon as the event is queued.
    pub async fn complete_task(
        &self,
        user_id: &UserId,
        task_id: &TaskId,
    ) -> Result<Task, CompleteTaskError> {
        let assignment = self
            .repository
            .find_task(user_id, task_id)
            .await?
            .ok_or_else(|| CompleteTaskError::TaskNotFound {
                user_id: user_id.clone(),
                task_id: task_id.clone(),
            })?;

        if assignment.task.status.is_finished() {
            return Err(CompleteTaskError::AlreadyFinished(task_id.clone()));
        }

        let flipped = self
            .repository
            .mark_finished(assignment.home_id, task_id)
            .await?;
        if !flipped {
            return Err(CompleteTaskError::AlreadyFinished(task_id.clone()));
        }

        let task = Task {
            status: TaskStatus::Finished,
            ..assignment.task
        };
        let event = CompletionEvent::new(
            self.ids.generate_event_id(),
            task.name.clone(),
            user_id.clone(),
            task.reward,
            self.clock.now(),
        );
        let event_id = event.event_id();

        if let Err(err) = self.sender.enqueue(event).await {
            warn!(
                %event_id,
                %user_id,
                %task_id,
                error = %err,
                "task finished but reward could not be queued"
            );
            return Err(err.into());
        }

        info!(%event_id, %user_id, %task_id, reward = task.reward.points(), "task completed");
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{EnqueueMode, ProcessorBuilder};
    use crate::config::ProcessorConfig;
    use crate::domain::{HomeId, Reward, TaskAssignment, User};
    use crate::impls::InMemoryHousehold;
    use crate::ports::{FixedClock, UlidGenerator};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use tokio::sync::Barrier;

    struct Fixture {
        household: Arc<InMemoryHousehold>,
        home: HomeId,
        ana: UserId,
        processor: crate::app::CompletionProcessor,
        service: TaskCompletionService,
    }

    async fn fixture(capacity: usize) -> Fixture {
        let household = Arc::new(InMemoryHousehold::new());
        let ana = household
            .upsert_user(User::new("Ana", "ana@example.com"))
            .await
            .email;
        let home = household.create_home(&ana, "Casa").await.unwrap();
        household
            .upsert_task(&ana, Task::pending("dishes", Reward::new(10).unwrap()))
            .await
            .unwrap();

        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 2, 1, 18, 0, 0).unwrap(),
        ));
        let processor = ProcessorBuilder::new()
            .config(ProcessorConfig {
                capacity,
                ..ProcessorConfig::default()
            })
            .score_store(household.clone())
            .clock(clock.clone())
            .build()
            .unwrap();
        let service = TaskCompletionService::new(
            household.clone(),
            processor.sender(),
            clock.clone(),
            Arc::new(UlidGenerator::new(clock)),
        );

        Fixture {
            household,
            home,
            ana,
            processor,
            service,
        }
    }

    #[tokio::test]
    async fn complete_task_marks_finished_and_queues_event() {
        let f = fixture(4).await;

        let task = f
            .service
            .complete_task(&f.ana, &TaskId::new("dishes"))
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Finished);

        let home = f.household.home(f.home).await.unwrap();
        assert_eq!(home.tasks[0].status, TaskStatus::Finished);
        assert_eq!(f.processor.stats().enqueued, 1);
    }

    #[tokio::test]
    async fn completing_twice_is_rejected() {
        let f = fixture(4).await;
        let dishes = TaskId::new("dishes");
        f.service.complete_task(&f.ana, &dishes).await.unwrap();

        let err = f.service.complete_task(&f.ana, &dishes).await.unwrap_err();
        assert!(matches!(err, CompleteTaskError::AlreadyFinished(_)));
        assert_eq!(f.processor.stats().enqueued, 1);
    }

    /// Lets every caller finish `find_task` before any of them marks the task.
    struct InterleavingRepository {
        inner: Arc<InMemoryHousehold>,
        after_find: Barrier,
    }

    #[async_trait]
    impl TaskRepository for InterleavingRepository {
        async fn find_task(
            &self,
            user_id: &UserId,
            task_id: &TaskId,
        ) -> Result<Option<TaskAssignment>, StoreError> {
            let found = self.inner.find_task(user_id, task_id).await;
            self.after_find.wait().await;
            found
        }

        async fn mark_finished(
            &self,
            home_id: HomeId,
            task_id: &TaskId,
        ) -> Result<bool, StoreError> {
            self.inner.mark_finished(home_id, task_id).await
        }
    }

    #[tokio::test]
    async fn concurrent_completions_reward_once() {
        let f = fixture(4).await;
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 2, 1, 18, 0, 0).unwrap(),
        ));
        let service = TaskCompletionService::new(
            Arc::new(InterleavingRepository {
                inner: f.household.clone(),
                after_find: Barrier::new(2),
            }),
            f.processor.sender(),
            clock.clone(),
            Arc::new(UlidGenerator::new(clock)),
        );
        let dishes = TaskId::new("dishes");

        let (first, second) = tokio::join!(
            service.complete_task(&f.ana, &dishes),
            service.complete_task(&f.ana, &dishes)
        );

        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(CompleteTaskError::AlreadyFinished(_))))
        );
        assert_eq!(f.processor.stats().enqueued, 1);
    }

    #[tokio::test]
    async fn unknown_task_is_not_found() {
        let f = fixture(4).await;
        let err = f
            .service
            .complete_task(&f.ana, &TaskId::new("mow"))
            .await
            .unwrap_err();
        assert!(matches!(err, CompleteTaskError::TaskNotFound { .. }));
    }

    #[tokio::test]
    async fn unknown_user_is_store_not_found() {
        let f = fixture(4).await;
        let err = f
            .service
            .complete_task(&UserId::new("ghost@example.com"), &TaskId::new("dishes"))
            .await
            .unwrap_err();
        assert!(matches!(err, CompleteTaskError::Store(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn full_channel_surfaces_enqueue_error() {
        let f = fixture(1).await;
        f.household
            .upsert_task(&f.ana, Task::pending("trash", Reward::new(3).unwrap()))
            .await
            .unwrap();
        assert_eq!(f.processor.sender().mode(), EnqueueMode::NonBlocking);

        f.service
            .complete_task(&f.ana, &TaskId::new("dishes"))
            .await
            .unwrap();
        let err = f
            .service
            .complete_task(&f.ana, &TaskId::new("trash"))
            .await
            .unwrap_err();
        assert!(matches!(err, CompleteTaskError::Enqueue(EnqueueError::ChannelFull)));
    }

    #[tokio::test]
    async fn reward_reaches_score_once_processor_runs() {
        let mut f = fixture(4).await;
        f.processor.start().unwrap();
        f.service
            .complete_task(&f.ana, &TaskId::new("dishes"))
            .await
            .unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            while f.processor.stats().applied < 1 {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("reward should be applied");

        assert_eq!(f.household.user(&f.ana).await.unwrap().score, 10);
        f.processor
            .shutdown(std::time::Duration::from_secs(1))
            .await
            .unwrap();
    }
}

//! CompletionEvent - タスク完了による加点要求
//!
//! 生成後は不変（フィールドは private、accessor のみ）。
//! producer → channel → consumer へ所有権ごと移動します。

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{EventId, TaskId, UserId};

/// Points credited for finishing a task. Never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Reward(i64);

/// Returned when a reward would be negative.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("reward must be non-negative, got {0}")]
pub struct InvalidReward(pub i64);

impl Reward {
    pub const ZERO: Reward = Reward(0);

    pub fn new(points: i64) -> Result<Self, InvalidReward> {
        if points < 0 {
            return Err(InvalidReward(points));
        }
        Ok(Self(points))
    }

    pub fn points(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Reward {
    type Error = InvalidReward;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Reward> for i64 {
    fn from(reward: Reward) -> Self {
        reward.0
    }
}

impl fmt::Display for Reward {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Deduplication key handed to the score store on every attempt.
///
/// Derived from the task and the completion timestamp, so retries of the same
/// event share a key while a later completion of the same task does not.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// One task completion that needs a score update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    event_id: EventId,
    task_id: TaskId,
    user_id: UserId,
    reward: Reward,
    enqueued_at: DateTime<Utc>,
}

impl CompletionEvent {
    pub fn new(
        event_id: EventId,
        task_id: TaskId,
        user_id: UserId,
        reward: Reward,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id,
            task_id,
            user_id,
            reward,
            enqueued_at,
        }
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn reward(&self) -> Reward {
        self.reward
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    /// `"{task_id}@{enqueued_at}"` with millisecond precision.
    pub fn idempotency_key(&self) -> IdempotencyKey {
        IdempotencyKey(format!(
            "{}@{}",
            self.task_id,
            self.enqueued_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use ulid::Ulid;

    fn event_at(task: &str, at: DateTime<Utc>) -> CompletionEvent {
        CompletionEvent::new(
            EventId::from_ulid(Ulid::new()),
            TaskId::new(task),
            UserId::new("ana@example.com"),
            Reward::new(10).unwrap(),
            at,
        )
    }

    #[rstest]
    #[case(0, true)]
    #[case(15, true)]
    #[case(-1, false)]
    fn reward_rejects_negative_points(#[case] points: i64, #[case] ok: bool) {
        assert_eq!(Reward::new(points).is_ok(), ok);
    }

    #[test]
    fn negative_reward_fails_to_deserialize() {
        let parsed: Result<Reward, _> = serde_json::from_str("-5");
        assert!(parsed.is_err());
    }

    #[test]
    fn idempotency_key_combines_task_and_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let event = event_at("dishes", at);
        assert_eq!(event.idempotency_key().as_str(), "dishes@2024-03-01T09:30:00.000Z");
    }

    #[test]
    fn same_task_completed_twice_gets_distinct_keys() {
        let first = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 3, 2, 9, 30, 0).unwrap();
        assert_ne!(
            event_at("dishes", first).idempotency_key(),
            event_at("dishes", second).idempotency_key()
        );
    }

    #[test]
    fn clones_share_the_key() {
        let event = event_at("laundry", Utc::now());
        assert_eq!(event.clone().idempotency_key(), event.idempotency_key());
    }
}

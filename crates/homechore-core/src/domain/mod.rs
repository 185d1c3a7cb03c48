//! Domain model (IDs, events, household entities, errors, outcomes).

pub mod errors;
pub mod event;
pub mod ids;
pub mod model;
pub mod outcome;

pub use self::errors::{ApplyError, EnqueueError, ErrorKind, StoreError};
pub use self::event::{CompletionEvent, IdempotencyKey, InvalidReward, Reward};
pub use self::ids::{EventId, HomeId, TaskId, UserId};
pub use self::model::{Home, Task, TaskAssignment, TaskStatus, User};
pub use self::outcome::{DropReason, FailureReport};

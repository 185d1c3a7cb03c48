//! Terminal outcomes of a completion event.
//!
//! Only drops are reported outward (see [`crate::ports::FailureSink`]); a
//! successful application is visible through the stats counters alone.

use serde::{Deserialize, Serialize};

use super::errors::ErrorKind;
use super::event::CompletionEvent;

/// Why an event left the pipeline without being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DropReason {
    /// Every attempt failed transiently.
    RetriesExhausted,

    /// The first non-retryable failure.
    Permanent,

    /// Shutdown arrived before the event could be applied.
    Cancelled,
}

impl DropReason {
    pub fn kind(self) -> ErrorKind {
        match self {
            DropReason::RetriesExhausted => ErrorKind::Transient,
            DropReason::Permanent => ErrorKind::Permanent,
            DropReason::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Full payload handed to the failure sink when an event is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub event: CompletionEvent,
    pub reason: DropReason,

    /// Number of `apply_reward` calls made for this event.
    pub attempts: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl FailureReport {
    pub fn new(
        event: CompletionEvent,
        reason: DropReason,
        attempts: u32,
        last_error: Option<String>,
    ) -> Self {
        Self {
            event,
            reason,
            attempts,
            last_error,
        }
    }

    pub fn cancelled(event: CompletionEvent, attempts: u32) -> Self {
        Self::new(event, DropReason::Cancelled, attempts, None)
    }

    /// `false` for shutdown cancellations.
    pub fn is_alertable(&self) -> bool {
        self.reason != DropReason::Cancelled
    }
}
